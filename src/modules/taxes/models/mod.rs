mod computation;
mod order_context;
mod tax_rule;

pub use computation::{
    GroupedTaxLine, OrderTaxBreakdown, OrderTaxSnapshot, TaxComputationResult, TaxLine,
    TaxSnapshot,
};
pub use order_context::{OrderAmountContext, OrderLineItem, MAX_ORDER_AMOUNT};
pub use tax_rule::{
    CreateTaxRuleRequest, OrderType, TaxCategory, TaxConditions, TaxKind, TaxPhase, TaxRule,
    TaxScope, UpdateTaxRuleRequest,
};
