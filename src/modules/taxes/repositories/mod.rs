pub mod in_memory;
pub mod order_tax_repository;
pub mod tax_rule_repository;

pub use in_memory::InMemoryTaxStore;
pub use order_tax_repository::{MySqlOrderTaxRepository, OrderTaxStore};
pub use tax_rule_repository::{MySqlTaxRuleRepository, TaxRuleFilter, TaxRuleStore};
