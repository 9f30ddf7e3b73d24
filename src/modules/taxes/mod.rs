pub mod controllers;
pub mod models;
pub mod repositories;
pub mod services;

pub use models::{OrderAmountContext, TaxComputationResult, TaxRule};
pub use repositories::{InMemoryTaxStore, OrderTaxStore, TaxRuleStore};
pub use services::{ApplicabilityResolver, DisplayGrouper, TaxCalculator, TaxService};
