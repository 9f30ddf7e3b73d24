pub mod applicability_resolver;
pub mod display_grouper;
pub mod tax_calculator;
pub mod tax_service;

pub use applicability_resolver::{sort_for_evaluation, ApplicabilityResolver, Exclusion};
pub use display_grouper::DisplayGrouper;
pub use tax_calculator::TaxCalculator;
pub use tax_service::TaxService;
