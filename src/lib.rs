//! Tablefare restaurant tax engine
//!
//! Resolves which tax rules apply to an order, computes cascading taxes with
//! per-rule rounding, and groups the resulting lines for display.

pub mod config;
pub mod core;
pub mod middleware;
pub mod modules;

use actix_web::web;

// Re-export commonly used types
pub use modules::health;
pub use modules::taxes;

/// Register every route together with the JSON and query error handlers.
///
/// The caller supplies `web::Data<Arc<TaxService>>` and, when running on
/// MySQL, `web::Data<MySqlPool>` for the readiness probe.
pub fn configure_app(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(middleware::json_error_handler))
        .app_data(web::QueryConfig::default().error_handler(middleware::query_error_handler))
        .configure(health::configure)
        .configure(taxes::controllers::configure);
}
