use std::sync::Arc;

use actix_web::{web, HttpResponse};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::core::error::AppError;
use crate::modules::taxes::models::{
    CreateTaxRuleRequest, OrderAmountContext, OrderLineItem, OrderType, UpdateTaxRuleRequest,
};
use crate::modules::taxes::repositories::TaxRuleFilter;
use crate::modules::taxes::services::TaxService;

/// Order payload for previewing or finalizing taxes
#[derive(Debug, Clone, Deserialize)]
pub struct CalculateTaxRequest {
    #[serde(default)]
    pub branch_id: Option<String>,
    pub order_type: OrderType,
    #[serde(default)]
    pub line_items: Vec<OrderLineItem>,
    /// Explicit subtotal, e.g. after discounts; defaults to the line item sum
    #[serde(default)]
    pub subtotal: Option<Decimal>,
}

impl CalculateTaxRequest {
    pub fn into_context(self, restaurant_id: &str) -> Result<OrderAmountContext, AppError> {
        match self.subtotal {
            None => OrderAmountContext::from_line_items(
                restaurant_id,
                self.branch_id,
                self.order_type,
                &self.line_items,
            ),
            Some(subtotal) => {
                let item_amounts = OrderAmountContext::merge_item_amounts(&self.line_items)?;
                OrderAmountContext::new(
                    restaurant_id,
                    self.branch_id,
                    self.order_type,
                    subtotal,
                    item_amounts,
                    &self.line_items,
                )
            }
        }
    }
}

/// Create a tax rule
/// POST /restaurants/{restaurant_id}/taxes
pub async fn create_rule(
    service: web::Data<Arc<TaxService>>,
    path: web::Path<String>,
    request: web::Json<CreateTaxRuleRequest>,
) -> Result<HttpResponse, AppError> {
    let restaurant_id = path.into_inner();
    let rule = service
        .create_rule(&restaurant_id, request.into_inner())
        .await?;

    Ok(HttpResponse::Created().json(rule))
}

/// List tax rules
/// GET /restaurants/{restaurant_id}/taxes?branch_id=&active=&category=
pub async fn list_rules(
    service: web::Data<Arc<TaxService>>,
    path: web::Path<String>,
    query: web::Query<TaxRuleFilter>,
) -> Result<HttpResponse, AppError> {
    let restaurant_id = path.into_inner();
    let rules = service.list_rules(&restaurant_id, &query).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "rules": rules })))
}

/// GET /restaurants/{restaurant_id}/taxes/{id}
pub async fn get_rule(
    service: web::Data<Arc<TaxService>>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, AppError> {
    let (restaurant_id, id) = path.into_inner();
    let rule = service.get_rule(&restaurant_id, &id).await?;

    Ok(HttpResponse::Ok().json(rule))
}

/// PATCH /restaurants/{restaurant_id}/taxes/{id}
pub async fn update_rule(
    service: web::Data<Arc<TaxService>>,
    path: web::Path<(String, String)>,
    request: web::Json<UpdateTaxRuleRequest>,
) -> Result<HttpResponse, AppError> {
    let (restaurant_id, id) = path.into_inner();
    let rule = service
        .update_rule(&restaurant_id, &id, request.into_inner())
        .await?;

    Ok(HttpResponse::Ok().json(rule))
}

/// POST /restaurants/{restaurant_id}/taxes/{id}/activate
pub async fn activate_rule(
    service: web::Data<Arc<TaxService>>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, AppError> {
    let (restaurant_id, id) = path.into_inner();
    let rule = service.set_rule_active(&restaurant_id, &id, true).await?;

    Ok(HttpResponse::Ok().json(rule))
}

/// POST /restaurants/{restaurant_id}/taxes/{id}/deactivate
pub async fn deactivate_rule(
    service: web::Data<Arc<TaxService>>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, AppError> {
    let (restaurant_id, id) = path.into_inner();
    let rule = service.set_rule_active(&restaurant_id, &id, false).await?;

    Ok(HttpResponse::Ok().json(rule))
}

/// Preview the taxes of an order
/// POST /restaurants/{restaurant_id}/taxes/calculate
pub async fn calculate(
    service: web::Data<Arc<TaxService>>,
    path: web::Path<String>,
    request: web::Json<CalculateTaxRequest>,
) -> Result<HttpResponse, AppError> {
    let restaurant_id = path.into_inner();
    let context = request.into_inner().into_context(&restaurant_id)?;
    let breakdown = service.calculate(&context).await?;

    Ok(HttpResponse::Ok().json(breakdown))
}

/// Freeze the taxes of an order
/// POST /restaurants/{restaurant_id}/taxes/orders/{order_id}/finalize
pub async fn finalize_order(
    service: web::Data<Arc<TaxService>>,
    path: web::Path<(String, String)>,
    request: web::Json<CalculateTaxRequest>,
) -> Result<HttpResponse, AppError> {
    let (restaurant_id, order_id) = path.into_inner();
    let context = request.into_inner().into_context(&restaurant_id)?;
    let snapshot = service.finalize_order_taxes(&order_id, &context).await?;

    Ok(HttpResponse::Created().json(snapshot))
}

/// GET /restaurants/{restaurant_id}/taxes/orders/{order_id}
pub async fn get_order_taxes(
    service: web::Data<Arc<TaxService>>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, AppError> {
    let (restaurant_id, order_id) = path.into_inner();
    let snapshot = service.order_tax_snapshot(&restaurant_id, &order_id).await?;

    Ok(HttpResponse::Ok().json(snapshot))
}

/// Configure tax routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    // Static segments are registered ahead of `/{id}`
    cfg.service(
        web::scope("/restaurants/{restaurant_id}/taxes")
            .route("", web::post().to(create_rule))
            .route("", web::get().to(list_rules))
            .route("/calculate", web::post().to(calculate))
            .route("/orders/{order_id}/finalize", web::post().to(finalize_order))
            .route("/orders/{order_id}", web::get().to(get_order_taxes))
            .route("/{id}", web::get().to(get_rule))
            .route("/{id}", web::patch().to(update_rule))
            .route("/{id}/activate", web::post().to(activate_rule))
            .route("/{id}/deactivate", web::post().to(deactivate_rule)),
    );
}
