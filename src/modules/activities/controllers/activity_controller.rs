use std::sync::Arc;

use actix_web::{web, HttpResponse};

use crate::core::error::AppError;
use crate::modules::invoices::services::InvoiceService;

/// Audit history of an invoice, newest first
/// GET /invoices/{id}/activity
pub async fn list_activity(
    service: web::Data<Arc<InvoiceService>>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let activities = service.list_activity(&path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(activities))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/invoices/{id}/activity").route(web::get().to(list_activity)));
}
