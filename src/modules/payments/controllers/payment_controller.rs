use std::sync::Arc;

use actix_web::{web, HttpResponse};

use crate::core::error::AppError;
use crate::modules::invoices::services::InvoiceService;
use crate::modules::payments::models::RecordPaymentRequest;

/// Record a payment against a sent invoice
/// POST /invoices/{id}/payments
pub async fn record_payment(
    service: web::Data<Arc<InvoiceService>>,
    path: web::Path<String>,
    request: web::Json<RecordPaymentRequest>,
) -> Result<HttpResponse, AppError> {
    let outcome = service
        .record_payment(&path.into_inner(), request.into_inner())
        .await?;

    Ok(HttpResponse::Created().json(outcome))
}

/// DELETE /invoices/{id}/payments/{payment_id}
pub async fn delete_payment(
    service: web::Data<Arc<InvoiceService>>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, AppError> {
    let (invoice_id, payment_id) = path.into_inner();
    let outcome = service.delete_payment(&invoice_id, &payment_id).await?;

    Ok(HttpResponse::Ok().json(outcome))
}

/// Configure payment routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/invoices/{id}/payments").route(web::post().to(record_payment)))
        .service(
            web::resource("/invoices/{id}/payments/{payment_id}")
                .route(web::delete().to(delete_payment)),
        );
}
