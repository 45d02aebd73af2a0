use std::sync::Arc;

use actix_web::{web, HttpResponse};

use crate::core::error::AppError;
use crate::modules::invoices::models::{
    AddLineItemRequest, CreateInvoiceRequest, SetStatusRequest, UpdateLineItemRequest,
    UpdateTaxRateRequest,
};
use crate::modules::invoices::services::invoice_service::InvoiceService;

/// Create a draft invoice
/// POST /invoices
pub async fn create_invoice(
    service: web::Data<Arc<InvoiceService>>,
    request: web::Json<CreateInvoiceRequest>,
) -> Result<HttpResponse, AppError> {
    let invoice = service.create_invoice(request.into_inner()).await?;

    Ok(HttpResponse::Created().json(invoice))
}

/// Get invoice with line items and payments
/// GET /invoices/{id}
pub async fn get_invoice(
    service: web::Data<Arc<InvoiceService>>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let detail = service.get_invoice(&path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(detail))
}

/// Soft-delete an invoice
/// DELETE /invoices/{id}
pub async fn delete_invoice(
    service: web::Data<Arc<InvoiceService>>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    service.delete_invoice(&path.into_inner()).await?;

    Ok(HttpResponse::NoContent().finish())
}

/// PUT /invoices/{id}/tax-rate
pub async fn update_tax_rate(
    service: web::Data<Arc<InvoiceService>>,
    path: web::Path<String>,
    request: web::Json<UpdateTaxRateRequest>,
) -> Result<HttpResponse, AppError> {
    let outcome = service
        .update_tax_rate(&path.into_inner(), request.into_inner())
        .await?;

    Ok(HttpResponse::Ok().json(outcome))
}

/// POST /invoices/{id}/line-items
pub async fn add_line_item(
    service: web::Data<Arc<InvoiceService>>,
    path: web::Path<String>,
    request: web::Json<AddLineItemRequest>,
) -> Result<HttpResponse, AppError> {
    let outcome = service
        .add_line_item(&path.into_inner(), request.into_inner())
        .await?;

    Ok(HttpResponse::Created().json(outcome))
}

/// PATCH /invoices/{id}/line-items/{line_item_id}
pub async fn update_line_item(
    service: web::Data<Arc<InvoiceService>>,
    path: web::Path<(String, String)>,
    request: web::Json<UpdateLineItemRequest>,
) -> Result<HttpResponse, AppError> {
    let (invoice_id, line_item_id) = path.into_inner();
    let outcome = service
        .update_line_item(&invoice_id, &line_item_id, request.into_inner())
        .await?;

    Ok(HttpResponse::Ok().json(outcome))
}

/// DELETE /invoices/{id}/line-items/{line_item_id}
pub async fn remove_line_item(
    service: web::Data<Arc<InvoiceService>>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, AppError> {
    let (invoice_id, line_item_id) = path.into_inner();
    let outcome = service
        .remove_line_item(&invoice_id, &line_item_id)
        .await?;

    Ok(HttpResponse::Ok().json(outcome))
}

/// Move a draft to SENT
/// POST /invoices/{id}/send
pub async fn send_invoice(
    service: web::Data<Arc<InvoiceService>>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let outcome = service.send(&path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(outcome))
}

/// Operator status override
/// PUT /invoices/{id}/status
pub async fn set_status(
    service: web::Data<Arc<InvoiceService>>,
    path: web::Path<String>,
    request: web::Json<SetStatusRequest>,
) -> Result<HttpResponse, AppError> {
    let outcome = service
        .set_status(&path.into_inner(), request.into_inner())
        .await?;

    Ok(HttpResponse::Ok().json(outcome))
}

/// Configure invoice routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/invoices").route(web::post().to(create_invoice)))
        .service(
            web::resource("/invoices/{id}")
                .route(web::get().to(get_invoice))
                .route(web::delete().to(delete_invoice)),
        )
        .service(web::resource("/invoices/{id}/tax-rate").route(web::put().to(update_tax_rate)))
        .service(web::resource("/invoices/{id}/line-items").route(web::post().to(add_line_item)))
        .service(
            web::resource("/invoices/{id}/line-items/{line_item_id}")
                .route(web::patch().to(update_line_item))
                .route(web::delete().to(remove_line_item)),
        )
        .service(web::resource("/invoices/{id}/send").route(web::post().to(send_invoice)))
        .service(web::resource("/invoices/{id}/status").route(web::put().to(set_status)));
}
