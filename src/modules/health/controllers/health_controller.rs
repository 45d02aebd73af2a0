use std::sync::Arc;
use std::time::Instant;

use actix_web::{web, HttpResponse, Responder};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::modules::invoices::services::InvoiceService;

#[derive(Debug, Serialize, Deserialize)]
pub struct LivenessResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub store: StoreCheck,
}

/// Result of pinging the record store
#[derive(Debug, Serialize, Deserialize)]
pub struct StoreCheck {
    pub backend: String,
    pub reachable: bool,
    pub latency_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// GET /health
pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(LivenessResponse {
        status: "alive".to_string(),
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
    })
}

/// GET /ready - 503 until the record store answers
pub async fn readiness_check(service: web::Data<Arc<InvoiceService>>) -> impl Responder {
    let store = service.store();
    let started = Instant::now();
    let ping = store.ping().await;
    let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    let check = match ping {
        Ok(()) => StoreCheck {
            backend: store.backend().to_string(),
            reachable: true,
            latency_ms,
            error: None,
        },
        Err(e) => {
            tracing::error!(backend = store.backend(), error = %e, "Store readiness check failed");
            StoreCheck {
                backend: store.backend().to_string(),
                reachable: false,
                latency_ms,
                error: Some(e.to_string()),
            }
        }
    };

    let response = ReadinessResponse {
        ready: check.reachable,
        store: check,
    };

    if response.ready {
        HttpResponse::Ok().json(response)
    } else {
        HttpResponse::ServiceUnavailable().json(response)
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/ready", web::get().to(readiness_check));
}
