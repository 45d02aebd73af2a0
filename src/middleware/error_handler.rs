use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    error::{JsonPayloadError, PathError},
    web, Error, HttpRequest,
};
use futures_util::future::LocalBoxFuture;
use std::future::{ready, Ready};
use std::rc::Rc;

use crate::core::AppError;

/// Middleware that logs every failed request with its status and route
pub struct ErrorHandler;

impl<S> Transform<S, ServiceRequest> for ErrorHandler
where
    S: Service<ServiceRequest, Response = ServiceResponse, Error = Error> + 'static,
    S::Future: 'static,
{
    type Response = ServiceResponse;
    type Error = Error;
    type InitError = ();
    type Transform = ErrorHandlerMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ErrorHandlerMiddleware {
            service: Rc::new(service),
        }))
    }
}

pub struct ErrorHandlerMiddleware<S> {
    service: Rc<S>,
}

impl<S> Service<ServiceRequest> for ErrorHandlerMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse, Error = Error> + 'static,
    S::Future: 'static,
{
    type Response = ServiceResponse;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let method = req.method().clone();
        let path = req.path().to_string();

        Box::pin(async move {
            let result = service.call(req).await;

            match &result {
                Ok(response) => {
                    let status = response.status();
                    if let Some(err) = response.response().error() {
                        if status.is_server_error() {
                            tracing::error!(%method, %path, status = status.as_u16(), error = %err, "Request failed");
                        } else {
                            tracing::debug!(%method, %path, status = status.as_u16(), error = %err, "Request rejected");
                        }
                    }
                }
                Err(err) => {
                    tracing::error!(%method, %path, error = ?err, "Request error");
                }
            }

            result
        })
    }
}

/// JSON extractor configuration: malformed bodies become validation errors
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(64 * 1024)
        .error_handler(json_error_handler)
}

/// Path extractor configuration
pub fn path_config() -> web::PathConfig {
    web::PathConfig::default().error_handler(path_error_handler)
}

pub fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> Error {
    let message = match &err {
        JsonPayloadError::Deserialize(e) => format!("Invalid request body: {}", e),
        JsonPayloadError::ContentType => "Content type must be application/json".to_string(),
        JsonPayloadError::OverflowKnownLength { .. } | JsonPayloadError::Overflow { .. } => {
            "Request body too large".to_string()
        }
        other => format!("Invalid JSON payload: {}", other),
    };

    AppError::validation(message).into()
}

fn path_error_handler(err: PathError, _req: &HttpRequest) -> Error {
    AppError::validation(format!("Invalid path parameter: {}", err)).into()
}
