use actix_web::web;

pub mod activities;
pub mod health;
pub mod invoices;
pub mod payments;

/// Register every HTTP route
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.configure(health::controllers::configure)
        .configure(invoices::controllers::configure)
        .configure(payments::controllers::configure)
        .configure(activities::controllers::configure);
}
