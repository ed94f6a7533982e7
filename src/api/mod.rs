pub mod auth;
pub mod cron;
pub mod customers;
pub mod logs;
pub mod notifications;
pub mod reminders;
pub mod renew;
pub mod services;
pub mod validate;

use actix_web::web;
use actix_web::HttpRequest;

/// Public device and scheduler endpoints.
pub fn public_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(validate::validate_device)
        .service(renew::renew_service)
        .service(cron::expiry_check);
}

/// Staff endpoints; mount inside a scope wrapped by [`auth::JwtMiddleware`].
pub fn admin_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(services::list_services)
        .service(services::create_service)
        .service(services::get_service)
        .service(services::update_service)
        .service(services::delete_service)
        .service(services::renew_history)
        .service(services::create_services_bulk)
        .service(customers::list_customers)
        .service(customers::create_customer)
        .service(customers::get_customer)
        .service(customers::delete_customer)
        .service(reminders::list_reminders)
        .service(reminders::delete_reminder)
        .service(notifications::list_notifications)
        .service(notifications::mark_all_read)
        .service(notifications::mark_read)
        .service(logs::list_api_logs);
}

pub(crate) fn client_ip(req: &HttpRequest) -> Option<String> {
    req.connection_info().realip_remote_addr().map(str::to_string)
}

pub(crate) fn user_agent(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(actix_web::http::header::USER_AGENT)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string)
}
