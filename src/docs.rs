use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::api::validate::validate_device,
        crate::api::renew::renew_service,
        crate::api::cron::expiry_check,
        crate::api::services::list_services,
        crate::api::services::get_service,
        crate::api::services::create_service,
        crate::api::services::create_services_bulk,
        crate::api::services::update_service,
        crate::api::services::delete_service,
        crate::api::services::renew_history,
        crate::api::customers::list_customers,
        crate::api::customers::get_customer,
        crate::api::customers::create_customer,
        crate::api::customers::delete_customer,
        crate::api::reminders::list_reminders,
        crate::api::reminders::delete_reminder,
        crate::api::notifications::list_notifications,
        crate::api::notifications::mark_read,
        crate::api::notifications::mark_all_read,
        crate::api::logs::list_api_logs
    ),
    components(
        schemas(
            crate::models::PaymentType,
            crate::models::Currency,
            crate::trial::DeviceValidationRequest,
            crate::trial::ValidationResponse,
            crate::trial::ValidatedService,
            crate::api::renew::RenewRequest,
            crate::services::NewServiceRequest,
            crate::services::ServiceUpdateRequest,
            crate::customers::NewCustomerRequest
        )
    ),
    tags(
        (name = "devices", description = "Device validation, trials and renewals"),
        (name = "cron", description = "Externally scheduled jobs"),
        (name = "services", description = "Service administration"),
        (name = "customers", description = "Customer administration"),
        (name = "reminders", description = "Scheduled expiry reminders"),
        (name = "notifications", description = "Dashboard alert feed"),
        (name = "logs", description = "Device call audit log")
    )
)]
pub struct ApiDoc;
