use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use checkout_gateway::GatewayError;
use hosting_engine::traits::LifecycleError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("{0}")]
    Lifecycle(#[from] LifecycleError),
    #[error("Payment gateway error. {0}")]
    Gateway(#[from] GatewayError),
    #[error("Webhook signature invalid or not provided")]
    SignatureVerification,
    #[error("The webhook could not be processed in time")]
    WebhookDeadlineExceeded,
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::SignatureVerification => StatusCode::BAD_REQUEST,
            Self::WebhookDeadlineExceeded => StatusCode::SERVICE_UNAVAILABLE,
            Self::Lifecycle(e) => match e {
                LifecycleError::Validation(_) => StatusCode::BAD_REQUEST,
                LifecycleError::InvalidTransition { .. } => StatusCode::BAD_REQUEST,
                LifecycleError::OrderNotFound(_) => StatusCode::NOT_FOUND,
                LifecycleError::NotFound(_) => StatusCode::NOT_FOUND,
                LifecycleError::Conflict { .. } => StatusCode::CONFLICT,
                LifecycleError::Provisioning(_) => StatusCode::BAD_GATEWAY,
                LifecycleError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Gateway(e) => match e {
                GatewayError::ValidationError(_) => StatusCode::BAD_REQUEST,
                GatewayError::SignatureVerification => StatusCode::BAD_REQUEST,
                _ => StatusCode::BAD_GATEWAY,
            },
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}
