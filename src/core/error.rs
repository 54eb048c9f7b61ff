use axum::http::StatusCode;
use axum::Json;
use thiserror::Error;

use crate::dto::error::ErrorDto;

#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("Image version not found - {0}")]
    ImageVersionNotFound(String),
    #[error("Request timeout reached {millis}ms")]
    RequestTimeout { millis: u128 },
    #[error("App name not found for component {0}")]
    AppNameNotFound(String),
    #[error("No desired component version - {0}")]
    NoDesiredComponentVersion(String),
    #[error("Transport error - {context}")]
    Transport {
        context: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Unexpected status {status} from {url}")]
    Status { url: String, status: u16 },
    #[error("Decode error - {context}")]
    Decode {
        context: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Upstream error - {0}")]
    Upstream(String),
    #[error("Invalid argument - {0}")]
    InvalidArgument(String),
    #[error("Configuration error - {0}")]
    Configuration(String),
    #[error("Resolver task aborted - {0}")]
    Aborted(String),
}

impl ResolverError {
    pub fn transport(context: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Transport { context: context.into(), source }
    }

    pub fn decode(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Decode { context: context.into(), source }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ImageVersionNotFound(_) | Self::NoDesiredComponentVersion(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::RequestTimeout { .. })
    }

    /// Soft failures degrade to a missing-image signal instead of aborting the caller.
    pub fn is_soft(&self) -> bool {
        self.is_not_found() || self.is_timeout()
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record {namespace}/{name} not found")]
    NotFound { namespace: String, name: String },
    #[error("Conflict on record {namespace}/{name}")]
    Conflict { namespace: String, name: String },
    #[error("Record {namespace}/{name} clashes with the one of component {owner}")]
    NameClash { namespace: String, name: String, owner: String },
    #[error("Component name '{0}' cannot be stored")]
    InvalidName(String),
    #[error("Kubernetes api error - {0}")]
    Kube(#[from] kube::Error),
}

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Resolver(#[from] ResolverError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("No resolver registered for source '{0}'")]
    UnknownSource(String),
    #[error("Catalog error - {0}")]
    Catalog(String),
    #[error("Controller is not running")]
    Stopped,
}

impl ControllerError {
    /// Failures that retrying the same job cannot fix.
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Store(StoreError::NameClash { .. } | StoreError::InvalidName(_)))
    }
}

#[derive(Debug, Error)]
pub enum TagwatchError {
    #[error("Not Found")]
    NotFound,
    #[error("Internal Error - {0}")]
    InternalError(String),
    #[error("Bad Request - {0}")]
    BadRequest(String),
    #[error("Service unavailable - {0}")]
    Unavailable(String),
}

impl TagwatchError {
    pub fn code(&self) -> &'static str {
        match self {
            TagwatchError::NotFound => "NOT_FOUND",
            TagwatchError::InternalError(_) => "INTERNAL_SERVER_ERROR",
            TagwatchError::BadRequest(_) => "BAD_REQUEST",
            TagwatchError::Unavailable(_) => "UNAVAILABLE",
        }
    }
}

impl From<ControllerError> for TagwatchError {
    fn from(value: ControllerError) -> Self {
        match value {
            ControllerError::Store(StoreError::NotFound { .. }) => Self::NotFound,
            ControllerError::Stopped => Self::Unavailable(value.to_string()),
            ControllerError::UnknownSource(_) => Self::BadRequest(value.to_string()),
            other => Self::InternalError(other.to_string()),
        }
    }
}

impl From<StoreError> for TagwatchError {
    fn from(value: StoreError) -> Self {
        ControllerError::from(value).into()
    }
}

impl From<TagwatchError> for (StatusCode, Json<ErrorDto>) {
    fn from(err: TagwatchError) -> Self {
        let code = String::from(err.code());
        match &err {
            TagwatchError::NotFound => (StatusCode::NOT_FOUND, Json(ErrorDto { code, message: String::from("Not found") })),
            TagwatchError::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorDto { code, message: format!("Internal error - {msg}") })),
            TagwatchError::BadRequest(msg) => (StatusCode::BAD_REQUEST, Json(ErrorDto { code, message: format!("Bad Request - {msg}") })),
            TagwatchError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, Json(ErrorDto { code, message: format!("Unavailable - {msg}") })),
        }
    }
}
