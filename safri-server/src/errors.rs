use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use safri_dispatch::{
    AssignmentError, AuthError, FleetError, PresenceError, RideError, TripError,
};

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Missing or invalid session")]
    Unauthorized,
    #[error("Unknown internal error: {0}")]
    Unknown(String),
}

impl ServerError {
    fn as_status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::InvalidCredentials => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        (self.as_status_code(), self.to_string()).into_response()
    }
}

impl From<AuthError> for ServerError {
    fn from(value: AuthError) -> Self {
        match value {
            AuthError::InvalidEmail
            | AuthError::InvalidPhoneNumber
            | AuthError::InvalidCnic => Self::BadRequest(value.to_string()),
            AuthError::EmailInUse => Self::Conflict(value.to_string()),
            AuthError::UserNotFound => Self::NotFound(value.to_string()),
            AuthError::WrongPassword | AuthError::InvalidPin => Self::InvalidCredentials,
            AuthError::InvalidSession => Self::Unauthorized,
            e => Self::Unknown(e.to_string()),
        }
    }
}

impl From<RideError> for ServerError {
    fn from(value: RideError) -> Self {
        match value {
            RideError::NotFound(_) => Self::NotFound(value.to_string()),
            RideError::NotYourRide => Self::BadRequest(value.to_string()),
            RideError::NotCancellable => Self::Conflict(value.to_string()),
            RideError::MissingLocation => Self::BadRequest(value.to_string()),
            e => Self::Unknown(e.to_string()),
        }
    }
}

impl From<FleetError> for ServerError {
    fn from(value: FleetError) -> Self {
        match value {
            FleetError::InvalidRegistration | FleetError::InvalidPhoneNumber => {
                Self::BadRequest(value.to_string())
            }
            FleetError::DuplicateCar(_) => Self::Conflict(value.to_string()),
            FleetError::CarNotFound(_) => Self::NotFound(value.to_string()),
            e => Self::Unknown(e.to_string()),
        }
    }
}

impl From<AssignmentError> for ServerError {
    fn from(value: AssignmentError) -> Self {
        match value {
            AssignmentError::RideNotFound(_) | AssignmentError::DriverNotFound => {
                Self::NotFound(value.to_string())
            }
            AssignmentError::AlreadyAssigned => Self::Conflict(value.to_string()),
            AssignmentError::ForeignDriver
            | AssignmentError::DriverUnavailable
            | AssignmentError::Sms(_) => Self::BadRequest(value.to_string()),
            e => Self::Unknown(e.to_string()),
        }
    }
}

impl From<TripError> for ServerError {
    fn from(value: TripError) -> Self {
        match value {
            TripError::InvalidTransition => Self::Conflict(value.to_string()),
            e => Self::Unknown(e.to_string()),
        }
    }
}

impl From<PresenceError> for ServerError {
    fn from(value: PresenceError) -> Self {
        match value {
            PresenceError::DriverNotFound => Self::NotFound(value.to_string()),
            PresenceError::IncompleteProfile => Self::BadRequest(value.to_string()),
            e => Self::Unknown(e.to_string()),
        }
    }
}
