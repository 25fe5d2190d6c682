use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

/// Why a raw postal code was rejected before any upstream call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("A zipcode must be entered, please try again.")]
    Empty,

    #[error("The zipcode {raw} is not a valid number, please try again.")]
    WrongLength { raw: String, digits: usize },
}

impl ValidationError {
    pub fn status(&self) -> StatusCode {
        match self {
            ValidationError::Empty => StatusCode::BAD_REQUEST,
            ValidationError::WrongLength { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

/// Failure of a single upstream GET.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("query failed with status {status}")]
    StatusMismatch { status: StatusCode },

    /// The stage deadline fired, or its scope was cancelled, while the call was in flight.
    #[error("stage ended before the upstream answered")]
    Interrupted,
}

/// The single error shape handed back to callers.
///
/// Serialized as `{"message": "...", "code": 404}`; `code` doubles as the HTTP status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{message} ErrorCode:{code}")]
pub struct LookupError {
    pub message: String,
    pub code: u16,
}

impl LookupError {
    pub fn new(message: impl Into<String>, status: StatusCode) -> Self {
        Self { message: message.into(), code: status.as_u16() }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(message, StatusCode::BAD_REQUEST)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(message, StatusCode::NOT_FOUND)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(message, StatusCode::REQUEST_TIMEOUT)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(message, StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// HTTP status for this error; unknown codes degrade to 500.
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl From<ValidationError> for LookupError {
    fn from(err: ValidationError) -> Self {
        Self::new(err.to_string(), err.status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_map_to_their_status() {
        let empty = LookupError::from(ValidationError::Empty);
        assert_eq!(empty.code, 400);

        let short = LookupError::from(ValidationError::WrongLength { raw: "123".into(), digits: 3 });
        assert_eq!(short.code, 422);
        assert!(short.message.contains("123"));
    }

    #[test]
    fn lookup_error_wire_shape() {
        let err = LookupError::not_found("city could not be located");
        let json = serde_json::to_value(&err).unwrap();

        assert_eq!(json, serde_json::json!({"message": "city could not be located", "code": 404}));
    }

    #[test]
    fn display_matches_client_report() {
        let err = LookupError::timeout("Search time exceeded.");
        assert_eq!(err.to_string(), "Search time exceeded. ErrorCode:408");
    }

    #[test]
    fn unknown_code_degrades_to_internal() {
        let err = LookupError { message: "odd".into(), code: 42 };
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
