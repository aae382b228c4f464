use actix_web::{HttpResponse, http::StatusCode};
use derive_more::Display;

pub type Result<T> = std::result::Result<T, HrError>;

/// Error taxonomy for the attendance/payroll core.
///
/// All variants except `Internal` are policy rejections: the caller gets a
/// structured message and decides what to do, nothing is retried.
#[derive(Debug, Display)]
pub enum HrError {
    #[display(fmt = "{}", _0)]
    Validation(String),

    #[display(fmt = "{}", _0)]
    Forbidden(String),

    #[display(fmt = "{}", _0)]
    Conflict(String),

    #[display(fmt = "{}", _0)]
    NotFound(String),

    #[display(fmt = "Internal Server Error")]
    Internal(String),
}

impl HrError {
    pub fn validation(msg: impl Into<String>) -> Self {
        HrError::Validation(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        HrError::Forbidden(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        HrError::Conflict(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        HrError::NotFound(msg.into())
    }
}

impl std::error::Error for HrError {}

impl actix_web::ResponseError for HrError {
    fn status_code(&self) -> StatusCode {
        match self {
            HrError::Validation(_) => StatusCode::BAD_REQUEST,
            HrError::Forbidden(_) => StatusCode::FORBIDDEN,
            HrError::Conflict(_) => StatusCode::CONFLICT,
            HrError::NotFound(_) => StatusCode::NOT_FOUND,
            HrError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let HrError::Internal(detail) = self {
            tracing::error!(error = %detail, "internal error");
        }
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "message": self.to_string()
        }))
    }
}

impl From<sqlx::Error> for HrError {
    fn from(e: sqlx::Error) -> Self {
        // Natural-key uniqueness is the concurrency guard; a duplicate-key
        // rejection from the database is a conflict, not a server fault.
        if let sqlx::Error::Database(db_err) = &e {
            if db_err.code().as_deref() == Some("23000") {
                return HrError::Conflict("Duplicate record".to_string());
            }
        }
        HrError::Internal(e.to_string())
    }
}
