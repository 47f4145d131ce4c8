use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use rust_decimal::Decimal;
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SplitError>;

#[derive(Error, Debug)]
pub enum SplitError {
    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Expense not found: {0}")]
    ExpenseNotFound(String),

    #[error("Member not found: {0}")]
    MemberNotFound(String),

    #[error("Group not found: {0}")]
    GroupNotFound(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(Decimal),

    #[error("An expense needs at least one participant")]
    EmptySplit,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Email already registered: {0}")]
    DuplicateUser(String),

    #[error("{0} and {1} are already friends")]
    AlreadyFriends(String, String),

    #[error("Balance does not fit in a decimal")]
    BalanceOverflow,

    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Client visible classes of failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidInput,
    Conflict,
    Internal,
}

impl SplitError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SplitError::UserNotFound(_)
            | SplitError::ExpenseNotFound(_)
            | SplitError::MemberNotFound(_)
            | SplitError::GroupNotFound(_) => ErrorKind::NotFound,
            SplitError::InvalidAmount(_) | SplitError::EmptySplit | SplitError::InvalidInput(_) => {
                ErrorKind::InvalidInput
            }
            SplitError::DuplicateUser(_) | SplitError::AlreadyFriends(..) => ErrorKind::Conflict,
            SplitError::BalanceOverflow | SplitError::Database(_) | SplitError::Internal(_) => {
                ErrorKind::Internal
            }
        }
    }

    fn error_type(&self) -> &str {
        match self {
            SplitError::UserNotFound(_) => "user_not_found",
            SplitError::ExpenseNotFound(_) => "expense_not_found",
            SplitError::MemberNotFound(_) => "member_not_found",
            SplitError::GroupNotFound(_) => "group_not_found",
            SplitError::InvalidAmount(_) => "invalid_amount",
            SplitError::EmptySplit => "empty_split",
            SplitError::InvalidInput(_) => "invalid_input",
            SplitError::DuplicateUser(_) => "duplicate_user",
            SplitError::AlreadyFriends(..) => "already_friends",
            SplitError::BalanceOverflow => "balance_overflow",
            SplitError::Database(_) => "database_error",
            SplitError::Internal(_) => "internal_error",
        }
    }
}

impl ResponseError for SplitError {
    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();
        // Storage internals stay in the logs.
        let message = match self.kind() {
            ErrorKind::Internal => "Internal server error".to_string(),
            _ => self.to_string(),
        };

        HttpResponse::build(status_code).json(json!({
            "error": {
                "code": status_code.as_u16(),
                "message": message,
                "type": self.error_type()
            }
        }))
    }

    fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
