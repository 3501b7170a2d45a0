use thiserror::Error;

/// Service-level failure taxonomy. `NotFound` and `Forbidden` short-circuit
/// before any mutation; `Validation` prevents the offending write;
/// `AccountOperation` covers identity-store calls that did not succeed.
#[derive(Debug, Error)]
pub enum HrError {
    #[error("record not found")]
    NotFound,
    #[error("insufficient permissions")]
    Forbidden,
    #[error("{0}")]
    Validation(String),
    #[error("account operation failed: {0}")]
    AccountOperation(String),
    #[error(transparent)]
    Db(#[from] sea_orm::DbErr),
}

impl HrError {
    pub fn validation(message: impl Into<String>) -> Self {
        HrError::Validation(message.into())
    }

    pub fn account(message: impl Into<String>) -> Self {
        HrError::AccountOperation(message.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            HrError::NotFound => "NOT_FOUND",
            HrError::Forbidden => "FORBIDDEN",
            HrError::Validation(_) => "VALIDATION",
            HrError::AccountOperation(_) => "ACCOUNT_OP",
            HrError::Db(_) => "INTERNAL",
        }
    }
}
