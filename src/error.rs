use sea_orm::DbErr;
use thiserror::Error;

pub type Result<T, E = LedgerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("That username is already taken. Please choose a different one.")]
    DuplicateHandle,

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Please log in to access this page.")]
    Unauthenticated,

    #[error("inventory item {0} not found")]
    NotFound(i32),

    #[error("inventory item {0} belongs to another account")]
    Forbidden(i32),

    #[error("Product \"{0}\" not found in your inventory.")]
    ProductNotFound(String),

    #[error("Not enough stock for \"{product}\". Only {available} available.")]
    InsufficientStock { product: String, available: i32 },

    #[error("{0}")]
    Validation(String),

    #[error("{0} is too large to total")]
    Overflow(&'static str),

    #[error("storage failure: {0}")]
    Storage(#[from] DbErr),

    #[error("export failed: {0}")]
    Export(#[from] csv::Error),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl LedgerError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_facing_messages() {
        let err = LedgerError::InsufficientStock {
            product: "Widget".to_string(),
            available: 7,
        };
        assert_eq!(
            err.to_string(),
            "Not enough stock for \"Widget\". Only 7 available."
        );

        let err = LedgerError::ProductNotFound("Gadget".to_string());
        assert_eq!(
            err.to_string(),
            "Product \"Gadget\" not found in your inventory."
        );
    }

    #[test]
    fn test_storage_errors_convert() {
        let err: LedgerError = DbErr::Custom("commit failed".to_string()).into();
        assert!(matches!(err, LedgerError::Storage(_)));
    }

    #[test]
    fn test_overflow_names_the_total() {
        assert_eq!(
            LedgerError::Overflow("revenue").to_string(),
            "revenue is too large to total"
        );
    }
}
