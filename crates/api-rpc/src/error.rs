//! RPC Error Types
//!
//! Maps application errors to JSON-RPC error codes.

use jsonrpsee::types::ErrorObjectOwned;
use openmic_core::domain::DomainError;
use openmic_core::error::AppError;

/// RPC Error Codes
pub mod code {
    pub const VALIDATION_ERROR: i32 = 4000;
    pub const NOT_FOUND: i32 = 4001;
    pub const CONFLICT: i32 = 4002;
    pub const THROTTLED: i32 = 4003;
    pub const INVALID_TRANSITION: i32 = 4004;
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const DB_ERROR: i32 = 5001;
    pub const SYSTEM_ERROR: i32 = 5002;
    pub const UNAVAILABLE: i32 = 5003;
}

/// Convert AppError to JSON-RPC ErrorObject
pub fn to_rpc_error(err: AppError) -> ErrorObjectOwned {
    match err {
        AppError::Domain(e) => domain_to_rpc_error(e),
        AppError::Validation(msg) => {
            ErrorObjectOwned::owned(code::VALIDATION_ERROR, msg, None::<()>)
        }
        AppError::NotFound(msg) => ErrorObjectOwned::owned(code::NOT_FOUND, msg, None::<()>),
        AppError::Conflict(msg) => ErrorObjectOwned::owned(code::CONFLICT, msg, None::<()>),
        AppError::Unavailable(msg) => ErrorObjectOwned::owned(code::UNAVAILABLE, msg, None::<()>),
        AppError::Database(msg) => ErrorObjectOwned::owned(code::DB_ERROR, msg, None::<()>),
        AppError::Io(e) => ErrorObjectOwned::owned(code::SYSTEM_ERROR, e.to_string(), None::<()>),
        AppError::Serialization(e) => {
            ErrorObjectOwned::owned(code::VALIDATION_ERROR, e.to_string(), None::<()>)
        }
        AppError::Internal(msg) => ErrorObjectOwned::owned(code::INTERNAL_ERROR, msg, None::<()>),
    }
}

fn domain_to_rpc_error(err: DomainError) -> ErrorObjectOwned {
    match &err {
        DomainError::InvalidTransition { .. } => {
            ErrorObjectOwned::owned(code::INVALID_TRANSITION, err.to_string(), None::<()>)
        }
        DomainError::JobNotFound(_) | DomainError::EntryNotFound(_) => {
            ErrorObjectOwned::owned(code::NOT_FOUND, err.to_string(), None::<()>)
        }
        DomainError::Validation(_) => {
            ErrorObjectOwned::owned(code::VALIDATION_ERROR, err.to_string(), None::<()>)
        }
        DomainError::Conflict(_) => {
            ErrorObjectOwned::owned(code::CONFLICT, err.to_string(), None::<()>)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let err = to_rpc_error(AppError::Domain(DomainError::InvalidTransition {
            from: "PROCESSED".into(),
            to: "CANCELLED".into(),
        }));
        assert_eq!(err.code(), code::INVALID_TRANSITION);

        let err = to_rpc_error(AppError::Domain(DomainError::JobNotFound("x".into())));
        assert_eq!(err.code(), code::NOT_FOUND);

        let err = to_rpc_error(AppError::Conflict("queue changed".into()));
        assert_eq!(err.code(), code::CONFLICT);

        let err = to_rpc_error(AppError::Database("locked".into()));
        assert_eq!(err.code(), code::DB_ERROR);
    }
}
