//! API handlers module

pub mod health;
pub mod posts;
pub mod sections;
pub mod tags;

use axum::extract::rejection::{JsonRejection, PathRejection};
use quire_common::errors::AppError;
use validator::ValidationErrors;

/// Malformed JSON body or wrong field types
pub(crate) fn json_rejection(rejection: JsonRejection) -> AppError {
    AppError::InvalidFormat {
        message: rejection.body_text(),
    }
}

/// Unparseable query string
pub(crate) fn query_error(err: impl std::fmt::Display) -> AppError {
    AppError::InvalidFormat {
        message: format!("Failed to deserialize query string: {}", err),
    }
}

/// Path segment that is not a valid id
pub(crate) fn path_rejection(rejection: PathRejection) -> AppError {
    AppError::InvalidFormat {
        message: rejection.body_text(),
    }
}

/// First failing field wins; the message lists all of them
pub(crate) fn validation_error(errors: ValidationErrors) -> AppError {
    let field = errors.field_errors().keys().next().map(|f| f.to_string());
    AppError::Validation {
        message: errors.to_string(),
        field,
    }
}
