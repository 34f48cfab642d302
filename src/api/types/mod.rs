//! Request and response types of the HTTP API

pub mod error;
pub mod json;
pub mod translate;

pub use error::{ApiError, ApiErrorDetail, ApiErrorResponse, ApiErrorType};
pub use json::ValidatedJson;
pub use translate::TranslateRequest;
