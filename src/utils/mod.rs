// Utility modules for the MoodGPT backend

pub mod chat_errors;
pub mod validation;
pub mod webhook_signature;

pub use chat_errors::ChatError;
pub use validation::{trim_and_validate_field, trim_optional_field};
