pub mod openai_error;
pub mod url_validation;
pub use openai_error::{OpenAIErrorResponse, describe_failure};
pub use url_validation::{UrlValidationError, join_path, validate_endpoint_url};
