pub mod file;
pub mod validation;

pub use file::*;
pub use validation::{validate_callback_url, validate_process_request};
