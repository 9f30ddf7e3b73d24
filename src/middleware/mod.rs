pub mod error_handler;
pub mod request_id;

pub use error_handler::{json_error_handler, query_error_handler, ErrorHandler};
pub use request_id::{RequestId, RequestIdValue};
