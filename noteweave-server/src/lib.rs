pub mod error;
pub mod server;
pub mod state;

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use state::AppState;
