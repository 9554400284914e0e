//! Ask Me HTTP server: upload documents, ask questions about them.

pub mod error;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::build_router;
pub use state::AppState;
