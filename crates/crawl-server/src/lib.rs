//! HTTP surface assembling every collector crate behind one `axum`
//! router, per spec.md §6. Grounded on `dashflow-langserve`'s
//! `server.rs`/`handler.rs`/`error.rs` split.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

pub use routes::build_router;
pub use state::AppState;
