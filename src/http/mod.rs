//! HTTP subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum::serve, connect info, graceful shutdown)
//!     → request.rs (request id)
//!     → pipeline.rs (validated stage plan → layered Router)
//!     → fixed.rs / crate::routes (handlers, extract.rs for bodies)
//!     → response.rs (envelopes, pagination headers)
//!     → error.rs (terminal rendering of every failure)
//!     → Send to client
//! ```

pub mod error;
pub mod extract;
pub mod fixed;
pub mod pipeline;
pub mod request;
pub mod response;
pub mod server;
pub mod state;

pub use error::ApiError;
pub use extract::{ApiBody, ApiJson, ApiQuery};
pub use pipeline::{build_router, PipelineError, PipelinePlan, Stage};
pub use request::{RequestIdExt, X_REQUEST_ID};
pub use server::ApiServer;
pub use state::{AppState, Collaborators};
