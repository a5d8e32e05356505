//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Settings → Logging/Metrics → Database → State → Pipeline → Bind
//!
//! Background (sweeper.rs):
//!     Every interval → sweep sessions and rate-limit windows
//!
//! Shutdown (shutdown.rs, signals.rs):
//!     SIGTERM/SIGINT → Stop accepting → Drain → Stop tasks → Close database
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then core, then listeners
//! - Ordered shutdown: stop accept, drain, close

pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod sweeper;

pub use shutdown::{Shutdown, ShutdownListener};
pub use signals::{spawn_signal_listener, wait_for_signal};
pub use sweeper::Sweeper;
