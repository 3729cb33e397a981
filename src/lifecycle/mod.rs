//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → Telemetry → Object store → Executor → HTTP server
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain requests
//!     → Drain background pool (tasks.rs) → Flush log queue
//!     → Flush span exporter → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then observability, then storage
//! - Ordered shutdown: stop accept, drain, flush
//! - Background drain has a deadline; stragglers are abandoned

pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod tasks;

pub use shutdown::Shutdown;
pub use startup::{Gateway, StartupError};
pub use tasks::TaskPool;
