//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events with structured fields
//!     → logging.rs (filter + fmt subscriber)
//!     → stdout
//! ```
//!
//! # Design Decisions
//! - Request ID flows through every dispatch log line
//! - Health transitions log at info/warn, steady state at debug

pub mod logging;
