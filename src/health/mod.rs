//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     One probe round before the listener accepts traffic
//!
//! Active health checks (active.rs):
//!     Periodic timer
//!     → Probe each endpoint (sequentially)
//!     → registry.set_healthy(address, ok)
//! ```
//!
//! # Design Decisions
//! - Each probe result is applied immediately, no thresholds or quorum
//! - Health state is per-endpoint and never takes the selection lock
//! - The loop stops on the shutdown broadcast and is joined by the server

pub mod active;

pub use active::{HealthMonitor, ProbeError};
