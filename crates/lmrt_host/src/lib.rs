//! Host side of the burst-packed ray/triangle accelerator.
//!
//! Ties the packing, streaming and verification crates into a single
//! session, and provides a software accelerator to run it against.

pub mod config;
pub mod session;
pub mod sim;

pub use config::{BackoffConfig, HostConfig, SceneConfig};
pub use session::{run_session, SessionOutcome};
pub use sim::{SimConfig, SimJob, SoftwareAccelerator};
