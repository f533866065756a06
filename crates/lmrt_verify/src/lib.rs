//! Reference intersection and verification of streamed accelerator results.

pub mod engine;
pub mod scene;
pub mod verifier;

pub use engine::ReferenceEngine;
pub use scene::TestScene;
pub use verifier::{verify, VerificationMismatch, VerificationReport, VerifyResult};
