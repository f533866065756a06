//! Checks streamed accelerator results against the reference set.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use lmrt_core::Intersection;

/// Ways a streamed result set can disagree with the reference.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerificationMismatch {
    #[error("Intersection count mismatch: expected {expected}, streamed {streamed}")]
    Count { expected: usize, streamed: usize },

    #[error("{0} reference intersections missing from streamed results")]
    Missing(usize),
}

pub type VerifyResult<T> = Result<T, VerificationMismatch>;

/// Outcome of comparing streamed intersections with the reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub expected_count: usize,
    pub streamed_count: usize,
    /// Reference pairs never seen in the stream, in reference order
    pub missing: Vec<Intersection>,
    /// Streamed pairs with no counterpart in the reference, in arrival order
    pub unexpected: Vec<Intersection>,
}

impl VerificationReport {
    pub fn counts_match(&self) -> bool {
        self.expected_count == self.streamed_count
    }

    pub fn passed(&self) -> bool {
        self.counts_match() && self.missing.is_empty()
    }

    /// The first failed check, if any.
    pub fn mismatch(&self) -> Option<VerificationMismatch> {
        if !self.counts_match() {
            Some(VerificationMismatch::Count {
                expected: self.expected_count,
                streamed: self.streamed_count,
            })
        } else if !self.missing.is_empty() {
            Some(VerificationMismatch::Missing(self.missing.len()))
        } else {
            None
        }
    }

    pub fn into_result(self) -> VerifyResult<Self> {
        match self.mismatch() {
            Some(mismatch) => Err(mismatch),
            None => Ok(self),
        }
    }
}

/// Compare `streamed` with `reference`.
///
/// Cardinality is checked first. Membership is checked regardless, so a
/// count mismatch still lists every missing pair. Order is ignored.
pub fn verify(reference: &[Intersection], streamed: &[Intersection]) -> VerificationReport {
    if reference.len() == streamed.len() {
        log::info!("Intersection count matches: {}", reference.len());
    } else {
        log::error!(
            "Intersection count mismatch: expected {}, streamed {}",
            reference.len(),
            streamed.len()
        );
    }

    let streamed_set: HashSet<Intersection> = streamed.iter().copied().collect();
    let missing: Vec<Intersection> = reference
        .iter()
        .filter(|pair| !streamed_set.contains(*pair))
        .copied()
        .collect();
    for pair in &missing {
        log::error!("Missing intersection: ray {} triangle {}", pair.ray, pair.triangle);
    }

    let reference_set: HashSet<Intersection> = reference.iter().copied().collect();
    let unexpected: Vec<Intersection> = streamed
        .iter()
        .filter(|pair| !reference_set.contains(*pair))
        .copied()
        .collect();
    if !unexpected.is_empty() {
        log::warn!("{} streamed intersections not in the reference set", unexpected.len());
    }

    let report = VerificationReport {
        expected_count: reference.len(),
        streamed_count: streamed.len(),
        missing,
        unexpected,
    };

    if report.passed() {
        log::info!("Verification passed");
    } else {
        log::error!("Verification failed");
    }
    report
}
