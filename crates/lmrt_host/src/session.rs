//! One end-to-end host session: pack, upload, launch, poll, verify.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use lmrt_core::{
    memory_initialisation, Accelerator, BurstLayout, Intersection, KernelPlan, PackedRecordBuffer, RunError,
    StatusReport, TriangleRecord, WireFormat,
};
use lmrt_stream::{Backoff, ExponentialBackoff, FixedSleep, PollDriver, PollSummary, ResultReader, Spin, StatusReader};
use lmrt_verify::{verify, ReferenceEngine, TestScene, VerificationReport};

use crate::config::{BackoffConfig, HostConfig};

/// What a session observed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionOutcome {
    pub layout: BurstLayout,
    pub plan: KernelPlan,
    pub poll: PollSummary,
    /// Streamed intersections in arrival order
    pub intersections: Vec<Intersection>,
    pub status: Option<StatusReport>,
    pub report: VerificationReport,
}

impl SessionOutcome {
    pub fn passed(&self) -> bool {
        self.report.passed()
    }
}

/// Run `scene` through `accelerator` and verify the streamed results.
///
/// A verification mismatch is part of the outcome, not an error. Errors are
/// layout problems and accelerator failures.
pub fn run_session<A>(accelerator: &A, scene: &TestScene, config: &HostConfig) -> Result<SessionOutcome>
where
    A: Accelerator + Sync,
    A::Job: Send,
{
    let format =
        WireFormat::query::<_, TriangleRecord>(accelerator).context("Failed to query triangle wire format")?;
    let triangles =
        PackedRecordBuffer::from_records(&format, &scene.triangles).context("Failed to pack triangles")?;
    let layout = *triangles.layout();
    log::info!(
        "Packed {} triangles into {} records across {} bursts",
        scene.triangles.len(),
        layout.total_records(),
        layout.total_bursts()
    );

    let reference = ReferenceEngine::default().intersect(&scene.triangles, &scene.rays);

    let upload =
        memory_initialisation(&triangles, config.offset_in_bursts).context("Upload offset out of range")?;
    accelerator
        .run(upload)
        .context("Failed to write triangles to accelerator memory")?;

    let mut results = ResultReader::open_or_idle(accelerator, &config.results);
    let mut status = StatusReader::open_or_idle(accelerator, &config.status);

    let plan = KernelPlan::query(accelerator, &layout, scene.rays.len()).context("Failed to plan kernel run")?;
    log::info!(
        "Kernel plan: {} intersection ticks, {} memory command ticks",
        plan.intersection_ticks,
        plan.memory_command_ticks
    );

    let job = accelerator
        .run_nonblock(plan.actions(&scene.rays))
        .context("Failed to launch intersection kernel")?;

    let poll = match config.backoff {
        BackoffConfig::Spin => gather_results(accelerator, job, &plan, &mut results, &mut status, Spin),
        BackoffConfig::Sleep { micros } => gather_results(
            accelerator,
            job,
            &plan,
            &mut results,
            &mut status,
            FixedSleep(Duration::from_micros(micros)),
        ),
        BackoffConfig::Exponential { min_micros, max_micros } => gather_results(
            accelerator,
            job,
            &plan,
            &mut results,
            &mut status,
            ExponentialBackoff::new(Duration::from_micros(min_micros), Duration::from_micros(max_micros)),
        ),
    }
    .context("Intersection kernel failed")?;

    status.log_summary();
    results.log_results();

    let report = verify(&reference, results.intersections());
    if let Some(path) = &config.report_path {
        write_report(path, &report)?;
    }

    Ok(SessionOutcome {
        layout,
        plan,
        poll,
        intersections: results.into_intersections(),
        status: status.latest().copied(),
        report,
    })
}

/// Gather every result of `job`, then join it.
fn gather_results<A, B>(
    accelerator: &A,
    job: A::Job,
    plan: &KernelPlan,
    results: &mut ResultReader,
    status: &mut StatusReader,
    backoff: B,
) -> Result<PollSummary, RunError>
where
    A: Accelerator + Sync,
    A::Job: Send,
    B: Backoff,
{
    if status.is_available() {
        let summary = PollDriver::new(backoff).run_until(results, status, |report| plan.is_complete(report));
        results.drain();
        accelerator.wait(job)?;
        results.drain();
        return Ok(summary);
    }

    // Without status there is no completion signal, so join the job on a
    // second thread and keep the results ring moving until it finishes.
    log::warn!("No status stream, polling results until the job is joined");
    let finished = AtomicBool::new(false);
    let mut backoff = backoff;
    let mut summary = PollSummary::default();

    let joined = thread::scope(|scope| {
        let waiter = scope.spawn(|| {
            let outcome = accelerator.wait(job);
            finished.store(true, Ordering::Release);
            outcome
        });

        while !finished.load(Ordering::Acquire) {
            summary.passes += 1;
            let slots = results.poll();
            summary.result_slots += slots as u64;
            if slots == 0 {
                summary.idle_passes += 1;
                backoff.idle();
            } else {
                backoff.reset();
            }
        }
        waiter.join().unwrap_or(Err(RunError::JobPanicked))
    });

    summary.result_slots += results.drain() as u64;
    joined?;
    Ok(summary)
}

fn write_report(path: &std::path::Path, report: &VerificationReport) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create report {}", path.display()))?;
    serde_json::to_writer_pretty(file, report)
        .with_context(|| format!("Failed to write report {}", path.display()))?;
    log::info!("Wrote verification report to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SceneConfig;
    use crate::sim::{SimConfig, SoftwareAccelerator};
    use lmrt_core::names;

    fn run(config: &HostConfig) -> SessionOutcome {
        let accelerator = SoftwareAccelerator::new(config.sim.clone());
        run_session(&accelerator, &config.scene.build(), config).unwrap()
    }

    #[test]
    fn test_standard_session_passes() {
        let outcome = run(&HostConfig::default());

        assert!(outcome.passed());
        assert!(outcome.poll.completed);
        assert_eq!(outcome.intersections.len(), 80);
        assert_eq!(outcome.report.expected_count, 80);
        assert_eq!(outcome.layout.total_bursts(), 2);
        assert_eq!(outcome.plan.intersection_ticks, 256);
        assert_eq!(outcome.status.map(|s| s.ticks), Some(256));
    }

    #[test]
    fn test_offset_upload() {
        let config = HostConfig {
            offset_in_bursts: 3,
            backoff: BackoffConfig::Spin,
            ..HostConfig::default()
        };
        assert!(run(&config).passed());
    }

    #[test]
    fn test_odd_hits_fail_verification() {
        let config = HostConfig {
            scene: SceneConfig {
                triangles: 3,
                rays: 1,
                first_hit: 0,
            },
            ..HostConfig::default()
        };
        let outcome = run(&config);

        assert_eq!(outcome.report.expected_count, 3);
        assert_eq!(outcome.report.streamed_count, 4);
        assert!(outcome.report.missing.is_empty());
        assert!(!outcome.passed());
    }

    #[test]
    fn test_without_status_stream() {
        let config = HostConfig {
            sim: SimConfig {
                streams: vec![names::RESULTS_OUT.to_string()],
                ..SimConfig::default()
            },
            backoff: BackoffConfig::Sleep { micros: 10 },
            ..HostConfig::default()
        };
        let outcome = run(&config);

        assert!(!outcome.poll.completed);
        assert!(outcome.status.is_none());
        assert!(outcome.passed());
    }

    #[test]
    fn test_results_larger_than_ring() {
        // 64 x 64 hits need 2048 slots; the ring only holds 512
        let config = HostConfig {
            scene: SceneConfig {
                triangles: 64,
                rays: 64,
                first_hit: 0,
            },
            ..HostConfig::default()
        };
        let outcome = run(&config);

        assert!(outcome.passed());
        assert_eq!(outcome.intersections.len(), 64 * 64);
    }

    #[test]
    fn test_record_width_mismatch_fails_early() {
        let mut accelerator = SoftwareAccelerator::new(SimConfig::default());
        accelerator.set_constant("TriangleWidthInBytes", 36);

        let err = run_session(&accelerator, &TestScene::standard(), &HostConfig::default()).unwrap_err();
        assert!(err.to_string().contains("Failed to pack triangles"));
    }
}
