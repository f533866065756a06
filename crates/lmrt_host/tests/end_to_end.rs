use std::collections::HashSet;

use lmrt_core::{names, Intersection};
use lmrt_host::{run_session, BackoffConfig, HostConfig, SceneConfig, SimConfig, SoftwareAccelerator};
use lmrt_verify::{ReferenceEngine, TestScene, VerificationReport};

fn session(config: &HostConfig) -> lmrt_host::SessionOutcome {
    let accelerator = SoftwareAccelerator::new(config.sim.clone());
    run_session(&accelerator, &config.scene.build(), config).unwrap()
}

#[test]
fn test_standard_scene_round_trip() {
    let outcome = session(&HostConfig::default());

    assert!(outcome.report.counts_match());
    assert!(outcome.report.missing.is_empty());

    let scene = TestScene::standard();
    let reference: HashSet<Intersection> = ReferenceEngine::default()
        .intersect(&scene.triangles, &scene.rays)
        .into_iter()
        .collect();
    let streamed: HashSet<Intersection> = outcome.intersections.iter().copied().collect();
    assert_eq!(reference, streamed);
    assert!(streamed.iter().all(|hit| (11..16).contains(&hit.ray) && hit.triangle < 16));
}

#[test]
fn test_reversed_winding_streams_same_pairs() {
    let config = HostConfig::default();
    let accelerator = SoftwareAccelerator::new(config.sim.clone());
    let scene = TestScene::standard().reversed();

    let outcome = run_session(&accelerator, &scene, &config).unwrap();
    assert!(outcome.passed());
    assert_eq!(outcome.intersections.len(), 80);
}

#[test]
fn test_repeated_sessions_on_one_accelerator() {
    let config = HostConfig::default();
    let accelerator = SoftwareAccelerator::new(config.sim.clone());
    let scene = config.scene.build();

    for _ in 0..3 {
        assert!(run_session(&accelerator, &scene, &config).unwrap().passed());
    }
}

#[test]
fn test_progress_reports_without_interval() {
    let config = HostConfig {
        sim: SimConfig {
            status_interval_ticks: 0,
            ..SimConfig::default()
        },
        ..HostConfig::default()
    };
    let outcome = session(&config);

    assert!(outcome.passed());
    assert_eq!(outcome.poll.status_reports, 1);
}

#[test]
fn test_no_result_stream_reports_every_pair_missing() {
    let config = HostConfig {
        sim: SimConfig {
            streams: vec![names::STATUS_OUT.to_string()],
            ..SimConfig::default()
        },
        ..HostConfig::default()
    };
    let outcome = session(&config);

    assert!(outcome.poll.completed);
    assert!(outcome.intersections.is_empty());
    assert_eq!(outcome.report.missing.len(), 80);
    assert_eq!(outcome.status.map(|s| s.intersections), Some(80));
}

#[test]
fn test_multi_burst_scene_with_report_file() {
    let path = std::env::temp_dir().join(format!("lmrt_report_{}.json", std::process::id()));
    let config = HostConfig {
        scene: SceneConfig {
            triangles: 37,
            rays: 24,
            first_hit: 20,
        },
        backoff: BackoffConfig::Spin,
        report_path: Some(path.clone()),
        ..HostConfig::default()
    };
    let outcome = session(&config);

    assert!(outcome.passed());
    assert_eq!(outcome.report.expected_count, 4 * 37);
    assert!(outcome.layout.total_records() >= 37);
    assert_eq!(outcome.layout.byte_size() % 384, 0);

    let written: VerificationReport =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(written, outcome.report);
    std::fs::remove_file(&path).unwrap();
}
