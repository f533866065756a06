use anyhow::Result;
use lmrt_host::{run_session, HostConfig, SoftwareAccelerator};

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    log::info!("Starting LMRT host");

    let config = HostConfig::from_args(std::env::args())?;
    let scene = config.scene.build();
    let accelerator = SoftwareAccelerator::new(config.sim.clone());

    let outcome = run_session(&accelerator, &scene, &config)?;
    log::info!(
        "Streamed {} intersections in {} poll passes",
        outcome.intersections.len(),
        outcome.poll.passes
    );

    outcome.report.into_result()?;
    log::info!("All reference intersections streamed back");
    Ok(())
}
