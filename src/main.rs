use anyhow::Context;
use orbit_viewer::ViewerConfig;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ViewerConfig::default();
    log::info!(
        "starting viewer '{}' with {} and {}",
        config.container_id,
        config.assets.environment.display(),
        config.assets.model.display()
    );

    orbit_viewer::run(config).context("viewer failed to start")
}
