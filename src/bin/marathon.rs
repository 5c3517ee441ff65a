use anyhow::Result;
use clap::Parser;
use std::sync::Arc;

use memwarden::cli::{self, marathon::MarathonArgs};
use memwarden::config::{ResolvedPaths, WardenConfig};
use memwarden::marathon::{run_marathon, MarathonRunner, Shutdown};
use memwarden::plane::ControlPlane;

#[tokio::main]
async fn main() -> Result<()> {
    let args = MarathonArgs::parse();
    let home = args.common.openclaw_home();

    let config = WardenConfig::load(&home)?;
    cli::init_logging(&config.logging.level);

    let paths = ResolvedPaths::resolve(&home, args.common.workspace.as_deref());
    let settings = args.into_settings(&config)?;
    let runner = Arc::new(MarathonRunner::new(ControlPlane::new(paths), settings));

    let shutdown = Shutdown::default();
    shutdown.listen_for_signals();

    run_marathon(runner, shutdown, |outcome| match serde_json::to_string(outcome) {
        Ok(line) => println!("{line}"),
        Err(e) => tracing::error!(error = %e, "failed to serialize cycle outcome"),
    })
    .await?;

    Ok(())
}
