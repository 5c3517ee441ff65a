use anyhow::Result;
use clap::Parser;

use memwarden::cli::{self, CommonArgs, HygieneCommand};
use memwarden::config::{ResolvedPaths, WardenConfig};
use memwarden::plane::ControlPlane;

#[derive(Parser)]
#[command(
    name = "memwarden",
    version,
    about = "Memory hygiene control plane for OpenClaw workspaces"
)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    command: HygieneCommand,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let home = cli.common.openclaw_home();

    let config = WardenConfig::load(&home)?;
    cli::init_logging(&config.logging.level);

    let paths = ResolvedPaths::resolve(&home, cli.common.workspace.as_deref());
    tracing::debug!(workspace = %paths.workspace.display(), "resolved paths");
    let plane = ControlPlane::new(paths);
    let legacy_roots = config.legacy_roots(&cli.common.legacy_roots);

    match cli::execute(&plane, &config, &legacy_roots, cli.command) {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({ "error": e.to_string() }))?
            );
            std::process::exit(1);
        }
    }
}
