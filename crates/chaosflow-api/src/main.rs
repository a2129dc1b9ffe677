//! chaosflow CLI entry point.
//!
//! Binary name: `chaosflow`
//!
//! Parses CLI arguments, sets up tracing, loads configuration, then
//! dispatches to the matching command handler.

mod cli;
mod state;

use clap::Parser;
use clap_complete::generate;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up tracing based on verbosity
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,chaosflow=debug",
        _ => "trace",
    };
    chaosflow_observe::tracing_setup::init_tracing(EnvFilter::new(filter), cli.otel)
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;

    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "chaosflow", &mut std::io::stdout());
        return Ok(());
    }

    let state = AppState::init().await?;

    let result = match cli.command {
        Commands::Validate { file } => cli::workflow::handle_validate(&state, &file, cli.json).await,
        Commands::Convert {
            file,
            format,
            output,
            namespace,
        } => {
            let args = cli::workflow::ConvertArgs {
                format,
                output,
                namespace,
                quiet: cli.quiet,
            };
            cli::workflow::handle_convert(&state, &file, args, cli.json).await
        }
        Commands::Topology { file } => cli::workflow::handle_topology(&state, &file, cli.json).await,
        Commands::Steps { file } => cli::workflow::handle_steps(&state, &file, cli.json).await,
        Commands::List => cli::workflow::handle_list(&state, cli.json).await,
        Commands::Kinds => cli::kinds::handle_kinds(cli.json),
        Commands::Completions { .. } => unreachable!("handled above"),
    };

    chaosflow_observe::tracing_setup::shutdown_tracing();
    result
}
