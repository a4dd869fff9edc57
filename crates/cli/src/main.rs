use clap::Parser;
use tracing_subscriber::EnvFilter;

use bk_cli::cli::{self, Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_cli_tracing(cli.global.verbose);

    let result = match cli.command {
        Command::Ping => {
            cli::ping::run(&cli.global).await;
            Ok(())
        }
        Command::Init { yes } => cli::init::run(&cli.global, yes).await,
        Command::Apply { local, recursive } => cli::apply::run(&cli.global, local, recursive).await,
        Command::Plan => cli::intent::plan(&cli.global).await,
        Command::Generate => cli::intent::generate(&cli.global).await,
        Command::Magic => cli::magic::run(&cli.global).await,
        Command::Call { server, tool, args, socket } => {
            cli::call::run(&cli.global, &server, &tool, args.as_deref(), socket).await
        }
    };

    bk_mcp_client::wait_detached_shutdowns().await;
    result
}

/// Compact stderr logging. `RUST_LOG` wins unless `--verbose` is given.
fn init_cli_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
