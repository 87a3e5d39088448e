use anyhow::{anyhow, Context, Result};
use brrtweb::cli::{build_app, Cli};
use brrtweb::logging::{init_logging, LogConfig};
use brrtweb::runtime_config::RuntimeConfig;
use clap::Parser;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_logging(&LogConfig::from_env())?;

    let config = RuntimeConfig::from_env();
    config.apply();

    let server = build_app(&cli, &config)?;
    if cli.dump_routes {
        server.router().dump_routes();
        return Ok(());
    }

    let handle = server
        .start(cli.addr.as_str())
        .with_context(|| format!("failed to bind {}", cli.addr))?;
    handle
        .join()
        .map_err(|_| anyhow!("server coroutine panicked"))?;
    Ok(())
}
