use std::path::{Path, PathBuf};

use clap::Parser;
use tokio::io::BufReader;

use scriptserver_core::ScriptContext;
use scriptserver_interfaces::UdpTransport;
use scriptserver_node::{NodeError, RunStatus, RunnerSettings, ScriptRunner, ServerConfig};

#[derive(Parser)]
#[command(name = "script-server", about = "Run RF conformance scripts over UDP")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "script-server.toml")]
    config: PathBuf,
    /// Script to run, `-` reads standard input
    #[arg(short = 'f', long, default_value = "-")]
    script: PathBuf,
    /// Default response timeout in seconds
    #[arg(short, long)]
    timeout: Option<u64>,
    /// Append log output to this file
    #[arg(short = 'o', long)]
    log_file: Option<PathBuf>,
    /// Log level, e.g. `info` or `debug`
    #[arg(short, long)]
    level: Option<String>,
}

async fn run_script(
    runner: &mut ScriptRunner<UdpTransport>,
    script: &Path,
) -> Result<RunStatus, NodeError> {
    if script == Path::new("-") {
        runner.run(BufReader::new(tokio::io::stdin())).await
    } else {
        let file = tokio::fs::File::open(script).await?;
        runner.run(BufReader::new(file)).await
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let mut config = match ServerConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("failed to load config from {}: {e}", cli.config.display());
            std::process::exit(1);
        }
    };

    let level = cli.level.unwrap_or(config.logging.level.clone());
    let log_file = cli.log_file.or(config.logging.file.clone());
    let logging = if std::env::var("RUST_LOG_FORMAT").as_deref() == Ok("json") {
        scriptserver_node::logging::init_json(&level, log_file.as_deref())
    } else {
        scriptserver_node::logging::init(&level, log_file.as_deref())
    };
    if let Err(e) = logging {
        eprintln!("{e}");
        std::process::exit(1);
    }

    if let Some(timeout) = cli.timeout {
        config.runner.default_timeout = timeout;
    }
    let ctx = ScriptContext::new(config.node_directory(), config.export.clone());
    let transport = UdpTransport::new(config.runner.listen_host);
    let mut runner = ScriptRunner::new(transport, ctx, RunnerSettings::from(&config.runner));
    tracing::info!(
        nodes = config.nodes.len(),
        default_timeout = config.runner.default_timeout,
        script = %cli.script.display(),
        "script server starting"
    );

    match run_script(&mut runner, &cli.script).await {
        Ok(status) => {
            tracing::info!(?status, code = status.code(), "script finished");
            std::process::exit(status.code());
        }
        Err(e) => {
            tracing::error!("script aborted: {e}");
            std::process::exit(1);
        }
    }
}
