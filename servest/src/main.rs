//! Servest - serve a directory over HTTP
//!
//! This is the main entry point for the servest CLI.

use clap::error::ErrorKind;
use clap::Parser;
use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use servest_core::config::{
    current_dir, resolve_root, PortRange, ServerConfig, DEFAULT_INTERFACE, DEFAULT_MAX_PORT,
    DEFAULT_MIN_PORT,
};
use servest_core::error::{EXIT_LISTENER, EXIT_USAGE};
use servest_core::server::{bind_in_range, BindOutcome};
use servest_http::Dispatcher;

/// Long flags that may be written with a single dash
const SINGLE_DASH_FLAGS: &[&str] = &["minport", "maxport", "log", "single", "version", "help"];

/// Servest - a quick HTTP server for a directory
#[derive(Parser, Debug)]
#[command(name = "servest", about, long_about = None, disable_version_flag = true)]
struct Cli {
    /// Port to listen on (0 looks for a free port)
    #[arg(short = 'p', default_value_t = 0)]
    port: u16,

    /// Interface to listen on
    #[arg(short = 'i', default_value = DEFAULT_INTERFACE)]
    interface: String,

    /// Directory to serve (default: ./public-html if present, else cwd)
    #[arg(short = 'd')]
    dir: Option<PathBuf>,

    /// Minimum port to try binding to
    #[arg(long = "minport", default_value_t = DEFAULT_MIN_PORT)]
    min_port: u16,

    /// Maximum port to try binding to
    #[arg(long = "maxport", default_value_t = DEFAULT_MAX_PORT)]
    max_port: u16,

    /// Log every request
    #[arg(long = "log")]
    log: bool,

    /// Serve index.html for unknown paths (single-page apps)
    #[arg(long = "single")]
    single: bool,

    /// Print version and exit
    #[arg(long = "version")]
    version: bool,
}

/// Rewrite `-minport 9000` style flags to `--minport 9000`
fn normalize_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .map(|arg| single_dash_flag(&arg).unwrap_or(arg))
        .collect()
}

fn single_dash_flag(arg: &OsString) -> Option<OsString> {
    let text = arg.to_str()?;
    let rest = text.strip_prefix('-')?;
    let name = rest.split('=').next().unwrap_or(rest);
    SINGLE_DASH_FLAGS
        .contains(&name)
        .then(|| OsString::from(format!("-{}", text)))
}

fn main() {
    let cli = match Cli::try_parse_from(normalize_args(std::env::args_os())) {
        Ok(cli) => cli,
        Err(e) => {
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => EXIT_USAGE,
            };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    if cli.version {
        println!("servest v{}", servest_core::VERSION);
        return;
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("❌ {}", e);
            e.downcast_ref::<servest_core::Error>()
                .map_or(EXIT_LISTENER, servest_core::Error::exit_code)
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> anyhow::Result<i32> {
    let ports = PortRange::from_flags(cli.port, cli.min_port, cli.max_port)?;
    let cwd = current_dir()?;
    let root = resolve_root(cli.dir.as_deref(), &cwd)?;

    let config = Arc::new(
        ServerConfig::new(root)
            .with_interface(cli.interface)
            .with_ports(ports)
            .with_single_page(cli.single)
            .with_logging(cli.log),
    );

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(serve(config))
}

async fn serve(config: Arc<ServerConfig>) -> anyhow::Result<i32> {
    println!("[servest]");
    println!("https://github.com/aerth/servest");
    println!();

    if config.ports.min() != config.ports.max() {
        tracing::info!(
            "🔍 Looking for an available port between {} and {}",
            config.ports.min(),
            config.ports.max()
        );
    }

    let (listener, port) = match bind_in_range(&config.bind_interface, config.ports).await? {
        BindOutcome::Bound { listener, port } => (listener, port),
        BindOutcome::ExhaustedRange => {
            tracing::error!(
                "❌ No free port between {} and {} on {}",
                config.ports.min(),
                config.ports.max(),
                config.bind_interface
            );
            return Ok(EXIT_LISTENER);
        }
    };

    let addr = listener.local_addr()?;
    println!(
        "Serving {} on http://{}",
        config.root_directory.display(),
        addr
    );
    tracing::info!(
        "🚀 Listening on port {} (single-page: {}, request log: {})",
        port,
        config.single_page_mode,
        config.logging_enabled
    );

    let dispatcher = Arc::new(Dispatcher::from_config(config));
    servest_http::serve(listener, dispatcher, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    })
    .await;

    Ok(0)
}
