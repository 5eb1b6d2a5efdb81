//! `idle-svc` command line.
//!
//! # Environment Variables
//!
//! - `KUBECONFIG`: kubeconfig to load (defaults to `~/.kube/config`, then in-cluster)
//! - `RUST_LOG`: log filter; logs go to stderr so stdout stays machine readable

use std::io;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use idle_svc::output::{self, OutputFormat};
use idle_svc::{Error, KubeSource, Orphan, Result, ScanOrchestrator, ScanScope, TokioSleeper};
use tokio_util::sync::CancellationToken;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Find Kubernetes Services with zero ready endpoints.
#[derive(Debug, Parser)]
#[command(name = "idle-svc", version, about, long_about = None)]
struct Cli {
    /// Scan all namespaces.
    #[arg(short = 'A', long = "all-namespaces")]
    all_namespaces: bool,

    /// Scan a single namespace.
    #[arg(short = 'n', long)]
    namespace: Option<String>,

    /// Output JSON instead of a table.
    #[arg(long)]
    json: bool,

    /// Exit 1 when idle services are found.
    #[arg(long = "exit-code")]
    exit_code: bool,

    /// HTTP listen address for Prometheus metrics (e.g. :9090); empty disables the metrics server.
    #[arg(long, default_value = "")]
    listen: String,

    /// Rescan continuously, every --interval.
    #[arg(long)]
    watch: bool,

    /// Scan interval for --watch mode.
    #[arg(long, default_value = "30s", value_parser = humantime::parse_duration)]
    interval: Duration,

    /// Deadline for each Kubernetes API call.
    #[arg(long = "request-timeout", default_value = "30s", value_parser = humantime::parse_duration)]
    request_timeout: Duration,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref()))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("{e}");
            ExitCode::from(e.exit_code())
        }
    }
}

/// Log filter from `RUST_LOG` directives, warn and above when unset.
fn log_filter(directives: Option<&str>) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .parse_lossy(directives.unwrap_or_default())
}

async fn run(cli: Cli) -> Result<u8> {
    // Validated before any API access.
    let scope = ScanScope::from_flags(cli.all_namespaces, cli.namespace.as_deref())?;

    let config = kube::Config::infer().await?;
    let client = kube::Client::try_from(config).map_err(Error::Client)?;
    let orchestrator =
        ScanOrchestrator::new(KubeSource::new(client), scope, cli.request_timeout)?;

    if !cli.listen.is_empty() {
        idle_svc::metrics::serve(&cli.listen, orchestrator.metrics()).await?;
    }

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Table
    };

    if !cli.watch {
        let orphans = orchestrator.scan_once().await?;
        print_orphans(&orphans, format);
        return Ok(output::exit_code(&orphans, cli.exit_code));
    }

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupt received, stopping after the current scan");
                cancel.cancel();
            }
        }
    });

    let last = orchestrator
        .watch(cli.interval, &TokioSleeper, &cancel, |orphans| {
            print_orphans(orphans, format);
            output::watch_step(orphans, cli.exit_code)
        })
        .await?;

    Ok(output::exit_code(&last, cli.exit_code))
}

fn print_orphans(orphans: &[Orphan], format: OutputFormat) {
    let mut stdout = io::stdout().lock();
    if let Err(e) = output::write_orphans(&mut stdout, orphans, format) {
        tracing::warn!("failed to write scan results: {e}");
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;
    use tracing::Level;

    use super::*;

    fn with_filter<T>(directives: Option<&str>, check: impl FnOnce() -> T) -> T {
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(log_filter(directives))
            .with_writer(io::sink)
            .finish();
        tracing::subscriber::with_default(subscriber, check)
    }

    #[test]
    fn log_filter_defaults_to_warn() {
        with_filter(None, || {
            assert!(tracing::enabled!(Level::WARN));
            assert!(!tracing::enabled!(Level::INFO));
            assert!(!tracing::enabled!(Level::DEBUG));
        });
    }

    #[test]
    fn log_filter_honours_debug_directive() {
        with_filter(Some("debug"), || {
            assert!(tracing::enabled!(Level::DEBUG));
            assert!(!tracing::enabled!(Level::TRACE));
        });
    }

    #[test]
    fn log_filter_honours_target_directive() {
        with_filter(Some("idle_svc=info"), || {
            assert!(tracing::enabled!(Level::INFO));
            assert!(!tracing::enabled!(Level::DEBUG));
        });
    }

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn cli_defaults() {
        let cli = Cli::parse_from(["idle-svc"]);

        assert!(!cli.all_namespaces);
        assert!(cli.namespace.is_none());
        assert!(cli.listen.is_empty());
        assert!(!cli.watch);
        assert_eq!(cli.interval, Duration::from_secs(30));
        assert_eq!(cli.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn cli_parses_all_flags() {
        let cli = Cli::parse_from([
            "idle-svc",
            "-A",
            "--json",
            "--exit-code",
            "--listen",
            ":9090",
            "--watch",
            "--interval",
            "5m",
            "--request-timeout",
            "10s",
        ]);

        assert!(cli.all_namespaces);
        assert!(cli.json);
        assert!(cli.exit_code);
        assert_eq!(cli.listen, ":9090");
        assert!(cli.watch);
        assert_eq!(cli.interval, Duration::from_secs(300));
        assert_eq!(cli.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn cli_both_scopes_is_config_error() {
        let cli = Cli::parse_from(["idle-svc", "-A", "--namespace", "prod"]);

        let err = ScanScope::from_flags(cli.all_namespaces, cli.namespace.as_deref()).unwrap_err();

        assert!(matches!(err, Error::Config(_)));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn cli_rejects_bad_interval() {
        assert!(Cli::try_parse_from(["idle-svc", "--interval", "soon"]).is_err());
    }
}
