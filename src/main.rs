use anyhow::{Context, Result};
use clap::Parser;
use lsp_cli::cli::{Cli, Command, ServerAction};
use lsp_cli::config::AppConfig;
use tracing_subscriber::EnvFilter;

fn init_logging(log_dir: &std::path::Path, log_filter: &str, foreground: bool) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let _ = std::fs::create_dir_all(log_dir);
    let file_appender = tracing_appender::rolling::daily(log_dir, "lsp-cli.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_new(log_filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking);

    if foreground {
        subscriber.init();
    } else {
        subscriber.with_ansi(false).init();
    }
    Some(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let is_broker = matches!(cli.command, Command::Server { action: ServerAction::RunBroker });

    let config = AppConfig::new(
        None,
        None,
        None,
        None,
        if cli.debug { Some("debug".to_string()) } else { None },
    );

    let _log_guard = init_logging(&config.log_dir, &config.log, is_broker);

    if is_broker {
        let config = std::sync::Arc::new(config);
        let _watcher = lsp_cli::config::ConfigWatcher::start(&config.data_dir);
        return lsp_cli::broker::run(config).await.context("broker exited with an error");
    }

    let debug = cli.debug;
    match lsp_cli::cli::dispatch(cli).await {
        Ok(()) => Ok(()),
        Err(e) => {
            if debug {
                eprintln!("error: {e:?}");
            } else {
                eprintln!("error: {e}");
            }
            std::process::exit(1);
        }
    }
}
