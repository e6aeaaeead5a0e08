use clap::Parser;
use firecrud::app::{build_dispatcher, report_failure, report_startup_failure, report_success};
use firecrud::cli::{Args, LogLevel};
use firecrud::config::Config;
use firecrud::resource::validate;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::fmt::writer::MakeWriterExt;

fn setup_logging(level: LogLevel) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let tracing_level = level.to_tracing_level()?;

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Warning: cannot open log file {:?}: {}", log_path, e);
            return None;
        }
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!(
        "firecrud {} started with log level: {:?}",
        firecrud::VERSION,
        level
    );
    tracing::info!("Log file: {:?}", log_path);

    Some(guard)
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("firecrud").join("firecrud.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".firecrud").join("firecrud.log");
    }
    PathBuf::from("firecrud.log")
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level);

    // Malformed requests fail before any credentials are loaded
    let request = match args.request().and_then(|request| {
        validate(request.kind(), request.action(), request.params())?;
        Ok(request)
    }) {
        Ok(request) => request,
        Err(err) => return report_failure(&err),
    };

    let config = Config::load();
    let dispatcher = match build_dispatcher(&args, &config).await {
        Ok(dispatcher) => dispatcher,
        Err(err) => return report_startup_failure(&err),
    };

    match dispatcher.dispatch(&request).await {
        Ok(outcome) => report_success(&outcome),
        Err(err) => report_failure(&err),
    }
}
