use std::io;
use tracing::Level;
use tracing_appender::rolling;
use tracing_subscriber::filter::FilterFn;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

const DEFAULT_STDOUT_FILTER: &str = "info,cluster=info,entity=warn,scoring=info,db_query=warn,sqlx=off";
const DEFAULT_FILE_FILTER: &str = "info,cluster=debug,scoring=debug,db_query=info,sqlx=warn";

pub fn configure_logging() {
    // sqlx reports every slow statement at WARN; the db_query target already covers them
    let custom_filter = FilterFn::new(|metadata| {
        !(metadata.level() == &Level::WARN && metadata.target().starts_with("sqlx::query"))
    });

    // RUST_LOG overrides the stdout filter only
    let stdout_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_STDOUT_FILTER));
    let stdout_log = fmt::layer()
        .with_writer(io::stdout)
        .with_filter(stdout_filter)
        .with_filter(custom_filter);

    let file_appender = rolling::daily("logs", "clusters.log");
    let file_log = fmt::layer()
        .with_ansi(false)
        .with_writer(file_appender)
        .with_filter(EnvFilter::new(DEFAULT_FILE_FILTER));

    tracing_subscriber::Registry::default()
        .with(stdout_log)
        .with(file_log)
        .init();
}
