use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter variable checked before `RUST_LOG`.
pub const LOG_ENV: &str = "HUBSYNC_LOG";

/// Modules that log one line per vendor request.
const SERVICE_TARGETS: [&str; 4] = [
    "hubsync::core",
    "hubsync::aha",
    "hubsync::github",
    "hubsync::zenhub",
];

/// Default filter directives. Verbose raises the vendor clients to `debug`;
/// other crates (reqwest, hyper) stay at `warn` either way.
pub fn default_directives(verbose: bool) -> String {
    let level = if verbose { "debug" } else { "info" };

    let mut directives = vec!["warn".to_string(), "hubsync=info".to_string()];
    directives.extend(
        SERVICE_TARGETS
            .iter()
            .map(|target| format!("{}={}", target, level)),
    );
    directives.join(",")
}

fn build_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)))
}

pub fn init_cli_logger(verbose: bool) {
    tracing_subscriber::registry()
        .with(build_filter(verbose))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(verbose)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .init();
}

/// JSON lines on stdout, for running behind a log collector. The target is
/// kept so entries can be grouped by service.
pub fn init_json_logger() {
    tracing_subscriber::registry()
        .with(build_filter(false))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .json(),
        )
        .init();
}
