use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "SCANSHELF_LOG";

/// Installs the global subscriber. `SCANSHELF_LOG` takes `EnvFilter`
/// directives and defaults to `info`. Output goes to stderr so command
/// output on stdout stays parseable.
pub fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
