use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::LogFormat;

/// Install the global subscriber. Logs go to stderr so stdout stays JSON.
pub fn init_tracing(verbose: u8, format: LogFormat) {
    let filter = match verbose {
        0 => "docpipe=info,docpipe_lib=info,actix_web=info",
        1 => "docpipe=debug,docpipe_lib=debug,actix_web=info",
        _ => "docpipe=trace,docpipe_lib=trace,actix_web=debug",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let result = match format {
        LogFormat::Text => fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init(),
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .try_init(),
    };
    if let Err(err) = result {
        eprintln!("logging already initialised: {err}");
    }
}
