//! Logging setup for the `kujua` binary.
//!
//! - `KUJUA_LOG` holds the filter directives (default `warn`).
//! - `KUJUA_LOG_FORMAT=json` switches to JSON lines.
//!
//! Logs always go to stderr so they never mix with command output.

use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter.
pub const LOG_FILTER_ENV: &str = "KUJUA_LOG";

/// Environment variable selecting the log format.
pub const LOG_FORMAT_ENV: &str = "KUJUA_LOG_FORMAT";

/// Install the global subscriber. Safe to call more than once.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_env(LOG_FILTER_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    let result = match std::env::var(LOG_FORMAT_ENV).as_deref() {
        Ok("json") => builder.json().try_init(),
        _ => builder.try_init(),
    };

    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_twice() {
        init_tracing();
        init_tracing();
    }
}
