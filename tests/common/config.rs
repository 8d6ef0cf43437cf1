//! Config helpers pointing every endpoint at one mock server

use feed_relay::Config;
use std::path::Path;
use std::time::Duration;
use wiremock::MockServer;

/// Config for `ids` with source, proxy and destination all served by `server`
///
/// Retry delays are shortened to milliseconds so retried items do not slow the tests.
pub fn relay_config(server: &MockServer, staging: &Path, ids: &[&str], max_attempts: u32) -> Config {
    let ids = ids
        .iter()
        .map(|id| format!("{:?}", id))
        .collect::<Vec<_>>()
        .join(", ");
    let toml = format!(
        r#"
        timeout = 10
        staging_dir = {staging:?}

        [source]
        server = "{uri}"
        download_server = "{uri}"
        ids = [{ids}]

        [destination]
        server = "{uri}"
        username = "editor"
        password = "secret"

        [retry]
        max_attempts = {max_attempts}
        jitter = false
        "#,
        staging = staging.display().to_string(),
        uri = server.uri(),
    );

    let mut config = Config::from_toml_str(&toml).expect("test config should be valid");
    config.retry.initial_delay = Duration::from_millis(5);
    config.retry.max_delay = Duration::from_millis(20);
    config
}
