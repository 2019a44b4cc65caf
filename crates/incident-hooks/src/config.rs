//! Configuration for the incident webhook service.

use std::env;
use std::fmt;
use std::time::Duration;

use crate::error::ConfigError;

const ENV_PORT: &str = "INCIDENT_HOOKS_PORT";
const ENV_API_KEY: &str = "PAGERDUTY_API_KEY";
const ENV_FROM_EMAIL: &str = "PAGERDUTY_FROM_EMAIL";
const ENV_NOTE_CONTENT: &str = "PAGERDUTY_NOTE_CONTENT";
const ENV_API_URL: &str = "PAGERDUTY_API_URL";
const ENV_CALLBACK_TIMEOUT_SECS: &str = "PAGERDUTY_CALLBACK_TIMEOUT_SECS";

/// Default listening port.
pub const DEFAULT_PORT: u16 = 9004;

/// Default `PagerDuty` REST API base URL.
pub const DEFAULT_API_URL: &str = "https://api.pagerduty.com";

/// Note posted on an incident when it is acknowledged.
pub const DEFAULT_NOTE_CONTENT: &str =
    "The incident has been acknowledged and responders have been notified.";

/// Default timeout for the note callback.
pub const DEFAULT_CALLBACK_TIMEOUT: Duration = Duration::from_secs(5);

/// Process-wide service configuration.
///
/// Loaded once at startup and never mutated afterwards.
#[derive(Clone)]
pub struct Config {
    /// HTTP server port.
    pub port: u16,
    /// `PagerDuty` REST API token.
    pub api_key: String,
    /// Email identity sent in the `From` header.
    pub from_email: String,
    /// Body of the acknowledgement note.
    pub note_content: String,
    /// REST API base URL, without a trailing slash.
    pub api_base_url: String,
    /// Upper bound on a single note callback.
    pub callback_timeout: Duration,
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    /// Returns an error if a required variable is missing, still holds a
    /// placeholder, or cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    /// Same as [`Config::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = match get(ENV_PORT) {
            Some(value) => value.parse::<u16>().map_err(|_| ConfigError::Invalid {
                var: ENV_PORT,
                value,
                reason: "expected a port number",
            })?,
            None => DEFAULT_PORT,
        };

        let api_key = required(ENV_API_KEY, get(ENV_API_KEY))?;
        let from_email = required(ENV_FROM_EMAIL, get(ENV_FROM_EMAIL))?;

        let note_content = match get(ENV_NOTE_CONTENT) {
            Some(value) => not_placeholder(ENV_NOTE_CONTENT, value)?,
            None => DEFAULT_NOTE_CONTENT.to_string(),
        };

        let api_base_url = get(ENV_API_URL).unwrap_or_else(|| DEFAULT_API_URL.to_string());
        if !(api_base_url.starts_with("https://") || api_base_url.starts_with("http://")) {
            return Err(ConfigError::Invalid {
                var: ENV_API_URL,
                value: api_base_url,
                reason: "expected an http(s) URL",
            });
        }
        let api_base_url = api_base_url.trim_end_matches('/').to_string();

        let callback_timeout = match get(ENV_CALLBACK_TIMEOUT_SECS) {
            Some(value) => match value.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::Invalid {
                        var: ENV_CALLBACK_TIMEOUT_SECS,
                        value,
                        reason: "expected a positive number of seconds",
                    })
                }
            },
            None => DEFAULT_CALLBACK_TIMEOUT,
        };

        Ok(Self {
            port,
            api_key,
            from_email,
            note_content,
            api_base_url,
            callback_timeout,
        })
    }
}

fn required(var: &'static str, value: Option<String>) -> Result<String, ConfigError> {
    let value = value.ok_or(ConfigError::Missing(var))?;
    not_placeholder(var, value)
}

fn not_placeholder(var: &'static str, value: String) -> Result<String, ConfigError> {
    if value.starts_with('<') && value.ends_with('>') {
        return Err(ConfigError::Placeholder(var));
    }
    Ok(value)
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("api_key", &"<redacted>")
            .field("from_email", &self.from_email)
            .field("note_content", &self.note_content)
            .field("api_base_url", &self.api_base_url)
            .field("callback_timeout", &self.callback_timeout)
            .finish()
    }
}
