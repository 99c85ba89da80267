//! Application-level configuration loading, including the default language roster.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "CODEGUESS_BACK_CONFIG_PATH";
/// Seconds a round stays open before the host closes it on timeout.
const DEFAULT_ROUND_TIME_LIMIT_SECS: u64 = 30;
/// Cadence of the host controller's periodic evaluation tick.
const DEFAULT_HOST_TICK_MS: u64 = 1000;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    round_time_limit: Duration,
    host_tick: Duration,
    languages: Vec<String>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to the
    /// baked-in defaults when the file is missing or malformed.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        languages = config.languages.len(),
                        round_time_limit_secs = config.round_time_limit.as_secs(),
                        "loaded configuration"
                    );
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// How long a round stays open before timing out.
    pub fn round_time_limit(&self) -> Duration {
        self.round_time_limit
    }

    /// How often the host controller re-evaluates the active round.
    pub fn host_tick(&self) -> Duration {
        self.host_tick
    }

    /// Languages offered when a session does not restrict the roster.
    pub fn languages(&self) -> &[String] {
        &self.languages
    }

    #[cfg(test)]
    pub(crate) fn for_tests(round_time_limit: Duration, host_tick: Duration) -> Self {
        Self {
            round_time_limit,
            host_tick,
            languages: default_languages(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            round_time_limit: Duration::from_secs(DEFAULT_ROUND_TIME_LIMIT_SECS),
            host_tick: Duration::from_millis(DEFAULT_HOST_TICK_MS),
            languages: default_languages(),
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file.
struct RawConfig {
    round_time_limit_secs: Option<u64>,
    host_tick_ms: Option<u64>,
    languages: Option<Vec<String>>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = Self::default();
        Self {
            round_time_limit: value
                .round_time_limit_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.round_time_limit),
            host_tick: value
                .host_tick_ms
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.host_tick),
            languages: value
                .languages
                .filter(|languages| !languages.is_empty())
                .unwrap_or(defaults.languages),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Built-in language roster shipped with the binary.
fn default_languages() -> Vec<String> {
    [
        "C",
        "C++",
        "C#",
        "Java",
        "JavaScript",
        "TypeScript",
        "Python",
        "Ruby",
        "PHP",
        "Go",
        "Rust",
        "Swift",
        "Kotlin",
        "SQL",
        "MATLAB",
        "R",
        "Bash",
        "PowerShell",
        "Visual Basic",
        "Perl",
        "Haskell",
        "Elm",
        "F#",
        "OCaml",
        "Elixir",
        "Scala",
        "Lisp",
        "ML",
        "Prolog",
        "Erlang",
        "Brainfuck",
        "Befunge",
        "Piet",
        "Assembly",
        "Dart",
        "Julia",
        "Nim",
        "Objective-C",
        "Ada",
        "GDScript",
        "Hack",
        "Cobol",
        "Fortran",
        "Lua",
        "Crystal",
        "D",
        "Smalltalk",
        "Forth",
        "Racket",
        "Tcl",
        "Scheme",
        "VHDL",
        "Verilog",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}
