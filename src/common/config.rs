//! Configuration file handling

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use super::paths::config_path;
use super::Result;

/// Main configuration structure
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Shell used to run listing commands
    #[serde(default)]
    pub shell: ShellConfig,

    /// Timeout settings
    #[serde(default)]
    pub timeouts: Timeouts,

    /// Output comparison settings
    #[serde(default)]
    pub compare: CompareConfig,

    /// Long-running server detection
    #[serde(default)]
    pub server: ServerConfig,
}

/// Shell settings
#[derive(Debug, Deserialize)]
pub struct ShellConfig {
    /// Shell executable, resolved through PATH when not absolute
    #[serde(default = "default_shell")]
    pub program: PathBuf,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            program: default_shell(),
        }
    }
}

fn default_shell() -> PathBuf {
    PathBuf::from("/bin/bash")
}

/// Timeout settings in seconds
#[derive(Debug, Deserialize)]
pub struct Timeouts {
    /// Maximum time a listing command may run; 0 waits forever
    #[serde(default = "default_command")]
    pub command_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            command_secs: default_command(),
        }
    }
}

fn default_command() -> u64 {
    600
}

/// Output comparison settings
#[derive(Debug, Deserialize)]
pub struct CompareConfig {
    /// Replacement for the scenario's temporary directory in actual output
    #[serde(default = "default_placeholder")]
    pub placeholder: String,
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self {
            placeholder: default_placeholder(),
        }
    }
}

fn default_placeholder() -> String {
    "/workspace".to_string()
}

/// Server detection settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Substrings marking a command that never exits on its own
    #[serde(default = "default_markers")]
    pub markers: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            markers: default_markers(),
        }
    }
}

fn default_markers() -> Vec<String> {
    vec!["runserver".to_string()]
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = config_path() {
            if path.exists() {
                let content = std::fs::read_to_string(&path).map_err(|e| {
                    super::Error::FileRead {
                        path: path.display().to_string(),
                        error: e.to_string(),
                    }
                })?;
                return Self::from_toml(&content);
            }
        }
        Ok(Self::default())
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| super::Error::ConfigParse(e.to_string()))
    }

    /// Command timeout, `None` when disabled
    pub fn command_timeout(&self) -> Option<Duration> {
        match self.timeouts.command_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Resolve the shell executable
    ///
    /// Absolute paths are used as-is, anything else is looked up in PATH
    pub fn shell_path(&self) -> Result<PathBuf> {
        let program = &self.shell.program;
        if program.is_absolute() {
            return Ok(program.clone());
        }
        which::which(program).map_err(|e| {
            super::Error::Config(format!("Shell '{}' not found: {}", program.display(), e))
        })
    }
}
