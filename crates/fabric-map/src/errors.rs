use std::fmt;
use std::io;
use std::path::PathBuf;

use fabric_core::{BusFault, ConfigError, SubmitError};

/// Every failure a command can report.
#[derive(Debug)]
pub enum CliError {
    /// The description file could not be read.
    Read {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
    /// The description file is not a valid fabric description.
    Parse {
        /// File that failed.
        path: PathBuf,
        /// Deserializer message.
        source: toml::de::Error,
    },
    /// The description parsed but does not build.
    Config(ConfigError),
    /// The descriptor list could not be serialized.
    Json(serde_json::Error),
    /// A bus transaction could not be issued.
    Submit(SubmitError),
    /// A bus transaction completed with a fault.
    Transaction {
        /// System address of the failed access.
        address: u32,
        /// Delivered fault.
        fault: BusFault,
    },
    /// No peripheral with this name is mapped.
    UnknownChannel(String),
    /// The named peripheral is not a delta-sigma channel.
    NotAChannel {
        /// Instance name.
        name: String,
        /// Its actual class.
        class: String,
    },
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read { path, source } => {
                write!(f, "failed to read {}: {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "{}: invalid fabric description: {source}", path.display())
            }
            Self::Config(error) => write!(f, "invalid fabric: {error}"),
            Self::Json(error) => write!(f, "failed to serialize descriptors: {error}"),
            Self::Submit(error) => write!(f, "bus submission failed: {error}"),
            Self::Transaction { address, fault } => {
                write!(f, "access to {address:#010x} failed: {fault}")
            }
            Self::UnknownChannel(name) => write!(f, "no peripheral named {name}"),
            Self::NotAChannel { name, class } => {
                write!(f, "{name} is a {class} block, not a pdm channel")
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Read { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::Config(error) => Some(error),
            Self::Json(error) => Some(error),
            Self::Submit(error) => Some(error),
            Self::Transaction { .. } | Self::UnknownChannel(_) | Self::NotAChannel { .. } => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(error: ConfigError) -> Self {
        Self::Config(error)
    }
}

impl From<SubmitError> for CliError {
    fn from(error: SubmitError) -> Self {
        Self::Submit(error)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(error: serde_json::Error) -> Self {
        Self::Json(error)
    }
}
