use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use dbgvis_frame::{ConnectionConfig, DEFAULT_MAX_PAYLOAD};
pub use dbgvis_transport::{DEFAULT_HOST, DEFAULT_PORT};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SessionError};

/// Where a session sends its primitive stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    /// Listen for one viewer at a time.
    Server,
    /// Connect to a listening viewer.
    Client,
    /// Connect, or record to the stream file if nobody is listening.
    ClientOrFile,
    /// Render through the caller's renderer only.
    Local,
    /// Record to the stream file only.
    File,
}

impl RunMode {
    pub const ALL: [RunMode; 5] = [
        RunMode::Server,
        RunMode::Client,
        RunMode::ClientOrFile,
        RunMode::Local,
        RunMode::File,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RunMode::Server => "server",
            RunMode::Client => "client",
            RunMode::ClientOrFile => "client-or-file",
            RunMode::Local => "local",
            RunMode::File => "file",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunMode {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self> {
        RunMode::ALL
            .into_iter()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| SessionError::Config(format!("unknown run mode {s:?}")))
    }
}

/// Everything a [`Session`](crate::Session) needs to start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    pub mode: RunMode,
    pub host: String,
    pub port: u16,
    /// Name announced to the peer during the handshake.
    pub app_name: String,
    /// Also deliver sent frames to the local renderer.
    pub echo_locally: bool,
    /// Record the primitive stream here.
    pub stream_file: Option<PathBuf>,
    /// Play back a recorded primitive stream from here.
    pub stream_playback_file: Option<PathBuf>,
    /// Record received remote commands here.
    pub command_record_file: Option<PathBuf>,
    /// Replay remote commands from here.
    pub command_playback_file: Option<PathBuf>,
    /// Iterations `server_wait` spends waiting for an ACK before giving up.
    pub max_server_wait: u32,
    /// Length of one wait iteration, and the I/O thread's read timeout.
    pub poll_interval_ms: u64,
    /// Largest packet accepted from the peer.
    pub max_payload_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mode: RunMode::Local,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            app_name: "dbgvis".to_string(),
            echo_locally: false,
            stream_file: None,
            stream_playback_file: None,
            command_record_file: None,
            command_playback_file: None,
            max_server_wait: 2000,
            poll_interval_ms: 1,
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}

impl SessionConfig {
    /// Load a configuration from a JSON file; missing fields take defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no session can run with.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(SessionError::Config("poll_interval_ms must be at least 1".into()));
        }
        if self.max_payload_size == 0 {
            return Err(SessionError::Config("max_payload_size must be non-zero".into()));
        }
        if matches!(self.mode, RunMode::File) && self.stream_file.is_none() {
            return Err(SessionError::MissingStreamFile(self.mode));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Connection tuning derived from this configuration.
    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            max_payload_size: self.max_payload_size,
            poll_interval: self.poll_interval(),
            ..ConnectionConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 5525);
        assert_eq!(config.mode, RunMode::Local);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: SessionConfig =
            serde_json::from_str(r#"{ "mode": "client-or-file", "port": 6000 }"#).unwrap();
        assert_eq!(config.mode, RunMode::ClientOrFile);
        assert_eq!(config.port, 6000);
        assert_eq!(config.max_server_wait, 2000);
    }

    #[test]
    fn unknown_field_is_rejected() {
        let err = serde_json::from_str::<SessionConfig>(r#"{ "prot": 1 }"#).unwrap_err();
        assert!(err.to_string().contains("unknown field"));
    }

    #[test]
    fn file_mode_needs_stream_file() {
        let config = SessionConfig {
            mode: RunMode::File,
            ..SessionConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SessionError::MissingStreamFile(RunMode::File))
        ));
    }

    #[test]
    fn run_mode_parses_names() {
        for mode in RunMode::ALL {
            assert_eq!(mode.as_str().parse::<RunMode>().unwrap(), mode);
        }
        assert_eq!("SERVER".parse::<RunMode>().unwrap(), RunMode::Server);
        assert!("viewer".parse::<RunMode>().is_err());
    }

    #[test]
    fn from_json_file_reads_disk() {
        let path = std::env::temp_dir().join(format!(
            "dbgvis-config-{}-{}.json",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::write(&path, r#"{ "mode": "server", "app_name": "sim" }"#).unwrap();
        let config = SessionConfig::from_json_file(&path).unwrap();
        assert_eq!(config.mode, RunMode::Server);
        assert_eq!(config.app_name, "sim");
        let _ = std::fs::remove_file(&path);
    }
}
