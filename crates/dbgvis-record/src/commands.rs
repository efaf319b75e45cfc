//! Record and replay of the remote-command stream.
//!
//! One command per line, UTF-8. Embedded line breaks are written as spaces,
//! which the argument splitter treats as separators anyway.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Lines, Write};
use std::path::Path;

use tracing::{debug, info};

use crate::error::Result;

/// Appends commands to a log file.
#[derive(Debug)]
pub struct CommandLog {
    out: BufWriter<File>,
    written: usize,
}

impl CommandLog {
    /// Create (or truncate) a command log at `path`.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path)?;
        info!(path = %path.display(), "recording remote commands");
        Ok(Self {
            out: BufWriter::new(file),
            written: 0,
        })
    }

    /// Append one command and flush it so a crash loses nothing already sent.
    pub fn append(&mut self, command: &str) -> Result<()> {
        let line = command.replace(['\r', '\n'], " ");
        self.out.write_all(line.as_bytes())?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        self.written += 1;
        debug!(command = %line, "logged command");
        Ok(())
    }

    pub fn written(&self) -> usize {
        self.written
    }
}

/// Replays commands from a log written by [`CommandLog`].
#[derive(Debug)]
pub struct CommandPlayback {
    lines: Lines<BufReader<File>>,
}

impl CommandPlayback {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        info!(path = %path.display(), "replaying remote commands");
        Ok(Self {
            lines: BufReader::new(file).lines(),
        })
    }

    /// The next non-empty command, or `None` when the log is exhausted.
    pub fn next_command(&mut self) -> Result<Option<String>> {
        for line in self.lines.by_ref() {
            let line = line?;
            if !line.trim().is_empty() {
                return Ok(Some(line));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_then_replay() {
        let path = temp_path("roundtrip");
        let mut log = CommandLog::create(&path).unwrap();
        log.append("camera reset").unwrap();
        log.append("say \"two words\" \"\"").unwrap();
        log.append("multi\nline").unwrap();
        assert_eq!(log.written(), 3);
        drop(log);

        let mut playback = CommandPlayback::open(&path).unwrap();
        assert_eq!(playback.next_command().unwrap().as_deref(), Some("camera reset"));
        assert_eq!(
            playback.next_command().unwrap().as_deref(),
            Some("say \"two words\" \"\"")
        );
        assert_eq!(playback.next_command().unwrap().as_deref(), Some("multi line"));
        assert_eq!(playback.next_command().unwrap(), None);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn blank_lines_are_skipped() {
        let path = temp_path("blank");
        std::fs::write(&path, "\n\nfirst\n   \nsecond").unwrap();
        let mut playback = CommandPlayback::open(&path).unwrap();
        assert_eq!(playback.next_command().unwrap().as_deref(), Some("first"));
        assert_eq!(playback.next_command().unwrap().as_deref(), Some("second"));
        assert_eq!(playback.next_command().unwrap(), None);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn missing_playback_file_errors() {
        assert!(CommandPlayback::open(temp_path("missing")).is_err());
    }

    fn temp_path(tag: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!(
            "dbgvis-commands-{tag}-{}-{}.log",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ))
    }
}
