//! Subscriber setup: a console layer and a size-rotated file layer.
//!
//! The console honours `RUST_LOG` when it is set and falls back to the
//! configured console level otherwise. The file layer always uses the
//! configured file level so the run log stays complete. Once the file
//! passes `max_bytes` it is renamed to `<file>.1` and older backups shift
//! up, keeping at most `backup_count`.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use file_rotate::compression::Compression;
use file_rotate::suffix::AppendCount;
use file_rotate::{ContentLimit, FileRotate};
use parking_lot::Mutex;
use thiserror::Error;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{fmt as tracing_fmt, EnvFilter, Layer};

use crate::config::LogSettings;

/// Logging could not be set up.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The log directory or file could not be opened.
    #[error("cannot open log file {}", path.display())]
    File {
        /// Log file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A level directive is not a tracing level.
    #[error("invalid log level '{0}'")]
    Level(String),

    /// A global subscriber is already installed.
    #[error("logging already initialized")]
    Init(#[from] TryInitError),
}

/// Shared handle on the rotating log file.
#[derive(Clone)]
struct RotatingWriter(Arc<Mutex<FileRotate<AppendCount>>>);

impl RotatingWriter {
    /// Opens `dir/file_name`, creating the directory. A zero size or backup
    /// count disables rotation.
    fn open(settings: &LogSettings) -> Result<(Self, PathBuf), LoggingError> {
        let path = settings.dir.join(&settings.file_name);
        fs::create_dir_all(&settings.dir)
            .and_then(|()| OpenOptions::new().create(true).append(true).open(&path))
            .map_err(|source| LoggingError::File {
                path: path.clone(),
                source,
            })?;

        let limit = if settings.max_bytes == 0 || settings.backup_count == 0 {
            ContentLimit::None
        } else {
            ContentLimit::BytesSurpassed(settings.max_bytes)
        };
        let rotate = FileRotate::new(
            &path,
            AppendCount::new(settings.backup_count),
            limit,
            Compression::None,
            #[cfg(unix)]
            None,
        );
        Ok((Self(Arc::new(Mutex::new(rotate))), path))
    }
}

impl Write for RotatingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.lock().flush()
    }
}

impl fmt::Debug for RotatingWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RotatingWriter").finish_non_exhaustive()
    }
}

/// Keeps the log file handle; call [`LoggingGuard::shutdown`] before exit.
#[derive(Debug)]
pub struct LoggingGuard {
    writer: RotatingWriter,
    path: PathBuf,
}

impl LoggingGuard {
    /// Path of the run log.
    #[must_use]
    pub fn log_file(&self) -> &Path {
        &self.path
    }

    /// Flushes the log file.
    pub fn shutdown(mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

fn level(directive: &str) -> Result<LevelFilter, LoggingError> {
    LevelFilter::from_str(directive).map_err(|_| LoggingError::Level(directive.to_string()))
}

/// Installs the global subscriber described by `settings`.
pub fn init(settings: &LogSettings) -> Result<LoggingGuard, LoggingError> {
    let console_level = level(&settings.console_level)?;
    let file_level = level(&settings.file_level)?;

    let (writer, path) = RotatingWriter::open(settings)?;

    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(console_level.into()));
    let console = if settings.json {
        tracing_fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(console_filter)
            .boxed()
    } else {
        tracing_fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .with_filter(console_filter)
            .boxed()
    };

    let file_writer = writer.clone();
    let file_layer = tracing_fmt::layer()
        .with_ansi(false)
        .with_writer(move || file_writer.clone())
        .with_filter(file_level);

    tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .try_init()?;

    Ok(LoggingGuard { writer, path })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_unknown_level() {
        let settings = LogSettings {
            console_level: "loud".to_string(),
            ..LogSettings::default()
        };
        assert!(matches!(init(&settings), Err(LoggingError::Level(l)) if l == "loud"));
    }

    #[test]
    fn test_rotates_past_max_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let settings = LogSettings {
            dir: dir.path().to_path_buf(),
            max_bytes: 64,
            backup_count: 2,
            ..LogSettings::default()
        };

        let (mut writer, path) = RotatingWriter::open(&settings).unwrap();
        for i in 0..20 {
            writeln!(writer, "event {i:02} with enough padding to fill").unwrap();
        }
        writer.flush().unwrap();

        let backup = |n: usize| dir.path().join(format!("training_pipeline.log.{n}"));
        assert!(path.exists());
        assert!(backup(1).exists());
        assert!(backup(2).exists());
        assert!(!backup(3).exists());
        assert!(fs::read_to_string(&path).unwrap().len() < 2 * 64);
    }

    #[test]
    fn test_zero_backups_never_rotates() {
        let dir = tempfile::tempdir().unwrap();
        let settings = LogSettings {
            dir: dir.path().to_path_buf(),
            max_bytes: 16,
            backup_count: 0,
            ..LogSettings::default()
        };

        let (mut writer, path) = RotatingWriter::open(&settings).unwrap();
        for i in 0..5 {
            writeln!(writer, "event {i} past the limit").unwrap();
        }
        writer.flush().unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 5);
        assert!(!dir.path().join("training_pipeline.log.1").exists());
    }

    #[test]
    fn test_writes_file_and_refuses_second_init() {
        let dir = tempfile::tempdir().unwrap();
        let settings = LogSettings {
            dir: dir.path().join("logs"),
            console_level: "off".to_string(),
            ..LogSettings::default()
        };

        let guard = init(&settings).unwrap();
        tracing::info!(marker = "file-layer-check", "Logging initialized");
        let path = guard.log_file().to_path_buf();
        guard.shutdown().unwrap();

        let contents = fs::read_to_string(path).unwrap();
        assert!(contents.contains("file-layer-check"));
        assert!(matches!(init(&settings), Err(LoggingError::Init(_))));
    }
}
