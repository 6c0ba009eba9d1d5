use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter};
use std::path::Path;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use windlass_scripting_host::{LoggingConfig, ProjectPaths};

const MAX_LOG_SIZE: u64 = 1024 * 1024; // 1MB

/// Initialize logging for a component.
///
/// - `component_name`: Name of the log file without extension (e.g. "windlass")
/// - `config`: `file` enables file logging next to the console output, `filter`
///   is used when `RUST_LOG` is unset
///
/// Returns a guard that must be kept alive for the duration of the program.
pub fn init_logging(component_name: &str, config: &LoggingConfig) -> io::Result<Option<WorkerGuard>> {
    if config.file {
        let log_dir = get_log_directory()?;
        fs::create_dir_all(&log_dir)?;

        let log_path = log_dir.join(format!("{}.log", component_name));

        // Truncate if over 1MB
        truncate_if_needed(&log_path)?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        let (non_blocking_file, guard) = tracing_appender::non_blocking(BufWriter::new(file));

        tracing_subscriber::registry()
            .with(env_filter(&config.filter))
            .with(fmt::layer().with_writer(io::stdout).with_ansi(true))
            .with(
                fmt::layer()
                    .with_writer(non_blocking_file)
                    .with_ansi(false)
                    .with_target(true),
            )
            .init();

        tracing::info!("Logging to file: {}", log_path.display());

        Ok(Some(guard))
    } else {
        // Console-only logging
        tracing_subscriber::fmt()
            .with_env_filter(env_filter(&config.filter))
            .init();

        Ok(None)
    }
}

/// `RUST_LOG` when set, else `fallback`, else "info"
fn env_filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Get the log directory path.
fn get_log_directory() -> io::Result<PathBuf> {
    let proj_paths = ProjectPaths::windlass()
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "Failed to find home directory"))?;

    Ok(proj_paths.data_dir().join("logs"))
}

/// Truncate log file if it exceeds MAX_LOG_SIZE.
fn truncate_if_needed(log_path: &Path) -> io::Result<()> {
    if log_path.exists() {
        let metadata = fs::metadata(log_path)?;
        if metadata.len() > MAX_LOG_SIZE {
            let file = File::create(log_path)?;
            file.set_len(0)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_small_log_is_kept() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("windlass.log");
        fs::write(&path, "short").unwrap();

        truncate_if_needed(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "short");
    }

    #[test]
    fn test_large_log_is_truncated() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("windlass.log");
        fs::write(&path, vec![b'x'; (MAX_LOG_SIZE + 1) as usize]).unwrap();

        truncate_if_needed(&path).unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), 0);
    }

    #[test]
    fn test_missing_log_is_fine() {
        let dir = TempDir::new().unwrap();
        truncate_if_needed(&dir.path().join("absent.log")).unwrap();
    }
}
