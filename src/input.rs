//! Opening log files for line-by-line reading.
//!
//! Archived benchmark logs are usually zstd-compressed, so inputs ending in
//! `.zst` are decoded on the fly. Everything else is read as plain text.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Open an input file as a buffered line source.
pub fn open_input(path: &Path) -> Result<Box<dyn BufRead>, InputError> {
    let file = File::open(path).map_err(|e| InputError::Open {
        path: path.to_path_buf(),
        source: e,
    })?;

    if is_compressed(path) {
        let decoder = zstd::stream::read::Decoder::new(file).map_err(|e| InputError::Open {
            path: path.to_path_buf(),
            source: e,
        })?;
        tracing::debug!(file = %path.display(), "reading zstd-compressed input");
        Ok(Box::new(BufReader::new(decoder)))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

fn is_compressed(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("zst")
}

/// Where a line came from, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub path: PathBuf,
    /// 1-based line number.
    pub line: usize,
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.path.display(), self.line)
    }
}

/// Errors from opening or reading an input file.
#[derive(Debug)]
pub enum InputError {
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    Read {
        location: Location,
        source: std::io::Error,
    },
}

impl std::fmt::Display for InputError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputError::Open { path, source } => {
                write!(f, "failed to open {}: {source}", path.display())
            }
            InputError::Read { location, source } => {
                write!(f, "failed to read {location}: {source}")
            }
        }
    }
}

impl std::error::Error for InputError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            InputError::Open { source, .. } => Some(source),
            InputError::Read { source, .. } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn read_lines(path: &Path) -> Vec<String> {
        open_input(path)
            .unwrap()
            .lines()
            .collect::<Result<_, _>>()
            .unwrap()
    }

    #[test]
    fn plain_file_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.log");
        std::fs::write(&path, "RESULT a=1\nnoise\r\nRESULT a=2\n").unwrap();
        assert_eq!(read_lines(&path), vec!["RESULT a=1", "noise", "RESULT a=2"]);
    }

    #[test]
    fn zstd_file_is_decompressed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.log.zst");
        let compressed = zstd::encode_all("RESULT a=1\nRESULT a=2\n".as_bytes(), 3).unwrap();
        std::fs::write(&path, compressed).unwrap();
        assert_eq!(read_lines(&path), vec!["RESULT a=1", "RESULT a=2"]);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = match open_input(Path::new("/nonexistent/run.log")) {
            Ok(_) => panic!("expected open failure"),
            Err(e) => e,
        };
        assert!(matches!(err, InputError::Open { .. }));
        assert!(err.to_string().contains("/nonexistent/run.log"));
    }

    #[test]
    fn location_display() {
        let loc = Location {
            path: PathBuf::from("logs/a.txt"),
            line: 12,
        };
        assert_eq!(loc.to_string(), "logs/a.txt:12");
    }
}
