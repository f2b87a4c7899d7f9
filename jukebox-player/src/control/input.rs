//! Hardware input watcher
//!
//! Watches a file such as a sysfs GPIO `value` file. The kernel signals a
//! level change as priority readiness (`POLLPRI`); on each such edge one
//! ASCII digit is read: `'1'` means play, any other digit means pause. The
//! read offset is rewound afterwards so the next edge reads the fresh value.
//! Files without poll support are read once per tick instead, and only
//! level changes are reported.
//!
//! Read and parse failures are logged at debug level and otherwise ignored:
//! a flaky input line must never stop the event loop.

use crate::error::{Error, Result};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::unix::AsyncFd;
use tokio::io::Interest;
use tracing::{debug, info};

#[cfg(any(target_os = "linux", target_os = "android"))]
const INPUT_INTEREST: Interest = Interest::PRIORITY;
#[cfg(not(any(target_os = "linux", target_os = "android")))]
const INPUT_INTEREST: Interest = Interest::READABLE;

/// epoll refuses regular files with EPERM
const EPERM: i32 = 1;

/// Logical level of the input line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputLevel {
    /// `'1'`: play
    Active,
    /// Any other digit: pause
    Inactive,
}

impl InputLevel {
    /// Parse one byte of the input file; `None` for non-digits
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'1' => Some(InputLevel::Active),
            b'0'..=b'9' => Some(InputLevel::Inactive),
            _ => None,
        }
    }
}

/// Read the current level and rewind to the start of the file
///
/// The rewind happens even when the byte cannot be parsed.
pub fn read_level(mut file: &File) -> io::Result<InputLevel> {
    let mut byte = [0u8; 1];
    let read = file.read(&mut byte);
    file.seek(SeekFrom::Start(0))?;

    if read? == 0 {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "input file is empty"));
    }
    InputLevel::from_byte(byte[0]).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unexpected input byte 0x{:02x}", byte[0]),
        )
    })
}

enum Source {
    /// Edge notifications through `POLLPRI`
    Edge(AsyncFd<File>),
    /// The file cannot be polled (regular files): read it once per tick and
    /// report changes
    Level {
        file: File,
        last: Option<InputLevel>,
    },
}

pub struct HardwareInputWatcher {
    path: PathBuf,
    source: Source,
}

impl HardwareInputWatcher {
    /// Open `path` read-only and register it for readiness events
    ///
    /// Files that do not support polling fall back to reading the level on
    /// every tick.
    ///
    /// # Errors
    /// `InvalidConfiguration` if the file cannot be opened or registered.
    pub fn open(path: &Path) -> Result<Self> {
        let open = || {
            File::open(path).map_err(|e| {
                Error::InvalidConfiguration(format!("Cannot open input {}: {}", path.display(), e))
            })
        };

        let source = match AsyncFd::with_interest(open()?, INPUT_INTEREST) {
            Ok(fd) => {
                info!("Watching hardware input {} for edges", path.display());
                Source::Edge(fd)
            }
            Err(e) if e.raw_os_error() == Some(EPERM) => {
                info!("Watching hardware input {} by polling its level", path.display());
                Source::Level {
                    file: open()?,
                    last: None,
                }
            }
            Err(e) => {
                return Err(Error::InvalidConfiguration(format!(
                    "Cannot poll input {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        Ok(Self {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True when level changes arrive as kernel edge notifications
    pub fn is_edge_triggered(&self) -> bool {
        matches!(self.source, Source::Edge(_))
    }

    /// Wait up to `timeout` for an input edge
    ///
    /// Returns the level read on the edge, or `None` on timeout or on a
    /// swallowed read failure. In level mode the wait always lasts `timeout`
    /// and only a changed level is reported.
    pub async fn poll(&mut self, timeout: Duration) -> Option<InputLevel> {
        match &mut self.source {
            Source::Edge(fd) => tokio::time::timeout(timeout, wait_edge(fd, &self.path))
                .await
                .unwrap_or(None),
            Source::Level { file, last } => {
                tokio::time::sleep(timeout).await;
                match read_level(file) {
                    Ok(level) if Some(level) != *last => {
                        *last = Some(level);
                        Some(level)
                    }
                    Ok(_) => None,
                    Err(e) => {
                        debug!("Ignoring input {} read: {}", self.path.display(), e);
                        None
                    }
                }
            }
        }
    }
}

async fn wait_edge(fd: &AsyncFd<File>, path: &Path) -> Option<InputLevel> {
    let mut guard = match fd.ready(INPUT_INTEREST).await {
        Ok(guard) => guard,
        Err(e) => {
            debug!("Input {} not pollable: {}", path.display(), e);
            // Let the caller's timeout bound this tick
            std::future::pending::<()>().await;
            return None;
        }
    };

    let result = read_level(guard.get_inner());
    guard.clear_ready();

    match result {
        Ok(level) => Some(level),
        Err(e) => {
            debug!("Ignoring input {} read: {}", path.display(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn input_file(content: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_from_byte() {
        assert_eq!(InputLevel::from_byte(b'1'), Some(InputLevel::Active));
        assert_eq!(InputLevel::from_byte(b'0'), Some(InputLevel::Inactive));
        assert_eq!(InputLevel::from_byte(b'7'), Some(InputLevel::Inactive));
        assert_eq!(InputLevel::from_byte(b'x'), None);
        assert_eq!(InputLevel::from_byte(b'\n'), None);
    }

    #[test]
    fn test_read_level_rewinds() {
        let tmp = input_file(b"1\n");
        let file = File::open(tmp.path()).unwrap();

        assert_eq!(read_level(&file).unwrap(), InputLevel::Active);
        // Same byte again: the offset went back to 0
        assert_eq!(read_level(&file).unwrap(), InputLevel::Active);
    }

    #[test]
    fn test_read_level_sees_new_value() {
        let mut tmp = input_file(b"1\n");
        let file = File::open(tmp.path()).unwrap();
        assert_eq!(read_level(&file).unwrap(), InputLevel::Active);

        tmp.as_file_mut().set_len(0).unwrap();
        tmp.as_file_mut().seek(SeekFrom::Start(0)).unwrap();
        tmp.write_all(b"0\n").unwrap();
        tmp.flush().unwrap();

        assert_eq!(read_level(&file).unwrap(), InputLevel::Inactive);
    }

    #[test]
    fn test_read_level_errors() {
        let empty = input_file(b"");
        let file = File::open(empty.path()).unwrap();
        assert_eq!(
            read_level(&file).unwrap_err().kind(),
            io::ErrorKind::UnexpectedEof
        );

        let garbage = input_file(b"x");
        let file = File::open(garbage.path()).unwrap();
        assert_eq!(
            read_level(&file).unwrap_err().kind(),
            io::ErrorKind::InvalidData
        );
    }

    #[tokio::test]
    async fn test_open_missing_file_is_configuration_error() {
        let result = HardwareInputWatcher::open(Path::new("/nonexistent/gpio/value"));
        assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
    }

    #[tokio::test]
    async fn test_regular_file_falls_back_to_level_polling() {
        let mut tmp = input_file(b"0\n");
        let mut watcher = HardwareInputWatcher::open(tmp.path()).unwrap();
        assert!(!watcher.is_edge_triggered());

        let tick = Duration::from_millis(10);
        // First read establishes the level
        assert_eq!(watcher.poll(tick).await, Some(InputLevel::Inactive));
        assert_eq!(watcher.poll(tick).await, None);

        tmp.as_file_mut().set_len(0).unwrap();
        tmp.as_file_mut().seek(SeekFrom::Start(0)).unwrap();
        tmp.write_all(b"1\n").unwrap();
        tmp.flush().unwrap();

        assert_eq!(watcher.poll(tick).await, Some(InputLevel::Active));
        assert_eq!(watcher.poll(tick).await, None);
    }
}
