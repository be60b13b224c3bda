// File-backed log store
// One plain-text file per (address, run), never overwritten.
use async_trait::async_trait;
use chrono::{DateTime, Local};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use netprobe_core::application::constants::MAX_LOG_NAME_SUFFIX;
use netprobe_core::domain::{log_file_name, Target};
use netprobe_core::port::{LogError, LogStore, ProbeLog};

/// Writes session logs into a directory
pub struct FileLogStore {
    dir: PathBuf,
}

impl FileLogStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// `name.txt` for the first attempt, then `name_1.txt`, `name_2.txt`, ...
fn candidate_name(base: &str, attempt: u32) -> String {
    if attempt == 0 {
        return base.to_string();
    }
    match base.strip_suffix(".txt") {
        Some(stem) => format!("{}_{}.txt", stem, attempt),
        None => format!("{}_{}", base, attempt),
    }
}

#[async_trait]
impl LogStore for FileLogStore {
    async fn open(
        &self,
        target: &Target,
        run_started_at: DateTime<Local>,
    ) -> Result<Box<dyn ProbeLog>, LogError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| LogError::Open {
                path: self.dir.clone(),
                reason: e.to_string(),
            })?;

        let base = log_file_name(target.address(), run_started_at);
        for attempt in 0..=MAX_LOG_NAME_SUFFIX {
            let path = self.dir.join(candidate_name(&base, attempt));
            // create_new: two runs in the same second must not share a file
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => {
                    debug!(path = %path.display(), "Opened session log");
                    return Ok(Box::new(FileProbeLog { path, file }));
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(LogError::Open {
                        path,
                        reason: e.to_string(),
                    })
                }
            }
        }

        Err(LogError::Open {
            path: self.dir.join(base),
            reason: format!("no free file name after {} attempts", MAX_LOG_NAME_SUFFIX),
        })
    }
}

struct FileProbeLog {
    path: PathBuf,
    file: File,
}

#[async_trait]
impl ProbeLog for FileProbeLog {
    fn path(&self) -> &Path {
        &self.path
    }

    async fn append_line(&mut self, line: &str) -> Result<(), LogError> {
        let mut bytes = Vec::with_capacity(line.len() + 1);
        bytes.extend_from_slice(line.as_bytes());
        bytes.push(b'\n');
        self.file
            .write_all(&bytes)
            .await
            .map_err(|e| LogError::Write(e.to_string()))?;
        // Flush per line: a crash mid-run still leaves partial output on disk
        self.file
            .flush()
            .await
            .map_err(|e| LogError::Write(e.to_string()))
    }

    async fn close(mut self: Box<Self>) -> Result<(), LogError> {
        self.file
            .flush()
            .await
            .map_err(|e| LogError::Close(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use netprobe_core::domain::RepeatCount;

    fn target(address: &str) -> Target {
        Target::new(address, RepeatCount::new(2).unwrap()).unwrap()
    }

    fn at(second: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 7, 1, 9, 30, second).unwrap()
    }

    #[tokio::test]
    async fn test_writes_lines_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileLogStore::new(dir.path().join("logs"));

        let mut log = store.open(&target("10.0.0.1"), at(0)).await.unwrap();
        let path = log.path().to_path_buf();
        log.append_line("start").await.unwrap();
        log.append_line("64 bytes from 10.0.0.1").await.unwrap();
        log.close().await.unwrap();

        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "10.0.0.1_probe_log_20240701_093000.txt"
        );
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "start\n64 bytes from 10.0.0.1\n");
    }

    #[tokio::test]
    async fn test_line_is_on_disk_before_close() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileLogStore::new(dir.path());

        let mut log = store.open(&target("10.0.0.2"), at(0)).await.unwrap();
        log.append_line("partial evidence").await.unwrap();

        let contents = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(contents, "partial evidence\n");
    }

    #[tokio::test]
    async fn test_same_second_runs_never_collide() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileLogStore::new(dir.path());

        let first = store.open(&target("example.com"), at(5)).await.unwrap();
        let second = store.open(&target("example.com"), at(5)).await.unwrap();
        let later = store.open(&target("example.com"), at(6)).await.unwrap();

        assert_ne!(first.path(), second.path());
        assert!(second
            .path()
            .to_str()
            .unwrap()
            .ends_with("example.com_probe_log_20240701_093005_1.txt"));
        assert_ne!(first.path(), later.path());
    }

    #[tokio::test]
    async fn test_ipv6_address_makes_valid_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileLogStore::new(dir.path());

        let log = store.open(&target("fe80::1"), at(0)).await.unwrap();

        assert_eq!(log.path().parent().unwrap(), dir.path());
        assert!(log.path().exists());
    }

    #[test]
    fn test_candidate_names() {
        assert_eq!(candidate_name("a.txt", 0), "a.txt");
        assert_eq!(candidate_name("a.txt", 2), "a_2.txt");
        assert_eq!(candidate_name("a", 1), "a_1");
    }
}
