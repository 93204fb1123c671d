use std::path::PathBuf;
use tokio::fs::{self as async_fs, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use crate::error::{Error, Result};
use crate::store::record::{encode_frame, read_frame, FrameRead, LogRecord};
use crate::types::ids::RouteId;

/// What loading one log found.
#[derive(Debug)]
pub struct LoadedLog {
    pub records: Vec<LogRecord>,
    pub truncated_bytes: u64,
    pub reason: Option<String>,
}

/// Append-only, fsynced record log for a single route.
///
/// ## Durability
/// - **Append**: `write_all` followed by `sync_data` before the call returns.
/// - **Failed append**: the file is cut back to the last good length so a
///   half-written frame never precedes later records.
/// - **Load**: frames are read front to back; the first incomplete or
///   checksum-failing frame and everything after it are truncated away.
/// - **Rewrite**: temp file, fsync, rename, then fsync of the directory.
/// - **Unreadable**: a log that failed to load refuses every write, so
///   whatever is on disk is left untouched.
pub struct RouteLog {
    route_id: RouteId,
    path: PathBuf,
    file: Option<File>,
    len: u64,
    unavailable: Option<String>,
}

impl RouteLog {
    pub fn new(route_id: RouteId, path: PathBuf) -> Self {
        RouteLog {
            route_id,
            path,
            file: None,
            len: 0,
            unavailable: None,
        }
    }

    /// Placeholder for a log that could not be read at startup.
    pub fn unavailable(route_id: RouteId, path: PathBuf, reason: impl Into<String>) -> Self {
        RouteLog {
            unavailable: Some(reason.into()),
            ..RouteLog::new(route_id, path)
        }
    }

    fn ensure_available(&self) -> Result<()> {
        match &self.unavailable {
            Some(reason) => Err(Error::StorePersistence {
                route_id: self.route_id.clone(),
                reason: format!("log {:?} could not be loaded: {}", self.path, reason),
            }),
            None => Ok(()),
        }
    }

    /// Read an existing log, healing a damaged tail in place.
    pub async fn load(route_id: RouteId, path: PathBuf) -> Result<(Self, LoadedLog)> {
        let data = async_fs::read(&path).await?;

        let mut records = Vec::new();
        let mut offset = 0usize;
        let mut reason = None;

        while offset < data.len() {
            match read_frame(&data[offset..]) {
                FrameRead::Record { record, len } => {
                    records.push(record);
                    offset += len;
                }
                FrameRead::Incomplete => {
                    reason = Some("incomplete trailing record".to_string());
                    break;
                }
                FrameRead::Corrupt(why) => {
                    reason = Some(why);
                    break;
                }
            }
        }

        let good_len = offset as u64;
        let truncated_bytes = data.len() as u64 - good_len;
        if truncated_bytes > 0 {
            tracing::warn!(
                "Truncating {} damaged bytes from {:?} ({} records kept): {}",
                truncated_bytes,
                path,
                records.len(),
                reason.as_deref().unwrap_or("unknown")
            );
            let file = OpenOptions::new().write(true).open(&path).await?;
            file.set_len(good_len).await?;
            file.sync_all().await?;
        }

        let log = RouteLog {
            route_id,
            path,
            file: None,
            len: good_len,
            unavailable: None,
        };

        Ok((log, LoadedLog { records, truncated_bytes, reason }))
    }

    pub async fn append(&mut self, record: &LogRecord) -> Result<()> {
        self.ensure_available()?;
        let frame = encode_frame(record)?;

        if let Err(e) = self.write_frame(&frame).await {
            self.rollback().await;
            return Err(Error::StorePersistence {
                route_id: self.route_id.clone(),
                reason: e.to_string(),
            });
        }

        self.len += frame.len() as u64;
        Ok(())
    }

    async fn write_frame(&mut self, frame: &[u8]) -> std::io::Result<()> {
        if self.file.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .await?;
            self.file = Some(file);
        }

        if let Some(file) = self.file.as_mut() {
            file.write_all(frame).await?;
            file.flush().await?;
            file.sync_data().await?;
        }
        Ok(())
    }

    async fn rollback(&mut self) {
        // Drop the handle; the next append reopens from a clean length.
        if let Some(file) = self.file.take() {
            if let Err(e) = file.set_len(self.len).await {
                tracing::error!("Rollback of {:?} to {} bytes failed: {}", self.path, self.len, e);
            }
        }
    }

    /// Replace the log with exactly `records`, atomically.
    pub async fn rewrite(&mut self, records: &[LogRecord]) -> Result<()> {
        self.ensure_available()?;
        let mut data = Vec::new();
        for record in records {
            data.extend_from_slice(&encode_frame(record)?);
        }

        let tmp_path = self.path.with_extension("log.tmp");
        let persist = async {
            let mut tmp = File::create(&tmp_path).await?;
            tmp.write_all(&data).await?;
            tmp.flush().await?;
            tmp.sync_all().await?;
            drop(tmp);
            async_fs::rename(&tmp_path, &self.path).await?;
            if let Some(dir) = self.path.parent() {
                File::open(dir).await?.sync_all().await?;
            }
            Ok::<_, std::io::Error>(())
        };

        self.file = None;
        persist.await.map_err(|e| Error::StorePersistence {
            route_id: self.route_id.clone(),
            reason: format!("rewrite failed: {}", e),
        })?;

        self.len = data.len() as u64;
        tracing::info!("Rewrote {:?} with {} records", self.path, records.len());
        Ok(())
    }
}
