//! FileSink - appends rendered lines to a file

use std::path::{Path, PathBuf};

use contracts::{ContractError, DataSink, Reading};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, instrument};

use crate::error::DispatcherError;

/// Sink that appends `<device_id>: value=<v>` lines to a file
///
/// Lines are buffered until `flush` (called after every batch and on close).
pub struct FileSink {
    name: String,
    path: PathBuf,
    writer: BufWriter<File>,
}

impl FileSink {
    /// Open (or create) `path` for appending
    ///
    /// Missing parent directories are created.
    #[instrument(name = "file_sink_create", skip_all, fields(path = %path.as_ref().display()))]
    pub async fn create(
        name: impl Into<String>,
        path: impl AsRef<Path>,
    ) -> Result<Self, DispatcherError> {
        let name = name.into();
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DispatcherError::sink_creation(&name, e.to_string()))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| DispatcherError::sink_creation(&name, e.to_string()))?;

        debug!(sink = %name, "file sink opened");
        Ok(Self {
            name,
            path,
            writer: BufWriter::new(file),
        })
    }

    /// Target file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DataSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&mut self, reading: &Reading) -> Result<(), ContractError> {
        let mut line = reading.render();
        line.push('\n');
        self.writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(self.writer.flush().await?)
    }

    #[instrument(name = "file_sink_close", skip(self), fields(sink = %self.name))]
    async fn close(&mut self) -> Result<(), ContractError> {
        self.writer.flush().await?;
        self.writer.get_mut().sync_all().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_sink_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("readings.log");

        let mut sink = FileSink::create("file", &path).await.unwrap();
        sink.write(&Reading::new(0, "sensor_1", 20.0)).await.unwrap();
        sink.write(&Reading::new(0, "sensor_2", 21.34)).await.unwrap();
        sink.close().await.unwrap();

        let mut sink = FileSink::create("file", &path).await.unwrap();
        sink.write(&Reading::new(0, "sensor_3", 7.0)).await.unwrap();
        sink.close().await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines,
            vec!["sensor_1: value=20.0", "sensor_2: value=21.3", "sensor_3: value=7.0"]
        );
    }

    #[tokio::test]
    async fn test_file_sink_create_fails_on_directory() {
        let dir = tempfile::tempdir().unwrap();
        let result = FileSink::create("file", dir.path()).await;
        assert!(matches!(result, Err(DispatcherError::SinkCreation { .. })));
    }
}
