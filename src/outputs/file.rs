//! File output implementation

use crate::core::{ContentType, Event, Output, OutputStatus, PipelineError, Result};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Appends encoded events to a file.
///
/// [`Output::reopen`] closes and reopens the path, so an external rotation
/// tool can move the file away and signal the pipeline to start a new one.
pub struct FileOutput {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl FileOutput {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let writer = Some(Self::open(&path)?);
        Ok(Self { path, writer })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(path: &Path) -> Result<BufWriter<File>> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| {
                PipelineError::io_operation(
                    "opening log file",
                    path.display().to_string(),
                    e,
                )
            })?;
        Ok(BufWriter::new(file))
    }

    fn writer(&mut self) -> Result<&mut BufWriter<File>> {
        self.writer
            .as_mut()
            .ok_or_else(|| PipelineError::other(format!("file output '{}' is closed", self.path.display())))
    }
}

impl Output for FileOutput {
    fn write(&mut self, _event: &Event, payload: &[u8], _content_type: ContentType) -> Result<()> {
        self.writer()?.write_all(payload)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if let Some(ref mut writer) = self.writer {
            writer.flush()?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        Ok(())
    }

    fn reopen(&mut self) -> Result<OutputStatus> {
        if self.writer.is_none() {
            return Ok(OutputStatus::Closed);
        }
        self.flush()?;
        self.writer = Some(Self::open(&self.path)?);
        Ok(OutputStatus::Reopened)
    }

    fn name(&self) -> &str {
        "file"
    }
}

impl Drop for FileOutput {
    fn drop(&mut self) {
        // Ensure all buffered data is flushed to disk
        let _ = self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Level;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_write_and_flush() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("app.log");
        let mut output = FileOutput::new(&path)?;
        let event = Event::new("app", Level::Info, "x");

        output.write(&event, b"first\n", ContentType::TEXT)?;
        output.flush()?;
        assert_eq!(fs::read_to_string(&path)?, "first\n");
        Ok(())
    }

    #[test]
    fn test_reopen_after_rotation() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("app.log");
        let rotated = dir.path().join("app.log.1");
        let mut output = FileOutput::new(&path)?;
        let event = Event::new("app", Level::Info, "x");

        output.write(&event, b"before\n", ContentType::TEXT)?;
        output.flush()?;
        fs::rename(&path, &rotated)?;

        assert_eq!(output.reopen()?, OutputStatus::Reopened);
        output.write(&event, b"after\n", ContentType::TEXT)?;
        output.flush()?;

        assert_eq!(fs::read_to_string(&rotated)?, "before\n");
        assert_eq!(fs::read_to_string(&path)?, "after\n");
        Ok(())
    }

    #[test]
    fn test_closed_output_rejects_writes() -> Result<()> {
        let dir = tempdir()?;
        let mut output = FileOutput::new(dir.path().join("app.log"))?;
        output.close()?;

        let event = Event::new("app", Level::Info, "x");
        assert!(output.write(&event, b"late\n", ContentType::TEXT).is_err());
        assert_eq!(output.reopen()?, OutputStatus::Closed);
        Ok(())
    }

    #[test]
    fn test_open_failure_has_context() {
        let dir = tempdir().unwrap();
        let result = FileOutput::new(dir.path().join("missing").join("app.log"));
        match result {
            Err(err @ PipelineError::IoOperation { .. }) => {
                assert!(err.to_string().contains("opening log file"));
            }
            _ => panic!("expected IoOperation error"),
        }
    }
}
