//! ZIP archive streaming.
//!
//! [`ArchiveStream`] writes a ZIP in a single forward pass onto any
//! `AsyncWrite` (in the server: the write half of the pipe feeding the
//! response body). Entries are `Stored`: every payload is already a
//! compressed image format, and deflating it again only costs CPU.
//!
//! [`pump`] is the consumer side of a conversion. It appends units in the
//! order the converter hands them over, deletes each file once archived, and
//! owns the end-of-request sequence:
//!
//! ```text
//! units drained ─▶ converter result ─▶ archive close ─▶ workspace close ─▶ outcome
//! ```
//!
//! The outcome is only published after the workspace is gone, so a finished
//! response body implies a clean workspace root.

use crate::error::Pdf2ImgError;
use crate::pipeline::render::ConvertedUnit;
use crate::pipeline::workspace::Workspace;
use async_zip::tokio::write::ZipFileWriter;
use async_zip::{Compression, ZipEntryBuilder};
use std::path::Path;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// An in-progress ZIP written straight to `W`.
pub struct ArchiveStream<W: AsyncWrite + Unpin> {
    writer: ZipFileWriter<W>,
    entries: usize,
}

impl<W: AsyncWrite + Unpin> ArchiveStream<W> {
    /// Start a ZIP on `sink`. Nothing is written until the first entry.
    pub fn open(sink: W) -> Self {
        Self {
            writer: ZipFileWriter::with_tokio(sink),
            entries: 0,
        }
    }

    /// Append the file at `path` as `entry_name`.
    pub async fn append(&mut self, path: &Path, entry_name: &str) -> Result<(), Pdf2ImgError> {
        let write_err = |detail: String| Pdf2ImgError::ArchiveWriteFailed {
            entry: entry_name.to_string(),
            detail,
        };

        let data = tokio::fs::read(path)
            .await
            .map_err(|e| write_err(e.to_string()))?;
        let entry = ZipEntryBuilder::new(entry_name.to_string().into(), Compression::Stored);
        self.writer
            .write_entry_whole(entry, &data)
            .await
            .map_err(|e| write_err(e.to_string()))?;

        self.entries += 1;
        debug!(entry = entry_name, bytes = data.len(), "Entry appended");
        Ok(())
    }

    /// Entries appended so far.
    pub fn entries(&self) -> usize {
        self.entries
    }

    /// Write the central directory and shut the sink down.
    pub async fn close(self) -> Result<usize, Pdf2ImgError> {
        let close_err = |detail: String| Pdf2ImgError::ArchiveWriteFailed {
            entry: "<central directory>".into(),
            detail,
        };

        let mut sink = self
            .writer
            .close()
            .await
            .map_err(|e| close_err(e.to_string()))?
            .into_inner();
        sink.shutdown().await.map_err(|e| close_err(e.to_string()))?;
        Ok(self.entries)
    }
}

/// Drive one conversion's archive to completion.
///
/// * `units`: unit hand-off from the converter
/// * `converter`: the converter's final result (units produced)
/// * `outcome`: receives the overall result after cleanup
pub async fn pump<W: AsyncWrite + Unpin>(
    mut archive: ArchiveStream<W>,
    mut units: mpsc::UnboundedReceiver<ConvertedUnit>,
    converter: oneshot::Receiver<Result<usize, Pdf2ImgError>>,
    workspace: Workspace,
    outcome: oneshot::Sender<Result<usize, Pdf2ImgError>>,
) {
    let id = workspace.id();

    let mut appended = Ok(());
    while let Some(unit) = units.recv().await {
        let result = archive.append(&unit.path, &unit.entry_name).await;
        if let Err(e) = tokio::fs::remove_file(&unit.path).await {
            warn!(workspace = %id, "Could not delete {}: {}", unit.path.display(), e);
        }
        if let Err(e) = result {
            appended = Err(e);
            break;
        }
    }
    // Closing the receiver makes the converter's next hand-off fail.
    drop(units);

    let converted = converter.await.unwrap_or_else(|_| {
        Err(Pdf2ImgError::Internal(
            "converter stopped without reporting a result".into(),
        ))
    });

    // The archive is closed on every path; on failure it holds whatever was
    // appended before the error.
    let entries = archive.entries();
    let closed = archive.close().await;
    workspace.close();

    let result = appended
        .and(converted)
        .and_then(|produced| closed.map(|entries| (produced, entries)))
        .and_then(|(produced, entries)| {
            if produced == entries {
                Ok(entries)
            } else {
                Err(Pdf2ImgError::Internal(format!(
                    "{produced} units converted but {entries} archived"
                )))
            }
        });

    match &result {
        Ok(n) => info!(workspace = %id, entries = n, "Archive complete"),
        Err(e) => error!(
            workspace = %id,
            entries,
            "Conversion aborted after streaming started: {}",
            e
        ),
    }
    let _ = outcome.send(result);
}
