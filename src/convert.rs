//! Request-scoped conversion: validated request in, archive byte stream out.
//!
//! ## Ordering
//!
//! Everything that can still become an ordinary HTTP error happens before
//! this function returns:
//!
//! 1. the workspace is created and (for PDFs) the upload staged in it,
//! 2. the PDF engine loads the document and reports its page count.
//!
//! Only then is the archive pump started and the body stream handed back.
//! From that point failures travel through the stream (see [`crate::stream`]).
//!
//! ## Who owns what
//!
//! The async side owns the [`Workspace`]; converters only see its path. The
//! pump closes the workspace after the archive, so it is removed on success,
//! on engine failure and on client disconnect alike. If this future is
//! dropped before the pump starts (request timeout), dropping the workspace
//! removes it and the converter's next hand-off fails.

use crate::config::ServerConfig;
use crate::engine::{EngineHandle, EngineQueue, SourceDocument};
use crate::error::Pdf2ImgError;
use crate::pipeline::archive::{self, ArchiveStream};
use crate::pipeline::intake::{ConversionRequest, ImageBatchRequest, PdfRequest};
use crate::pipeline::naming::file_stem;
use crate::pipeline::render::{self, ConvertedUnit, PageJob};
use crate::pipeline::workspace::Workspace;
use crate::progress::{self, ProgressCallback};
use crate::stream::{archive_body, ArchiveByteStream};
use std::path::{Path, PathBuf};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

/// Name the PDF upload is staged under inside the workspace.
pub const SOURCE_PDF: &str = "source.pdf";

type Outcome = Result<usize, Pdf2ImgError>;

/// Start converting `request` and return the archive body.
///
/// # Errors
/// Workspace failures, and for PDFs any failure to load the document
/// (including [`Pdf2ImgError::EngineUnavailable`]) are returned here, before
/// any archive byte exists.
pub async fn convert<H: EngineHandle + 'static>(
    engine: &EngineQueue<H>,
    request: ConversionRequest,
    config: &ServerConfig,
) -> Result<ArchiveByteStream, Pdf2ImgError> {
    let workspace = Workspace::open(&config.workspace_root)?;
    let progress = progress::resolve(config.progress_callback.as_ref());

    // Unbounded: queued units are paths, their bytes wait on disk. The
    // engine thread is shared, so it must never wait on this client's socket.
    let (unit_tx, unit_rx) = mpsc::unbounded_channel::<ConvertedUnit>();
    let (done_tx, done_rx) = oneshot::channel::<Outcome>();

    match request {
        ConversionRequest::Pdf(pdf) => {
            info!(
                workspace = %workspace.id(),
                file = %pdf.file_name,
                format = %pdf.format,
                placement = %pdf.placement,
                bytes = pdf.bytes.len(),
                "PDF conversion requested"
            );
            let pages = start_pdf(engine, pdf, workspace.path(), unit_tx, done_tx, progress).await?;
            debug!(workspace = %workspace.id(), pages, "Document loaded; streaming archive");
        }
        ConversionRequest::ImageBatch(batch) => {
            info!(
                workspace = %workspace.id(),
                images = batch.images.len(),
                format = %batch.format,
                "Image batch conversion requested"
            );
            start_images(
                batch,
                workspace.path().to_path_buf(),
                config.jpeg_quality,
                unit_tx,
                done_tx,
                progress,
            );
        }
    }

    let (reader, writer) = tokio::io::duplex(config.stream_buffer_bytes);
    let (outcome_tx, outcome_rx) = oneshot::channel();
    tokio::spawn(archive::pump(
        ArchiveStream::open(writer),
        unit_rx,
        done_rx,
        workspace,
        outcome_tx,
    ));

    Ok(archive_body(reader, outcome_rx))
}

/// Stage the PDF, queue the engine job, and wait until the document loaded.
async fn start_pdf<H: EngineHandle + 'static>(
    engine: &EngineQueue<H>,
    pdf: PdfRequest,
    dir: &Path,
    units: mpsc::UnboundedSender<ConvertedUnit>,
    done: oneshot::Sender<Outcome>,
    progress: ProgressCallback,
) -> Result<usize, Pdf2ImgError> {
    let source = dir.join(SOURCE_PDF);
    tokio::fs::write(&source, &pdf.bytes)
        .await
        .map_err(|e| Pdf2ImgError::Workspace {
            path: source.clone(),
            source: e,
        })?;

    let (ready_tx, ready_rx) = oneshot::channel::<Outcome>();
    let dir = dir.to_path_buf();
    let stem = file_stem(&pdf.file_name, "document");
    let PdfRequest {
        file_name,
        format,
        placement,
        ..
    } = pdf;

    engine.submit(move |handle: &H| {
        let mut doc = match handle.load_document(&source) {
            Ok(doc) => doc,
            Err(e) => {
                let _ = ready_tx.send(Err(attribute_to_upload(e, &file_name)));
                return;
            }
        };
        let _ = ready_tx.send(Ok(doc.page_count()));

        let job = PageJob {
            stem: &stem,
            format,
            placement,
        };
        let result = render::render_pdf_pages(&mut doc, &dir, job, &units, progress.as_ref());
        let _ = done.send(result);
    })?;

    ready_rx.await.map_err(|_| {
        Pdf2ImgError::EngineUnavailable("engine job ended before loading the document".into())
    })?
}

/// Run the image batch on the blocking pool; the pump awaits its result.
fn start_images(
    batch: ImageBatchRequest,
    dir: PathBuf,
    jpeg_quality: u8,
    units: mpsc::UnboundedSender<ConvertedUnit>,
    done: oneshot::Sender<Outcome>,
    progress: ProgressCallback,
) {
    tokio::task::spawn_blocking(move || {
        let result = render::render_image_batch(
            &batch.images,
            &dir,
            batch.format,
            jpeg_quality,
            &units,
            progress.as_ref(),
        );
        let _ = done.send(result);
    });
}

/// Engine errors name the staged path; callers know the upload by its name.
fn attribute_to_upload(e: Pdf2ImgError, file_name: &str) -> Pdf2ImgError {
    match e {
        Pdf2ImgError::CorruptPdf { detail, .. } => Pdf2ImgError::CorruptPdf {
            file_name: file_name.to_string(),
            detail,
        },
        other => other,
    }
}
