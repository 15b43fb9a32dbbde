//! Rendering engines behind a small capability interface.
//!
//! The pipeline never talks to PDFium or the `image` crate directly. It sees
//! a [`SourceDocument`] with exactly these capabilities:
//!
//! | capability          | method                                   |
//! |---------------------|------------------------------------------|
//! | load-document       | [`EngineHandle::load_document`] / [`raster::RasterDocument::decode`] |
//! | page-count          | [`SourceDocument::page_count`]           |
//! | select-page         | [`SourceDocument::select_page`]          |
//! | set-output-format   | [`SourceDocument::set_output_format`]    |
//! | draw-text-overlay   | [`SourceDocument::draw_text_overlay`]    |
//! | write-current-page  | [`SourceDocument::write_current_page`]   |
//!
//! Any engine implementing these traits is substitutable; the integration
//! tests run the whole HTTP surface against a stub engine.
//!
//! ## Threading
//!
//! PDFium keeps global state and is not proven safe for concurrent,
//! independent documents. The PDF engine is therefore bound once, on a
//! dedicated thread owned by an [`EngineQueue`], and PDF jobs are executed
//! one at a time from its work queue. The engine is released when the last
//! queue handle is dropped at shutdown.

pub mod pdfium;
pub mod raster;

use crate::config::{OutputFormat, PageNumberPlacement};
use crate::error::Pdf2ImgError;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::mpsc as std_mpsc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// A document loaded into an engine, positioned on one page at a time.
pub trait SourceDocument {
    /// Number of pages (1 for a raster image).
    fn page_count(&self) -> usize;

    /// Make `index` (0-based) the current page.
    ///
    /// Returns false when the engine cannot seek there; callers stop their
    /// page loop in that case instead of failing.
    fn select_page(&mut self, index: usize) -> bool;

    /// Format used by the next [`write_current_page`](Self::write_current_page).
    fn set_output_format(&mut self, format: OutputFormat);

    /// Draw `text` onto the current page, anchored at `placement`.
    fn draw_text_overlay(
        &mut self,
        placement: PageNumberPlacement,
        text: &str,
    ) -> Result<(), Pdf2ImgError>;

    /// Render the current page in the selected format to `path`.
    fn write_current_page(&mut self, path: &Path) -> Result<(), Pdf2ImgError>;
}

/// A bound PDF engine, living on the engine thread.
pub trait EngineHandle {
    /// Documents borrow the engine they were loaded by.
    type Document<'a>: SourceDocument
    where
        Self: 'a;

    /// Load the PDF at `path`.
    fn load_document<'a>(&'a self, path: &Path) -> Result<Self::Document<'a>, Pdf2ImgError>;
}

/// A unit of work executed on the engine thread.
pub type EngineJob<H> = Box<dyn FnOnce(&H) + Send + 'static>;

/// Process-wide PDF engine: one thread, one bound engine, a FIFO of jobs.
///
/// Cloning is cheap; all clones feed the same thread.
pub struct EngineQueue<H> {
    jobs: mpsc::UnboundedSender<EngineJob<H>>,
}

impl<H> Clone for EngineQueue<H> {
    fn clone(&self) -> Self {
        Self {
            jobs: self.jobs.clone(),
        }
    }
}

impl<H: EngineHandle + 'static> EngineQueue<H> {
    /// Spawn the engine thread and bind the engine on it with `init`.
    ///
    /// Blocks until `init` has finished, so a binding failure is reported
    /// here (at start-up) rather than on the first request.
    pub fn start<F>(init: F) -> Result<Self, Pdf2ImgError>
    where
        F: FnOnce() -> Result<H, Pdf2ImgError> + Send + 'static,
    {
        let (jobs, mut queue) = mpsc::unbounded_channel::<EngineJob<H>>();
        let (ready_tx, ready_rx) = std_mpsc::sync_channel::<Result<(), Pdf2ImgError>>(1);

        std::thread::Builder::new()
            .name("pdf-engine".into())
            .spawn(move || {
                let handle = match init() {
                    Ok(handle) => {
                        let _ = ready_tx.send(Ok(()));
                        handle
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                info!("PDF engine ready");

                while let Some(job) = queue.blocking_recv() {
                    if panic::catch_unwind(AssertUnwindSafe(|| job(&handle))).is_err() {
                        error!("PDF engine job panicked; engine thread continues");
                    }
                }
                debug!("Engine queue closed; releasing PDF engine");
            })
            .map_err(|e| Pdf2ImgError::EngineUnavailable(format!("spawn engine thread: {e}")))?;

        ready_rx.recv().map_err(|_| {
            Pdf2ImgError::EngineUnavailable("engine thread exited during start-up".into())
        })??;

        Ok(Self { jobs })
    }

    /// Queue `job` for execution on the engine thread.
    pub fn submit<J>(&self, job: J) -> Result<(), Pdf2ImgError>
    where
        J: FnOnce(&H) + Send + 'static,
    {
        self.jobs
            .send(Box::new(job))
            .map_err(|_| Pdf2ImgError::EngineUnavailable("engine thread has stopped".into()))
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! In-memory PDF engine for unit tests.

    use super::*;
    use crate::engine::raster::solid_page;
    use crate::pipeline::encode::write_image;
    use std::sync::{Arc, Mutex};

    /// Records of every overlay drawn: (page index, placement, text).
    pub type OverlayLog = Arc<Mutex<Vec<(usize, PageNumberPlacement, String)>>>;

    pub struct FakeHandle {
        pub pages: usize,
        /// Pages the engine refuses to seek to (simulates a short document).
        pub seekable: usize,
        /// Page index whose write fails.
        pub fail_on: Option<usize>,
        pub overlays: OverlayLog,
    }

    pub struct FakeDocument<'a> {
        handle: &'a FakeHandle,
        current: usize,
        format: OutputFormat,
    }

    impl EngineHandle for FakeHandle {
        type Document<'a> = FakeDocument<'a>;

        fn load_document<'a>(&'a self, path: &Path) -> Result<FakeDocument<'a>, Pdf2ImgError> {
            let bytes = std::fs::read(path).map_err(|e| Pdf2ImgError::CorruptPdf {
                file_name: path.display().to_string(),
                detail: e.to_string(),
            })?;
            if !bytes.starts_with(b"%PDF-") {
                return Err(Pdf2ImgError::CorruptPdf {
                    file_name: path.display().to_string(),
                    detail: "no header".into(),
                });
            }
            Ok(FakeDocument {
                handle: self,
                current: 0,
                format: OutputFormat::Png,
            })
        }
    }

    impl SourceDocument for FakeDocument<'_> {
        fn page_count(&self) -> usize {
            self.handle.pages
        }

        fn select_page(&mut self, index: usize) -> bool {
            if index < self.handle.seekable {
                self.current = index;
                true
            } else {
                false
            }
        }

        fn set_output_format(&mut self, format: OutputFormat) {
            self.format = format;
        }

        fn draw_text_overlay(
            &mut self,
            placement: PageNumberPlacement,
            text: &str,
        ) -> Result<(), Pdf2ImgError> {
            self.handle
                .overlays
                .lock()
                .map_err(|e| Pdf2ImgError::Internal(e.to_string()))?
                .push((self.current, placement, text.to_string()));
            Ok(())
        }

        fn write_current_page(&mut self, path: &Path) -> Result<(), Pdf2ImgError> {
            if self.handle.fail_on == Some(self.current) {
                return Err(Pdf2ImgError::RasterisationFailed {
                    page: self.current + 1,
                    detail: "injected failure".into(),
                });
            }
            write_image(&solid_page(self.current), self.format, 90, path).map(|_| ())
        }
    }

    pub fn handle(pages: usize) -> FakeHandle {
        FakeHandle {
            pages,
            seekable: pages,
            fail_on: None,
            overlays: OverlayLog::default(),
        }
    }
}
