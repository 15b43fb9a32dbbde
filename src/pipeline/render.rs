//! Conversion loops: drive a [`SourceDocument`] one unit at a time.
//!
//! Both loops are blocking code. The PDF loop runs on the engine thread, the
//! image loop on tokio's blocking pool. Each finished unit stays on disk in
//! the workspace and only its path is queued for the archive pump, so the
//! loop runs at engine speed whatever the client's download speed. A closed
//! archive (client gone, write failure) stops the loop at the next hand-off.
//!
//! Any engine error is fatal to the request: the loop returns it and no
//! further pages are attempted.

use crate::config::{OutputFormat, PageNumberPlacement};
use crate::engine::raster::RasterDocument;
use crate::engine::SourceDocument;
use crate::error::Pdf2ImgError;
use crate::pipeline::intake::UploadedFile;
use crate::pipeline::naming::{file_stem, page_entry_name, EntryNames};
use crate::progress::ConversionProgressCallback;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// One output file in the workspace, waiting to be archived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedUnit {
    pub path: PathBuf,
    pub entry_name: String,
}

/// Producer end of the unit hand-off.
pub type UnitSender = mpsc::UnboundedSender<ConvertedUnit>;

/// Options of a PDF run.
#[derive(Debug, Clone, Copy)]
pub struct PageJob<'a> {
    pub stem: &'a str,
    pub format: OutputFormat,
    pub placement: PageNumberPlacement,
}

/// Convert every page of `doc` into `dir`, handing each to `units`.
///
/// Stops silently when the engine cannot seek to a page. Returns the number
/// of units handed off.
pub fn render_pdf_pages<D: SourceDocument>(
    doc: &mut D,
    dir: &Path,
    job: PageJob<'_>,
    units: &UnitSender,
    progress: &dyn ConversionProgressCallback,
) -> Result<usize, Pdf2ImgError> {
    let total = doc.page_count();
    progress.on_conversion_start(total);

    let mut produced = 0;
    for idx in 0..total {
        if !doc.select_page(idx) {
            warn!("Engine could not seek to page {} of {}; stopping", idx + 1, total);
            break;
        }

        let unit = match convert_page(doc, idx, total, dir, job) {
            Ok(unit) => unit,
            Err(e) => return Err(fail(progress, idx + 1, total, produced, e)),
        };
        progress.on_unit_complete(idx + 1, total, &unit.entry_name);
        hand_off(units, unit).map_err(|e| fail(progress, idx + 1, total, produced, e))?;
        produced += 1;
    }

    progress.on_conversion_complete(total, produced);
    Ok(produced)
}

/// Convert each image in submission order into `dir`, handing each to `units`.
pub fn render_image_batch(
    images: &[UploadedFile],
    dir: &Path,
    format: OutputFormat,
    jpeg_quality: u8,
    units: &UnitSender,
    progress: &dyn ConversionProgressCallback,
) -> Result<usize, Pdf2ImgError> {
    let total = images.len();
    progress.on_conversion_start(total);

    let mut names = EntryNames::new();
    let mut produced = 0;
    for (idx, image) in images.iter().enumerate() {
        let unit = match convert_image(image, dir, format, jpeg_quality, &mut names) {
            Ok(unit) => unit,
            Err(e) => return Err(fail(progress, idx + 1, total, produced, e)),
        };
        progress.on_unit_complete(idx + 1, total, &unit.entry_name);
        hand_off(units, unit).map_err(|e| fail(progress, idx + 1, total, produced, e))?;
        produced += 1;
    }

    progress.on_conversion_complete(total, produced);
    Ok(produced)
}

fn convert_page<D: SourceDocument>(
    doc: &mut D,
    idx: usize,
    total: usize,
    dir: &Path,
    job: PageJob<'_>,
) -> Result<ConvertedUnit, Pdf2ImgError> {
    doc.set_output_format(job.format);
    if job.placement.is_visible() {
        let label = PageNumberPlacement::label(idx + 1, total);
        doc.draw_text_overlay(job.placement, &label)?;
    }
    let entry_name = page_entry_name(idx, job.stem, job.format);
    let path = dir.join(&entry_name);
    doc.write_current_page(&path)?;
    Ok(ConvertedUnit { path, entry_name })
}

fn convert_image(
    image: &UploadedFile,
    dir: &Path,
    format: OutputFormat,
    jpeg_quality: u8,
    names: &mut EntryNames,
) -> Result<ConvertedUnit, Pdf2ImgError> {
    // A decoded image is a one-page document already positioned on page 0.
    let mut doc = RasterDocument::decode(&image.file_name, &image.bytes, jpeg_quality)?;
    doc.set_output_format(format);
    let entry_name = names.next(&file_stem(&image.file_name, "image"), format);
    let path = dir.join(&entry_name);
    doc.write_current_page(&path)?;
    Ok(ConvertedUnit { path, entry_name })
}

fn hand_off(units: &UnitSender, unit: ConvertedUnit) -> Result<(), Pdf2ImgError> {
    debug!(entry = %unit.entry_name, "Unit ready for archive");
    units
        .send(unit)
        .map_err(|_| Pdf2ImgError::ArchiveClosed)
}

fn fail(
    progress: &dyn ConversionProgressCallback,
    unit_num: usize,
    total: usize,
    produced: usize,
    e: Pdf2ImgError,
) -> Pdf2ImgError {
    progress.on_unit_error(unit_num, total, &e.to_string());
    progress.on_conversion_complete(total, produced);
    e
}
