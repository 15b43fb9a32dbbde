//! Pipeline stages for upload-to-archive conversion.
//!
//! Each submodule implements exactly one step, so each is testable on its
//! own and the engine behind [`render`] can change without touching the rest.
//!
//! ## Data Flow
//!
//! ```text
//! intake ──▶ sniff ──▶ workspace ──▶ render ──▶ archive
//! (form)     (magic)   (scratch)     (engine)   (ZIP onto the response)
//! ```
//!
//! 1. [`intake`]    — drain the multipart form and validate it into a
//!    [`intake::ConversionRequest`]
//! 2. [`sniff`]     — classify bytes by signature; reject anything unexpected
//! 3. [`workspace`] — per-request scratch directory, removed on every path
//! 4. [`render`]    — drive the engine one page or image at a time; uses
//!    [`naming`] for entry names and [`encode`] for the output files
//! 5. [`archive`]   — append each unit to the ZIP, then delete it

pub mod archive;
pub mod encode;
pub mod intake;
pub mod naming;
pub mod render;
pub mod sniff;
pub mod workspace;
