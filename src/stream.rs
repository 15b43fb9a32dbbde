//! Response body for a streaming archive.
//!
//! ## Why a pipe?
//!
//! The ZIP writer wants an `AsyncWrite`; axum wants a `Stream` of byte
//! chunks. A bounded `tokio::io::duplex` pipe joins the two: the archive pump
//! writes into one half, [`archive_body`] reads the other half as the body.
//! The pipe capacity bounds the memory a slow client can pin, and a client
//! disconnect drops the read half, which fails the pump's next write.
//!
//! ## Late failures
//!
//! Once the first chunk is out, the status line and headers are gone. If the
//! conversion fails after that, the archive is still closed (so whatever was
//! appended forms a readable ZIP) and the body then ends with an error item.
//! hyper aborts the connection instead of finishing the chunked body, so a
//! client never sees a failed conversion as a complete, successful download.

use crate::error::Pdf2ImgError;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use std::io;
use std::pin::Pin;
use tokio::io::DuplexStream;
use tokio::sync::oneshot;
use tokio_stream::Stream;
use tokio_util::io::ReaderStream;

/// A boxed stream of archive bytes.
pub type ArchiveByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, io::Error>> + Send>>;

/// Body that yields everything written to the pipe, then the conversion
/// outcome: nothing on success, an error item on failure.
pub fn archive_body(
    reader: DuplexStream,
    outcome: oneshot::Receiver<Result<usize, Pdf2ImgError>>,
) -> ArchiveByteStream {
    let tail = stream::once(async move {
        match outcome.await {
            Ok(Ok(_)) => None::<Result<Bytes, io::Error>>,
            Ok(Err(e)) => Some(Err(io::Error::other(e.to_string()))),
            Err(_) => Some(Err(io::Error::other(
                "archive pump stopped without reporting an outcome",
            ))),
        }
    })
    .filter_map(|item| async move { item });

    Box::pin(ReaderStream::new(reader).chain(tail))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    async fn collect(mut body: ArchiveByteStream) -> (Vec<u8>, Option<io::Error>) {
        let mut bytes = Vec::new();
        while let Some(item) = body.next().await {
            match item {
                Ok(chunk) => bytes.extend_from_slice(&chunk),
                Err(e) => return (bytes, Some(e)),
            }
        }
        (bytes, None)
    }

    #[tokio::test]
    async fn success_ends_cleanly() {
        let (reader, mut writer) = tokio::io::duplex(1024);
        let (tx, rx) = oneshot::channel();
        writer.write_all(b"PK\x03\x04data").await.unwrap();
        drop(writer);
        tx.send(Ok(1)).unwrap();

        let (bytes, err) = collect(archive_body(reader, rx)).await;
        assert_eq!(bytes, b"PK\x03\x04data");
        assert!(err.is_none());
    }

    #[tokio::test]
    async fn failure_ends_with_an_error_item() {
        let (reader, mut writer) = tokio::io::duplex(1024);
        let (tx, rx) = oneshot::channel();
        writer.write_all(b"partial").await.unwrap();
        drop(writer);
        tx.send(Err(Pdf2ImgError::RasterisationFailed {
            page: 4,
            detail: "x".into(),
        }))
        .unwrap();

        let (bytes, err) = collect(archive_body(reader, rx)).await;
        assert_eq!(bytes, b"partial");
        assert!(err.unwrap().to_string().contains("page 4"));
    }

    #[tokio::test]
    async fn lost_outcome_is_an_error() {
        let (reader, writer) = tokio::io::duplex(1024);
        let (tx, rx) = oneshot::channel::<Result<usize, Pdf2ImgError>>();
        drop(writer);
        drop(tx);

        let (_, err) = collect(archive_body(reader, rx)).await;
        assert!(err.is_some());
    }
}
