// Chunked JSON streaming utilities
use crate::infrastructure::http_response::brotli_compress;
use axum::body::Body;
use axum::http::{header, Response, StatusCode};
use axum::response::IntoResponse;
use bytes::{BufMut, Bytes, BytesMut};
use futures::StreamExt;
use futures::stream::Stream;
use serde::Serialize;

/// Create a chunked streaming response: every message is one frame of a
/// 4-byte big-endian length followed by its JSON (Brotli-compressed per
/// frame when `compress` is set).
pub fn chunked_json_stream<S, T>(stream: S, compress: bool) -> Result<Response<Body>, StatusCode>
where
    S: Stream<Item = T> + Send + 'static,
    T: Serialize + Send + Sync + 'static,
{
    let byte_stream = stream.then(move |msg| async move { serialize_chunk(&msg, compress).await });

    let body = Body::from_stream(byte_stream);

    // Frames are compressed individually, so no Content-Encoding header
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/x-ndjson-framed")
        .header(header::TRANSFER_ENCODING, "chunked")
        .body(body)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// Serialize a single message to a length-prefixed frame
async fn serialize_chunk<T: Serialize>(msg: &T, compress: bool) -> Result<Bytes, std::io::Error> {
    let json = serde_json::to_vec(msg).map_err(std::io::Error::other)?;

    let payload = if compress {
        brotli_compress(json).await?
    } else {
        json
    };

    let length = payload.len() as u32;
    let mut chunk = BytesMut::with_capacity(4 + payload.len());
    chunk.put_u32(length);
    chunk.put_slice(&payload);

    Ok(chunk.freeze())
}

/// Helper to create a streaming response from a receiver
pub fn stream_from_receiver<T>(
    mut rx: tokio::sync::mpsc::Receiver<T>,
    compress: bool,
) -> impl IntoResponse
where
    T: Serialize + Send + Sync + 'static,
{
    let stream = async_stream::stream! {
        while let Some(msg) = rx.recv().await {
            yield msg;
        }
    };

    match chunked_json_stream(stream, compress) {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}
