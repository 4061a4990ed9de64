use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::errors::NetworkError;
use crate::message::Message;

/// Fixed width of the ASCII-decimal, space-padded length header (§6).
pub const HEADER_SIZE: usize = 10;

/// Reads exactly one framed message: a 10-byte ASCII-decimal length header
/// followed by that many bytes of JSON body. Returns `Ok(None)` on a clean
/// EOF before any header bytes arrive (the original's `receive_all`
/// returning `None`); a partial header or body is an I/O error, since the
/// peer closing mid-frame is not the same as it never having sent anything.
pub async fn read_message<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<Option<Message>, NetworkError> {
    let mut header = [0u8; HEADER_SIZE];
    match reader.read_exact(&mut header).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let header_str = std::str::from_utf8(&header)
        .map_err(|e| NetworkError::MalformedMessage(format!("non-utf8 header: {e}")))?;
    let len: usize = header_str
        .trim()
        .parse()
        .map_err(|e| NetworkError::MalformedMessage(format!("bad length header {header_str:?}: {e}")))?;

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;

    let message = serde_json::from_slice(&body)
        .map_err(|e| NetworkError::MalformedMessage(format!("invalid JSON body: {e}")))?;
    Ok(Some(message))
}

/// Writes one framed message: header then body, in a single buffer so a
/// partial write can't interleave with another writer on the same stream.
pub async fn write_message<W: AsyncWrite + Unpin>(
    writer: &mut W,
    message: &Message,
) -> Result<(), NetworkError> {
    let body = serde_json::to_vec(message)
        .map_err(|e| NetworkError::MalformedMessage(format!("failed to encode message: {e}")))?;
    let header = format!("{:<width$}", body.len(), width = HEADER_SIZE);
    if header.len() != HEADER_SIZE {
        return Err(NetworkError::MalformedMessage(format!(
            "message body too large to frame: {} bytes",
            body.len()
        )));
    }

    let mut framed = Vec::with_capacity(HEADER_SIZE + body.len());
    framed.extend_from_slice(header.as_bytes());
    framed.extend_from_slice(&body);
    writer.write_all(&framed).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn round_trips_a_sync_message() {
        let mut buf = Vec::new();
        write_message(&mut buf, &Message::Sync).await.unwrap();
        assert_eq!(buf.len(), HEADER_SIZE + r#"{"type":"SYNC"}"#.len());

        let mut cursor = Cursor::new(buf);
        let restored = read_message(&mut cursor).await.unwrap().unwrap();
        assert!(matches!(restored, Message::Sync));
    }

    #[tokio::test]
    async fn clean_eof_before_any_bytes_yields_none() {
        let mut cursor = Cursor::new(Vec::<u8>::new());
        let result = read_message(&mut cursor).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn truncated_header_is_an_error() {
        let mut cursor = Cursor::new(b"12".to_vec());
        assert!(read_message(&mut cursor).await.is_err());
    }
}
