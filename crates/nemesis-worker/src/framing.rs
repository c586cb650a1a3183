//! Length-prefixed message framing
//!
//! Messages are framed as a 4-byte little-endian length followed by
//! the JSON payload, on any async byte stream.

use nemesis_core::{PolicyError, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Guard against a corrupt length prefix.
const MAX_FRAME: usize = 16 * 1024 * 1024;

/// Read one length-prefixed message.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>> {
    let mut len_bytes = [0u8; 4];
    reader
        .read_exact(&mut len_bytes)
        .await
        .map_err(|e| PolicyError::ProtocolError(format!("read length failed: {e}")))?;
    let len = u32::from_le_bytes(len_bytes) as usize;
    if len > MAX_FRAME {
        return Err(PolicyError::ProtocolError(format!(
            "frame length {len} exceeds limit"
        )));
    }

    let mut data = vec![0u8; len];
    reader
        .read_exact(&mut data)
        .await
        .map_err(|e| PolicyError::ProtocolError(format!("read data failed: {e}")))?;
    Ok(data)
}

/// Write one length-prefixed message.
pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, data: &[u8]) -> Result<()> {
    let len = (data.len() as u32).to_le_bytes();
    writer
        .write_all(&len)
        .await
        .map_err(|e| PolicyError::ProtocolError(format!("write length failed: {e}")))?;
    writer
        .write_all(data)
        .await
        .map_err(|e| PolicyError::ProtocolError(format!("write data failed: {e}")))?;
    writer
        .flush()
        .await
        .map_err(|e| PolicyError::ProtocolError(format!("flush failed: {e}")))?;
    Ok(())
}
