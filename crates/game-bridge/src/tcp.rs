//! TCP transport implementation for the game gateway

use crate::transport::{AsyncReader, AsyncWriter, MAX_FRAME_LEN};
use async_trait::async_trait;
use relay_core::{BridgeError, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

/// TCP read wrapper; generic so any byte stream can carry frames
pub struct TcpReadWrapper<R = OwnedReadHalf>(pub R);

#[async_trait]
impl<R: AsyncRead + Unpin + Send> AsyncReader for TcpReadWrapper<R> {
    async fn read_message(&mut self) -> Result<Vec<u8>> {
        // Read 4-byte length prefix (little-endian)
        let mut len_bytes = [0u8; 4];
        self.0
            .read_exact(&mut len_bytes)
            .await
            .map_err(|e| BridgeError::Transport(format!("TCP read length failed: {}", e)))?;
        let len = u32::from_le_bytes(len_bytes) as usize;

        if len > MAX_FRAME_LEN {
            return Err(BridgeError::Protocol(format!(
                "Message too large: {} bytes",
                len
            )));
        }

        let mut data = vec![0u8; len];
        self.0
            .read_exact(&mut data)
            .await
            .map_err(|e| BridgeError::Transport(format!("TCP read data failed: {}", e)))?;

        Ok(data)
    }
}

/// TCP write wrapper
pub struct TcpWriteWrapper(pub OwnedWriteHalf);

#[async_trait]
impl AsyncWriter for TcpWriteWrapper {
    async fn write_message(&mut self, data: &[u8]) -> Result<()> {
        let len = u32::try_from(data.len())
            .map_err(|_| BridgeError::Protocol(format!("Message too large: {} bytes", data.len())))?
            .to_le_bytes();
        self.0
            .write_all(&len)
            .await
            .map_err(|e| BridgeError::Transport(format!("TCP write length failed: {}", e)))?;

        self.0
            .write_all(data)
            .await
            .map_err(|e| BridgeError::Transport(format!("TCP write data failed: {}", e)))?;

        self.0
            .flush()
            .await
            .map_err(|e| BridgeError::Transport(format!("TCP flush failed: {}", e)))?;

        Ok(())
    }

    async fn shutdown(&mut self) {
        let _ = self.0.shutdown().await;
    }
}
