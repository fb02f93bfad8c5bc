use std::{io, time::Duration};

use shared::protocol::END_OF_INPUT;
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::trace;

/// The event stream failed after `written` script bytes had gone out.
#[derive(Debug, Error)]
#[error("event stream failed after {written} bytes: {source}")]
pub struct FeedError {
    pub written: usize,
    #[source]
    pub source: io::Error,
}

/// Writes every script byte with `delay` between bytes, then the end marker.
/// Returns the number of script bytes written.
pub async fn feed_events<W>(events: &mut W, script: &[u8], delay: Duration) -> Result<usize, FeedError>
where
    W: AsyncWrite + Unpin,
{
    for (index, byte) in script.iter().enumerate() {
        send(events, *byte)
            .await
            .map_err(|source| FeedError {
                written: index,
                source,
            })?;
        trace!(index, byte = *byte, "event fed");
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
    send(events, END_OF_INPUT)
        .await
        .map_err(|source| FeedError {
            written: script.len(),
            source,
        })?;
    Ok(script.len())
}

async fn send<W>(events: &mut W, byte: u8) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    events.write_all(&[byte]).await?;
    events.flush().await
}

#[cfg(test)]
#[path = "tests/feeder_tests.rs"]
mod tests;
