//! Bridge from the blocking archive encoder to an async response body.

use bytes::Bytes;
use std::io::{self, Write};
use tokio::sync::mpsc;

/// Items carried from the encoder thread to the response body
pub type BodyChunk = io::Result<Bytes>;

/// `Write` sink that forwards fixed-size chunks over a tokio channel.
///
/// Must be used from a blocking context (e.g. `spawn_blocking`); sends block
/// while the channel is full, which applies the client's read speed as
/// backpressure to the encoder.
pub struct ChannelWriter {
    tx: mpsc::Sender<BodyChunk>,
    buf: Vec<u8>,
    chunk_size: usize,
}

impl ChannelWriter {
    pub fn new(tx: mpsc::Sender<BodyChunk>, chunk_size: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            tx,
            buf: Vec::with_capacity(chunk_size),
            chunk_size,
        }
    }

    /// Ends the stream with an error instead of further data.
    ///
    /// Buffered bytes are discarded. If nothing was sent yet the receiver
    /// sees the error first and can still answer with an error status.
    pub fn fail(self, err: io::Error) {
        // The receiver is gone if this fails; nothing left to report to
        let _ = self.tx.blocking_send(Err(err));
    }

    fn send_buffered(&mut self) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let chunk = Bytes::from(std::mem::replace(
            &mut self.buf,
            Vec::with_capacity(self.chunk_size),
        ));
        self.tx
            .blocking_send(Ok(chunk))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "receiver disconnected"))
    }
}

impl Write for ChannelWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let room = self.chunk_size - self.buf.len();
        let take = room.min(data.len());
        self.buf.extend_from_slice(&data[..take]);

        if self.buf.len() >= self.chunk_size {
            self.send_buffered()?;
        }
        Ok(take)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.send_buffered()
    }
}
