//! Inter-stage streams: unbounded FIFO queues of text chunks.
//!
//! A [`Stream`] connects two adjacent pipeline stages. The producing side
//! calls [`Stream::write`] for every chunk and [`Stream::close`] when done;
//! the consuming side awaits [`Stream::recv`], which blocks while the queue
//! is empty and open, and yields `None` once it is empty and closed.

/// An unbounded FIFO channel of text chunks with a close flag.
///
/// Cloning is cheap and every clone refers to the same queue. Chunks are
/// delivered to the consumer in write order.
#[derive(Debug, Clone)]
pub struct Stream {
    tx: async_channel::Sender<String>,
    rx: async_channel::Receiver<String>,
}

impl Stream {
    /// A fresh, open stream.
    pub fn new() -> Self {
        let (tx, rx) = async_channel::unbounded();
        Self { tx, rx }
    }

    /// An already-closed, empty stream — the stdin of a pipeline's first
    /// stage, which sees immediate end-of-input.
    pub fn closed() -> Self {
        let stream = Self::new();
        stream.close();
        stream
    }

    /// Enqueue a chunk and wake any waiting reader. Writes after
    /// [`Stream::close`] are dropped.
    pub fn write(&self, chunk: impl Into<String>) {
        let _ = self.tx.try_send(chunk.into());
    }

    /// Mark the stream closed. Readers drain the remaining queue and then
    /// see end-of-input.
    pub fn close(&self) {
        self.tx.close();
    }

    /// Receive the next chunk, suspending while the stream is empty but
    /// still open. Returns `None` when the stream is empty and closed.
    pub async fn recv(&self) -> Option<String> {
        self.rx.recv().await.ok()
    }

    /// Drain the stream to end-of-input, concatenating every chunk.
    pub async fn read_to_string(&self) -> String {
        let mut buffer = String::new();
        while let Some(chunk) = self.recv().await {
            buffer.push_str(&chunk);
        }
        buffer
    }
}

impl Default for Stream {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_lite::future::block_on;

    #[test]
    fn test_fifo_order() {
        let stream = Stream::new();
        stream.write("a");
        stream.write("b");
        stream.close();
        block_on(async {
            assert_eq!(stream.recv().await.as_deref(), Some("a"));
            assert_eq!(stream.recv().await.as_deref(), Some("b"));
            assert_eq!(stream.recv().await, None);
        });
    }

    #[test]
    fn test_closed_stream_is_empty() {
        let stream = Stream::closed();
        block_on(async {
            assert_eq!(stream.recv().await, None);
        });
    }

    #[test]
    fn test_write_after_close_is_dropped() {
        let stream = Stream::new();
        stream.close();
        stream.write("late");
        block_on(async {
            assert_eq!(stream.recv().await, None);
        });
    }

    #[test]
    fn test_read_to_string() {
        let stream = Stream::new();
        stream.write("hello ");
        stream.write("world");
        stream.close();
        assert_eq!(block_on(stream.read_to_string()), "hello world");
    }

    #[test]
    fn test_recv_wakes_on_write() {
        let stream = Stream::new();
        let reader = stream.clone();
        block_on(async {
            let recv = reader.recv();
            stream.write("late chunk");
            assert_eq!(recv.await.as_deref(), Some("late chunk"));
        });
    }
}
