use async_trait::async_trait;
use tokio::sync::mpsc;

/// Sentinel used on text wire formats to mark the end of a run
pub const DONE_MARKER: &str = "[DONE]";

/// Receiver of partial output for a live listener.
///
/// Exactly one of `on_complete`, `on_cancelled` or `on_error` is delivered per run,
/// and it is always the last notification.
#[async_trait]
pub trait StreamSink: Send + Sync {
    async fn on_text(&self, delta: &str);

    async fn on_complete(&self);

    async fn on_cancelled(&self);

    async fn on_error(&self, message: &str);
}

/// Notifications delivered through a [`ChannelSink`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    Text(String),
    Complete,
    Cancelled,
    Error(String),
}

impl SinkEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SinkEvent::Text(_))
    }
}

/// A sink backed by a bounded channel. A full channel makes the producer wait, so
/// text is never dropped; a closed receiver is logged and otherwise ignored.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<SinkEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<SinkEvent>) -> Self {
        Self { tx }
    }

    /// Create a sink together with the receiving half of its channel
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<SinkEvent>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self::new(tx), rx)
    }

    async fn send(&self, event: SinkEvent) {
        if let Err(e) = self.tx.send(event).await {
            tracing::warn!("Stream sink receiver dropped, discarding {:?}", e.0);
        }
    }
}

#[async_trait]
impl StreamSink for ChannelSink {
    async fn on_text(&self, delta: &str) {
        self.send(SinkEvent::Text(delta.to_string())).await;
    }

    async fn on_complete(&self) {
        self.send(SinkEvent::Complete).await;
    }

    async fn on_cancelled(&self) {
        self.send(SinkEvent::Cancelled).await;
    }

    async fn on_error(&self, message: &str) {
        self.send(SinkEvent::Error(message.to_string())).await;
    }
}
