//! In-process channel pair.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{Channel, ChannelError};

/// One end of an in-process channel.
pub struct MemoryChannel<Out, In> {
    tx: Option<mpsc::UnboundedSender<Out>>,
    rx: mpsc::UnboundedReceiver<In>,
    closed: bool,
}

/// Create two connected ends.
pub fn pair<A, B>() -> (MemoryChannel<A, B>, MemoryChannel<B, A>) {
    let (a_tx, a_rx) = mpsc::unbounded_channel();
    let (b_tx, b_rx) = mpsc::unbounded_channel();
    (
        MemoryChannel {
            tx: Some(a_tx),
            rx: b_rx,
            closed: false,
        },
        MemoryChannel {
            tx: Some(b_tx),
            rx: a_rx,
            closed: false,
        },
    )
}

#[async_trait]
impl<Out, In> Channel<Out, In> for MemoryChannel<Out, In>
where
    Out: Send + 'static,
    In: Send + 'static,
{
    async fn write(&mut self, message: Out) -> Result<(), ChannelError> {
        let tx = self.tx.as_ref().ok_or(ChannelError::Closed)?;
        tx.send(message).map_err(|_| {
            self.closed = true;
            ChannelError::Closed
        })
    }

    async fn read(&mut self) -> Result<Option<In>, ChannelError> {
        let message = self.rx.recv().await;
        if message.is_none() {
            self.closed = true;
        }
        Ok(message)
    }

    fn is_closed(&self) -> bool {
        self.closed
            || self
                .tx
                .as_ref()
                .map_or(true, mpsc::UnboundedSender::is_closed)
    }

    async fn close(&mut self) -> Result<(), ChannelError> {
        self.closed = true;
        self.tx = None;
        self.rx.close();
        Ok(())
    }
}
