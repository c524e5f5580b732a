/*!
 * Loopback Transport
 * In-process transport over a flume channel
 */

use super::traits::Transport;
use super::types::{Envelope, OutboundRequest};
use crate::core::errors::TransportError;
use crate::core::id::{AtomicGenerator, CorrelationToken};
use tracing::debug;

/// Transport delivering every request to a local receiver
#[derive(Clone)]
pub struct ChannelTransport {
    tx: flume::Sender<Envelope>,
    tokens: AtomicGenerator<u64>,
}

impl ChannelTransport {
    /// Unbounded loopback; the receiver sees every request in send order
    pub fn new() -> (Self, flume::Receiver<Envelope>) {
        let (tx, rx) = flume::unbounded();
        (Self::from_sender(tx), rx)
    }

    /// Bounded loopback; sends fail once `capacity` requests are undelivered
    pub fn bounded(capacity: usize) -> (Self, flume::Receiver<Envelope>) {
        let (tx, rx) = flume::bounded(capacity);
        (Self::from_sender(tx), rx)
    }

    fn from_sender(tx: flume::Sender<Envelope>) -> Self {
        Self {
            tx,
            tokens: AtomicGenerator::default(),
        }
    }
}

impl Transport for ChannelTransport {
    fn send(&mut self, request: OutboundRequest) -> Result<CorrelationToken, TransportError> {
        let token = CorrelationToken::Transport(self.tokens.next());
        let destination = request.destination.clone();

        self.tx
            .try_send(Envelope { token, request })
            .map_err(|err| match err {
                flume::TrySendError::Disconnected(_) => TransportError::Closed,
                flume::TrySendError::Full(_) => TransportError::Rejected {
                    destination: destination.clone(),
                    reason: "queue full".into(),
                },
            })?;

        debug!(token = %token, destination = %destination, "request sent");
        Ok(token)
    }
}
