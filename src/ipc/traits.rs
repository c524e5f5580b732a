/*!
 * IPC Traits
 */

use super::types::OutboundRequest;
use crate::core::errors::TransportError;
use crate::core::id::CorrelationToken;

/// Outbound side of the message bus
///
/// Replies come back as `InboundReply` events carrying the returned token.
/// Delivery and retry semantics belong to the implementation.
pub trait Transport: Send {
    fn send(&mut self, request: OutboundRequest) -> Result<CorrelationToken, TransportError>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, request: OutboundRequest) -> Result<CorrelationToken, TransportError> {
        (**self).send(request)
    }
}
