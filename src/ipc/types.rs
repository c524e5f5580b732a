/*!
 * IPC Types
 * Outbound requests and inbound replies exchanged with the message bus
 */

use crate::core::id::CorrelationToken;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request handed to the transport collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundRequest {
    /// Bus address of the receiver (app id for native apps)
    pub destination: String,
    pub method: String,
    pub payload: Value,
}

impl OutboundRequest {
    pub fn new(destination: impl Into<String>, method: impl Into<String>, payload: Value) -> Self {
        Self {
            destination: destination.into(),
            method: method.into(),
            payload,
        }
    }
}

/// Request as delivered on the far side of the transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub token: CorrelationToken,
    pub request: OutboundRequest,
}

/// "Reply arrived" event fed back into the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundReply {
    pub token: CorrelationToken,
    pub payload: Value,
}
