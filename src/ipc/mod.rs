/*!
 * IPC Module
 * Message-bus transport boundary
 */

pub mod loopback;
pub mod traits;
pub mod types;

pub use loopback::ChannelTransport;
pub use traits::Transport;
pub use types::{Envelope, InboundReply, OutboundRequest};
