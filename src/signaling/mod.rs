//! Network boundary to the conversational-agent server
//!
//! - `channel`: owned `SignalingChannel` with a queued, single-consumer inbound side
//! - `messages`: outbound events and typed inbound messages
//! - `socketio`: Engine.IO v4 / Socket.IO packet codec
//! - `websocket`: transport task speaking that codec over tokio-tungstenite

pub mod channel;
pub mod messages;
pub mod socketio;
pub mod websocket;

pub use channel::{ChannelUpdate, ConnectionState, SignalingChannel, TransportEndpoint, TransportEvent};
pub use messages::{
    parse_inbound, InboundMessage, OutboundEvent, StartStream, StopStream, TURN_COMPLETE_STATUS,
    UNAVAILABLE_STATUS,
};
