pub mod channel;
pub mod consts;
pub mod error;
pub mod host;
pub mod net;
pub mod packet;
pub mod peer;
pub mod transport;

pub use channel::{Channel, ChannelConfig, ChannelID, Registry};
pub use error::{RelayError, Result};
pub use packet::{Packet, Payload, ReceiveInfo, RelayDecision, RelayMode};
pub use peer::PeerID;

#[cfg(test)]
mod test;
