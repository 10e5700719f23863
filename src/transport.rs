use async_trait::async_trait;
use bytes::Bytes;

use crate::{channel::ChannelID, error::TransportError, peer::PeerID};

/// One message handed to the local peer by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub channel_id: ChannelID,
    pub bytes: Bytes,
    pub sender: PeerID,
    pub sender_is_authority: bool,
}

/// The message passing primitive a [`crate::channel::Channel`] runs on.
///
/// Sends are fire-and-forget, a transport may queue them but never blocks the caller.
pub trait Transport {
    /// Identity of the local peer
    fn local_id(&self) -> PeerID;

    /// Identity of the authority, if one is known
    fn authority_id(&self) -> Option<PeerID>;

    fn is_authority(&self) -> bool {
        self.authority_id() == Some(self.local_id())
    }

    /// Whether channels and packets can be created yet
    fn is_ready(&self) -> bool;

    /// Whether a local user can see notices
    fn is_interactive(&self) -> bool {
        true
    }

    /// Upper bound of peers, used to size scratch buffers
    fn peer_capacity(&self) -> usize;

    fn register_handler(&mut self, channel: ChannelID) -> Result<(), TransportError>;

    fn unregister_handler(&mut self, channel: ChannelID) -> Result<(), TransportError>;

    fn send_to_authority(&mut self, channel: ChannelID, bytes: Bytes) -> Result<(), TransportError>;

    fn send_to(&mut self, channel: ChannelID, bytes: Bytes, peer: PeerID)
        -> Result<(), TransportError>;

    /// Appends every connected peer to `out`
    fn peers(&self, out: &mut Vec<PeerID>);

    fn display_name(&self, peer: PeerID) -> Option<String>;

    /// Next already queued delivery for a registered channel
    fn try_recv(&mut self) -> Option<Delivery>;
}

/// Async side of a transport, resolves once a delivery arrives
#[async_trait]
pub trait Incoming {
    /// `None` once the transport is closed
    async fn recv(&mut self) -> Option<Delivery>;
}
