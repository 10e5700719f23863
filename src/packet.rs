use std::fmt::Debug;

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{
    channel::ChannelID,
    error::{RelayError, Result},
    peer::PeerID,
    transport::Transport,
};

/// Where the authority forwards a packet after handling it
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelayMode {
    /// No automatic sending to other peers
    #[default]
    None,
    /// Sends to every peer except the sender, the authority never gets it twice
    ToOthers,
    /// Sends to every peer including the sender, the authority never gets it twice
    ToEveryone,
}

/// Returned by [`Payload::received`], only the authority acts on it
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RelayDecision {
    pub relay: RelayMode,
    /// Set when the handler modified the packet, cached bytes are dropped before relaying
    pub reserialize: bool,
}

impl RelayDecision {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn to_others() -> Self {
        Self {
            relay: RelayMode::ToOthers,
            reserialize: false,
        }
    }

    pub fn to_everyone() -> Self {
        Self {
            relay: RelayMode::ToEveryone,
            reserialize: false,
        }
    }

    pub fn reserialized(mut self) -> Self {
        self.reserialize = true;
        self
    }
}

/// Context handed to a payload handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiveInfo {
    pub channel_id: ChannelID,
    /// Peer the bytes came from, the local id for local delivery
    pub sender: PeerID,
    pub local: PeerID,
    pub is_authority: bool,
}

/// Application messages carried by a channel, usually an enum with one variant per kind.
///
/// Sequences and maps must report their length up front, so `#[serde(flatten)]` and
/// other unsized collections fail to encode with [`crate::error::EncodingError::UnknownLength`].
pub trait Payload: Serialize + DeserializeOwned + Debug {
    /// Application state handlers work on
    type Context;

    /// Short name of the variant for diagnostics
    fn kind(&self) -> &'static str;

    /// Called on every peer the packet reaches, including the authority.
    ///
    /// `origin` is the validated original sender when running on the authority.
    fn received(
        &mut self,
        origin: PeerID,
        info: &ReceiveInfo,
        ctx: &mut Self::Context,
    ) -> RelayDecision;
}

/// A payload plus the id of the peer that built it
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Packet<P> {
    /// Assigned on construction, validated by the authority on arrival
    #[serde(rename = "origin")]
    pub original_sender: PeerID,
    pub payload: P,
}

impl<P> Packet<P> {
    pub fn new(original_sender: PeerID, payload: P) -> Self {
        Self {
            original_sender,
            payload,
        }
    }

    /// Stamps the packet with the local identity of `transport`
    pub fn from_transport<T: Transport + ?Sized>(transport: &T, payload: P) -> Result<Self> {
        if !transport.is_ready() || !transport.local_id().is_assigned() {
            return Err(RelayError::TransportNotReady(
                "packets cannot be created before the transport is ready".to_string(),
            ));
        }
        Ok(Self::new(transport.local_id(), payload))
    }
}

impl<P: Payload> Packet<P> {
    pub fn kind(&self) -> &'static str {
        self.payload.kind()
    }

    pub(crate) fn received(&mut self, info: &ReceiveInfo, ctx: &mut P::Context) -> RelayDecision {
        self.payload.received(self.original_sender, info, ctx)
    }
}
