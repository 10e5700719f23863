pub mod config;
pub mod diagnostics;
pub mod registry;

use std::marker::PhantomData;

use bytes::Bytes;

pub use self::{
    config::{channel_id_from_workshop_id, ChannelConfig},
    diagnostics::Notice,
    registry::{Registration, Registry},
};

use self::diagnostics::Diagnostics;
use crate::{
    error::{RelayError, Result},
    host::Endpoint,
    net::codec::{decode_limited, encode_limited},
    packet::{Packet, Payload, ReceiveInfo, RelayMode},
    peer::PeerID,
    transport::{Delivery, Incoming, Transport},
};

/// An ID to identify the channel with
pub type ChannelID = u16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Active,
    Disposed,
}

/// One numbered packet stream between the authority and its peers.
///
/// The authority validates the origin of every packet it receives and relays it according to
/// the [`crate::packet::RelayDecision`] the payload handler returns. Clients only hand packets
/// to the authority, relaying is never done client side.
pub struct Channel<P: Payload, T: Transport = Endpoint> {
    config: ChannelConfig,
    transport: T,
    state: ChannelState,
    registration: Option<Registration>,
    listening: bool,
    diagnostics: Diagnostics,

    // Reused for every relay
    peers: Vec<PeerID>,
    _payload: PhantomData<fn() -> P>,
}

impl<P: Payload, T: Transport> std::fmt::Debug for Channel<P, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("channel_id", &self.config.channel_id)
            .field("owner", &self.config.owner_name)
            .field("state", &self.state)
            .field("listening", &self.listening)
            .finish()
    }
}

impl<P: Payload, T: Transport> Channel<P, T> {
    /// Binds the channel in the process-wide registry
    pub fn create(config: ChannelConfig, transport: T) -> Result<Self> {
        Self::new(config, transport, Registry::global())
    }

    pub fn new(config: ChannelConfig, mut transport: T, registry: &Registry) -> Result<Self> {
        if !transport.is_ready() {
            return Err(RelayError::TransportNotReady(config.owner_name));
        }

        let registration = registry.acquire(config.channel_id, &config.owner_name)?;

        if config.register_listener {
            transport.register_handler(config.channel_id)?;
        }

        let diagnostics = Diagnostics::new(
            config.owner_name.clone(),
            transport.is_interactive(),
            config.notice_duration,
        );
        let peers = Vec::with_capacity(transport.peer_capacity());

        tracing::debug!(
            "{}: channel {} active on peer {} (authority: {})",
            config.owner_name,
            config.channel_id,
            transport.local_id(),
            transport.is_authority()
        );

        Ok(Channel {
            listening: config.register_listener,
            config,
            transport,
            state: ChannelState::Active,
            registration: Some(registration),
            diagnostics,
            peers,
            _payload: PhantomData,
        })
    }

    /// Unregisters the inbound handler and frees the channel id
    pub fn dispose(&mut self) {
        if self.state == ChannelState::Disposed {
            return;
        }

        if self.listening {
            if let Err(e) = self.transport.unregister_handler(self.config.channel_id) {
                tracing::debug!("{}: unregister during dispose: {e}", self.config.owner_name);
            }
            self.listening = false;
        }

        self.registration.take();
        self.peers.clear();
        self.state = ChannelState::Disposed;
        tracing::debug!(
            "{}: channel {} disposed",
            self.config.owner_name,
            self.config.channel_id
        );
    }

    pub fn channel_id(&self) -> ChannelID {
        self.config.channel_id
    }

    pub fn owner_name(&self) -> &str {
        &self.config.owner_name
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn is_authority(&self) -> bool {
        self.transport.is_authority()
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    pub fn local_id(&self) -> PeerID {
        self.transport.local_id()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Builds a packet originating from the local peer
    pub fn packet(&self, payload: P) -> Result<Packet<P>> {
        Packet::from_transport(&self.transport, payload)
    }

    pub fn set_serialize_test(&mut self, serialize_test: bool) {
        self.config.serialize_test = serialize_test;
    }

    /// Replaces the default log-and-notify handling of receive and relay errors
    pub fn set_exception_handler(&mut self, handler: impl FnMut(&RelayError) + Send + 'static) {
        self.diagnostics.exception_handler = Some(Box::new(handler));
    }

    /// Called after the exception handler when a received packet could not be handled
    pub fn set_receive_exception_handler(
        &mut self,
        handler: impl FnMut(PeerID, Option<&str>, &[u8]) + Send + 'static,
    ) {
        self.diagnostics.receive_exception_handler = Some(Box::new(handler));
    }

    /// Replaces the default handling of protocol anomalies such as spoofed origins
    pub fn set_error_handler(&mut self, handler: impl FnMut(&str) + Send + 'static) {
        self.diagnostics.error_handler = Some(Box::new(handler));
    }

    /// Notices produced by the default handlers since the last call
    pub fn drain_notices(&mut self) -> Vec<Notice> {
        self.diagnostics.drain_notices()
    }

    /// Sends a packet to the authority, works on every peer.
    ///
    /// On the authority the packet is handled locally without serializing it, unless
    /// serialize test mode is on. `serialized` may hold the already encoded packet.
    pub fn send_to_authority(
        &mut self,
        packet: Packet<P>,
        serialized: Option<Bytes>,
        ctx: &mut P::Context,
    ) -> Result<()> {
        self.ensure_active()?;

        if !self.config.serialize_test && self.transport.is_authority() {
            let local = self.transport.local_id();
            return self.dispatch(packet, local, serialized, ctx);
        }

        let bytes = match serialized {
            Some(bytes) => bytes,
            None => self.serialize(&packet)?,
        };
        self.transport
            .send_to_authority(self.config.channel_id, bytes)?;
        Ok(())
    }

    /// Sends a packet to one peer, authority only
    pub fn send_to_peer(
        &mut self,
        packet: &Packet<P>,
        peer: PeerID,
        serialized: Option<Bytes>,
    ) -> Result<()> {
        self.ensure_active()?;
        self.require_authority("send packets to other peers")?;

        let bytes = match serialized {
            Some(bytes) => bytes,
            None => self.serialize(packet)?,
        };
        self.transport.send_to(self.config.channel_id, bytes, peer)?;
        Ok(())
    }

    /// Sends a packet to every peer but the authority itself, authority only.
    ///
    /// The packet's original sender is not skipped.
    pub fn send_to_everyone(&mut self, packet: &Packet<P>, serialized: Option<Bytes>) -> Result<()> {
        self.ensure_active()?;
        self.relay_to_peers(packet, None, serialized)?;
        Ok(())
    }

    /// Handles one delivery from the transport.
    ///
    /// Errors are reported through the diagnostics hooks and never returned, a bad packet from
    /// one peer must not affect the others.
    pub fn receive(&mut self, delivery: Delivery, ctx: &mut P::Context) {
        if self.state == ChannelState::Disposed {
            tracing::trace!("{}: dropping delivery after dispose", self.config.owner_name);
            return;
        }
        if delivery.channel_id != self.config.channel_id {
            tracing::trace!(
                "{}: ignoring delivery for channel {}",
                self.config.owner_name,
                delivery.channel_id
            );
            return;
        }

        let Delivery {
            bytes,
            sender,
            sender_is_authority,
            ..
        } = delivery;
        tracing::trace!(
            "{}: {} bytes from {sender} (authority: {sender_is_authority})",
            self.config.owner_name,
            bytes.len()
        );

        let result = match decode_limited::<Packet<P>>(&bytes, self.config.max_packet_size) {
            Ok(packet) => self.dispatch(packet, sender, Some(bytes.clone()), ctx),
            Err(e) => Err(e.into()),
        };

        if let Err(e) = result {
            self.diagnostics.exception(&e);
            let name = self.transport.display_name(sender);
            self.diagnostics
                .receive_exception(sender, name.as_deref(), &bytes);
        }
    }

    /// Handles every delivery the transport already queued, returns how many there were
    pub fn pump(&mut self, ctx: &mut P::Context) -> usize {
        let mut handled = 0;
        while self.state == ChannelState::Active {
            let Some(delivery) = self.transport.try_recv() else {
                break;
            };
            self.receive(delivery, ctx);
            handled += 1;
        }
        handled
    }

    fn dispatch(
        &mut self,
        mut packet: Packet<P>,
        sender: PeerID,
        mut serialized: Option<Bytes>,
        ctx: &mut P::Context,
    ) -> Result<()> {
        let is_authority = self.transport.is_authority();

        if is_authority && packet.original_sender != sender {
            let text = format!(
                "WARNING: packet {} from {sender} has altered origin to {}. Replaced it with proper id, but if this triggers for everyone then it's a bug somewhere.",
                packet.kind(),
                packet.original_sender
            );
            self.diagnostics.error(&text);

            packet.original_sender = sender;
            serialized = None;
        }

        let info = ReceiveInfo {
            channel_id: self.config.channel_id,
            sender,
            local: self.transport.local_id(),
            is_authority,
        };
        let decision = packet.received(&info, ctx);

        if !is_authority {
            return Ok(());
        }

        if decision.reserialize {
            serialized = None;
        }

        match decision.relay {
            RelayMode::None => {}
            RelayMode::ToOthers => {
                self.relay_to_peers(&packet, Some(sender), serialized)?;
            }
            RelayMode::ToEveryone => {
                self.relay_to_peers(&packet, None, serialized)?;
            }
        }
        Ok(())
    }

    /// Sends to every peer except the authority and `exclude`, returns how many sends succeeded.
    ///
    /// The packet is serialized at most once and only if some peer needs it.
    pub(crate) fn relay_to_peers(
        &mut self,
        packet: &Packet<P>,
        exclude: Option<PeerID>,
        mut serialized: Option<Bytes>,
    ) -> Result<usize> {
        self.require_authority("relay packets")?;

        let authority = self.transport.local_id();
        let mut peers = std::mem::take(&mut self.peers);
        peers.clear();
        self.transport.peers(&mut peers);

        let mut sent = 0;
        let mut result: Result<()> = Ok(());
        for &peer in &peers {
            if peer == authority || Some(peer) == exclude {
                continue;
            }

            let bytes = match serialized.clone() {
                Some(bytes) => bytes,
                None => match self.serialize(packet) {
                    Ok(bytes) => {
                        serialized = Some(bytes.clone());
                        bytes
                    }
                    Err(e) => {
                        result = Err(e);
                        break;
                    }
                },
            };

            match self.transport.send_to(self.config.channel_id, bytes, peer) {
                Ok(()) => sent += 1,
                Err(e) => self.diagnostics.exception(&e.into()),
            }
        }

        peers.clear();
        self.peers = peers;
        result.map(|_| sent)
    }

    fn serialize(&self, packet: &Packet<P>) -> Result<Bytes> {
        let bytes = encode_limited(packet, self.config.max_packet_size)?;
        tracing::trace!(
            "{}: serialized {} into {} bytes",
            self.config.owner_name,
            packet.kind(),
            bytes.len()
        );
        Ok(bytes)
    }

    fn ensure_active(&self) -> Result<()> {
        match self.state {
            ChannelState::Active => Ok(()),
            ChannelState::Disposed => Err(RelayError::Disposed(self.config.channel_id)),
        }
    }

    fn require_authority(&self, operation: &'static str) -> Result<()> {
        if self.transport.is_authority() {
            return Ok(());
        }
        Err(RelayError::NotAuthority {
            owner: self.config.owner_name.clone(),
            operation,
        })
    }
}

impl<P: Payload, T: Transport + Incoming> Channel<P, T> {
    /// Waits for the next delivery and handles it, `false` once the transport closed
    pub async fn poll(&mut self, ctx: &mut P::Context) -> bool {
        if self.state == ChannelState::Disposed {
            return false;
        }
        match self.transport.recv().await {
            Some(delivery) => {
                self.receive(delivery, ctx);
                true
            }
            None => false,
        }
    }
}

impl<P: Payload, T: Transport> Drop for Channel<P, T> {
    fn drop(&mut self) {
        self.dispose();
    }
}
