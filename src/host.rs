//! In-process message transport.
//!
//! A [`Host`] routes bytes between [`Endpoint`]s living in the same process, one endpoint per
//! simulated peer. Each endpoint owns a bounded queue of deliveries, so a peer task can drive
//! its [`crate::channel::Channel`] exactly like it would on a real transport.

pub mod config;

use std::{
    collections::{BTreeMap, HashSet},
    sync::{Arc, Mutex, MutexGuard},
};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc::{self, error::TrySendError, Receiver, Sender};

use self::config::HostConfig;

use crate::{
    channel::ChannelID,
    error::{RelayError, Result, TransportError},
    peer::{PeerID, PeerInfo},
    transport::{Delivery, Incoming, Transport},
};

struct Route {
    info: PeerInfo,
    sender: Sender<Delivery>,
    // Tells a reconnected peer apart from the endpoint it replaced
    generation: u64,
}

#[derive(Default)]
struct HostState {
    peers: BTreeMap<PeerID, Route>,
    authority: Option<PeerID>,
    next_generation: u64,
}

impl HostState {
    fn owns(&self, id: PeerID, generation: u64) -> bool {
        self.peers
            .get(&id)
            .map_or(false, |route| route.generation == generation)
    }
}

#[derive(Clone)]
pub struct Host {
    config: HostConfig,
    state: Arc<Mutex<HostState>>,
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host")
            .field("config", &self.config)
            .field("peers", &self.peer_ids())
            .field("authority", &self.authority())
            .finish()
    }
}

impl Host {
    pub fn new(config: HostConfig) -> Self {
        Host {
            config,
            state: Default::default(),
        }
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Connects the authoritative peer, a dedicated one is not listed among the peers
    pub fn connect_authority(
        &self,
        id: PeerID,
        display_name: impl Into<String>,
        dedicated: bool,
    ) -> Result<Endpoint> {
        if let Some(current) = self.authority() {
            return Err(RelayError::BadConfig(format!(
                "authority {current} already connected"
            )));
        }
        self.attach(PeerInfo::authority(id, display_name, dedicated))
    }

    pub fn connect(&self, id: PeerID, display_name: impl Into<String>) -> Result<Endpoint> {
        self.attach(PeerInfo::client(id, display_name))
    }

    fn attach(&self, info: PeerInfo) -> Result<Endpoint> {
        if !info.id.is_assigned() {
            return Err(RelayError::BadConfig(format!(
                "peer id {} is reserved",
                info.id
            )));
        }

        let mut state = self.lock();
        if state.peers.contains_key(&info.id) {
            return Err(TransportError::DuplicatePeer(info.id).into());
        }
        if state.peers.len() >= self.config.peer_count {
            return Err(TransportError::HostFull(self.config.peer_count).into());
        }

        let (sender, receiver) = mpsc::channel(self.config.queue_capacity);
        let generation = state.next_generation;
        state.next_generation += 1;
        if info.is_authority {
            state.authority = Some(info.id);
        }
        state.peers.insert(
            info.id,
            Route {
                info: info.clone(),
                sender,
                generation,
            },
        );
        drop(state);

        tracing::debug!(
            "Peer {} ({}) connected, authority: {}",
            info.id,
            info.display_name,
            info.is_authority
        );

        Ok(Endpoint {
            info,
            host: self.clone(),
            receiver,
            handlers: HashSet::new(),
            generation,
        })
    }

    /// Removes a peer, its endpoint's queue closes once drained
    pub fn disconnect(&self, id: PeerID) -> Result<PeerInfo> {
        let mut state = self.lock();
        let route = state
            .peers
            .remove(&id)
            .ok_or(TransportError::UnknownPeer(id))?;
        if state.authority == Some(id) {
            state.authority = None;
        }
        tracing::debug!("Peer {id} disconnected");
        Ok(route.info)
    }

    pub fn peer_ids(&self) -> Vec<PeerID> {
        self.lock().peers.keys().copied().collect()
    }

    pub fn authority(&self) -> Option<PeerID> {
        self.lock().authority
    }

    pub fn is_connected(&self, id: PeerID) -> bool {
        self.lock().peers.contains_key(&id)
    }

    fn lock(&self) -> MutexGuard<'_, HostState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// One peer's handle on a [`Host`], disconnects when dropped
pub struct Endpoint {
    info: PeerInfo,
    host: Host,
    receiver: Receiver<Delivery>,
    handlers: HashSet<ChannelID>,
    generation: u64,
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("id", &self.info.id)
            .field("name", &self.info.display_name)
            .field("authority", &self.info.is_authority)
            .finish()
    }
}

impl Endpoint {
    pub fn info(&self) -> &PeerInfo {
        &self.info
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    pub fn has_handler(&self, channel: ChannelID) -> bool {
        self.handlers.contains(&channel)
    }

    fn route(
        &self,
        channel: ChannelID,
        bytes: Bytes,
        target: PeerID,
    ) -> std::result::Result<(), TransportError> {
        let state = self.host.lock();
        if !state.owns(self.info.id, self.generation) {
            return Err(TransportError::NotReady);
        }
        let route = state
            .peers
            .get(&target)
            .ok_or(TransportError::UnknownPeer(target))?;

        let delivery = Delivery {
            channel_id: channel,
            bytes,
            sender: self.info.id,
            sender_is_authority: self.info.is_authority,
        };

        tracing::trace!(
            "Routing {} bytes on channel {channel}: {} -> {target}",
            delivery.bytes.len(),
            self.info.id
        );

        route.sender.try_send(delivery).map_err(|e| match e {
            TrySendError::Full(_) => TransportError::QueueFull(target),
            TrySendError::Closed(_) => TransportError::Disconnected(target),
        })
    }

    fn accept(&self, delivery: &Delivery) -> bool {
        if self.handlers.contains(&delivery.channel_id) {
            return true;
        }
        tracing::trace!(
            "Peer {}: no handler for channel {}, dropping delivery from {}",
            self.info.id,
            delivery.channel_id,
            delivery.sender
        );
        false
    }
}

impl Transport for Endpoint {
    fn local_id(&self) -> PeerID {
        self.info.id
    }

    fn authority_id(&self) -> Option<PeerID> {
        self.host.authority()
    }

    fn is_ready(&self) -> bool {
        self.host.lock().owns(self.info.id, self.generation)
    }

    fn is_interactive(&self) -> bool {
        self.info.listed
    }

    fn peer_capacity(&self) -> usize {
        self.host.config.peer_count
    }

    fn register_handler(&mut self, channel: ChannelID) -> std::result::Result<(), TransportError> {
        if !self.is_ready() {
            return Err(TransportError::NotReady);
        }
        self.handlers.insert(channel);
        Ok(())
    }

    fn unregister_handler(&mut self, channel: ChannelID) -> std::result::Result<(), TransportError> {
        self.handlers.remove(&channel);
        Ok(())
    }

    fn send_to_authority(
        &mut self,
        channel: ChannelID,
        bytes: Bytes,
    ) -> std::result::Result<(), TransportError> {
        let authority = self.host.authority().ok_or(TransportError::NoAuthority)?;
        self.route(channel, bytes, authority)
    }

    fn send_to(
        &mut self,
        channel: ChannelID,
        bytes: Bytes,
        peer: PeerID,
    ) -> std::result::Result<(), TransportError> {
        self.route(channel, bytes, peer)
    }

    fn peers(&self, out: &mut Vec<PeerID>) {
        let state = self.host.lock();
        out.extend(
            state
                .peers
                .values()
                .filter(|route| route.info.listed)
                .map(|route| route.info.id),
        );
    }

    fn display_name(&self, peer: PeerID) -> Option<String> {
        self.host
            .lock()
            .peers
            .get(&peer)
            .map(|route| route.info.display_name.clone())
    }

    fn try_recv(&mut self) -> Option<Delivery> {
        loop {
            let delivery = self.receiver.try_recv().ok()?;
            if self.accept(&delivery) {
                return Some(delivery);
            }
        }
    }
}

#[async_trait]
impl Incoming for Endpoint {
    async fn recv(&mut self) -> Option<Delivery> {
        loop {
            let delivery = self.receiver.recv().await?;
            if self.accept(&delivery) {
                return Some(delivery);
            }
        }
    }
}

impl Drop for Endpoint {
    fn drop(&mut self) {
        let mut state = self.host.lock();
        if !state.owns(self.info.id, self.generation) {
            return;
        }
        state.peers.remove(&self.info.id);
        if state.authority == Some(self.info.id) {
            state.authority = None;
        }
        tracing::debug!("Peer {} dropped its endpoint", self.info.id);
    }
}
