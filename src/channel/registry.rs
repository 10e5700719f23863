use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use once_cell::sync::OnceCell;

use crate::error::{RelayError, Result};

use super::ChannelID;

static GLOBAL: OnceCell<Registry> = OnceCell::new();

/// Tracks which channel ids are bound in a process.
///
/// Cloning shares the same set, [`Registry::new`] creates an isolated one.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    active: Arc<Mutex<HashMap<ChannelID, String>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry
    pub fn global() -> &'static Registry {
        GLOBAL.get_or_init(Registry::new)
    }

    pub fn acquire(&self, channel_id: ChannelID, owner: &str) -> Result<Registration> {
        let mut active = self.lock();
        if let Some(current) = active.get(&channel_id) {
            return Err(RelayError::AlreadyInstanced {
                channel_id,
                owner: owner.to_string(),
                current: current.clone(),
            });
        }
        active.insert(channel_id, owner.to_string());
        tracing::debug!("Channel {channel_id} bound by {owner}");

        Ok(Registration {
            registry: self.clone(),
            channel_id,
        })
    }

    pub fn is_active(&self, channel_id: ChannelID) -> bool {
        self.lock().contains_key(&channel_id)
    }

    pub fn owner(&self, channel_id: ChannelID) -> Option<String> {
        self.lock().get(&channel_id).cloned()
    }

    fn release(&self, channel_id: ChannelID) {
        if let Some(owner) = self.lock().remove(&channel_id) {
            tracing::debug!("Channel {channel_id} released by {owner}");
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ChannelID, String>> {
        self.active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Keeps a channel id bound until dropped
#[derive(Debug)]
pub struct Registration {
    registry: Registry,
    channel_id: ChannelID,
}

impl Registration {
    pub fn channel_id(&self) -> ChannelID {
        self.channel_id
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.release(self.channel_id);
    }
}
