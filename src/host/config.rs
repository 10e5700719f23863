use crate::{
    consts::{DEFAULT_PEER_COUNT, DEFAULT_QUEUE_CAPACITY},
    error::{RelayError, Result},
};

#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Most peers connected at once, the authority included
    pub peer_count: usize,
    /// Deliveries an endpoint can have queued before sends to it fail
    pub queue_capacity: usize,
}

impl HostConfig {
    pub fn new(peer_count: usize) -> Result<Self> {
        if peer_count == 0 {
            return Err(RelayError::BadConfig("peer count must be at least 1".to_string()));
        }

        Ok(HostConfig {
            peer_count,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        })
    }

    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Result<Self> {
        if queue_capacity == 0 {
            return Err(RelayError::BadConfig(
                "queue capacity must be at least 1".to_string(),
            ));
        }
        self.queue_capacity = queue_capacity;
        Ok(self)
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        HostConfig {
            peer_count: DEFAULT_PEER_COUNT,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}
