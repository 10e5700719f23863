use std::time::Duration;

use crate::{
    consts::{DEFAULT_NOTICE_DURATION, DEFAULT_PACKET_SIZE, MAXIMUM_PACKET_SIZE},
    error::{RelayError, Result},
};

use super::ChannelID;

#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Must be unique among everything sharing the transport
    pub channel_id: ChannelID,
    /// Shown in logs and notices
    pub owner_name: String,
    /// Turn off to never receive anything on this peer
    pub register_listener: bool,
    /// Routes the authority's own sends through the transport to exercise serialization
    pub serialize_test: bool,
    pub max_packet_size: usize,
    pub notice_duration: Duration,
}

impl ChannelConfig {
    pub fn new(channel_id: ChannelID, owner_name: impl Into<String>) -> Result<Self> {
        let owner_name = owner_name.into();
        if owner_name.trim().is_empty() {
            return Err(RelayError::BadConfig(format!(
                "channel {channel_id} needs an owner name"
            )));
        }

        Ok(ChannelConfig {
            channel_id,
            owner_name,
            register_listener: true,
            serialize_test: false,
            max_packet_size: DEFAULT_PACKET_SIZE,
            notice_duration: DEFAULT_NOTICE_DURATION,
        })
    }

    pub fn with_listener(mut self, register_listener: bool) -> Self {
        self.register_listener = register_listener;
        self
    }

    pub fn with_serialize_test(mut self, serialize_test: bool) -> Self {
        self.serialize_test = serialize_test;
        self
    }

    pub fn with_max_packet_size(mut self, max_packet_size: usize) -> Result<Self> {
        if max_packet_size == 0 || max_packet_size > MAXIMUM_PACKET_SIZE {
            return Err(RelayError::BadConfig(format!(
                "max packet size {max_packet_size} not in 1..={MAXIMUM_PACKET_SIZE}"
            )));
        }
        self.max_packet_size = max_packet_size;
        Ok(self)
    }

    pub fn with_notice_duration(mut self, notice_duration: Duration) -> Self {
        self.notice_duration = notice_duration;
        self
    }
}

/// Derives a channel id from a large, globally unique number such as a publisher id
pub fn channel_id_from_workshop_id(id: u64) -> ChannelID {
    (id % u64::from(u16::MAX)) as ChannelID
}
