use std::time::Duration;

/// Version byte written in front of every encoded packet
pub const WIRE_VERSION: u8 = 1;
/// Maximum size of a single encoded packet
pub const MAXIMUM_PACKET_SIZE: usize = 64 * 1024;
/// Default maximum size of a single encoded packet
pub const DEFAULT_PACKET_SIZE: usize = 16 * 1024;
/// Maximum nesting of sequences, maps, structs and variants
pub const MAXIMUM_NESTING_DEPTH: usize = 64;
/// Default amount of peers a host accepts
pub const DEFAULT_PEER_COUNT: usize = 16;
/// Default size of every endpoint's inbound queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;
/// How long a notice stays on screen
pub const DEFAULT_NOTICE_DURATION: Duration = Duration::from_secs(10);
/// Notices kept until drained, older ones are dropped first
pub const MAXIMUM_QUEUED_NOTICES: usize = 32;
