mod peer_id;
pub use peer_id::*;

/// What the transport knows about a connected peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerInfo {
    pub id: PeerID,
    pub display_name: String,
    pub is_authority: bool,
    /// Whether the peer shows up when enumerating peers, a dedicated authority does not
    pub listed: bool,
}

impl PeerInfo {
    pub fn client(id: PeerID, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            is_authority: false,
            listed: true,
        }
    }

    pub fn authority(id: PeerID, display_name: impl Into<String>, dedicated: bool) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            is_authority: true,
            listed: !dedicated,
        }
    }
}
