use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Identity of a peer as reported by the transport
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
#[derive(Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash, Copy, Clone, Debug, Default)]
pub struct PeerID(pub u64);

impl PeerID {
    /// Placeholder id used before a transport assigned one
    pub const UNASSIGNED: PeerID = PeerID(0);

    pub fn is_assigned(&self) -> bool {
        *self != Self::UNASSIGNED
    }
}

macro_rules! impl_convers_ids {
    ($ty: path) => {
        impl Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<u64> for $ty {
            fn from(value: u64) -> Self {
                $ty(value)
            }
        }

        impl From<u32> for $ty {
            fn from(value: u32) -> Self {
                let val: u64 = value.into();
                val.into()
            }
        }

        impl From<$ty> for u64 {
            fn from(value: $ty) -> Self {
                value.0
            }
        }
    };
}

impl_convers_ids!(PeerID);
