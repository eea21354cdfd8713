use serde::{Deserialize, Serialize};

use crate::codec::StoreCodec;
use crate::ids::{Address, Amount, Epoch, Hash256};

/// At most one per owning account (spec §3). `target` is either the owner
/// itself (self-stake) or a representative (proxy).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakedFunds {
    pub target: Address,
    pub amount: Amount,
    pub liability_hash: Hash256,
}

impl StakedFunds {
    pub fn new(target: Address, liability_hash: Hash256) -> Self {
        StakedFunds {
            target,
            amount: Amount::ZERO,
            liability_hash,
        }
    }
}

/// Many per owning account (a `dup` table keyed by owner). Iterated in
/// descending `expiration_epoch` order (spec §3 / Design Notes). A value of
/// `expiration_epoch == 0` means frozen: held open indefinitely while the
/// owner is an active delegate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThawingFunds {
    pub target: Address,
    pub amount: Amount,
    pub expiration_epoch: Epoch,
    pub liability_hash: Hash256,
}

impl ThawingFunds {
    pub fn new(target: Address, expiration_epoch: Epoch, liability_hash: Hash256) -> Self {
        ThawingFunds {
            target,
            amount: Amount::ZERO,
            expiration_epoch,
            liability_hash,
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.expiration_epoch.0 == 0
    }

    /// Two `ThawingFunds` records for the same owner consolidate into one
    /// when they share `(target, expiration_epoch)` (spec §3).
    pub fn same_bucket(&self, other: &ThawingFunds) -> bool {
        self.target == other.target && self.expiration_epoch == other.expiration_epoch
    }

    /// Dup-table value encoding: a big-endian-complemented `expiration_epoch`
    /// prefix followed by the bincode payload. `redb` multimaps sort values
    /// by byte order, so complementing the epoch turns ascending byte order
    /// into descending expiration order — the iteration order spec §3 and
    /// the Design Notes require, without needing a custom comparator.
    pub fn to_dup_value(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + 64);
        out.extend_from_slice(&(!self.expiration_epoch.0).to_be_bytes());
        out.extend_from_slice(&self.encode());
        out
    }

    pub fn from_dup_value(bytes: &[u8]) -> bincode::Result<Self> {
        Self::decode(&bytes[4..])
    }
}
