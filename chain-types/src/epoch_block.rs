use committable::{Commitment, Committable, RawCommitmentBuilder};
use serde::{Deserialize, Serialize};

use crate::codec::{commitment_to_hash256, StoreCodec};
use crate::ids::{Address, Amount, Epoch, Hash256};

/// One of the 32 delegate slots carried by an `EpochBlock` (spec §6).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegateEntry {
    pub account: Address,
    pub vote: Amount,
    pub stake: Amount,
    pub bls_pub: Hash256,
    pub ecies_pub: Hash256,
    /// `true` for the delegates newly promoted this epoch boundary; `false`
    /// for delegates continuing a term already in progress. Always `false`
    /// for every entry on an extension epoch (spec §4.F / §9 Open
    /// Questions — the "all false during extension" interpretation is
    /// canonical).
    pub starting_term: bool,
}

impl DelegateEntry {
    pub fn zeroed() -> Self {
        DelegateEntry {
            account: Address::ZERO,
            vote: Amount::ZERO,
            stake: Amount::ZERO,
            bls_pub: Hash256::ZERO,
            ecies_pub: Hash256::ZERO,
            starting_term: false,
        }
    }
}

pub const NUM_DELEGATE_SLOTS: usize = 32;

/// `{epoch_number, previous, delegates[32], is_extension, timestamp}`
/// (spec §6).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochBlock {
    pub epoch_number: Epoch,
    pub previous: Hash256,
    pub delegates: [DelegateEntry; NUM_DELEGATE_SLOTS],
    pub is_extension: bool,
    pub timestamp: u64,
}

impl EpochBlock {
    pub fn newly_promoted(&self) -> impl Iterator<Item = &DelegateEntry> {
        self.delegates.iter().filter(|d| d.starting_term)
    }

    /// Content hash used as this block's key in the `epoch` table and as
    /// the `previous` pointer of its successor, letting `ElectionManager`
    /// walk the chain backwards to the last non-extension block.
    pub fn hash(&self) -> Hash256 {
        commitment_to_hash256(self.commit())
    }
}

impl Committable for EpochBlock {
    fn commit(&self) -> Commitment<Self> {
        RawCommitmentBuilder::new("EpochBlock")
            .var_size_bytes(&self.encode())
            .finalize()
    }

    fn tag() -> String {
        "EPOCH_BLOCK".into()
    }
}
