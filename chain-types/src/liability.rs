use committable::{Commitment, Committable, RawCommitmentBuilder};
use serde::{Deserialize, Serialize};

use crate::codec::commitment_to_hash256;
use crate::ids::{Address, Amount, Epoch, Hash256};

/// The three forms a `Liability` can take (spec §3). The type itself does
/// not distinguish them structurally — `expiration_epoch == 0` plus which
/// table a record lives in is what distinguishes an unexpiring primary from
/// an expiring one; secondary liabilities are simply the ones indexed in
/// `secondary_liabilities` rather than `master_liabilities`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LiabilityKind {
    UnexpiringPrimary,
    ExpiringPrimary,
    Secondary,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Liability {
    pub source: Address,
    pub target: Address,
    pub amount: Amount,
    /// `0` for an unexpiring primary liability.
    pub expiration_epoch: Epoch,
    pub kind: LiabilityKind,
}

impl Committable for Liability {
    /// `hash = H(source, target, expiration_epoch)` (spec §3). Stable under
    /// an amount change, which is exactly what lets `update_amount`/
    /// `consolidate` reuse the same key when funds are added to an existing
    /// liability — `amount` and `kind` are deliberately excluded from the
    /// fields committed to.
    fn commit(&self) -> Commitment<Self> {
        RawCommitmentBuilder::new("Liability")
            .fixed_size_field("source", &self.source.0)
            .fixed_size_field("target", &self.target.0)
            .u64_field("expiration_epoch", self.expiration_epoch.0 as u64)
            .finalize()
    }

    fn tag() -> String {
        "LIABILITY".into()
    }
}

impl Liability {
    /// `hash = H(source, target, expiration_epoch)` (spec §3), narrowed to
    /// the `Hash256` every table keys by.
    pub fn hash(source: Address, target: Address, expiration_epoch: Epoch) -> Hash256 {
        Self {
            source,
            target,
            amount: Amount::ZERO,
            expiration_epoch,
            kind: LiabilityKind::UnexpiringPrimary,
        }
        .compute_hash()
    }

    pub fn new(
        source: Address,
        target: Address,
        amount: Amount,
        expiration_epoch: Epoch,
        kind: LiabilityKind,
    ) -> Self {
        Liability {
            source,
            target,
            amount,
            expiration_epoch,
            kind,
        }
    }

    pub fn compute_hash(&self) -> Hash256 {
        commitment_to_hash256(self.commit())
    }
}
