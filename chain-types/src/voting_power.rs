use serde::{Deserialize, Serialize};

use crate::ids::{Amount, Epoch};

/// `{self_stake, locked_proxied, unlocked_proxied}` (spec §3).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub self_stake: Amount,
    pub locked_proxied: Amount,
    pub unlocked_proxied: Amount,
}

impl Snapshot {
    /// `self_stake + locked_proxied + floor(unlocked_proxied * DILUTION_FACTOR / 100)`.
    pub fn voting_power(&self, dilution_factor: u128) -> Amount {
        let diluted = (self.unlocked_proxied.0 * dilution_factor) / 100;
        Amount(self.self_stake.0 + self.locked_proxied.0 + diluted)
    }
}

/// Two-slot voting-power record per representative, with lazy promotion
/// (spec §3 / §4.D).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingPowerInfo {
    pub current: Snapshot,
    pub next: Snapshot,
    pub epoch_modified: Epoch,
}

impl VotingPowerInfo {
    pub fn is_dormant(&self, epoch: Epoch) -> bool {
        self.epoch_modified < epoch
    }

    pub fn both_slots_zero(&self) -> bool {
        self.current == Snapshot::default() && self.next == Snapshot::default()
    }
}

/// Captures `current` at the moment it was first mutated inside an epoch,
/// so reads within that same epoch (election tallying) see the
/// pre-mutation figure rather than whatever has accumulated so far (spec
/// §3 / §4.D).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingPowerFallback {
    pub epoch: Epoch,
    pub snapshot: Snapshot,
}
