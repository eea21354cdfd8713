use serde::{Deserialize, Serialize};

use crate::ids::{Address, Amount, Epoch, Hash256};

/// The head of an epoch's per-delegate request chain (spec §3); lets the
/// (excluded) consensus collaborator splice chains at epoch boundaries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tip {
    pub epoch: Epoch,
    pub digest: Hash256,
}

/// Per-account subchain tips that let the validator enforce "at most one of
/// X per epoch" (spec §3).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepInfo {
    pub rep_action_tip: Hash256,
    pub candidacy_action_tip: Hash256,
    pub election_vote_tip: Hash256,
    /// Epoch `election_vote_tip` was last advanced in — the witness the
    /// validator checks to enforce "at most one vote per rep per epoch"
    /// (spec §4.G), since a hash alone does not carry the epoch it was cast
    /// in.
    pub election_vote_epoch: Epoch,
    pub governance_subchain_head: Hash256,
}

/// A candidate's accumulated standing for the election currently in
/// progress (spec §3). `cur_stake` lags `next_stake` by one epoch —
/// `next_stake` is written immediately by `Stake` requests, `cur_stake` is
/// only promoted at epoch transition (spec §4.H step 6).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateInfo {
    pub cur_stake: Amount,
    pub next_stake: Amount,
    pub votes_received_weighted: Amount,
    pub bls_key: Hash256,
    pub ecies_key: Hash256,
    pub epoch_modified: Epoch,
}

impl CandidateInfo {
    /// Total order used for top-k selection and the leading-candidates
    /// window (spec §4.E): greater `votes_received_weighted`, tie-break
    /// greater `cur_stake`, tie-break greater account address.
    pub fn ranking_key(&self, account: Address) -> (Amount, Amount, Address) {
        (self.votes_received_weighted, self.cur_stake, account)
    }
}
