use thiserror::Error;

use crate::ids::Hash256;

/// The error taxonomy from spec §7. The first six variants are recovered
/// locally: the offending request is rejected and its write transaction is
/// aborted without any state change. `Store` is fatal to the in-flight write
/// transaction; the caller (the excluded persistence layer) retries or halts
/// the node.
#[derive(Debug, Error)]
pub enum GovernanceError {
    #[error("request's previous hash {expected} does not match account tip {found}")]
    InvalidPrevious { expected: Hash256, found: Hash256 },

    #[error("request sequence {expected} does not follow account sequence {found}")]
    InvalidSequence { expected: u64, found: u64 },

    #[error("request does not continue account {0}'s governance subchain")]
    BadSubchain(crate::ids::Address),

    #[error("account {0} is not a representative")]
    NotRepresentative(crate::ids::Address),

    #[error("account {0} is not a candidate")]
    NotCandidate(crate::ids::Address),

    #[error("account {0} is already a representative")]
    AlreadyRepresentative(crate::ids::Address),

    #[error("account {0} is already a candidate")]
    AlreadyCandidate(crate::ids::Address),

    #[error("account {0} is a sitting delegate-elect and cannot announce candidacy")]
    AlreadyDelegate(crate::ids::Address),

    #[error("stake {have} is below the required minimum {required}")]
    InsufficientStake { have: crate::ids::Amount, required: crate::ids::Amount },

    #[error("account {0} does not have enough available balance to satisfy this request")]
    InsufficientBalance(crate::ids::Address),

    #[error("creating this secondary liability would violate the single-target uniqueness rule")]
    LiabilityConflict,

    #[error("request targets epoch {0} which is not yet resolved (dead period)")]
    DeadPeriod(crate::ids::Epoch),

    #[error(transparent)]
    Store(#[from] chain_store::StoreError),
}

pub type Result<T> = std::result::Result<T, GovernanceError>;
