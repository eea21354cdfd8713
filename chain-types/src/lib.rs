//! Data model, wire formats and error taxonomy (spec §3, §6, §7) for the
//! governance/staking/voting core. Plain data only — the stateful managers
//! that read and write it live in `governance-core`.

pub mod account;
pub mod candidate;
pub mod codec;
pub mod epoch_block;
pub mod error;
pub mod ids;
pub mod liability;
pub mod request;
pub mod staking;
pub mod voting_power;

pub use account::Account;
pub use candidate::{CandidateInfo, RepInfo, Tip};
pub use codec::StoreCodec;
pub use epoch_block::{DelegateEntry, EpochBlock, NUM_DELEGATE_SLOTS};
pub use error::{GovernanceError, Result};
pub use ids::{Address, Amount, Epoch, Hash256};
pub use liability::{Liability, LiabilityKind};
pub use request::{Request, RequestBody, RequestHeader, VoteAllocation};
pub use staking::{StakedFunds, ThawingFunds};
pub use voting_power::{Snapshot, VotingPowerFallback, VotingPowerInfo};
