//! Staking lifecycle, election/epoch rotation and voting-power accounting
//! for a DPoS chain (§4.B–§4.H). Every manager here is a small stateless
//! handle over `chain-store` tables; callers own the transaction and the
//! `Account`/`CandidateInfo`/etc. values being mutated, matching the
//! "services with an explicit construction point, no globals" design note.

pub mod accounts;
pub mod constants;
pub mod election;
pub mod epoch_transition;
mod keys;
pub mod liability;
pub mod registry;
pub mod staking;
mod store_ext;
pub mod validator;
pub mod voting_power;

pub use election::ElectionManager;
pub use epoch_transition::EpochTransitionApplier;
pub use liability::LiabilityLedger;
pub use registry::Registry;
pub use staking::StakingEngine;
pub use validator::RequestValidator;
pub use voting_power::VotingPowerLedger;
