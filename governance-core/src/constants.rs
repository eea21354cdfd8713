//! Protocol constants (spec §4.F, §8, §9). These are compile-time
//! protocol parameters, not runtime configuration — the original treats
//! them identically (fixed at build time), and changing one changes
//! consensus, so they are not exposed through `staking-cli`'s `Config`.

use chain_types::Amount;

/// Epochs a thaw takes to mature before its funds return to the owner's
/// available balance.
pub const THAWING_PERIOD: u32 = 24;

/// Size of the active delegate set.
pub const NUM_DELEGATES: usize = 32;

/// Epochs a delegate serves before rotating out, absent a term extension.
pub const TERM_LENGTH: u32 = 4;

/// `NUM_DELEGATES / TERM_LENGTH` — how many delegates retire (and how many
/// election winners are needed) at a normal epoch boundary.
pub const DELEGATES_RETIRING: usize = NUM_DELEGATES / TERM_LENGTH as usize;

/// Minimum self-stake to register as a representative.
pub const MIN_REP_STAKE: Amount = Amount(100_000 * UNIT);

/// Minimum stake to announce candidacy.
pub const MIN_DELEGATE_STAKE: Amount = Amount(500_000 * UNIT);

/// Numerator (over 100) by which unlocked-proxied balance counts toward
/// voting power.
pub const DILUTION_FACTOR: u128 = 50;

/// Total sub-vote units a representative may allocate across candidates in
/// one `ElectionVote` request.
pub const TOTAL_VOTE_UNITS: u8 = 8;

/// Divisor applied to the next delegate set's total vote weight to produce
/// the per-delegate cap `redistribute_votes` enforces (spec §4.F step 4).
/// Numerically coincides with `TOTAL_VOTE_UNITS` but is a distinct protocol
/// parameter — one bounds a single rep's ballot, the other bounds a single
/// delegate's post-election standing.
pub const VOTE_CAP_DIVISOR: u128 = 8;

/// Smallest denomination of `Amount` — keeps the constants above readable.
const UNIT: u128 = 1_000_000_000_000;

const _: () = assert!(NUM_DELEGATES / (TERM_LENGTH as usize) == DELEGATES_RETIRING);
