use serde::{Deserialize, Serialize};

use crate::ids::{Address, Amount, Epoch, Hash256};

/// Attributes of an account relevant to the governance/staking/voting core
/// (spec §3). The wider notion of "account" — public key material, the
/// full request chain, non-governance balances history — lives outside this
/// crate's concern and is assumed to already exist when these fields are
/// read or written.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub balance: Amount,
    /// `balance - staked - Σthawing`. Kept denormalized (rather than
    /// computed on read) because it is the quantity every staking-engine
    /// step reads and writes; `debug_assert_balance_conserved` recomputes it
    /// from scratch to check the invariant in tests.
    pub available_balance: Amount,
    pub block_count: u64,
    /// Hash of the last governance-affecting request issued by this
    /// account — the head of its governance subchain (spec §4.G).
    pub governance_subchain_head: Hash256,
    /// Last epoch at which `StakingEngine::prune_thawing` ran for this
    /// account. Guards idempotence (spec §8 property 6).
    pub epoch_thawing_updated: Epoch,
    /// The account this account proxies to. Zero means self-staking or no
    /// stake at all.
    pub rep: Address,
}

impl Account {
    pub fn new(balance: Amount) -> Self {
        Account {
            balance,
            available_balance: balance,
            block_count: 0,
            governance_subchain_head: Hash256::ZERO,
            epoch_thawing_updated: Epoch::GENESIS,
            rep: Address::ZERO,
        }
    }

    pub fn is_self_staking_or_unset(&self) -> bool {
        self.rep.is_zero()
    }

    /// Spec §8 property 1: `available_balance + staked + Σthawing ==
    /// balance`. Callers pass in the amounts read from the `staking`/
    /// `thawing` tables for this account since `Account` itself does not
    /// hold them.
    pub fn balance_conserved(&self, staked: Amount, thawing_total: Amount) -> bool {
        self.available_balance.0 + staked.0 + thawing_total.0 == self.balance.0
    }
}
