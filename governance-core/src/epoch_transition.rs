//! Epoch Transition Applier (spec §4.H): the handler invoked once per
//! committed epoch block, bundling deferred-removal drains, delegate
//! freeze/unfreeze, and candidate stake promotion into one pass.

use std::collections::HashSet;

use chain_store::WriteTxn;
use chain_types::{Address, Epoch, EpochBlock, Result};

use crate::election::ElectionManager;
use crate::registry::Registry;
use crate::staking::StakingEngine;

#[derive(Clone, Copy, Debug, Default)]
pub struct EpochTransitionApplier {
    registry: Registry,
    staking: StakingEngine,
    election: ElectionManager,
}

impl EpochTransitionApplier {
    pub fn new() -> Self {
        EpochTransitionApplier::default()
    }

    /// Runs all seven steps of spec §4.H against the just-committed
    /// `epoch_block`. Idempotence is the caller's responsibility — this is
    /// meant to run exactly once per committed epoch block, inside the
    /// same write transaction that commits it.
    pub fn transition_next_epoch(&self, txn: &WriteTxn, epoch_block: &EpochBlock) -> Result<()> {
        // 1. Drain the deferred-removal queues.
        let removed_candidates = self.registry.drain_remove_candidates(txn)?;
        let removed_reps = self.registry.drain_remove_reps(txn)?;
        tracing::debug!(
            removed_candidates = removed_candidates.len(),
            removed_reps = removed_reps.len(),
            epoch = %epoch_block.epoch_number,
            "drained deferred-removal queues"
        );

        // 2. The new delegate-elects are no longer candidates.
        for delegate in epoch_block.newly_promoted() {
            self.registry.delete_candidate(txn, delegate.account)?;
        }

        // 3. Every candidate row still present after steps 1-2 is, by
        // construction, neither renounced nor elected — it is automatically
        // carried forward for the next election with no further action.

        let previous_delegates = self.previous_delegate_set(txn, epoch_block)?;
        let new_delegates: HashSet<Address> = epoch_block.delegates.iter().map(|d| d.account).collect();

        // 4. Delegates whose term ended this boundary thaw normally again.
        for account in previous_delegates.difference(&new_delegates) {
            self.staking.unfreeze(txn, *account, epoch_block.epoch_number)?;
        }

        // 5. Newly elected delegates freeze their self-directed thawing.
        // The thawing being frozen was created while the elect was still a
        // candidate in the epoch just ending, so the match has to be keyed
        // on that epoch rather than the one this block is starting.
        let previous_epoch = Epoch(epoch_block.epoch_number.0.saturating_sub(1));
        for delegate in epoch_block.newly_promoted() {
            self.staking.mark_frozen(txn, delegate.account, previous_epoch)?;
        }

        // 6. Promote next_stake -> cur_stake for every remaining candidate;
        // votes_received_weighted resets lazily on the next vote it
        // receives (candidate_add_vote's epoch_modified check).
        for (account, mut info) in self.registry.all_candidates(txn)? {
            info.cur_stake = info.next_stake;
            self.registry.candidate_put(txn, account, &info)?;
        }

        // 7. VotingPowerLedger rows self-promote lazily on next access — no
        // wholesale walk here.
        Ok(())
    }

    fn previous_delegate_set(&self, txn: &WriteTxn, epoch_block: &EpochBlock) -> Result<HashSet<Address>> {
        if epoch_block.previous.is_zero() {
            return Ok(HashSet::new());
        }
        match self.election.get_epoch_block(txn, epoch_block.previous)? {
            Some(previous) => Ok(previous.delegates.iter().map(|d| d.account).collect()),
            None => Ok(HashSet::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use chain_store::Environment;
    use chain_types::{Account, Amount, CandidateInfo, DelegateEntry, Epoch, Hash256, NUM_DELEGATE_SLOTS};

    use super::*;
    use crate::staking::StakingEngine as _StakingEngineAlias;

    fn delegate(account: Address, starting_term: bool) -> DelegateEntry {
        DelegateEntry { account, vote: Amount::ZERO, stake: Amount::ZERO, bls_pub: Hash256::ZERO, ecies_pub: Hash256::ZERO, starting_term }
    }

    #[test]
    fn promotes_next_stake_to_cur_stake_for_surviving_candidates() {
        let env = Environment::in_memory().unwrap();
        let txn = env.begin_write().unwrap();
        let applier = EpochTransitionApplier::new();
        let registry = Registry::new();
        let account = Address([5u8; 32]);

        registry
            .candidate_put(&txn, account, &CandidateInfo { cur_stake: Amount(10), next_stake: Amount(50), ..Default::default() })
            .unwrap();

        let mut delegates = [DelegateEntry::zeroed(); NUM_DELEGATE_SLOTS];
        delegates[0] = delegate(Address([9u8; 32]), false);
        let block = EpochBlock { epoch_number: Epoch(2), previous: Hash256::ZERO, delegates, is_extension: false, timestamp: 0 };

        applier.transition_next_epoch(&txn, &block).unwrap();

        let updated = registry.get_candidate(&txn, account).unwrap().unwrap();
        assert_eq!(updated.cur_stake, Amount(50));
        txn.commit().unwrap();
    }

    #[test]
    fn newly_promoted_delegates_are_removed_from_the_candidate_set_and_frozen() {
        let env = Environment::in_memory().unwrap();
        let txn = env.begin_write().unwrap();
        let applier = EpochTransitionApplier::new();
        let registry = Registry::new();
        let staking = StakingEngine::new();
        let elect = Address([7u8; 32]);

        registry.candidate_put(&txn, elect, &CandidateInfo::default()).unwrap();
        let mut account = Account::new(Amount(1_000));
        staking.stake(&txn, elect, &mut account, Amount(100), elect, Epoch(1)).unwrap();
        staking.stake(&txn, elect, &mut account, Amount(0), elect, Epoch(1)).unwrap();

        let mut delegates = [DelegateEntry::zeroed(); NUM_DELEGATE_SLOTS];
        delegates[0] = delegate(elect, true);
        let block = EpochBlock { epoch_number: Epoch(2), previous: Hash256::ZERO, delegates, is_extension: false, timestamp: 0 };

        applier.transition_next_epoch(&txn, &block).unwrap();

        assert!(registry.get_candidate(&txn, elect).unwrap().is_none());
        let thawing = staking.get_thawing_funds(&txn, elect).unwrap();
        assert_eq!(thawing.len(), 1);
        assert!(thawing[0].is_frozen());
        txn.commit().unwrap();
    }

    #[test]
    fn retiring_delegates_get_unfrozen_on_the_boundary_they_leave() {
        let env = Environment::in_memory().unwrap();
        let txn = env.begin_write().unwrap();
        let election = ElectionManager::new();
        let applier = EpochTransitionApplier::new();
        let staking = StakingEngine::new();
        let retiring = Address([3u8; 32]);

        let mut account = Account::new(Amount(1_000));
        staking.stake(&txn, retiring, &mut account, Amount(100), retiring, Epoch(1)).unwrap();
        staking.stake(&txn, retiring, &mut account, Amount(0), retiring, Epoch(1)).unwrap();
        staking.mark_frozen(&txn, retiring, Epoch(1)).unwrap();

        let mut old_delegates = [DelegateEntry::zeroed(); NUM_DELEGATE_SLOTS];
        old_delegates[0] = delegate(retiring, true);
        let genesis = EpochBlock { epoch_number: Epoch(1), previous: Hash256::ZERO, delegates: old_delegates, is_extension: false, timestamp: 0 };
        let previous_hash = election.store_epoch_block(&txn, &genesis).unwrap();

        let new_delegates = [DelegateEntry::zeroed(); NUM_DELEGATE_SLOTS];
        let next = EpochBlock { epoch_number: Epoch(2), previous: previous_hash, delegates: new_delegates, is_extension: false, timestamp: 0 };

        applier.transition_next_epoch(&txn, &next).unwrap();

        let thawing = staking.get_thawing_funds(&txn, retiring).unwrap();
        assert_eq!(thawing.len(), 1);
        assert!(!thawing[0].is_frozen());
        assert_eq!(thawing[0].expiration_epoch, Epoch(2) + crate::constants::THAWING_PERIOD);
        txn.commit().unwrap();
    }
}
