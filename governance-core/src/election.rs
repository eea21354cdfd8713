//! Election Manager (spec §4.F): top-k candidate ranking, epoch-boundary
//! delegate-set rotation, and the vote-overflow redistribution that keeps
//! any one delegate from dominating the set's voting power.

use chain_store::{tables, WriteTxn};
use chain_types::{
    Address, Amount, CandidateInfo, DelegateEntry, Epoch, EpochBlock, GovernanceError, Hash256,
    Result, StoreCodec, NUM_DELEGATE_SLOTS,
};

use crate::constants::{DELEGATES_RETIRING, VOTE_CAP_DIVISOR};
use crate::keys;
use crate::registry::Registry;
use crate::store_ext::Reader;

#[derive(Clone, Copy, Debug, Default)]
pub struct ElectionManager {
    registry: Registry,
}

impl ElectionManager {
    pub fn new() -> Self {
        ElectionManager { registry: Registry::new() }
    }

    /// Top `k` candidates by the ranking comparator (spec §4.E
    /// `ranking_key` / §4.F step 1), best first. A full scan plus sort
    /// rather than a running min-heap — `k` is always small (`DELEGATES_RETIRING`)
    /// and the candidate set is bounded by `MIN_DELEGATE_STAKE`.
    pub fn get_election_winners<R: Reader>(&self, txn: &R, k: usize) -> Result<Vec<(Address, CandidateInfo)>> {
        let mut all = self.registry.all_candidates(txn)?;
        all.sort_by(|(a_addr, a), (b_addr, b)| b.ranking_key(*b_addr).cmp(&a.ranking_key(*a_addr)));
        all.truncate(k);
        Ok(all)
    }

    /// Accumulate `weight` toward `candidate`'s standing for `epoch` (spec
    /// §4.F "Vote accumulation" / §9 Open Questions): a tally carried over
    /// from an earlier epoch is reset to zero before the new weight is
    /// added; a vote naming an epoch older than the candidate's last
    /// observation is rejected outright rather than applied out of order.
    pub fn candidate_add_vote(&self, txn: &WriteTxn, candidate: Address, weight: Amount, epoch: Epoch) -> Result<()> {
        let mut info = self.registry.get_candidate(txn, candidate)?.ok_or(GovernanceError::NotCandidate(candidate))?;
        if epoch < info.epoch_modified {
            tracing::warn!(%candidate, observed = %epoch, stored = %info.epoch_modified, "rejecting vote for an already-superseded epoch");
            return Ok(());
        }
        if epoch > info.epoch_modified {
            info.votes_received_weighted = Amount::ZERO;
            info.epoch_modified = epoch;
        }
        info.votes_received_weighted = info.votes_received_weighted.saturating_add(weight);
        self.registry.candidate_put(txn, candidate, &info)?;
        Ok(())
    }

    fn load_epoch_tip<R: Reader>(&self, txn: &R) -> Result<Option<Hash256>> {
        match txn.get(tables::EPOCH_TIP, keys::EPOCH_TIP_SENTINEL)? {
            Some(bytes) => {
                let mut h = [0u8; 32];
                h.copy_from_slice(&bytes);
                Ok(Some(Hash256(h)))
            },
            None => Ok(None),
        }
    }

    fn load_epoch_block<R: Reader>(&self, txn: &R, hash: Hash256) -> Result<Option<EpochBlock>> {
        match txn.get(tables::EPOCH, &keys::hash_key(hash))? {
            Some(bytes) => Ok(Some(EpochBlock::decode(&bytes).expect("stored EpochBlock is well-formed"))),
            None => Ok(None),
        }
    }

    /// Public read of a specific epoch block by its content hash — used by
    /// the epoch-transition applier to compare the outgoing and incoming
    /// delegate sets.
    pub fn get_epoch_block<R: Reader>(&self, txn: &R, hash: Hash256) -> Result<Option<EpochBlock>> {
        self.load_epoch_block(txn, hash)
    }

    /// Persists `block` under its own content hash and advances the epoch
    /// tip to it.
    pub fn store_epoch_block(&self, txn: &WriteTxn, block: &EpochBlock) -> Result<Hash256> {
        let hash = block.hash();
        txn.put(tables::EPOCH, &keys::hash_key(hash), &block.encode())?;
        txn.put(tables::EPOCH_TIP, keys::EPOCH_TIP_SENTINEL, &keys::hash_key(hash))?;
        Ok(hash)
    }

    /// Whether `account` sits in the delegate set of the current epoch
    /// tip — used by the validator to reject `AnnounceCandidacy` from a
    /// sitting delegate-elect, who is no longer in the candidate registry
    /// (it was cleared at the boundary that elected them) but has not yet
    /// finished their term.
    pub fn is_current_delegate<R: Reader>(&self, txn: &R, account: Address) -> Result<bool> {
        let Some(hash) = self.load_epoch_tip(txn)? else {
            return Ok(false);
        };
        let Some(block) = self.load_epoch_block(txn, hash)? else {
            return Ok(false);
        };
        Ok(block.delegates.iter().any(|d| d.account == account))
    }

    /// The epoch number of the current epoch tip, or genesis if no epoch
    /// block has been committed yet — the witness the validator's
    /// dead-period rule (spec §4.G) checks requests against.
    pub fn tip_epoch<R: Reader>(&self, txn: &R) -> Result<Epoch> {
        match self.load_epoch_tip(txn)? {
            Some(hash) => match self.load_epoch_block(txn, hash)? {
                Some(block) => Ok(block.epoch_number),
                None => Ok(Epoch::GENESIS),
            },
            None => Ok(Epoch::GENESIS),
        }
    }

    /// Walks the `epoch` chain backward from the tip, skipping extension
    /// blocks, and returns the `starting_term` accounts of the last
    /// non-extension block found — the delegates retiring this epoch
    /// boundary (spec §4.F step 1).
    fn retiring_delegates<R: Reader>(&self, txn: &R) -> Result<Vec<Address>> {
        let mut cursor = self.load_epoch_tip(txn)?;
        while let Some(hash) = cursor {
            let block = match self.load_epoch_block(txn, hash)? {
                Some(block) => block,
                None => break,
            };
            if !block.is_extension {
                return Ok(block.newly_promoted().map(|d| d.account).collect());
            }
            cursor = if block.previous.is_zero() { None } else { Some(block.previous) };
        }
        Ok(Vec::new())
    }

    /// Builds the epoch block for `next_epoch` given the current 32-entry
    /// delegate set (spec §4.F steps 1-3). Does not persist it — callers
    /// pass the result to `store_epoch_block` once the rest of the
    /// transition (the epoch-transition applier's removal/promotion work)
    /// has also completed, so it all lands in a single commit.
    pub fn get_next_epoch_delegates<R: Reader>(
        &self,
        txn: &R,
        current_set: &[DelegateEntry; NUM_DELEGATE_SLOTS],
        previous_hash: Hash256,
        next_epoch: Epoch,
        timestamp: u64,
    ) -> Result<EpochBlock> {
        let retiring = self.retiring_delegates(txn)?;
        let winners = self.get_election_winners(txn, DELEGATES_RETIRING)?;

        if winners.len() < DELEGATES_RETIRING {
            tracing::info!(
                available = winners.len(),
                needed = DELEGATES_RETIRING,
                "fewer election winners than retiring slots; extending the current delegate term"
            );
            return Ok(EpochBlock {
                epoch_number: next_epoch,
                previous: previous_hash,
                delegates: *current_set,
                is_extension: true,
                timestamp,
            });
        }

        let mut delegates = [DelegateEntry::zeroed(); NUM_DELEGATE_SLOTS];
        let mut next_idx = 0;
        for entry in current_set.iter() {
            if retiring.contains(&entry.account) {
                continue;
            }
            let mut kept = *entry;
            kept.starting_term = false;
            delegates[next_idx] = kept;
            next_idx += 1;
        }
        for (account, info) in &winners {
            delegates[next_idx] = DelegateEntry {
                account: *account,
                vote: info.votes_received_weighted,
                stake: info.cur_stake,
                bls_pub: info.bls_key,
                ecies_pub: info.ecies_key,
                starting_term: true,
            };
            next_idx += 1;
        }
        debug_assert_eq!(next_idx, NUM_DELEGATE_SLOTS, "retiring-set size must equal the number of election winners");

        let total_vote: Amount = delegates.iter().map(|d| d.vote).sum();
        self.redistribute_votes(&mut delegates, total_vote);

        Ok(EpochBlock {
            epoch_number: next_epoch,
            previous: previous_hash,
            delegates,
            is_extension: false,
            timestamp,
        })
    }

    /// Clamps any delegate's `vote` above `total_vote / VOTE_CAP_DIVISOR`
    /// to the cap, redistributing the overflow proportionally among
    /// delegates still below it, repeating until no delegate exceeds the
    /// cap (spec §4.F step 4).
    pub fn redistribute_votes(&self, delegates: &mut [DelegateEntry; NUM_DELEGATE_SLOTS], total_vote: Amount) {
        let cap = Amount(total_vote.0 / VOTE_CAP_DIVISOR);
        loop {
            let mut overflow = Amount::ZERO;
            let mut any_clamped = false;
            for d in delegates.iter_mut() {
                if d.vote > cap {
                    overflow = overflow.saturating_add(d.vote.saturating_sub(cap));
                    d.vote = cap;
                    any_clamped = true;
                }
            }
            if !any_clamped || overflow.is_zero() {
                break;
            }

            let below_cap_total: Amount = delegates.iter().filter(|d| d.vote < cap).map(|d| d.vote).sum();
            if below_cap_total.is_zero() {
                tracing::warn!("vote overflow could not be redistributed; every delegate is already at the cap");
                break;
            }

            for d in delegates.iter_mut() {
                if d.vote < cap {
                    let share = Amount(overflow.0 * d.vote.0 / below_cap_total.0);
                    d.vote = d.vote.saturating_add(share).min(cap);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chain_store::Environment;

    use super::*;

    fn candidate(votes: u128, stake: u128) -> CandidateInfo {
        CandidateInfo { cur_stake: Amount(stake), next_stake: Amount(stake), votes_received_weighted: Amount(votes), ..Default::default() }
    }

    #[test]
    fn get_election_winners_returns_best_first() {
        let env = Environment::in_memory().unwrap();
        let txn = env.begin_write().unwrap();
        let registry = Registry::new();
        let election = ElectionManager::new();

        let low = Address([1u8; 32]);
        let high = Address([2u8; 32]);
        registry.candidate_put(&txn, low, &candidate(10, 0)).unwrap();
        registry.candidate_put(&txn, high, &candidate(99, 0)).unwrap();

        let winners = election.get_election_winners(&txn, 1).unwrap();
        assert_eq!(winners.len(), 1);
        assert_eq!(winners[0].0, high);
        txn.commit().unwrap();
    }

    #[test]
    fn candidate_add_vote_resets_a_stale_epoch_tally() {
        let env = Environment::in_memory().unwrap();
        let txn = env.begin_write().unwrap();
        let registry = Registry::new();
        let election = ElectionManager::new();
        let account = Address([7u8; 32]);

        let mut info = candidate(500, 0);
        info.epoch_modified = Epoch(1);
        registry.candidate_put(&txn, account, &info).unwrap();

        election.candidate_add_vote(&txn, account, Amount(40), Epoch(2)).unwrap();

        let updated = registry.get_candidate(&txn, account).unwrap().unwrap();
        assert_eq!(updated.votes_received_weighted, Amount(40));
        assert_eq!(updated.epoch_modified, Epoch(2));
        txn.commit().unwrap();
    }

    #[test]
    fn candidate_add_vote_accumulates_within_the_same_epoch() {
        let env = Environment::in_memory().unwrap();
        let txn = env.begin_write().unwrap();
        let registry = Registry::new();
        let election = ElectionManager::new();
        let account = Address([7u8; 32]);

        let mut info = candidate(500, 0);
        info.epoch_modified = Epoch(2);
        registry.candidate_put(&txn, account, &info).unwrap();

        election.candidate_add_vote(&txn, account, Amount(40), Epoch(2)).unwrap();

        let updated = registry.get_candidate(&txn, account).unwrap().unwrap();
        assert_eq!(updated.votes_received_weighted, Amount(540));
        txn.commit().unwrap();
    }

    #[test]
    fn redistribute_votes_caps_every_delegate_at_the_limit() {
        let election = ElectionManager::new();
        let mut delegates = [DelegateEntry::zeroed(); NUM_DELEGATE_SLOTS];
        delegates[0].vote = Amount(800);
        for d in delegates.iter_mut().skip(1) {
            d.vote = Amount(10);
        }
        let total: Amount = delegates.iter().map(|d| d.vote).sum();
        let cap = Amount(total.0 / VOTE_CAP_DIVISOR);

        election.redistribute_votes(&mut delegates, total);

        assert!(delegates.iter().all(|d| d.vote <= cap));
    }

    #[test]
    fn get_next_epoch_delegates_extends_the_term_when_winners_are_short() {
        let env = Environment::in_memory().unwrap();
        let txn = env.begin_write().unwrap();
        let election = ElectionManager::new();
        let current = [DelegateEntry::zeroed(); NUM_DELEGATE_SLOTS];

        let block = election.get_next_epoch_delegates(&txn, &current, Hash256::ZERO, Epoch(5), 0).unwrap();

        assert!(block.is_extension);
        assert_eq!(block.delegates, current);
        txn.commit().unwrap();
    }
}
