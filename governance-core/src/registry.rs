//! Candidate / Representative Registry (spec §4.E): mutable sets of active
//! candidates and representatives, a size-bounded "leading candidates"
//! window, and deferred-removal queues drained at epoch transition.
//!
//! Grounded in the source's `remove_candidates_db`/`remove_reps_db` pattern
//! (spec §9 "Locked iteration + deferred deletion"): marking for removal
//! only ever appends to a duplicate-key queue; nothing is deleted from
//! `candidate`/`representative` until the epoch-transition applier drains it.

use chain_store::{tables, WriteTxn};
use chain_types::{Address, CandidateInfo, RepInfo, Result};

use crate::constants::DELEGATES_RETIRING;
use crate::keys;
use crate::store_ext::Reader;

#[derive(Clone, Copy, Debug, Default)]
pub struct Registry;

/// `(votes_received_weighted, cur_stake, account)` encoded so ascending
/// byte order of the 64-byte blob matches the ranking comparator (spec
/// §4.E): greater votes, tie greater stake, tie greater address. Position 0
/// of an ascending scan is therefore always the current minimum — no
/// separate cached-minimum bookkeeping is needed the way a raw B-tree
/// cursor walk would require.
fn leading_entry(info: &CandidateInfo, account: Address) -> [u8; 64] {
    let mut out = [0u8; 64];
    out[0..16].copy_from_slice(&info.votes_received_weighted.0.to_be_bytes());
    out[16..32].copy_from_slice(&info.cur_stake.0.to_be_bytes());
    out[32..64].copy_from_slice(&account.0);
    out
}

fn decode_leading_entry(bytes: &[u8]) -> Address {
    let mut addr = [0u8; 32];
    addr.copy_from_slice(&bytes[32..64]);
    Address(addr)
}

impl Registry {
    pub fn new() -> Self {
        Registry
    }

    // -- reps ----------------------------------------------------------

    pub fn get_rep<R: Reader>(&self, txn: &R, account: Address) -> Result<Option<RepInfo>> {
        use chain_types::StoreCodec;
        match txn.get(tables::REPRESENTATIVE, &keys::address_key(account))? {
            Some(bytes) => Ok(Some(RepInfo::decode(&bytes).expect("stored RepInfo is well-formed"))),
            None => Ok(None),
        }
    }

    pub fn put_rep(&self, txn: &WriteTxn, account: Address, info: &RepInfo) -> Result<()> {
        use chain_types::StoreCodec;
        txn.put(tables::REPRESENTATIVE, &keys::address_key(account), &info.encode())?;
        Ok(())
    }

    pub fn mark_remove_rep(&self, txn: &WriteTxn, account: Address) -> Result<()> {
        txn.put_dup(tables::REMOVE_REPS, tables::REMOVE_QUEUE_SENTINEL, &keys::address_key(account))?;
        tracing::debug!(%account, "marked rep for removal next epoch");
        Ok(())
    }

    /// Drains `remove_reps`, deleting every named `representative` row.
    /// Returns the removed accounts so the caller can tear down any
    /// per-rep voting-power record (spec §4.D: "deleted only when the rep
    /// is removed... and both slots are zero").
    pub fn drain_remove_reps(&self, txn: &WriteTxn) -> Result<Vec<Address>> {
        let raw = txn.get_dup(tables::REMOVE_REPS, tables::REMOVE_QUEUE_SENTINEL)?;
        let mut removed = Vec::with_capacity(raw.len());
        for bytes in raw {
            txn.del_dup(tables::REMOVE_REPS, tables::REMOVE_QUEUE_SENTINEL, &bytes)?;
            let mut addr = [0u8; 32];
            addr.copy_from_slice(&bytes);
            let account = Address(addr);
            txn.del(tables::REPRESENTATIVE, &keys::address_key(account))?;
            removed.push(account);
        }
        Ok(removed)
    }

    // -- candidates ------------------------------------------------------

    pub fn get_candidate<R: Reader>(&self, txn: &R, account: Address) -> Result<Option<CandidateInfo>> {
        use chain_types::StoreCodec;
        match txn.get(tables::CANDIDATE, &keys::address_key(account))? {
            Some(bytes) => Ok(Some(CandidateInfo::decode(&bytes).expect("stored CandidateInfo is well-formed"))),
            None => Ok(None),
        }
    }

    /// Every candidate row in the registry — the full scan
    /// `ElectionManager::get_election_winners` reads from (spec §4.F step
    /// 1: "scan all candidate rows").
    pub fn all_candidates<R: Reader>(&self, txn: &R) -> Result<Vec<(Address, CandidateInfo)>> {
        use chain_types::StoreCodec;
        let mut out = Vec::new();
        for (key, value) in txn.iter_all(tables::CANDIDATE)? {
            let mut addr = [0u8; 32];
            addr.copy_from_slice(&key);
            let info = CandidateInfo::decode(&value).expect("stored CandidateInfo is well-formed");
            out.push((Address(addr), info));
        }
        Ok(out)
    }

    /// Writes `info` for `account` and maintains the leading-candidates
    /// window (spec §4.E `candidate_put`).
    pub fn candidate_put(&self, txn: &WriteTxn, account: Address, info: &CandidateInfo) -> Result<()> {
        use chain_types::StoreCodec;
        txn.put(tables::CANDIDATE, &keys::address_key(account), &info.encode())?;

        let mut entries: Vec<[u8; 64]> = txn
            .get_dup(tables::LEADING_CANDIDATES, tables::REMOVE_QUEUE_SENTINEL)?
            .into_iter()
            .map(|bytes| {
                let mut arr = [0u8; 64];
                arr.copy_from_slice(&bytes);
                arr
            })
            .collect();
        entries.sort();
        let new_entry = leading_entry(info, account);

        if let Some(pos) = entries.iter().position(|e| decode_leading_entry(e) == account) {
            let old_entry = entries[pos];
            txn.del_dup(tables::LEADING_CANDIDATES, tables::REMOVE_QUEUE_SENTINEL, &old_entry)?;
            txn.put_dup(tables::LEADING_CANDIDATES, tables::REMOVE_QUEUE_SENTINEL, &new_entry)?;
            // Replacing the previous minimum (position 0) never requires a
            // separate resync pass: the dup table's own sort order already
            // reflects the new minimum on next read.
        } else if entries.len() < DELEGATES_RETIRING {
            txn.put_dup(tables::LEADING_CANDIDATES, tables::REMOVE_QUEUE_SENTINEL, &new_entry)?;
        } else if let Some(&minimum) = entries.first() {
            if new_entry > minimum {
                txn.del_dup(tables::LEADING_CANDIDATES, tables::REMOVE_QUEUE_SENTINEL, &minimum)?;
                txn.put_dup(tables::LEADING_CANDIDATES, tables::REMOVE_QUEUE_SENTINEL, &new_entry)?;
            }
        }
        Ok(())
    }

    /// Current leading-candidates window, best first (spec §4.E
    /// `resync_leading`) — a read-only re-derivation; there is nothing to
    /// repair since the dup table is always kept consistent by
    /// `candidate_put`.
    pub fn resync_leading<R: Reader>(&self, txn: &R) -> Result<Vec<Address>> {
        let mut entries = txn.get_dup(tables::LEADING_CANDIDATES, tables::REMOVE_QUEUE_SENTINEL)?;
        entries.sort();
        Ok(entries.iter().rev().map(|bytes| decode_leading_entry(bytes)).collect())
    }

    pub fn remove_from_leading(&self, txn: &WriteTxn, account: Address, info: &CandidateInfo) -> Result<()> {
        txn.del_dup(tables::LEADING_CANDIDATES, tables::REMOVE_QUEUE_SENTINEL, &leading_entry(info, account))?;
        Ok(())
    }

    pub fn delete_candidate(&self, txn: &WriteTxn, account: Address) -> Result<()> {
        txn.del(tables::CANDIDATE, &keys::address_key(account))?;
        Ok(())
    }

    pub fn mark_remove_candidate(&self, txn: &WriteTxn, account: Address) -> Result<()> {
        txn.put_dup(tables::REMOVE_CANDIDATES, tables::REMOVE_QUEUE_SENTINEL, &keys::address_key(account))?;
        tracing::debug!(%account, "marked candidate for removal next epoch");
        Ok(())
    }

    /// Drains `remove_candidates`, deleting every named `candidate` row and
    /// its leading-candidates entry if present.
    pub fn drain_remove_candidates(&self, txn: &WriteTxn) -> Result<Vec<Address>> {
        let raw = txn.get_dup(tables::REMOVE_CANDIDATES, tables::REMOVE_QUEUE_SENTINEL)?;
        let mut removed = Vec::with_capacity(raw.len());
        for bytes in raw {
            txn.del_dup(tables::REMOVE_CANDIDATES, tables::REMOVE_QUEUE_SENTINEL, &bytes)?;
            let mut addr = [0u8; 32];
            addr.copy_from_slice(&bytes);
            let account = Address(addr);
            if let Some(info) = self.get_candidate(txn, account)? {
                self.remove_from_leading(txn, account, &info)?;
            }
            self.delete_candidate(txn, account)?;
            removed.push(account);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use chain_store::Environment;
    use chain_types::Amount;

    use super::*;

    fn candidate(votes: u128, stake: u128) -> CandidateInfo {
        CandidateInfo {
            cur_stake: Amount(stake),
            next_stake: Amount(stake),
            votes_received_weighted: Amount(votes),
            ..Default::default()
        }
    }

    #[test]
    fn leading_window_evicts_the_minimum_when_full() {
        let env = Environment::in_memory().unwrap();
        let txn = env.begin_write().unwrap();
        let registry = Registry::new();

        for i in 0..DELEGATES_RETIRING {
            let account = Address([i as u8 + 1; 32]);
            registry.candidate_put(&txn, account, &candidate(10 + i as u128, 0)).unwrap();
        }
        let challenger = Address([200u8; 32]);
        registry.candidate_put(&txn, challenger, &candidate(1000, 0)).unwrap();

        let leading = registry.resync_leading(&txn).unwrap();
        assert_eq!(leading.len(), DELEGATES_RETIRING);
        assert!(leading.contains(&challenger));
        // The original minimum (votes = 10) must have been evicted.
        assert!(!leading.contains(&Address([1u8; 32])));
        txn.commit().unwrap();
    }

    #[test]
    fn mark_and_drain_remove_candidates_deletes_the_row() {
        let env = Environment::in_memory().unwrap();
        let txn = env.begin_write().unwrap();
        let registry = Registry::new();
        let account = Address([9u8; 32]);

        registry.candidate_put(&txn, account, &candidate(5, 5)).unwrap();
        registry.mark_remove_candidate(&txn, account).unwrap();
        let removed = registry.drain_remove_candidates(&txn).unwrap();

        assert_eq!(removed, vec![account]);
        assert!(registry.get_candidate(&txn, account).unwrap().is_none());
        txn.commit().unwrap();
    }
}
