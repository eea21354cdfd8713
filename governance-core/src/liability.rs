//! Liability Ledger (spec §4.B).
//!
//! Tracks the primary obligations staked/thawing funds owe their target, and
//! the secondary obligations that outlive a target change. The single
//! invariant this module exists to enforce: **no source may hold two
//! secondary liabilities with different targets simultaneously.**

use chain_store::{tables, WriteTxn};
use chain_types::{Address, Amount, Epoch, GovernanceError, Hash256, Liability, LiabilityKind, Result, StoreCodec};
use serde::{Deserialize, Serialize};

use crate::keys;
use crate::store_ext::Reader;

/// A secondary-liability index entry: which target it obligates the source
/// to, and the hash of the full `Liability` record in `master_liabilities`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
struct SecondaryRef {
    target: Address,
    hash: Hash256,
}

/// Stateless handle onto the liability tables — constructed once at the
/// node's construction point and passed by reference (spec §9: "pass a
/// context or handle, do not reach for globals").
#[derive(Clone, Copy, Debug, Default)]
pub struct LiabilityLedger;

impl LiabilityLedger {
    pub fn new() -> Self {
        LiabilityLedger
    }

    fn load<R: Reader>(&self, txn: &R, hash: Hash256) -> Result<Option<Liability>> {
        match txn.get(tables::MASTER_LIABILITIES, &keys::hash_key(hash))? {
            Some(bytes) => Ok(Some(Liability::decode(&bytes).expect("stored Liability is well-formed"))),
            None => Ok(None),
        }
    }

    fn store(&self, txn: &WriteTxn, liability: &Liability) -> Result<()> {
        let hash = liability.compute_hash();
        txn.put(tables::MASTER_LIABILITIES, &keys::hash_key(hash), &liability.encode())?;
        Ok(())
    }

    /// Creates an unexpiring primary liability for a `StakedFunds` record.
    pub fn create_unexpiring(&self, txn: &WriteTxn, target: Address, source: Address, amount: Amount) -> Result<Hash256> {
        let liability = Liability::new(source, target, amount, Epoch(0), LiabilityKind::UnexpiringPrimary);
        self.store(txn, &liability)?;
        tracing::debug!(%source, %target, %amount, "created unexpiring liability");
        Ok(liability.compute_hash())
    }

    /// Creates an expiring primary liability for a `ThawingFunds` record.
    pub fn create_expiring(
        &self,
        txn: &WriteTxn,
        target: Address,
        source: Address,
        amount: Amount,
        expiration_epoch: Epoch,
    ) -> Result<Hash256> {
        let liability = Liability::new(source, target, amount, expiration_epoch, LiabilityKind::ExpiringPrimary);
        self.store(txn, &liability)?;
        tracing::debug!(%source, %target, %amount, %expiration_epoch, "created expiring liability");
        Ok(liability.compute_hash())
    }

    /// Returns `false` (refusing creation) if `source` already holds a
    /// secondary liability with a *different* target — callers must treat
    /// `false` as "request cannot be satisfied" rather than retrying.
    pub fn create_secondary(
        &self,
        txn: &WriteTxn,
        target: Address,
        source: Address,
        amount: Amount,
        expiration_epoch: Epoch,
    ) -> Result<bool> {
        if !self.can_create_secondary(txn, source, target)? {
            return Ok(false);
        }

        let liability = Liability::new(source, target, amount, expiration_epoch, LiabilityKind::Secondary);
        let hash = liability.compute_hash();

        if self.load(txn, hash)?.is_some() {
            // Same (source, target, expiration) — consolidate rather than
            // duplicate the index entries.
            self.consolidate(txn, hash, amount)?;
            return Ok(true);
        }

        self.store(txn, &liability)?;
        let secondary_ref = SecondaryRef { target, hash };
        txn.put_dup(
            tables::SECONDARY_LIABILITIES,
            &keys::address_key(source),
            &bincode::serialize(&secondary_ref).expect("SecondaryRef is always encodable"),
        )?;
        txn.put_dup(tables::REP_LIABILITIES, &keys::address_key(target), &keys::hash_key(hash))?;
        tracing::debug!(%source, %target, %amount, %expiration_epoch, "created secondary liability");
        Ok(true)
    }

    /// `true` iff creating a secondary liability from `source` to `target`
    /// would not violate the single-target uniqueness invariant.
    pub fn can_create_secondary<R: Reader>(&self, txn: &R, source: Address, target: Address) -> Result<bool> {
        let existing = txn.get_dup(tables::SECONDARY_LIABILITIES, &keys::address_key(source))?;
        for bytes in existing {
            let secondary_ref: SecondaryRef =
                bincode::deserialize(&bytes).expect("stored SecondaryRef is well-formed");
            if secondary_ref.target != target {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn update_amount(&self, txn: &WriteTxn, hash: Hash256, new_amount: Amount) -> Result<()> {
        let mut liability = match self.load(txn, hash)? {
            Some(liability) => liability,
            None => {
                tracing::error!(%hash, "update_amount on a liability that does not exist");
                unreachable!("applied requests never reference a liability hash that was not created first");
            },
        };
        liability.amount = new_amount;
        self.store(txn, &liability)
    }

    /// Adds `delta` to an existing liability's amount — used when a
    /// primary liability's backing funds are added to; the hash is stable
    /// (same target+expiration+source) so amounts are summed.
    pub fn consolidate(&self, txn: &WriteTxn, hash: Hash256, delta: Amount) -> Result<()> {
        let current = match self.load(txn, hash)? {
            Some(liability) => liability.amount,
            None => {
                tracing::error!(%hash, "consolidate on a liability that does not exist");
                unreachable!("applied requests never reference a liability hash that was not created first");
            },
        };
        self.update_amount(txn, hash, current.saturating_add(delta))
    }

    pub fn delete(&self, txn: &WriteTxn, hash: Hash256) -> Result<()> {
        let Some(liability) = self.load(txn, hash)? else {
            return Ok(());
        };
        txn.del(tables::MASTER_LIABILITIES, &keys::hash_key(hash))?;
        if liability.kind == LiabilityKind::Secondary {
            let secondary_ref = SecondaryRef { target: liability.target, hash };
            txn.del_dup(
                tables::SECONDARY_LIABILITIES,
                &keys::address_key(liability.source),
                &bincode::serialize(&secondary_ref).expect("SecondaryRef is always encodable"),
            )?;
            txn.del_dup(tables::REP_LIABILITIES, &keys::address_key(liability.target), &keys::hash_key(hash))?;
        }
        tracing::debug!(%hash, "deleted liability");
        Ok(())
    }

    /// Removes secondary liabilities belonging to `source` whose
    /// `expiration_epoch <= current_epoch`. Secondary liabilities are a
    /// pure overlay constraint — they do not themselves hold funds, so
    /// pruning one never changes `balance`/`available_balance`; it only
    /// lifts the "cannot rebind to a conflicting target" restriction.
    pub fn prune_secondary(&self, txn: &WriteTxn, source: Address, current_epoch: Epoch) -> Result<()> {
        let refs = txn.get_dup(tables::SECONDARY_LIABILITIES, &keys::address_key(source))?;
        for bytes in refs {
            let secondary_ref: SecondaryRef =
                bincode::deserialize(&bytes).expect("stored SecondaryRef is well-formed");
            if let Some(liability) = self.load(txn, secondary_ref.hash)? {
                if liability.expiration_epoch.0 != 0 && liability.expiration_epoch <= current_epoch {
                    self.delete(txn, secondary_ref.hash)?;
                }
            }
        }
        Ok(())
    }

    pub fn get<R: Reader>(&self, txn: &R, hash: Hash256) -> Result<Option<Liability>> {
        self.load(txn, hash)
    }
}

/// Helper so callers can treat a refused secondary-liability creation as an
/// explicit error at call sites that want to `?`-propagate instead of
/// branching on a bool (the staking engine itself branches, per spec §4.C
/// step 4: "if that fails, the extraction produces zero and the residue
/// thaws anyway" — this is only for the validator's preflight path).
pub fn require_secondary(created: bool) -> Result<()> {
    if created {
        Ok(())
    } else {
        Err(GovernanceError::LiabilityConflict)
    }
}

#[cfg(test)]
mod tests {
    use chain_store::Environment;

    use super::*;

    #[test]
    fn create_secondary_refuses_a_conflicting_target() {
        let env = Environment::in_memory().unwrap();
        let txn = env.begin_write().unwrap();
        let ledger = LiabilityLedger::new();
        let source = Address([1u8; 32]);
        let target_a = Address([2u8; 32]);
        let target_b = Address([3u8; 32]);

        assert!(ledger.create_secondary(&txn, target_a, source, Amount(10), Epoch(5)).unwrap());
        assert!(!ledger.create_secondary(&txn, target_b, source, Amount(10), Epoch(5)).unwrap());
        assert!(!ledger.can_create_secondary(&txn, source, target_b).unwrap());
        txn.commit().unwrap();
    }

    #[test]
    fn create_secondary_consolidates_the_same_target_and_expiration() {
        let env = Environment::in_memory().unwrap();
        let txn = env.begin_write().unwrap();
        let ledger = LiabilityLedger::new();
        let source = Address([1u8; 32]);
        let target = Address([2u8; 32]);

        assert!(ledger.create_secondary(&txn, target, source, Amount(10), Epoch(5)).unwrap());
        assert!(ledger.create_secondary(&txn, target, source, Amount(5), Epoch(5)).unwrap());

        let refs = txn.get_dup(tables::SECONDARY_LIABILITIES, &keys::address_key(source)).unwrap();
        assert_eq!(refs.len(), 1);
        let secondary_ref: SecondaryRef = bincode::deserialize(&refs[0]).unwrap();
        let liability = ledger.get(&txn, secondary_ref.hash).unwrap().unwrap();
        assert_eq!(liability.amount, Amount(15));
        txn.commit().unwrap();
    }

    #[test]
    fn prune_secondary_deletes_only_expired_entries() {
        let env = Environment::in_memory().unwrap();
        let txn = env.begin_write().unwrap();
        let ledger = LiabilityLedger::new();
        let source = Address([1u8; 32]);
        let target = Address([2u8; 32]);

        ledger.create_secondary(&txn, target, source, Amount(10), Epoch(5)).unwrap();
        ledger.prune_secondary(&txn, source, Epoch(3)).unwrap();
        assert!(!ledger.can_create_secondary(&txn, source, Address([9u8; 32])).unwrap());

        ledger.prune_secondary(&txn, source, Epoch(5)).unwrap();
        assert!(ledger.can_create_secondary(&txn, source, Address([9u8; 32])).unwrap());
        txn.commit().unwrap();
    }

    #[test]
    fn delete_removes_both_secondary_indices() {
        let env = Environment::in_memory().unwrap();
        let txn = env.begin_write().unwrap();
        let ledger = LiabilityLedger::new();
        let source = Address([1u8; 32]);
        let target = Address([2u8; 32]);

        ledger.create_secondary(&txn, target, source, Amount(10), Epoch(5)).unwrap();
        let refs = txn.get_dup(tables::SECONDARY_LIABILITIES, &keys::address_key(source)).unwrap();
        let secondary_ref: SecondaryRef = bincode::deserialize(&refs[0]).unwrap();

        ledger.delete(&txn, secondary_ref.hash).unwrap();
        assert!(ledger.get(&txn, secondary_ref.hash).unwrap().is_none());
        assert!(txn.get_dup(tables::SECONDARY_LIABILITIES, &keys::address_key(source)).unwrap().is_empty());
        assert!(txn.get_dup(tables::REP_LIABILITIES, &keys::address_key(target)).unwrap().is_empty());
        txn.commit().unwrap();
    }
}
