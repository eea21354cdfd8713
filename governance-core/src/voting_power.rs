//! Voting-Power Ledger (spec §4.D): two-slot (current, next) voting-power
//! records per representative, promoted lazily, with a fallback snapshot so
//! election tallying within an epoch sees a stable figure.

use chain_store::WriteTxn;
use chain_types::{Address, Amount, Epoch, Result, Snapshot, StoreCodec, VotingPowerFallback, VotingPowerInfo};

use crate::constants::DILUTION_FACTOR;
use crate::keys;
use crate::store_ext::Reader;

#[derive(Clone, Copy, Debug, Default)]
pub struct VotingPowerLedger;

impl VotingPowerLedger {
    pub fn new() -> Self {
        VotingPowerLedger
    }

    fn load<R: Reader>(&self, txn: &R, rep: Address) -> Result<VotingPowerInfo> {
        match txn.get(chain_store::tables::VOTING_POWER, &keys::address_key(rep))? {
            Some(bytes) => Ok(VotingPowerInfo::decode(&bytes).expect("stored VotingPowerInfo is well-formed")),
            None => Ok(VotingPowerInfo::default()),
        }
    }

    /// Raw `(current, next, epoch_modified)` record, for status/debug
    /// surfaces that need the unmediated slots rather than the
    /// fallback-aware figure `get_current_voting_power` returns.
    pub fn info<R: Reader>(&self, txn: &R, rep: Address) -> Result<VotingPowerInfo> {
        self.load(txn, rep)
    }

    fn store(&self, txn: &WriteTxn, rep: Address, vpi: &VotingPowerInfo) -> Result<()> {
        txn.put(chain_store::tables::VOTING_POWER, &keys::address_key(rep), &vpi.encode())?;
        Ok(())
    }

    fn load_fallback(&self, txn: &WriteTxn, rep: Address) -> Result<Option<VotingPowerFallback>> {
        match txn.get(chain_store::tables::VOTING_POWER_FALLBACK, &keys::address_key(rep))? {
            Some(bytes) => Ok(Some(VotingPowerFallback::decode(&bytes).expect("stored VotingPowerFallback is well-formed"))),
            None => Ok(None),
        }
    }

    /// Promotes `next → current` if `epoch_modified < epoch`, recording a
    /// fallback snapshot of the pre-promotion `current` the first time this
    /// happens within `epoch`. Every mutating entry point calls this first.
    pub fn transition_if_necessary(&self, txn: &WriteTxn, rep: Address, epoch: Epoch) -> Result<VotingPowerInfo> {
        let mut vpi = self.load(txn, rep)?;
        if vpi.epoch_modified < epoch {
            let old_current = vpi.current;
            if self.load_fallback(txn, rep)?.map(|f| f.epoch) != Some(epoch) {
                let fallback = VotingPowerFallback { epoch, snapshot: old_current };
                txn.put(chain_store::tables::VOTING_POWER_FALLBACK, &keys::address_key(rep), &fallback.encode())?;
            }
            vpi.current = vpi.next;
            vpi.epoch_modified = epoch;
            self.store(txn, rep, &vpi)?;
        }
        Ok(vpi)
    }

    fn mutate_next(
        &self,
        txn: &WriteTxn,
        rep: Address,
        epoch: Epoch,
        f: impl FnOnce(&mut Snapshot),
    ) -> Result<()> {
        let mut vpi = self.transition_if_necessary(txn, rep, epoch)?;
        f(&mut vpi.next);
        self.store(txn, rep, &vpi)
    }

    pub fn add_self_stake(&self, txn: &WriteTxn, rep: Address, amount: Amount, epoch: Epoch) -> Result<()> {
        self.mutate_next(txn, rep, epoch, |s| s.self_stake = s.self_stake.saturating_add(amount))
    }

    pub fn subtract_self_stake(&self, txn: &WriteTxn, rep: Address, amount: Amount, epoch: Epoch) -> Result<()> {
        self.mutate_next(txn, rep, epoch, |s| s.self_stake = s.self_stake.saturating_sub(amount))
    }

    pub fn add_locked_proxied(&self, txn: &WriteTxn, rep: Address, amount: Amount, epoch: Epoch) -> Result<()> {
        self.mutate_next(txn, rep, epoch, |s| s.locked_proxied = s.locked_proxied.saturating_add(amount))
    }

    pub fn subtract_locked_proxied(&self, txn: &WriteTxn, rep: Address, amount: Amount, epoch: Epoch) -> Result<()> {
        self.mutate_next(txn, rep, epoch, |s| s.locked_proxied = s.locked_proxied.saturating_sub(amount))
    }

    pub fn add_unlocked_proxied(&self, txn: &WriteTxn, rep: Address, amount: Amount, epoch: Epoch) -> Result<()> {
        self.mutate_next(txn, rep, epoch, |s| s.unlocked_proxied = s.unlocked_proxied.saturating_add(amount))
    }

    pub fn subtract_unlocked_proxied(&self, txn: &WriteTxn, rep: Address, amount: Amount, epoch: Epoch) -> Result<()> {
        self.mutate_next(txn, rep, epoch, |s| s.unlocked_proxied = s.unlocked_proxied.saturating_sub(amount))
    }

    /// Spec §4.D `GetCurrentVotingPower`: fallback for `epoch` wins if
    /// present, else `current` if already promoted for `epoch`, else `next`.
    pub fn get_current_voting_power<R: Reader>(&self, txn: &R, rep: Address, epoch: Epoch) -> Result<Amount> {
        Ok(self.current_snapshot(txn, rep, epoch)?.voting_power(DILUTION_FACTOR))
    }

    fn current_snapshot<R: Reader>(&self, txn: &R, rep: Address, epoch: Epoch) -> Result<Snapshot> {
        if let Some(bytes) = txn.get(chain_store::tables::VOTING_POWER_FALLBACK, &keys::address_key(rep))? {
            let fallback = VotingPowerFallback::decode(&bytes).expect("stored VotingPowerFallback is well-formed");
            if fallback.epoch == epoch {
                return Ok(fallback.snapshot);
            }
        }
        let vpi = self.load(txn, rep)?;
        if vpi.epoch_modified >= epoch {
            Ok(vpi.current)
        } else {
            Ok(vpi.next)
        }
    }

    /// A rep's record is deleted only when the rep itself is removed from
    /// the registry and both slots are zero (spec §4.D) — callers invoke
    /// this from the registry's deferred-removal drain, never eagerly.
    pub fn try_delete(&self, txn: &WriteTxn, rep: Address) -> Result<()> {
        let vpi = self.load(txn, rep)?;
        if vpi.both_slots_zero() {
            txn.del(chain_store::tables::VOTING_POWER, &keys::address_key(rep))?;
            txn.del(chain_store::tables::VOTING_POWER_FALLBACK, &keys::address_key(rep))?;
        }
        Ok(())
    }
}
