//! Staking Engine (spec §4.C). Maintains per-account staked funds and an
//! ordered list of thawing funds; moves amounts between available balance,
//! thawing and stake under epoch-aware rules.
//!
//! Grounded line-for-line in `StakingManager` (`staking_manager.cpp`):
//! `Extract`, `StakeAvailableFunds`, `Store`/`Delete`/`UpdateAmountAndStore`,
//! `BeginThawing`, `ReduceStake`, `ChangeTarget`, `Stake`, `Validate`,
//! `PruneThawing`, `GetPruneableThawingAmount`, `MarkThawingAsFrozen`,
//! `SetExpirationOfFrozen`.

use chain_store::{tables, WriteTxn};
use chain_types::{Account, Address, Amount, Epoch, Result, StakedFunds, StoreCodec, ThawingFunds};

use crate::constants::THAWING_PERIOD;
use crate::keys;
use crate::liability::LiabilityLedger;
use crate::store_ext::Reader;
use crate::voting_power::VotingPowerLedger;

#[derive(Clone, Copy, Debug, Default)]
pub struct StakingEngine {
    liabilities: LiabilityLedger,
    voting_power: VotingPowerLedger,
}

impl StakingEngine {
    pub fn new() -> Self {
        StakingEngine::default()
    }

    // -- raw table access --------------------------------------------------

    pub fn get_current_staked_funds<R: Reader>(&self, txn: &R, origin: Address) -> Result<Option<StakedFunds>> {
        match txn.get(tables::STAKING, &keys::address_key(origin))? {
            Some(bytes) => Ok(Some(StakedFunds::decode(&bytes).expect("stored StakedFunds is well-formed"))),
            None => Ok(None),
        }
    }

    /// All of `origin`'s thawing funds, in descending-`expiration_epoch`
    /// order (the `thawing` dup table's native sort order, per the dup-value
    /// encoding in `ThawingFunds::to_dup_value`).
    pub fn get_thawing_funds<R: Reader>(&self, txn: &R, origin: Address) -> Result<Vec<ThawingFunds>> {
        let raw = txn.get_dup(tables::THAWING, &keys::address_key(origin))?;
        Ok(raw
            .iter()
            .map(|bytes| ThawingFunds::from_dup_value(bytes).expect("stored ThawingFunds is well-formed"))
            .collect())
    }

    fn create_staked_funds(&self, txn: &WriteTxn, target: Address, origin: Address) -> Result<StakedFunds> {
        let hash = self.liabilities.create_unexpiring(txn, target, origin, Amount::ZERO)?;
        Ok(StakedFunds::new(target, hash))
    }

    fn create_thawing_funds(&self, txn: &WriteTxn, target: Address, origin: Address, epoch: Epoch) -> Result<ThawingFunds> {
        let expiration_epoch = epoch + THAWING_PERIOD;
        let hash = self.liabilities.create_expiring(txn, target, origin, Amount::ZERO, expiration_epoch)?;
        Ok(ThawingFunds::new(target, expiration_epoch, hash))
    }

    fn store_staked(&self, txn: &WriteTxn, origin: Address, funds: &StakedFunds) -> Result<()> {
        txn.put(tables::STAKING, &keys::address_key(origin), &funds.encode())?;
        self.liabilities.update_amount(txn, funds.liability_hash, funds.amount)
    }

    fn delete_staked(&self, txn: &WriteTxn, origin: Address) -> Result<()> {
        txn.del(tables::STAKING, &keys::address_key(origin))?;
        Ok(())
    }

    fn update_amount_and_store_staked(&self, txn: &WriteTxn, origin: Address, funds: &mut StakedFunds, new_amount: Amount) -> Result<()> {
        funds.amount = new_amount;
        if !funds.amount.is_zero() {
            self.store_staked(txn, origin, funds)
        } else {
            self.delete_staked(txn, origin)?;
            self.liabilities.delete(txn, funds.liability_hash)
        }
    }

    /// Stores `funds`, consolidating with an existing dup entry that shares
    /// `(target, expiration_epoch)`. Returns whether it consolidated.
    fn store_thawing(&self, txn: &WriteTxn, origin: Address, funds: &ThawingFunds) -> Result<bool> {
        for existing_bytes in txn.get_dup(tables::THAWING, &keys::address_key(origin))? {
            let mut existing = ThawingFunds::from_dup_value(&existing_bytes).expect("stored ThawingFunds is well-formed");
            if existing.same_bucket(funds) {
                debug_assert_eq!(existing.liability_hash, funds.liability_hash);
                txn.del_dup(tables::THAWING, &keys::address_key(origin), &existing_bytes)?;
                existing.amount = existing.amount.saturating_add(funds.amount);
                txn.put_dup(tables::THAWING, &keys::address_key(origin), &existing.to_dup_value())?;
                self.liabilities.update_amount(txn, existing.liability_hash, existing.amount)?;
                return Ok(true);
            }
        }
        txn.put_dup(tables::THAWING, &keys::address_key(origin), &funds.to_dup_value())?;
        self.liabilities.update_amount(txn, funds.liability_hash, funds.amount)?;
        Ok(false)
    }

    fn delete_thawing(&self, txn: &WriteTxn, origin: Address, funds: &ThawingFunds) -> Result<()> {
        txn.del_dup(tables::THAWING, &keys::address_key(origin), &funds.to_dup_value())?;
        Ok(())
    }

    fn update_amount_and_store_thawing(&self, txn: &WriteTxn, origin: Address, funds: &mut ThawingFunds, new_amount: Amount) -> Result<()> {
        self.delete_thawing(txn, origin, funds)?;
        funds.amount = new_amount;
        if !funds.amount.is_zero() {
            self.store_thawing(txn, origin, funds)?;
        } else {
            self.liabilities.delete(txn, funds.liability_hash)?;
        }
        Ok(())
    }

    /// Shared core of `Extract<T, R>` (spec §4.C "Extraction contract"):
    /// moves up to `amount_to_extract` from a source fund to a sink fund
    /// whose target may differ, creating the secondary liability that
    /// covers the gap. Returns the amount actually extracted; a refused
    /// secondary liability yields zero (the caller's residue keeps thawing).
    #[allow(clippy::too_many_arguments)]
    fn compute_extraction(
        &self,
        txn: &WriteTxn,
        input_target: Address,
        input_amount: Amount,
        input_expiration: Epoch,
        output_target: Address,
        amount_to_extract: Amount,
        origin: Address,
        epoch: Epoch,
    ) -> Result<Amount> {
        let to_extract = amount_to_extract.min(input_amount);
        if to_extract.is_zero() {
            return Ok(Amount::ZERO);
        }
        if input_target != output_target {
            if input_target == origin {
                return Ok(Amount::ZERO);
            }
            let liability_expiration = if input_expiration.0 == 0 { epoch + THAWING_PERIOD } else { input_expiration };
            let created = self.liabilities.create_secondary(txn, input_target, origin, to_extract, liability_expiration)?;
            if !created {
                return Ok(Amount::ZERO);
            }
        }
        Ok(to_extract)
    }

    fn extract_staked_to_staked(
        &self,
        txn: &WriteTxn,
        origin: Address,
        epoch: Epoch,
        input: &mut StakedFunds,
        output: &mut StakedFunds,
        amount_to_extract: Amount,
    ) -> Result<Amount> {
        let extracted = self.compute_extraction(txn, input.target, input.amount, Epoch(0), output.target, amount_to_extract, origin, epoch)?;
        self.update_amount_and_store_staked(txn, origin, input, input.amount.saturating_sub(extracted))?;
        output.amount = output.amount.saturating_add(extracted);
        Ok(extracted)
    }

    fn extract_staked_to_thawing(
        &self,
        txn: &WriteTxn,
        origin: Address,
        epoch: Epoch,
        input: &mut StakedFunds,
        output: &mut ThawingFunds,
        amount_to_extract: Amount,
    ) -> Result<Amount> {
        let extracted = self.compute_extraction(txn, input.target, input.amount, Epoch(0), output.target, amount_to_extract, origin, epoch)?;
        self.update_amount_and_store_staked(txn, origin, input, input.amount.saturating_sub(extracted))?;
        output.amount = output.amount.saturating_add(extracted);
        Ok(extracted)
    }

    fn extract_thawing_to_staked(
        &self,
        txn: &WriteTxn,
        origin: Address,
        epoch: Epoch,
        input: &mut ThawingFunds,
        output: &mut StakedFunds,
        amount_to_extract: Amount,
    ) -> Result<Amount> {
        let extracted = self.compute_extraction(txn, input.target, input.amount, input.expiration_epoch, output.target, amount_to_extract, origin, epoch)?;
        self.update_amount_and_store_thawing(txn, origin, input, input.amount.saturating_sub(extracted))?;
        output.amount = output.amount.saturating_add(extracted);
        Ok(extracted)
    }

    fn stake_available_funds(&self, account: &mut Account, output: &mut StakedFunds, amount: Amount, origin: Address) {
        if amount > account.available_balance {
            tracing::error!(%origin, have = %account.available_balance, want = %amount, "stake_available_funds: insufficient available balance");
            unreachable!("can_satisfy must have already guaranteed this amount is available");
        }
        account.available_balance = account.available_balance.saturating_sub(amount);
        output.amount = output.amount.saturating_add(amount);
    }

    /// `BeginThawing`: moves `amount_to_thaw` out of `cur_stake` into a new
    /// ThawingFunds record targeting the same rep.
    fn begin_thawing(&self, txn: &WriteTxn, origin: Address, epoch: Epoch, cur_stake: &mut StakedFunds, amount_to_thaw: Amount) -> Result<()> {
        let mut thawing = self.create_thawing_funds(txn, cur_stake.target, origin, epoch)?;
        self.extract_staked_to_thawing(txn, origin, epoch, cur_stake, &mut thawing, amount_to_thaw)?;
        self.store_thawing(txn, origin, &thawing)?;
        Ok(())
    }

    /// `ReduceStake`: subtracts the target's voting-power contribution, then
    /// begins thawing the reduced amount.
    fn reduce_stake(&self, txn: &WriteTxn, origin: Address, epoch: Epoch, cur_stake: &mut StakedFunds, amount_to_thaw: Amount) -> Result<()> {
        if cur_stake.target == origin {
            self.voting_power.subtract_self_stake(txn, cur_stake.target, amount_to_thaw, epoch)?;
        } else {
            self.voting_power.subtract_locked_proxied(txn, cur_stake.target, amount_to_thaw, epoch)?;
        }
        self.begin_thawing(txn, origin, epoch, cur_stake, amount_to_thaw)
    }

    /// `ChangeTarget`: redirects `cur_stake` to `new_target`, extracting as
    /// much as possible and thawing any residue.
    fn change_target(
        &self,
        txn: &WriteTxn,
        origin: Address,
        account: &mut Account,
        epoch: Epoch,
        cur_stake: &mut StakedFunds,
        new_target: Address,
        amount_left: &mut Amount,
    ) -> Result<StakedFunds> {
        if cur_stake.target == origin {
            self.voting_power.subtract_self_stake(txn, cur_stake.target, cur_stake.amount, epoch)?;
        } else {
            self.voting_power.subtract_locked_proxied(txn, cur_stake.target, cur_stake.amount, epoch)?;
            self.voting_power.subtract_unlocked_proxied(txn, cur_stake.target, account.available_balance, epoch)?;
        }

        let mut new_stake = self.create_staked_funds(txn, new_target, origin)?;
        let extracted = self.extract_staked_to_staked(txn, origin, epoch, cur_stake, &mut new_stake, *amount_left)?;
        *amount_left = amount_left.saturating_sub(extracted);

        if new_target == origin {
            self.voting_power.add_self_stake(txn, new_stake.target, new_stake.amount, epoch)?;
        } else {
            self.voting_power.add_locked_proxied(txn, new_stake.target, new_stake.amount, epoch)?;
            self.voting_power.add_unlocked_proxied(txn, new_stake.target, account.available_balance, epoch)?;
        }

        if !cur_stake.amount.is_zero() {
            let residue = cur_stake.amount;
            self.begin_thawing(txn, origin, epoch, cur_stake, residue)?;
        }
        Ok(new_stake)
    }

    /// `Stake`: the staking engine's single entry point (spec §4.C
    /// Algorithm). Makes `origin`'s staked funds equal `amount` to `target`.
    /// `account` must already reflect `governance_subchain_head`/`rep`
    /// current at the time of the call (the validator enforces ordering
    /// before invoking this).
    pub fn stake(&self, txn: &WriteTxn, origin: Address, account: &mut Account, amount: Amount, target: Address, epoch: Epoch) -> Result<()> {
        let mut amount_left = amount;
        let existing = self.get_current_staked_funds(txn, origin)?;
        let mut cur_stake = match &existing {
            Some(funds) => funds.clone(),
            None => {
                let funds = self.create_staked_funds(txn, target, origin)?;
                if target != origin {
                    self.voting_power.add_unlocked_proxied(txn, target, account.available_balance, epoch)?;
                }
                funds
            },
        };

        let rep = account.rep;
        if (target != origin && target != rep) || (target == origin && !rep.is_zero()) {
            tracing::error!(%origin, %target, %rep, "stake: target does not match the account's declared rep");
            unreachable!("the validator must reject a Stake request whose target disagrees with account.rep");
        }

        self.liabilities.prune_secondary(txn, origin, epoch)?;

        if target != cur_stake.target && existing.is_some() {
            cur_stake = self.change_target(txn, origin, account, epoch, &mut cur_stake, target, &mut amount_left)?;
        } else if amount_left < cur_stake.amount {
            let amount_to_thaw = cur_stake.amount.saturating_sub(amount_left);
            self.reduce_stake(txn, origin, epoch, &mut cur_stake, amount_to_thaw)?;
            return Ok(());
        } else {
            amount_left = amount_left.saturating_sub(cur_stake.amount);
        }

        if !amount_left.is_zero() {
            if target == origin {
                self.voting_power.add_self_stake(txn, target, amount_left, epoch)?;
            } else {
                self.voting_power.add_locked_proxied(txn, target, amount_left, epoch)?;
            }

            for mut t in self.get_thawing_funds(txn, origin)? {
                if amount_left.is_zero() {
                    break;
                }
                let extracted = self.extract_thawing_to_staked(txn, origin, epoch, &mut t, &mut cur_stake, amount_left)?;
                amount_left = amount_left.saturating_sub(extracted);
            }

            if !amount_left.is_zero() {
                self.stake_available_funds(account, &mut cur_stake, amount_left, origin);
            }
        }

        self.store_staked(txn, origin, &cur_stake)
    }

    /// `GetPruneableThawingAmount`: sum of thawing entries that would be
    /// pruned right now, without mutating anything (used by `can_satisfy`).
    pub fn pruneable_thawing_amount<R: Reader>(&self, txn: &R, origin: Address, account: &Account, cur_epoch: Epoch) -> Result<Amount> {
        if account.epoch_thawing_updated >= cur_epoch {
            return Ok(Amount::ZERO);
        }
        let mut total = Amount::ZERO;
        for t in self.get_thawing_funds(txn, origin)? {
            if t.expiration_epoch.0 != 0 && t.expiration_epoch <= cur_epoch {
                total = total.saturating_add(t.amount);
            }
        }
        Ok(total)
    }

    /// `PruneThawing`: deletes matured thawing entries, crediting their
    /// amount to `available_balance`. A no-op if already run for `cur_epoch`.
    pub fn prune_thawing(&self, txn: &WriteTxn, origin: Address, account: &mut Account, cur_epoch: Epoch) -> Result<()> {
        if account.epoch_thawing_updated >= cur_epoch {
            return Ok(());
        }
        account.epoch_thawing_updated = cur_epoch;

        for t in self.get_thawing_funds(txn, origin)? {
            if t.expiration_epoch.0 != 0 && t.expiration_epoch <= cur_epoch {
                self.delete_thawing(txn, origin, &t)?;
                self.liabilities.delete(txn, t.liability_hash)?;
                account.available_balance = account.available_balance.saturating_add(t.amount);
            }
        }
        Ok(())
    }

    /// `can_satisfy` (spec §4.C validation helper): true iff the account can
    /// cover `amount + fee` using available balance, pruneable thawing, and
    /// (where a secondary liability is still permitted) existing stake and
    /// thawing targeting some other rep.
    pub fn can_satisfy<R: Reader>(&self, txn: &R, origin: Address, account: &Account, amount: Amount, target: Address, epoch: Epoch, fee: Amount) -> Result<bool> {
        let pruneable = self.pruneable_thawing_amount(txn, origin, account, epoch)?;
        let available = account.available_balance.saturating_sub(fee).saturating_add(pruneable);

        if available >= amount {
            return Ok(true);
        }
        let mut remaining = amount.saturating_sub(available);
        let mut secondary_target: Option<Address> = None;

        if let Some(cur_stake) = self.get_current_staked_funds(txn, origin)? {
            if !cur_stake.amount.is_zero() {
                let compatible = cur_stake.target == target || self.probe_secondary(txn, origin, cur_stake.target, target, &mut secondary_target)?;
                if compatible {
                    if cur_stake.amount >= remaining {
                        return Ok(true);
                    }
                    remaining = remaining.saturating_sub(cur_stake.amount);
                }
            }
        }

        for t in self.get_thawing_funds(txn, origin)? {
            let compatible = t.target == target || self.probe_secondary(txn, origin, t.target, target, &mut secondary_target)?;
            if compatible {
                if t.amount >= remaining {
                    return Ok(true);
                }
                remaining = remaining.saturating_sub(t.amount);
            }
        }
        Ok(false)
    }

    /// Spec §4.C / the original's `Validate` helper: caches whether a
    /// secondary liability to `liability_target` could be created, and
    /// rejects a second distinct target once one has already been chosen —
    /// the uniqueness invariant (spec §4.B) means at most one conflicting
    /// target's worth of extraction can ever actually apply.
    fn probe_secondary<R: Reader>(&self, txn: &R, origin: Address, liability_target: Address, target: Address, already_chosen: &mut Option<Address>) -> Result<bool> {
        let _ = target;
        if let Some(chosen) = already_chosen {
            return Ok(*chosen == liability_target);
        }
        let can = self.liabilities.can_create_secondary(txn, origin, liability_target)?;
        if can {
            *already_chosen = Some(liability_target);
        }
        Ok(can)
    }

    /// `MarkThawingAsFrozen`: when `origin` becomes an elected delegate,
    /// every ThawingFunds targeting `origin` with
    /// `expiration_epoch == epoch_created + THAWING_PERIOD` is frozen.
    pub fn mark_frozen(&self, txn: &WriteTxn, origin: Address, epoch_created: Epoch) -> Result<()> {
        let epoch_to_freeze = epoch_created + THAWING_PERIOD;
        for mut t in self.get_thawing_funds(txn, origin)? {
            if t.expiration_epoch == epoch_to_freeze && t.target == origin {
                self.delete_thawing(txn, origin, &t)?;
                self.liabilities.delete(txn, t.liability_hash)?;
                t.expiration_epoch = Epoch(0);
                t.liability_hash = self.liabilities.create_unexpiring(txn, t.target, origin, t.amount)?;
                self.store_thawing(txn, origin, &t)?;
            } else if t.expiration_epoch < epoch_to_freeze {
                break;
            }
        }
        Ok(())
    }

    /// `SetExpirationOfFrozen`: when `origin` leaves the delegate set, every
    /// frozen ThawingFunds is re-dated to a concrete expiration.
    pub fn unfreeze(&self, txn: &WriteTxn, origin: Address, epoch_unfrozen: Epoch) -> Result<()> {
        let expiration_epoch = epoch_unfrozen + THAWING_PERIOD;
        for mut t in self.get_thawing_funds(txn, origin)? {
            if t.expiration_epoch.0 == 0 {
                self.delete_thawing(txn, origin, &t)?;
                self.liabilities.delete(txn, t.liability_hash)?;
                t.expiration_epoch = expiration_epoch;
                t.liability_hash = self.liabilities.create_expiring(txn, t.target, origin, t.amount, expiration_epoch)?;
                self.store_thawing(txn, origin, &t)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chain_store::Environment;

    use super::*;

    #[test]
    fn stake_self_moves_available_balance_into_staked_funds() {
        let env = Environment::in_memory().unwrap();
        let txn = env.begin_write().unwrap();
        let engine = StakingEngine::new();
        let origin = Address([1u8; 32]);
        let mut account = Account::new(Amount(1_000));

        engine.stake(&txn, origin, &mut account, Amount(400), origin, Epoch(1)).unwrap();

        let staked = engine.get_current_staked_funds(&txn, origin).unwrap().unwrap();
        assert_eq!(staked.amount, Amount(400));
        assert_eq!(staked.target, origin);
        assert_eq!(account.available_balance, Amount(600));
        txn.commit().unwrap();
    }

    #[test]
    fn staking_less_than_current_begins_thawing_the_difference() {
        let env = Environment::in_memory().unwrap();
        let txn = env.begin_write().unwrap();
        let engine = StakingEngine::new();
        let origin = Address([1u8; 32]);
        let mut account = Account::new(Amount(1_000));

        engine.stake(&txn, origin, &mut account, Amount(400), origin, Epoch(1)).unwrap();
        engine.stake(&txn, origin, &mut account, Amount(150), origin, Epoch(1)).unwrap();

        let staked = engine.get_current_staked_funds(&txn, origin).unwrap().unwrap();
        assert_eq!(staked.amount, Amount(150));
        let thawing = engine.get_thawing_funds(&txn, origin).unwrap();
        assert_eq!(thawing.len(), 1);
        assert_eq!(thawing[0].amount, Amount(250));
        txn.commit().unwrap();
    }

    #[test]
    fn prune_thawing_credits_matured_funds_and_is_idempotent_per_epoch() {
        let env = Environment::in_memory().unwrap();
        let txn = env.begin_write().unwrap();
        let engine = StakingEngine::new();
        let origin = Address([1u8; 32]);
        let mut account = Account::new(Amount(1_000));

        engine.stake(&txn, origin, &mut account, Amount(400), origin, Epoch(1)).unwrap();
        engine.stake(&txn, origin, &mut account, Amount(0), origin, Epoch(1)).unwrap();
        let matured_epoch = Epoch(1) + THAWING_PERIOD;

        engine.prune_thawing(&txn, origin, &mut account, matured_epoch).unwrap();
        assert_eq!(account.available_balance, Amount(1_000));
        assert!(engine.get_thawing_funds(&txn, origin).unwrap().is_empty());

        let balance_before = account.available_balance;
        engine.prune_thawing(&txn, origin, &mut account, matured_epoch).unwrap();
        assert_eq!(account.available_balance, balance_before);
        txn.commit().unwrap();
    }

    #[test]
    fn can_satisfy_is_true_when_available_balance_alone_covers_it() {
        let env = Environment::in_memory().unwrap();
        let txn = env.begin_write().unwrap();
        let engine = StakingEngine::new();
        let origin = Address([1u8; 32]);
        let account = Account::new(Amount(1_000));

        assert!(engine.can_satisfy(&txn, origin, &account, Amount(500), origin, Epoch(1), Amount(0)).unwrap());
        assert!(!engine.can_satisfy(&txn, origin, &account, Amount(5_000), origin, Epoch(1), Amount(0)).unwrap());
        txn.commit().unwrap();
    }
}
