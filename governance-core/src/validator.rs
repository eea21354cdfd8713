//! Governance Request Validator (spec §4.G): the per-account state machine
//! that decides whether a governance request is admissible and, once
//! admitted, applies its effect. `validate` never mutates; `apply` assumes
//! `validate` has already succeeded against the same snapshot and halts the
//! process rather than leave inconsistent state if an in-apply invariant is
//! violated (spec §7 "Applied requests cannot fail partway through").

use chain_store::WriteTxn;
use chain_types::{
    Account, Address, Amount, CandidateInfo, Epoch, GovernanceError, RepInfo, Request, RequestBody, Result,
};

use crate::constants::{MIN_DELEGATE_STAKE, MIN_REP_STAKE, TOTAL_VOTE_UNITS};
use crate::election::ElectionManager;
use crate::registry::Registry;
use crate::staking::StakingEngine;
use crate::store_ext::Reader;
use crate::voting_power::VotingPowerLedger;

#[derive(Clone, Copy, Debug, Default)]
pub struct RequestValidator {
    registry: Registry,
    staking: StakingEngine,
    voting_power: VotingPowerLedger,
    election: ElectionManager,
}

impl RequestValidator {
    pub fn new() -> Self {
        RequestValidator::default()
    }

    /// Checks the subchain link and the dead-period rule common to every
    /// request type, then dispatches to the per-variant rule (spec §4.G).
    /// Read-only: takes `&R` so it can run against a read transaction ahead
    /// of the write that `apply` performs.
    pub fn validate<R: Reader>(&self, txn: &R, request: &Request, current_epoch: Epoch, account: &Account) -> Result<()> {
        if request.header.governance_subchain_prev != account.governance_subchain_head {
            return Err(GovernanceError::BadSubchain(request.header.origin));
        }

        // Dead period (spec §4.G / §5 "closes the race where two epoch
        // boundaries overlap"): a request naming the epoch immediately
        // after the stored tip is only admissible once the caller's own
        // notion of the live epoch agrees that epoch has actually started.
        // Disagreement means the request was built against a tip that has
        // since moved (or not yet moved) relative to what the caller
        // expects, i.e. it straddles an in-flight epoch boundary.
        let tip_epoch = self.election.tip_epoch(txn)?;
        if request.header.epoch_num == tip_epoch.next() && current_epoch != tip_epoch.next() {
            return Err(GovernanceError::DeadPeriod(request.header.epoch_num));
        }

        let origin = request.header.origin;
        let fee = request.header.fee;
        match &request.body {
            RequestBody::StartRepresenting { stake } => {
                self.validate_start_representing(txn, origin, account, *stake, current_epoch, fee)
            },
            RequestBody::StopRepresenting => self.validate_stop_representing(txn, origin),
            RequestBody::AnnounceCandidacy { stake, .. } => {
                self.validate_announce_candidacy(txn, origin, account, *stake, current_epoch, fee)
            },
            RequestBody::RenounceCandidacy => self.validate_renounce_candidacy(txn, origin),
            RequestBody::ElectionVote { votes } => self.validate_election_vote(txn, origin, votes, current_epoch),
            RequestBody::Proxy { rep, lock_proxy } => {
                self.validate_proxy(txn, origin, account, *rep, *lock_proxy, current_epoch, fee)
            },
            RequestBody::Stake { amount } => self.validate_stake(txn, origin, account, *amount, current_epoch, fee),
            RequestBody::Unstake => self.validate_unstake(txn, origin),
        }
    }

    /// Applies a request already accepted by `validate` against the same
    /// snapshot, mutating `account` and the tables `validate` read.
    pub fn apply(&self, txn: &WriteTxn, request: &Request, timestamp: u64, current_epoch: Epoch, account: &mut Account) -> Result<()> {
        let _ = timestamp;
        let origin = request.header.origin;
        match &request.body {
            RequestBody::StartRepresenting { stake } => self.apply_start_representing(txn, origin, account, *stake, current_epoch)?,
            RequestBody::StopRepresenting => self.registry.mark_remove_rep(txn, origin)?,
            RequestBody::AnnounceCandidacy { stake, bls_key, ecies_key } => {
                self.apply_announce_candidacy(txn, origin, account, *stake, *bls_key, *ecies_key, current_epoch)?
            },
            RequestBody::RenounceCandidacy => self.registry.mark_remove_candidate(txn, origin)?,
            RequestBody::ElectionVote { votes } => self.apply_election_vote(txn, origin, votes, current_epoch, request.hash())?,
            RequestBody::Proxy { lock_proxy, rep } => self.apply_proxy(txn, origin, account, *lock_proxy, *rep, current_epoch)?,
            RequestBody::Stake { amount } => self.apply_stake(txn, origin, account, *amount, current_epoch)?,
            RequestBody::Unstake => self.apply_unstake(txn, origin, account, current_epoch)?,
        }
        // `can_satisfy` validated that available_balance covers amount + fee
        // (spec §4.C), so the fee comes out of what the request's own effect
        // left behind rather than being reserved up front.
        let fee = request.header.fee;
        account.available_balance = account.available_balance.saturating_sub(fee);
        account.balance = account.balance.saturating_sub(fee);
        account.governance_subchain_head = request.hash();
        Ok(())
    }

    // -- StartRepresenting ------------------------------------------------

    fn validate_start_representing<R: Reader>(
        &self,
        txn: &R,
        origin: Address,
        account: &Account,
        stake: Amount,
        epoch: Epoch,
        fee: Amount,
    ) -> Result<()> {
        if self.registry.get_rep(txn, origin)?.is_some() {
            return Err(GovernanceError::AlreadyRepresentative(origin));
        }
        if stake < MIN_REP_STAKE {
            return Err(GovernanceError::InsufficientStake { have: stake, required: MIN_REP_STAKE });
        }
        if !self.staking.can_satisfy(txn, origin, account, stake, origin, epoch, fee)? {
            return Err(GovernanceError::InsufficientBalance(origin));
        }
        Ok(())
    }

    fn apply_start_representing(&self, txn: &WriteTxn, origin: Address, account: &mut Account, stake: Amount, epoch: Epoch) -> Result<()> {
        self.registry.put_rep(txn, origin, &RepInfo::default())?;
        self.staking.stake(txn, origin, account, stake, origin, epoch)
    }

    // -- StopRepresenting ---------------------------------------------------

    fn validate_stop_representing<R: Reader>(&self, txn: &R, origin: Address) -> Result<()> {
        if self.registry.get_rep(txn, origin)?.is_none() {
            return Err(GovernanceError::NotRepresentative(origin));
        }
        if self.registry.get_candidate(txn, origin)?.is_some() {
            return Err(GovernanceError::AlreadyCandidate(origin));
        }
        Ok(())
    }

    // -- AnnounceCandidacy --------------------------------------------------

    fn validate_announce_candidacy<R: Reader>(
        &self,
        txn: &R,
        origin: Address,
        account: &Account,
        stake: Amount,
        epoch: Epoch,
        fee: Amount,
    ) -> Result<()> {
        if self.registry.get_candidate(txn, origin)?.is_some() {
            return Err(GovernanceError::AlreadyCandidate(origin));
        }
        if self.election.is_current_delegate(txn, origin)? {
            return Err(GovernanceError::AlreadyDelegate(origin));
        }
        if stake < MIN_DELEGATE_STAKE {
            return Err(GovernanceError::InsufficientStake { have: stake, required: MIN_DELEGATE_STAKE });
        }
        if !self.staking.can_satisfy(txn, origin, account, stake, origin, epoch, fee)? {
            return Err(GovernanceError::InsufficientBalance(origin));
        }
        Ok(())
    }

    fn apply_announce_candidacy(
        &self,
        txn: &WriteTxn,
        origin: Address,
        account: &mut Account,
        stake: Amount,
        bls_key: chain_types::Hash256,
        ecies_key: chain_types::Hash256,
        epoch: Epoch,
    ) -> Result<()> {
        if self.registry.get_rep(txn, origin)?.is_none() {
            self.registry.put_rep(txn, origin, &RepInfo::default())?;
        }
        self.staking.stake(txn, origin, account, stake, origin, epoch)?;
        let info = CandidateInfo { cur_stake: stake, next_stake: stake, votes_received_weighted: Amount::ZERO, bls_key, ecies_key, epoch_modified: epoch };
        self.registry.candidate_put(txn, origin, &info)
    }

    // -- RenounceCandidacy ----------------------------------------------------

    fn validate_renounce_candidacy<R: Reader>(&self, txn: &R, origin: Address) -> Result<()> {
        if self.registry.get_candidate(txn, origin)?.is_none() {
            return Err(GovernanceError::NotCandidate(origin));
        }
        Ok(())
    }

    // -- ElectionVote ---------------------------------------------------------

    fn validate_election_vote<R: Reader>(
        &self,
        txn: &R,
        origin: Address,
        votes: &[chain_types::VoteAllocation],
        current_epoch: Epoch,
    ) -> Result<()> {
        let rep_info = self.registry.get_rep(txn, origin)?.ok_or(GovernanceError::NotRepresentative(origin))?;
        if rep_info.election_vote_epoch == current_epoch {
            return Err(GovernanceError::BadSubchain(origin));
        }
        let total: u32 = votes.iter().map(|v| v.sub_vote as u32).sum();
        if total > TOTAL_VOTE_UNITS as u32 {
            return Err(GovernanceError::InsufficientStake { have: Amount(total as u128), required: Amount(TOTAL_VOTE_UNITS as u128) });
        }
        for vote in votes {
            if self.registry.get_candidate(txn, vote.candidate)?.is_none() {
                return Err(GovernanceError::NotCandidate(vote.candidate));
            }
        }
        Ok(())
    }

    fn apply_election_vote(
        &self,
        txn: &WriteTxn,
        origin: Address,
        votes: &[chain_types::VoteAllocation],
        current_epoch: Epoch,
        request_hash: chain_types::Hash256,
    ) -> Result<()> {
        let voting_power = self.voting_power.get_current_voting_power(txn, origin, current_epoch)?;
        for vote in votes {
            let weight = Amount(voting_power.0 * vote.sub_vote as u128 / TOTAL_VOTE_UNITS as u128);
            self.election.candidate_add_vote(txn, vote.candidate, weight, current_epoch)?;
        }
        let mut rep_info = self.registry.get_rep(txn, origin)?.unwrap_or_default();
        rep_info.election_vote_tip = request_hash;
        rep_info.election_vote_epoch = current_epoch;
        self.registry.put_rep(txn, origin, &rep_info)
    }

    // -- Proxy ------------------------------------------------------------

    fn validate_proxy<R: Reader>(
        &self,
        txn: &R,
        origin: Address,
        account: &Account,
        rep: Address,
        lock_proxy: Amount,
        epoch: Epoch,
        fee: Amount,
    ) -> Result<()> {
        if self.registry.get_rep(txn, rep)?.is_none() {
            return Err(GovernanceError::NotRepresentative(rep));
        }
        if !self.staking.can_satisfy(txn, origin, account, lock_proxy, rep, epoch, fee)? {
            return Err(GovernanceError::InsufficientBalance(origin));
        }
        Ok(())
    }

    fn apply_proxy(&self, txn: &WriteTxn, origin: Address, account: &mut Account, lock_proxy: Amount, rep: Address, epoch: Epoch) -> Result<()> {
        account.rep = rep;
        self.staking.stake(txn, origin, account, lock_proxy, rep, epoch)
    }

    // -- Stake --------------------------------------------------------------

    fn validate_stake<R: Reader>(
        &self,
        txn: &R,
        origin: Address,
        account: &Account,
        amount: Amount,
        epoch: Epoch,
        fee: Amount,
    ) -> Result<()> {
        if self.registry.get_rep(txn, origin)?.is_none() {
            return Err(GovernanceError::NotRepresentative(origin));
        }
        let required = if self.registry.get_candidate(txn, origin)?.is_some() { MIN_DELEGATE_STAKE } else { MIN_REP_STAKE };
        if amount < required {
            return Err(GovernanceError::InsufficientStake { have: amount, required });
        }
        if !self.staking.can_satisfy(txn, origin, account, amount, origin, epoch, fee)? {
            return Err(GovernanceError::InsufficientBalance(origin));
        }
        Ok(())
    }

    fn apply_stake(&self, txn: &WriteTxn, origin: Address, account: &mut Account, amount: Amount, epoch: Epoch) -> Result<()> {
        self.staking.stake(txn, origin, account, amount, origin, epoch)?;
        if let Some(mut info) = self.registry.get_candidate(txn, origin)? {
            info.next_stake = amount;
            self.registry.candidate_put(txn, origin, &info)?;
        }
        Ok(())
    }

    // -- Unstake --------------------------------------------------------------

    fn validate_unstake<R: Reader>(&self, txn: &R, origin: Address) -> Result<()> {
        if self.registry.get_rep(txn, origin)?.is_some() {
            return Err(GovernanceError::AlreadyRepresentative(origin));
        }
        if self.registry.get_candidate(txn, origin)?.is_some() {
            return Err(GovernanceError::AlreadyCandidate(origin));
        }
        Ok(())
    }

    fn apply_unstake(&self, txn: &WriteTxn, origin: Address, account: &mut Account, epoch: Epoch) -> Result<()> {
        let Some(current) = self.staking.get_current_staked_funds(txn, origin)? else {
            return Ok(());
        };
        self.staking.stake(txn, origin, account, Amount::ZERO, current.target, epoch)
    }
}

#[cfg(test)]
mod tests {
    use chain_store::Environment;
    use chain_types::{Hash256, RequestBody, RequestHeader};

    use super::*;

    fn request(origin: Address, prev: Hash256, epoch: Epoch, body: RequestBody) -> Request {
        Request {
            header: RequestHeader {
                origin,
                previous: Hash256::ZERO,
                sequence: 0,
                fee: Amount::ZERO,
                epoch_num: epoch,
                governance_subchain_prev: prev,
            },
            body,
            signature: Vec::new(),
        }
    }

    #[test]
    fn start_representing_requires_the_minimum_stake() {
        let env = Environment::in_memory().unwrap();
        let txn = env.begin_write().unwrap();
        let validator = RequestValidator::new();
        let origin = Address([1u8; 32]);
        let account = Account::new(Amount(1));

        let req = request(origin, Hash256::ZERO, Epoch(1), RequestBody::StartRepresenting { stake: Amount(1) });
        let err = validator.validate(&txn, &req, Epoch(1), &account).unwrap_err();
        assert!(matches!(err, GovernanceError::InsufficientStake { .. }));
        txn.commit().unwrap();
    }

    #[test]
    fn start_representing_then_stake_registers_rep_and_stakes_to_self() {
        let env = Environment::in_memory().unwrap();
        let txn = env.begin_write().unwrap();
        let validator = RequestValidator::new();
        let origin = Address([1u8; 32]);
        let mut account = Account::new(MIN_REP_STAKE.saturating_add(Amount(1_000)));

        let req = request(origin, Hash256::ZERO, Epoch(1), RequestBody::StartRepresenting { stake: MIN_REP_STAKE });
        validator.validate(&txn, &req, Epoch(1), &account).unwrap();
        validator.apply(&txn, &req, 0, Epoch(1), &mut account).unwrap();

        let registry = Registry::new();
        assert!(registry.get_rep(&txn, origin).unwrap().is_some());
        let staking = StakingEngine::new();
        let staked = staking.get_current_staked_funds(&txn, origin).unwrap().unwrap();
        assert_eq!(staked.amount, MIN_REP_STAKE);
        assert_eq!(account.governance_subchain_head, req.hash());
        txn.commit().unwrap();
    }

    #[test]
    fn rejects_a_request_whose_subchain_prev_is_stale() {
        let env = Environment::in_memory().unwrap();
        let txn = env.begin_write().unwrap();
        let validator = RequestValidator::new();
        let origin = Address([1u8; 32]);
        let mut account = Account::new(Amount(10_000_000_000_000_000));
        account.governance_subchain_head = Hash256([9u8; 32]);

        let req = request(origin, Hash256::ZERO, Epoch(1), RequestBody::StartRepresenting { stake: MIN_REP_STAKE });
        let err = validator.validate(&txn, &req, Epoch(1), &account).unwrap_err();
        assert!(matches!(err, GovernanceError::BadSubchain(_)));
        txn.commit().unwrap();
    }

    #[test]
    fn start_representing_rejects_a_declared_stake_the_balance_cannot_cover() {
        let env = Environment::in_memory().unwrap();
        let txn = env.begin_write().unwrap();
        let validator = RequestValidator::new();
        let origin = Address([1u8; 32]);
        // Meets the role minimum but the account has nowhere near enough
        // available balance to actually back it.
        let account = Account::new(MIN_REP_STAKE.saturating_sub(Amount(1)));

        let req = request(origin, Hash256::ZERO, Epoch(1), RequestBody::StartRepresenting { stake: MIN_REP_STAKE });
        let err = validator.validate(&txn, &req, Epoch(1), &account).unwrap_err();
        assert!(matches!(err, GovernanceError::InsufficientBalance(a) if a == origin));
        txn.commit().unwrap();
    }

    #[test]
    fn announce_candidacy_rejects_a_sitting_delegate_elect() {
        use chain_types::{DelegateEntry, EpochBlock, NUM_DELEGATE_SLOTS};

        let env = Environment::in_memory().unwrap();
        let txn = env.begin_write().unwrap();
        let validator = RequestValidator::new();
        let election = ElectionManager::new();
        let origin = Address([1u8; 32]);
        let account = Account::new(Amount(10_000_000_000_000_000));

        let mut delegates = [DelegateEntry::zeroed(); NUM_DELEGATE_SLOTS];
        delegates[0] = DelegateEntry { account: origin, vote: Amount::ZERO, stake: Amount::ZERO, bls_pub: Hash256::ZERO, ecies_pub: Hash256::ZERO, starting_term: true };
        let block = EpochBlock { epoch_number: Epoch(1), previous: Hash256::ZERO, delegates, is_extension: false, timestamp: 0 };
        election.store_epoch_block(&txn, &block).unwrap();

        let req = request(origin, Hash256::ZERO, Epoch(1), RequestBody::AnnounceCandidacy {
            stake: MIN_REP_STAKE,
            bls_key: Hash256::ZERO,
            ecies_key: Hash256::ZERO,
        });
        let err = validator.validate(&txn, &req, Epoch(1), &account).unwrap_err();
        assert!(matches!(err, GovernanceError::AlreadyDelegate(a) if a == origin));
        txn.commit().unwrap();
    }

    #[test]
    fn unstake_rejects_a_still_representing_account() {
        let env = Environment::in_memory().unwrap();
        let txn = env.begin_write().unwrap();
        let validator = RequestValidator::new();
        let registry = Registry::new();
        let origin = Address([1u8; 32]);
        let account = Account::new(Amount(1));
        registry.put_rep(&txn, origin, &RepInfo::default()).unwrap();

        let req = request(origin, Hash256::ZERO, Epoch(1), RequestBody::Unstake);
        let err = validator.validate(&txn, &req, Epoch(1), &account).unwrap_err();
        assert!(matches!(err, GovernanceError::AlreadyRepresentative(_)));
        txn.commit().unwrap();
    }
}
