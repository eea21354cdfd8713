use anyhow::{anyhow, Context, Result};
use chain_store::Environment;
use chain_types::{Account, Address, Amount, Hash256, Request, RequestBody, RequestHeader, VoteAllocation};
use governance_core::election::ElectionManager;
use governance_core::registry::Registry;
use governance_core::staking::StakingEngine;
use governance_core::validator::RequestValidator;

use crate::{AddressArg, Commands, Config};

/// Dispatches one `Commands` variant against the store at
/// `config.store_path`, opening it (creating it if absent) for the
/// duration of the call.
pub fn run(config: &Config, command: Commands) -> Result<()> {
    let env = Environment::open(&config.store_path).context("opening governance store")?;

    match command {
        Commands::Init => {
            tracing::info!(path = %config.store_path.display(), "store initialized");
        },
        Commands::Info => {
            let txn = env.begin_read()?;
            let election = ElectionManager::new();
            let tip = election.tip_epoch(&txn)?;
            println!("store: {}", config.store_path.display());
            println!("tip epoch: {tip}");
        },
        Commands::Fund { account, amount } => {
            let txn = env.begin_write()?;
            let mut acct = governance_core::accounts::load(&txn, account.0)?.unwrap_or_else(|| Account::new(Amount::ZERO));
            acct.balance = acct.balance.saturating_add(Amount(amount));
            acct.available_balance = acct.available_balance.saturating_add(Amount(amount));
            governance_core::accounts::store(&txn, account.0, &acct)?;
            txn.commit()?;
            println!("funded {account} with {amount}");
        },
        Commands::Account { account } => print_account(&env, account.0)?,
        Commands::LeadingCandidates { k } => {
            let txn = env.begin_read()?;
            let election = ElectionManager::new();
            for (address, info) in election.get_election_winners(&txn, k)? {
                println!(
                    "{address}  votes={}  stake={}",
                    info.votes_received_weighted, info.cur_stake
                );
            }
        },
        Commands::StartRepresenting { account, stake, fee } => {
            submit(&env, account.0, Amount(fee), RequestBody::StartRepresenting { stake: Amount(stake) })?
        },
        Commands::StopRepresenting { account } => submit(&env, account.0, Amount::ZERO, RequestBody::StopRepresenting)?,
        Commands::AnnounceCandidacy { account, stake, fee } => submit(
            &env,
            account.0,
            Amount(fee),
            RequestBody::AnnounceCandidacy {
                stake: Amount(stake),
                bls_key: Hash256::ZERO,
                ecies_key: Hash256::ZERO,
            },
        )?,
        Commands::RenounceCandidacy { account } => submit(&env, account.0, Amount::ZERO, RequestBody::RenounceCandidacy)?,
        Commands::Vote { account, votes } => {
            let votes = parse_votes(&votes)?;
            submit(&env, account.0, Amount::ZERO, RequestBody::ElectionVote { votes })?
        },
        Commands::Proxy { account, rep, lock_proxy, fee } => submit(
            &env,
            account.0,
            Amount(fee),
            RequestBody::Proxy { lock_proxy: Amount(lock_proxy), rep: rep.0 },
        )?,
        Commands::Stake { account, amount, fee } => {
            submit(&env, account.0, Amount(fee), RequestBody::Stake { amount: Amount(amount) })?
        },
        Commands::Unstake { account } => submit(&env, account.0, Amount::ZERO, RequestBody::Unstake)?,
    }
    Ok(())
}

/// Parses a `candidate:sub_vote[,candidate:sub_vote...]` list for `Vote`.
fn parse_votes(raw: &str) -> Result<Vec<VoteAllocation>> {
    raw.split(',')
        .map(|entry| {
            let (candidate, sub_vote) = entry
                .split_once(':')
                .ok_or_else(|| anyhow!("expected candidate:sub_vote, got {entry:?}"))?;
            let candidate: AddressArg = candidate.parse().context("invalid candidate address")?;
            let sub_vote: u8 = sub_vote.parse().context("invalid sub_vote")?;
            Ok(VoteAllocation { candidate: candidate.0, sub_vote })
        })
        .collect()
}

/// Loads `origin`'s account, builds a request carrying `body`, validates
/// and applies it in one write transaction, then persists the account and
/// commits. There is no signing or sequencing step here (spec §1: both are
/// the excluded consensus pipeline's job) — `signature` is left empty and
/// `header.previous`/`sequence` are left at their zero defaults.
fn submit(env: &Environment, origin: Address, fee: Amount, body: RequestBody) -> Result<()> {
    let txn = env.begin_write()?;
    let mut account = governance_core::accounts::load(&txn, origin)?
        .ok_or_else(|| anyhow!("unknown account {origin}; use `fund` to create it first"))?;

    let election = ElectionManager::new();
    let epoch = election.tip_epoch(&txn)?;

    let request = Request {
        header: RequestHeader {
            origin,
            previous: Hash256::ZERO,
            sequence: 0,
            fee,
            epoch_num: epoch,
            governance_subchain_prev: account.governance_subchain_head,
        },
        body,
        signature: Vec::new(),
    };

    let validator = RequestValidator::new();
    validator.validate(&txn, &request, epoch, &account)?;
    validator.apply(&txn, &request, 0, epoch, &mut account)?;
    governance_core::accounts::store(&txn, origin, &account)?;
    txn.commit()?;

    tracing::info!(%origin, kind = request.body.kind_name(), "request applied");
    println!("ok: {}", request.body.kind_name());
    Ok(())
}

fn print_account(env: &Environment, address: Address) -> Result<()> {
    let txn = env.begin_read()?;
    let account = governance_core::accounts::load(&txn, address)?.ok_or_else(|| anyhow!("unknown account {address}"))?;
    let staking = StakingEngine::new();
    let registry = Registry::new();

    println!("account:           {address}");
    println!("balance:           {}", account.balance);
    println!("available_balance: {}", account.available_balance);
    println!("rep:               {}", account.rep);

    if let Some(staked) = staking.get_current_staked_funds(&txn, address)? {
        println!("staked:            {} -> {}", staked.amount, staked.target);
    }
    let thawing = staking.get_thawing_funds(&txn, address)?;
    if !thawing.is_empty() {
        println!("thawing entries:   {}", thawing.len());
        for entry in thawing {
            println!("  {} -> {} (expires {})", entry.amount, entry.target, entry.expiration_epoch);
        }
    }
    if registry.get_rep(&txn, address)?.is_some() {
        println!("role:              representative");
    }
    if registry.get_candidate(&txn, address)?.is_some() {
        println!("role:              candidate");
    }
    Ok(())
}
