use std::path::PathBuf;

use clap::Subcommand;
use serde::{Deserialize, Serialize};

pub mod commands;
pub mod config;

pub use config::Config;

/// Each subcommand submits exactly one governance request (spec §4.G /
/// §6) against the store named by `Config::store_path`, the way the
/// teacher's CLI submits exactly one L1 transaction per subcommand.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the schema version and table contents summary for the store.
    Info,
    /// Open or create the store at the configured path and exit.
    Init,
    /// Seed an account with an initial balance, bypassing the governance
    /// request pipeline (there is no "deposit" request type — spec §1
    /// assumes balances arrive from outside this core).
    Fund {
        account: AddressArg,
        amount: u128,
    },
    /// Show an account's balance, stake, thawing funds and role.
    Account {
        account: AddressArg,
    },
    StartRepresenting {
        account: AddressArg,
        stake: u128,
        #[clap(long, default_value_t = 0)]
        fee: u128,
    },
    StopRepresenting {
        account: AddressArg,
    },
    AnnounceCandidacy {
        account: AddressArg,
        stake: u128,
        #[clap(long, default_value_t = 0)]
        fee: u128,
    },
    RenounceCandidacy {
        account: AddressArg,
    },
    /// `votes` is a comma-separated `candidate:sub_vote` list; `sub_vote`s
    /// must sum to at most `TOTAL_VOTE_UNITS` (spec §4.F).
    Vote {
        account: AddressArg,
        votes: String,
    },
    Proxy {
        account: AddressArg,
        rep: AddressArg,
        lock_proxy: u128,
        #[clap(long, default_value_t = 0)]
        fee: u128,
    },
    Stake {
        account: AddressArg,
        amount: u128,
        #[clap(long, default_value_t = 0)]
        fee: u128,
    },
    Unstake {
        account: AddressArg,
    },
    /// List the current top-k leading candidates (spec §4.E).
    LeadingCandidates {
        #[clap(long, default_value_t = 32)]
        k: usize,
    },
}

/// Hex-encoded 32-byte address, the CLI's textual form of
/// `chain_types::Address`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressArg(pub chain_types::Address);

impl std::str::FromStr for AddressArg {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(AddressArg)
    }
}

impl std::fmt::Display for AddressArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Default on-disk location when neither `--store-path` nor the
/// `GOVERNANCE_STORE` environment variable is set.
pub fn default_store_path() -> PathBuf {
    directories::ProjectDirs::from("", "", "governance-staking-cli")
        .map(|dirs| dirs.data_dir().join("store.redb"))
        .unwrap_or_else(|| PathBuf::from("governance-store.redb"))
}
