//! Named tables backing the persisted state layout (spec §3 / §6).
//!
//! Every value is an opaque byte string — `chain-types` owns the encoding,
//! this crate only moves bytes in and out of the engine. Tables whose keys
//! are declared `dup` in spec §4.A are backed by `redb`'s native multimap
//! tables, which keep values for one key sorted and deduplicated for free.

use redb::{MultimapTableDefinition, TableDefinition};

pub type Bytes<'a> = &'a [u8];

macro_rules! table {
    ($name:ident, $table_name:literal) => {
        pub const $name: TableDefinition<'static, Bytes, Bytes> =
            TableDefinition::new($table_name);
    };
}

macro_rules! dup_table {
    ($name:ident, $table_name:literal) => {
        pub const $name: MultimapTableDefinition<'static, Bytes, Bytes> =
            MultimapTableDefinition::new($table_name);
    };
}

table!(META, "meta");
table!(ACCOUNT, "account");
table!(REQUEST, "request");
table!(REQUEST_BLOCK, "request_block");
table!(EPOCH, "epoch");
table!(EPOCH_TIP, "epoch_tip");
table!(MICRO_BLOCK, "micro_block");
table!(MICRO_BLOCK_TIP, "micro_block_tip");
table!(REQUEST_TIP, "request_tip");
table!(REPRESENTATIVE, "representative");
table!(CANDIDATE, "candidate");
table!(VOTING_POWER, "voting_power");
table!(VOTING_POWER_FALLBACK, "voting_power_fallback");
table!(STAKING, "staking");
table!(MASTER_LIABILITIES, "master_liabilities");
table!(EPOCH_REWARDS, "epoch_rewards");
table!(GLOBAL_EPOCH_REWARDS, "global_epoch_rewards");

dup_table!(THAWING, "thawing");
dup_table!(LEADING_CANDIDATES, "leading_candidates");
dup_table!(REMOVE_CANDIDATES, "remove_candidates");
dup_table!(REMOVE_REPS, "remove_reps");
dup_table!(REP_LIABILITIES, "rep_liabilities");
dup_table!(SECONDARY_LIABILITIES, "secondary_liabilities");

/// Key under which `remove_candidates` / `remove_reps` park their
/// duplicate-key queues (spec §4.E: "a single sentinel key").
pub const REMOVE_QUEUE_SENTINEL: Bytes = b"\0";

/// Key `meta` stores the schema version under.
pub const SCHEMA_VERSION_KEY: Bytes = b"schema_version";

/// Current on-disk schema version this binary writes and expects.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;
