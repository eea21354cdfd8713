//! Minimal load/store for the `account` table. The wider notion of account
//! (keys, non-governance balance history) lives outside this crate — these
//! helpers only move the governance-relevant `Account` fields (spec §3) in
//! and out of the store for managers and tests to share.

use chain_store::{tables, WriteTxn};
use chain_types::{Account, Address, Result, StoreCodec};

use crate::keys;
use crate::store_ext::Reader;

pub fn load<R: Reader>(txn: &R, address: Address) -> Result<Option<Account>> {
    match txn.get(tables::ACCOUNT, &keys::address_key(address))? {
        Some(bytes) => Ok(Some(Account::decode(&bytes).expect("stored Account is well-formed"))),
        None => Ok(None),
    }
}

pub fn store(txn: &WriteTxn, address: Address, account: &Account) -> Result<()> {
    txn.put(tables::ACCOUNT, &keys::address_key(address), &account.encode())?;
    Ok(())
}
