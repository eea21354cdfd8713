//! Byte-key conventions for the tables in `chain_store::tables`. Kept in one
//! place so every manager agrees on how an `Address`/`Hash256` becomes a
//! store key.

use chain_types::{Address, Hash256};

pub fn address_key(address: Address) -> [u8; 32] {
    address.0
}

pub fn hash_key(hash: Hash256) -> [u8; 32] {
    hash.0
}

pub const EPOCH_TIP_SENTINEL: &[u8] = b"tip";
