//! A small capability trait so read-only query helpers can run against
//! either a `ReadTxn` or a `WriteTxn` without duplicating every lookup.
//! Mutations still take `&WriteTxn` directly — only the read path is
//! generalized.

use chain_store::tables::Bytes;
use chain_store::{MultimapTableDefinition, ReadTxn, Result, TableDefinition, WriteTxn};

pub trait Reader {
    fn get(&self, table: TableDefinition<'static, Bytes, Bytes>, key: &[u8]) -> Result<Option<Vec<u8>>>;
    fn get_dup(&self, table: MultimapTableDefinition<'static, Bytes, Bytes>, key: &[u8]) -> Result<Vec<Vec<u8>>>;
    fn iter_all(&self, table: TableDefinition<'static, Bytes, Bytes>) -> Result<Vec<(Vec<u8>, Vec<u8>)>>;
}

impl Reader for ReadTxn {
    fn get(&self, table: TableDefinition<'static, Bytes, Bytes>, key: &[u8]) -> Result<Option<Vec<u8>>> {
        ReadTxn::get(self, table, key)
    }

    fn get_dup(&self, table: MultimapTableDefinition<'static, Bytes, Bytes>, key: &[u8]) -> Result<Vec<Vec<u8>>> {
        ReadTxn::get_dup(self, table, key)
    }

    fn iter_all(&self, table: TableDefinition<'static, Bytes, Bytes>) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        ReadTxn::iter_all(self, table)
    }
}

impl Reader for WriteTxn {
    fn get(&self, table: TableDefinition<'static, Bytes, Bytes>, key: &[u8]) -> Result<Option<Vec<u8>>> {
        WriteTxn::get(self, table, key)
    }

    fn get_dup(&self, table: MultimapTableDefinition<'static, Bytes, Bytes>, key: &[u8]) -> Result<Vec<Vec<u8>>> {
        WriteTxn::get_dup(self, table, key)
    }

    fn iter_all(&self, table: TableDefinition<'static, Bytes, Bytes>) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        WriteTxn::iter_all(self, table)
    }
}
