use redb::{MultimapTableDefinition, TableDefinition};

use crate::error::Result;
use crate::tables::Bytes;

/// A snapshot-consistent, lock-free read transaction.
///
/// Mirrors spec §4.A / §5: any number of these may be open concurrently with
/// each other and with the single in-flight write transaction.
pub struct ReadTxn {
    pub(crate) inner: redb::ReadTransaction,
}

impl ReadTxn {
    pub fn get(&self, table: TableDefinition<'static, Bytes, Bytes>, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let table = self.inner.open_table(table)?;
        Ok(table.get(key)?.map(|guard| guard.value().to_vec()))
    }

    /// All duplicate values stored under `key`, in the table's native sort
    /// order (ascending byte order of the stored value — callers that need
    /// descending-expiration iteration arrange for that in the encoding,
    /// per the Design Notes "Thawing-ordering invariant").
    pub fn get_dup(
        &self,
        table: MultimapTableDefinition<'static, Bytes, Bytes>,
        key: &[u8],
    ) -> Result<Vec<Vec<u8>>> {
        let table = self.inner.open_multimap_table(table)?;
        let mut values = Vec::new();
        for value in table.get(key)? {
            values.push(value?.value().to_vec());
        }
        Ok(values)
    }

    /// Every `(key, value)` pair in `table`, in key order — the `cursor`
    /// contract of spec §4.A used by callers that need a full scan (the
    /// election manager's "scan all candidate rows").
    pub fn iter_all(&self, table: TableDefinition<'static, Bytes, Bytes>) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let table = self.inner.open_table(table)?;
        let mut out = Vec::new();
        for entry in table.iter()? {
            let (key, value) = entry?;
            out.push((key.value().to_vec(), value.value().to_vec()));
        }
        Ok(out)
    }
}

/// The single serialized write transaction. Only one may be open at a time;
/// `chain-store` relies on `redb`'s own single-writer enforcement rather
/// than an additional lock.
pub struct WriteTxn {
    pub(crate) inner: redb::WriteTransaction,
}

impl WriteTxn {
    pub fn get(&self, table: TableDefinition<'static, Bytes, Bytes>, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let table = self.inner.open_table(table)?;
        Ok(table.get(key)?.map(|guard| guard.value().to_vec()))
    }

    pub fn get_dup(
        &self,
        table: MultimapTableDefinition<'static, Bytes, Bytes>,
        key: &[u8],
    ) -> Result<Vec<Vec<u8>>> {
        let table = self.inner.open_multimap_table(table)?;
        let mut values = Vec::new();
        for value in table.get(key)? {
            values.push(value?.value().to_vec());
        }
        Ok(values)
    }

    pub fn put(&self, table: TableDefinition<'static, Bytes, Bytes>, key: &[u8], value: &[u8]) -> Result<()> {
        let mut table = self.inner.open_table(table)?;
        table.insert(key, value)?;
        Ok(())
    }

    pub fn del(&self, table: TableDefinition<'static, Bytes, Bytes>, key: &[u8]) -> Result<()> {
        let mut table = self.inner.open_table(table)?;
        table.remove(key)?;
        Ok(())
    }

    /// Insert one more duplicate value under `key`. A no-op if the exact
    /// `(key, value)` pair is already present (`redb` multimaps dedupe).
    pub fn put_dup(
        &self,
        table: MultimapTableDefinition<'static, Bytes, Bytes>,
        key: &[u8],
        value: &[u8],
    ) -> Result<()> {
        let mut table = self.inner.open_multimap_table(table)?;
        table.insert(key, value)?;
        Ok(())
    }

    /// Delete exactly one duplicate `(key, value)` pair — spec §4.A's
    /// `del_dup`. Other duplicates under the same key are untouched.
    pub fn del_dup(
        &self,
        table: MultimapTableDefinition<'static, Bytes, Bytes>,
        key: &[u8],
        value: &[u8],
    ) -> Result<()> {
        let mut table = self.inner.open_multimap_table(table)?;
        table.remove(key, value)?;
        Ok(())
    }

    /// Every `(key, value)` pair in `table`, in key order.
    pub fn iter_all(&self, table: TableDefinition<'static, Bytes, Bytes>) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let table = self.inner.open_table(table)?;
        let mut out = Vec::new();
        for entry in table.iter()? {
            let (key, value) = entry?;
            out.push((key.value().to_vec(), value.value().to_vec()));
        }
        Ok(out)
    }

    pub fn commit(self) -> Result<()> {
        self.inner.commit()?;
        Ok(())
    }

    pub fn abort(self) {
        // Dropping an uncommitted WriteTransaction rolls it back.
        drop(self.inner);
    }
}
