//! Store Adapter (spec §4.A).
//!
//! A typed `get`/`put`/`del`/`del_dup`/`cursor` surface over an embedded
//! ordered, transactional, duplicate-key-capable key/value engine. Every
//! value is an opaque byte string — callers (`chain-types`, `governance-core`)
//! own serialization; this crate only moves bytes through `redb`.

mod env;
mod error;
pub mod tables;
mod txn;

pub use env::Environment;
pub use error::{Result, StoreError};
pub use redb::{MultimapTableDefinition, TableDefinition};
pub use txn::{ReadTxn, WriteTxn};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_del_roundtrip() {
        let env = Environment::in_memory().unwrap();
        let txn = env.begin_write().unwrap();
        txn.put(tables::ACCOUNT, b"alice", b"v1").unwrap();
        assert_eq!(txn.get(tables::ACCOUNT, b"alice").unwrap(), Some(b"v1".to_vec()));
        txn.del(tables::ACCOUNT, b"alice").unwrap();
        assert_eq!(txn.get(tables::ACCOUNT, b"alice").unwrap(), None);
        txn.commit().unwrap();
    }

    #[test]
    fn missing_key_is_none_not_error() {
        let env = Environment::in_memory().unwrap();
        let read = env.begin_read().unwrap();
        assert!(read.get(tables::ACCOUNT, b"nobody").unwrap().is_none());
    }

    #[test]
    fn dup_table_tracks_multiple_values_per_key() {
        let env = Environment::in_memory().unwrap();
        let txn = env.begin_write().unwrap();
        txn.put_dup(tables::THAWING, b"alice", b"entry-1").unwrap();
        txn.put_dup(tables::THAWING, b"alice", b"entry-2").unwrap();
        let mut values = txn.get_dup(tables::THAWING, b"alice").unwrap();
        values.sort();
        assert_eq!(values, vec![b"entry-1".to_vec(), b"entry-2".to_vec()]);

        txn.del_dup(tables::THAWING, b"alice", b"entry-1").unwrap();
        let values = txn.get_dup(tables::THAWING, b"alice").unwrap();
        assert_eq!(values, vec![b"entry-2".to_vec()]);
        txn.commit().unwrap();
    }

    #[test]
    fn reopen_preserves_committed_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.redb");
        {
            let env = Environment::open(&path).unwrap();
            let txn = env.begin_write().unwrap();
            txn.put(tables::ACCOUNT, b"alice", b"v1").unwrap();
            txn.commit().unwrap();
        }
        let env = Environment::open(&path).unwrap();
        let read = env.begin_read().unwrap();
        assert_eq!(read.get(tables::ACCOUNT, b"alice").unwrap(), Some(b"v1".to_vec()));
    }

    #[test]
    fn iter_all_returns_every_entry_in_key_order() {
        let env = Environment::in_memory().unwrap();
        let txn = env.begin_write().unwrap();
        txn.put(tables::ACCOUNT, b"bob", b"v-bob").unwrap();
        txn.put(tables::ACCOUNT, b"alice", b"v-alice").unwrap();
        let entries = txn.iter_all(tables::ACCOUNT).unwrap();
        assert_eq!(entries, vec![(b"alice".to_vec(), b"v-alice".to_vec()), (b"bob".to_vec(), b"v-bob".to_vec())]);
        txn.commit().unwrap();
    }

    #[test]
    fn schema_version_rejects_future_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.redb");
        {
            let env = Environment::open(&path).unwrap();
            let txn = env.begin_write().unwrap();
            txn.put(tables::META, tables::SCHEMA_VERSION_KEY, &(tables::CURRENT_SCHEMA_VERSION + 1).to_be_bytes())
                .unwrap();
            txn.commit().unwrap();
        }
        let err = Environment::open(&path).unwrap_err();
        assert!(matches!(err, StoreError::SchemaTooNew { .. }));
    }
}
