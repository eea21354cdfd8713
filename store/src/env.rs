use std::path::Path;

use redb::backends::InMemoryBackend;
use redb::Database;

use crate::error::{Result, StoreError};
use crate::tables::{self, CURRENT_SCHEMA_VERSION, SCHEMA_VERSION_KEY};
use crate::txn::{ReadTxn, WriteTxn};

/// Owns the embedded engine handle. One `Environment` per process, shared
/// behind the managers built on top of it (spec §9: "pass a context or
/// handle, do not reach for globals").
pub struct Environment {
    db: Database,
}

impl Environment {
    /// Opens (creating if absent) a store rooted at `path`, ensuring every
    /// table named in spec §4.A exists and the schema version is one this
    /// binary understands.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = Database::create(path)?;
        let env = Self { db };
        env.init_tables_and_version()?;
        Ok(env)
    }

    /// An ephemeral, non-persistent store — used by `governance-core`'s and
    /// `staking-cli`'s test suites in place of a real file-backed engine.
    pub fn in_memory() -> Result<Self> {
        let db = Database::builder().create_with_backend(InMemoryBackend::new())?;
        let env = Self { db };
        env.init_tables_and_version()?;
        Ok(env)
    }

    fn init_tables_and_version(&self) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            // Opening a table definition creates it if it does not exist yet.
            txn.open_table(tables::META)?;
            txn.open_table(tables::ACCOUNT)?;
            txn.open_table(tables::REQUEST)?;
            txn.open_table(tables::REQUEST_BLOCK)?;
            txn.open_table(tables::EPOCH)?;
            txn.open_table(tables::EPOCH_TIP)?;
            txn.open_table(tables::MICRO_BLOCK)?;
            txn.open_table(tables::MICRO_BLOCK_TIP)?;
            txn.open_table(tables::REQUEST_TIP)?;
            txn.open_table(tables::REPRESENTATIVE)?;
            txn.open_table(tables::CANDIDATE)?;
            txn.open_table(tables::VOTING_POWER)?;
            txn.open_table(tables::VOTING_POWER_FALLBACK)?;
            txn.open_table(tables::STAKING)?;
            txn.open_table(tables::MASTER_LIABILITIES)?;
            txn.open_table(tables::EPOCH_REWARDS)?;
            txn.open_table(tables::GLOBAL_EPOCH_REWARDS)?;
            txn.open_multimap_table(tables::THAWING)?;
            txn.open_multimap_table(tables::LEADING_CANDIDATES)?;
            txn.open_multimap_table(tables::REMOVE_CANDIDATES)?;
            txn.open_multimap_table(tables::REMOVE_REPS)?;
            txn.open_multimap_table(tables::REP_LIABILITIES)?;
            txn.open_multimap_table(tables::SECONDARY_LIABILITIES)?;

            let mut meta = txn.open_table(tables::META)?;
            match meta.get(SCHEMA_VERSION_KEY)? {
                None => {
                    meta.insert(SCHEMA_VERSION_KEY, CURRENT_SCHEMA_VERSION.to_be_bytes().as_slice())?;
                },
                Some(guard) => {
                    let bytes: [u8; 4] = guard.value().try_into().unwrap_or([0; 4]);
                    let found = u32::from_be_bytes(bytes);
                    if found > CURRENT_SCHEMA_VERSION {
                        return Err(StoreError::SchemaTooNew {
                            found,
                            supported: CURRENT_SCHEMA_VERSION,
                        });
                    }
                },
            }
        }
        txn.commit()?;
        Ok(())
    }

    pub fn begin_read(&self) -> Result<ReadTxn> {
        Ok(ReadTxn {
            inner: self.db.begin_read()?,
        })
    }

    pub fn begin_write(&self) -> Result<WriteTxn> {
        Ok(WriteTxn {
            inner: self.db.begin_write()?,
        })
    }
}
