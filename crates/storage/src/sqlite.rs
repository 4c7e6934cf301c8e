use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info};

use templar_core::{
    AssetId, AssetType, ChangeSet, UnmergedAsset,
    value::{from_msgpack, to_msgpack},
};

use crate::error::StorageError;
use crate::traits::{AssetStore, CommitReceipt, prepare_commit};

/// Convert Vec<u8> to fixed-size array with proper error handling.
fn to_array<const N: usize>(v: Vec<u8>, label: &str) -> Result<[u8; N], StorageError> {
    v.try_into()
        .map_err(|_| StorageError::Serialization(format!("invalid {label} length")))
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &str) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn commit_count(&self) -> Result<u64, StorageError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM commits", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    pub fn get_asset(&self, id: AssetId) -> Result<Option<UnmergedAsset>, StorageError> {
        let row = self
            .conn
            .query_row(
                &format!("{SELECT_ASSET} WHERE asset_id = ?1"),
                [id.as_bytes().as_slice()],
                raw_row,
            )
            .optional()?;
        row.map(decode_asset).transpose()
    }
}

const SELECT_ASSET: &str =
    "SELECT asset_id, fqn, asset_type, asset_key, template_fqn, overrides, checksum FROM assets";

struct RawAsset {
    asset_id: Vec<u8>,
    fqn: String,
    asset_type: String,
    asset_key: String,
    template_fqn: Option<String>,
    overrides: Vec<u8>,
    checksum: Vec<u8>,
}

fn raw_row(row: &rusqlite::Row) -> rusqlite::Result<RawAsset> {
    Ok(RawAsset {
        asset_id: row.get(0)?,
        fqn: row.get(1)?,
        asset_type: row.get(2)?,
        asset_key: row.get(3)?,
        template_fqn: row.get(4)?,
        overrides: row.get(5)?,
        checksum: row.get(6)?,
    })
}

fn decode_asset(raw: RawAsset) -> Result<UnmergedAsset, StorageError> {
    let id = AssetId::from_bytes(to_array::<16>(raw.asset_id, "asset_id")?);
    let checksum = to_array::<32>(raw.checksum, "checksum")?;
    if *blake3::hash(&raw.overrides).as_bytes() != checksum {
        return Err(StorageError::ChecksumMismatch {
            asset_id: id.to_string(),
        });
    }
    let overrides = from_msgpack(&raw.overrides)
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
    Ok(UnmergedAsset {
        id,
        fqn: raw.fqn,
        asset_type: AssetType::parse(&raw.asset_type)?,
        asset_key: raw.asset_key,
        template_fqn: raw.template_fqn,
        overrides,
    })
}

fn write_asset(tx: &rusqlite::Transaction, asset: &UnmergedAsset) -> Result<(), StorageError> {
    let overrides = to_msgpack(&asset.overrides)
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
    let checksum = blake3::hash(&overrides);
    tx.execute(
        "INSERT INTO assets
             (asset_id, fqn, asset_type, asset_key, template_fqn, overrides, checksum)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            asset.id.as_bytes().as_slice(),
            asset.fqn,
            asset.asset_type.as_str(),
            asset.asset_key,
            asset.template_fqn,
            overrides,
            checksum.as_bytes().as_slice(),
        ],
    )?;
    Ok(())
}

impl AssetStore for SqliteStore {
    fn load_unmerged_assets(&self) -> Result<Vec<UnmergedAsset>, StorageError> {
        let mut stmt = self.conn.prepare(&format!("{SELECT_ASSET} ORDER BY fqn"))?;
        let rows = stmt.query_map([], raw_row)?;
        let mut assets = Vec::new();
        for row in rows {
            assets.push(decode_asset(row?)?);
        }
        Ok(assets)
    }

    fn commit_changes(&mut self, changes: &ChangeSet) -> Result<CommitReceipt, StorageError> {
        let committed = self.load_index()?;
        prepare_commit(&committed, changes)?;

        let tx = self.conn.transaction()?;
        // Clear every touched row first so that fqn swaps never trip the
        // unique constraint mid-transaction.
        for id in changes
            .deleted
            .iter()
            .chain(changes.upserted.iter().map(|a| &a.id))
        {
            tx.execute(
                "DELETE FROM assets WHERE asset_id = ?1",
                [id.as_bytes().as_slice()],
            )?;
        }
        for asset in &changes.upserted {
            debug!(fqn = %asset.fqn, id = %asset.id, "writing asset");
            write_asset(&tx, asset)?;
        }
        tx.execute(
            "INSERT INTO commits (upserted, deleted) VALUES (?1, ?2)",
            rusqlite::params![changes.upserted.len() as i64, changes.deleted.len() as i64],
        )?;
        tx.commit()?;

        info!(
            upserted = changes.upserted.len(),
            deleted = changes.deleted.len(),
            "sqlite store commit"
        );
        Ok(CommitReceipt {
            upserted: changes.upserted.len(),
            deleted: changes.deleted.len(),
        })
    }
}
