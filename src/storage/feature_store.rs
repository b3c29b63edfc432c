//! SQLite-backed store of named feature tables. Each snapshot is kept as a JSON
//! payload next to the columns used for ordering and lookup.

use crate::error::Result;
use crate::features::{FeatureTable, UserFeatureSnapshot};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

pub struct FeatureStore {
    conn: Mutex<Connection>,
}

impl FeatureStore {
    /// Open or create the store at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        Self::init(Connection::open(path)?)
    }

    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS feature_rows (
                table_name TEXT NOT NULL,
                user_id TEXT NOT NULL,
                label_ts INTEGER NOT NULL,
                churned INTEGER NOT NULL,
                payload TEXT NOT NULL,
                PRIMARY KEY (table_name, user_id)
            );
            CREATE INDEX IF NOT EXISTS idx_feature_rows_label ON feature_rows(table_name, label_ts);
            "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        // poisoned only by a panicking writer; the connection stays valid
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Replace table `name` with `table`'s rows.
    pub fn save_table(&self, name: &str, table: &FeatureTable) -> Result<()> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM feature_rows WHERE table_name = ?1", params![name])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO feature_rows (table_name, user_id, label_ts, churned, payload) VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for row in table.rows() {
                let payload = serde_json::to_string(row)?;
                stmt.execute(params![
                    name,
                    row.user_id,
                    row.label_ts.timestamp_millis(),
                    row.churned,
                    payload
                ])?;
            }
        }
        tx.commit()?;
        debug!(table = name, rows = table.len(), "feature table saved");
        Ok(())
    }

    /// Rows of table `name` ordered by `(label_ts, user_id)`; empty when unknown.
    pub fn load_table(&self, name: &str) -> Result<FeatureTable> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT payload FROM feature_rows WHERE table_name = ?1 ORDER BY label_ts, user_id",
        )?;
        let mut rows = stmt.query(params![name])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let payload: String = row.get(0)?;
            out.push(serde_json::from_str::<UserFeatureSnapshot>(&payload)?);
        }
        Ok(FeatureTable::new(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::sample_row;

    #[test]
    fn save_replaces_and_load_orders_by_label() {
        let store = FeatureStore::in_memory().unwrap();
        let mut late = sample_row("late", 5_000, 1);
        late.account_age_days = Some(12.0);
        let table = FeatureTable::new(vec![late, sample_row("early", 1_000, 0)]);
        store.save_table("features", &table).unwrap();

        let loaded = store.load_table("features").unwrap();
        assert_eq!(loaded.user_ids(), vec!["early", "late"]);
        assert_eq!(loaded.rows()[1].account_age_days, Some(12.0));
        assert_eq!(loaded.rows()[0].account_age_days, None);

        store
            .save_table("features", &FeatureTable::new(vec![sample_row("only", 0, 0)]))
            .unwrap();
        assert_eq!(store.load_table("features").unwrap().user_ids(), vec!["only"]);
    }

    #[test]
    fn tables_are_isolated_by_name() {
        let store = FeatureStore::in_memory().unwrap();
        store
            .save_table("a", &FeatureTable::new(vec![sample_row("x", 0, 0)]))
            .unwrap();
        store
            .save_table("b", &FeatureTable::new(vec![sample_row("x", 0, 1)]))
            .unwrap();
        store.save_table("a", &FeatureTable::default()).unwrap();
        assert!(store.load_table("a").unwrap().is_empty());
        assert_eq!(store.load_table("b").unwrap().labels(), vec![1]);
        assert!(store.load_table("missing").unwrap().is_empty());
    }
}
