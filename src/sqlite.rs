use std::sync::{Mutex, MutexGuard};

use camino::Utf8Path;
use rusqlite::{Connection, params, params_from_iter};

use crate::domain::ModifiedDate;
use crate::error::IngestError;
use crate::log_store::{LOG_TABLE, RunLog, RunLogEntry};
use crate::table::{NormalizedTable, TableStore};

/// SQLite-backed run log and table store sharing one connection.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Utf8Path) -> Result<Self, IngestError> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_str().is_empty()) {
            std::fs::create_dir_all(parent.as_std_path())
                .map_err(|err| IngestError::Filesystem(err.to_string()))?;
        }
        let conn = Connection::open(path.as_std_path())
            .map_err(|err| IngestError::Store(err.to_string()))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(|err| IngestError::Store(err.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self, IngestError> {
        let conn =
            Connection::open_in_memory().map_err(|err| IngestError::Store(err.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, IngestError> {
        self.conn
            .lock()
            .map_err(|_| IngestError::Store("connection lock poisoned".to_string()))
    }

    /// Number of rows in a materialized table.
    pub fn table_row_count(&self, name: &str) -> Result<usize, IngestError> {
        let conn = self.lock()?;
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(name));
        let count: i64 = conn
            .query_row(&sql, [], |row| row.get(0))
            .map_err(|err| IngestError::Store(err.to_string()))?;
        usize::try_from(count).map_err(|err| IngestError::Store(err.to_string()))
    }

    /// Column names of a materialized table, in order.
    pub fn table_columns(&self, name: &str) -> Result<Vec<String>, IngestError> {
        let conn = self.lock()?;
        let sql = format!("SELECT name FROM pragma_table_info({})", quote_literal(name));
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|err| IngestError::Store(err.to_string()))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|err| IngestError::Store(err.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|err| IngestError::Store(err.to_string()))
    }
}

impl RunLog for SqliteStore {
    fn ensure_schema(&self) -> Result<(), IngestError> {
        let conn = self.lock()?;
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {LOG_TABLE} (
                    file_name TEXT NOT NULL,
                    url TEXT NOT NULL,
                    download_timestamp TIMESTAMP NOT NULL,
                    modified_date DATE NOT NULL
                )"
            ),
            [],
        )
        .map_err(|err| IngestError::Store(err.to_string()))?;
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<RunLogEntry>, IngestError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT file_name, url, download_timestamp, modified_date
                 FROM {LOG_TABLE} ORDER BY rowid"
            ))
            .map_err(|err| IngestError::Store(err.to_string()))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(RunLogEntry {
                    file_name: row.get(0)?,
                    url: row.get(1)?,
                    download_timestamp: row.get(2)?,
                    modified_date: ModifiedDate::new(row.get(3)?),
                })
            })
            .map_err(|err| IngestError::Store(err.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|err| IngestError::Store(err.to_string()))
    }

    fn append(&self, entry: &RunLogEntry) -> Result<(), IngestError> {
        let conn = self.lock()?;
        conn.execute(
            &format!(
                "INSERT INTO {LOG_TABLE} (file_name, url, download_timestamp, modified_date)
                 VALUES (?1, ?2, ?3, ?4)"
            ),
            params![
                entry.file_name,
                entry.url,
                entry.download_timestamp,
                entry.modified_date.as_date(),
            ],
        )
        .map_err(|err| IngestError::Store(err.to_string()))?;
        Ok(())
    }
}

impl TableStore for SqliteStore {
    fn materialize(&self, name: &str, table: &NormalizedTable) -> Result<(), IngestError> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|err| IngestError::Store(err.to_string()))?;

        let table_ident = quote_ident(name);
        let column_defs = table
            .columns
            .iter()
            .map(|column| format!("{} TEXT", quote_ident(column)))
            .collect::<Vec<_>>()
            .join(", ");
        tx.execute_batch(&format!(
            "DROP TABLE IF EXISTS {table_ident}; CREATE TABLE {table_ident} ({column_defs});"
        ))
        .map_err(|err| IngestError::Store(err.to_string()))?;

        {
            let placeholders = (1..=table.columns.len())
                .map(|idx| format!("?{idx}"))
                .collect::<Vec<_>>()
                .join(", ");
            let mut stmt = tx
                .prepare(&format!("INSERT INTO {table_ident} VALUES ({placeholders})"))
                .map_err(|err| IngestError::Store(err.to_string()))?;
            for row in &table.rows {
                stmt.execute(params_from_iter(row.iter()))
                    .map_err(|err| IngestError::Store(err.to_string()))?;
            }
        }

        tx.commit()
            .map_err(|err| IngestError::Store(err.to_string()))?;
        Ok(())
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn append_and_read_back_in_order() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.ensure_schema().unwrap();
        store.ensure_schema().unwrap();

        let timestamp = NaiveDate::from_ymd_opt(2024, 1, 10)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap();
        for modified in ["2024-01-10", "2024-02-01"] {
            store
                .append(&RunLogEntry {
                    file_name: "hospital_general_info.csv".to_string(),
                    url: "https://example.org/hospital_general_info.csv".to_string(),
                    download_timestamp: timestamp,
                    modified_date: modified.parse().unwrap(),
                })
                .unwrap();
        }

        let entries = store.read_all().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].modified_date.to_string(), "2024-01-10");
        assert_eq!(entries[1].modified_date.to_string(), "2024-02-01");
        assert_eq!(entries[1].download_timestamp, timestamp);
    }

    #[test]
    fn values_with_quotes_are_bound_not_spliced() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.ensure_schema().unwrap();
        store
            .append(&RunLogEntry {
                file_name: "o'brien.csv".to_string(),
                url: "https://example.org/o'brien.csv'); DROP TABLE job_log; --".to_string(),
                download_timestamp: NaiveDate::from_ymd_opt(2024, 1, 1)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap(),
                modified_date: "2024-01-01".parse().unwrap(),
            })
            .unwrap();
        let entries = store.read_all().unwrap();
        assert_eq!(entries[0].file_name, "o'brien.csv");
    }

    #[test]
    fn materialize_replaces_table() {
        let store = SqliteStore::open_in_memory().unwrap();
        let first = NormalizedTable {
            columns: vec!["facility_id".to_string(), "hospital_name".to_string()],
            rows: vec![
                vec![Some("010001".to_string()), Some("SOUTHEAST HEALTH".to_string())],
                vec![Some("010005".to_string()), None],
            ],
        };
        store.materialize("hospital_general_info", &first).unwrap();
        assert_eq!(store.table_row_count("hospital_general_info").unwrap(), 2);

        let second = NormalizedTable {
            columns: vec!["facility_id".to_string()],
            rows: vec![vec![Some("010012".to_string())]],
        };
        store.materialize("hospital_general_info", &second).unwrap();
        assert_eq!(store.table_row_count("hospital_general_info").unwrap(), 1);
        assert_eq!(
            store.table_columns("hospital_general_info").unwrap(),
            vec!["facility_id"]
        );
    }
}
