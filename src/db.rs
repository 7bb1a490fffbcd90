// 🗄️ Record Storage - Row-oriented persistence for the bank catalog
//
// One row per (slot, bound card). The medium is opaque to the bank store:
// CSV (reference), SQLite (feature "sqlite") and in-memory are interchangeable.

use crate::error::{StorageError, StorageResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

#[cfg(feature = "sqlite")]
use rusqlite::{params, Connection};
#[cfg(feature = "sqlite")]
use std::sync::Mutex;

/// Column order of the persisted form
pub const RECORD_FIELDS: [&str; 6] = [
    "account_id",
    "account_type",
    "balance",
    "tier",
    "card_number",
    "pin",
];

// ============================================================================
// ACCOUNT RECORD
// ============================================================================

/// One persisted row.
///
/// `balance` defaults to 0 and `tier` to "Standard" when blank or absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    #[serde(default)]
    pub account_id: String,

    #[serde(default)]
    pub account_type: String,

    #[serde(default)]
    pub balance: Option<i64>,

    #[serde(default)]
    pub tier: Option<String>,

    #[serde(default)]
    pub card_number: String,

    #[serde(default)]
    pub pin: String,
}

impl AccountRecord {
    /// Reject rows that cannot address a slot or a card (`row` is 1-based)
    pub fn validate(&self, row: usize) -> StorageResult<()> {
        let required = [
            ("account_id", &self.account_id),
            ("account_type", &self.account_type),
            ("card_number", &self.card_number),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(StorageError::InvalidRecord {
                    row,
                    reason: format!("{} is empty", field),
                });
            }
        }
        Ok(())
    }

    pub fn balance_or_default(&self) -> i64 {
        self.balance.unwrap_or(0)
    }

    /// Tier name, `None` when blank or absent
    pub fn tier_name(&self) -> Option<&str> {
        self.tier
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

// ============================================================================
// RECORD STORE
// ============================================================================

/// Backing medium for `BankStore`
pub trait RecordStore: Send + Sync {
    /// Read every row in stored order (a missing store reads as empty)
    fn load(&self) -> StorageResult<Vec<AccountRecord>>;

    /// Replace the stored rows
    fn save(&self, records: &[AccountRecord]) -> StorageResult<()>;

    /// Human-readable location for log output
    fn describe(&self) -> String;
}

// ============================================================================
// CSV STORE
// ============================================================================

pub struct CsvStore {
    path: PathBuf,
}

impl CsvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        CsvStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }
}

impl RecordStore for CsvStore {
    fn load(&self) -> StorageResult<Vec<AccountRecord>> {
        if !self.path.is_file() {
            debug!(path = %self.path.display(), "No CSV file found, starting empty");
            return Ok(Vec::new());
        }

        // Values are read verbatim: PINs compare exactly
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::Headers)
            .from_path(&self.path)?;

        let mut records = Vec::new();
        for result in rdr.deserialize() {
            let record: AccountRecord = result?;
            records.push(record);
        }

        debug!(path = %self.path.display(), rows = records.len(), "Loaded CSV records");
        Ok(records)
    }

    fn save(&self, records: &[AccountRecord]) -> StorageResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        // Header is written by hand so an empty catalog still gets one
        let tmp = self.temp_path();
        {
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .from_path(&tmp)?;
            writer.write_record(RECORD_FIELDS)?;
            for record in records {
                writer.serialize(record)?;
            }
            writer.flush()?;
        }
        fs::rename(&tmp, &self.path)?;

        debug!(path = %self.path.display(), rows = records.len(), "Wrote CSV records");
        Ok(())
    }

    fn describe(&self) -> String {
        format!("csv:{}", self.path.display())
    }
}

// ============================================================================
// MEMORY STORE
// ============================================================================

/// In-memory rows. Clones share the same rows, so a second `BankStore` can
/// reload what the first one saved.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    rows: Arc<RwLock<Vec<AccountRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    pub fn with_records(records: Vec<AccountRecord>) -> Self {
        MemoryStore {
            rows: Arc::new(RwLock::new(records)),
        }
    }

    /// Snapshot of the saved rows
    pub fn records(&self) -> Vec<AccountRecord> {
        self.rows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl RecordStore for MemoryStore {
    fn load(&self) -> StorageResult<Vec<AccountRecord>> {
        Ok(self.records())
    }

    fn save(&self, records: &[AccountRecord]) -> StorageResult<()> {
        let mut rows = self.rows.write().unwrap_or_else(PoisonError::into_inner);
        *rows = records.to_vec();
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

// ============================================================================
// SQLITE STORE
// ============================================================================

#[cfg(feature = "sqlite")]
pub struct SqliteStore {
    conn: Mutex<Connection>,
    location: String,
}

#[cfg(feature = "sqlite")]
impl SqliteStore {
    pub fn open(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;
        setup_database(&conn)?;
        Ok(SqliteStore {
            conn: Mutex::new(conn),
            location: path.display().to_string(),
        })
    }

    pub fn from_connection(conn: Connection) -> StorageResult<Self> {
        setup_database(&conn)?;
        Ok(SqliteStore {
            conn: Mutex::new(conn),
            location: ":memory:".to_string(),
        })
    }
}

#[cfg(feature = "sqlite")]
pub fn setup_database(conn: &Connection) -> StorageResult<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS account_cards (
            position INTEGER PRIMARY KEY,
            account_id TEXT NOT NULL,
            account_type TEXT NOT NULL,
            balance INTEGER,
            tier TEXT,
            card_number TEXT NOT NULL,
            pin TEXT NOT NULL
        )",
        [],
    )?;

    Ok(())
}

#[cfg(feature = "sqlite")]
impl RecordStore for SqliteStore {
    fn load(&self) -> StorageResult<Vec<AccountRecord>> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let mut stmt = conn.prepare(
            "SELECT account_id, account_type, balance, tier, card_number, pin
             FROM account_cards
             ORDER BY position",
        )?;

        let records = stmt
            .query_map([], |row| {
                Ok(AccountRecord {
                    account_id: row.get(0)?,
                    account_type: row.get(1)?,
                    balance: row.get(2)?,
                    tier: row.get(3)?,
                    card_number: row.get(4)?,
                    pin: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        debug!(path = %self.location, rows = records.len(), "Loaded SQLite records");
        Ok(records)
    }

    fn save(&self, records: &[AccountRecord]) -> StorageResult<()> {
        let mut conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM account_cards", [])?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO account_cards (
                    position, account_id, account_type, balance, tier, card_number, pin
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for (position, record) in records.iter().enumerate() {
                insert.execute(params![
                    position as i64,
                    record.account_id,
                    record.account_type,
                    record.balance,
                    record.tier,
                    record.card_number,
                    record.pin,
                ])?;
            }
        }
        tx.commit()?;

        debug!(path = %self.location, rows = records.len(), "Wrote SQLite records");
        Ok(())
    }

    fn describe(&self) -> String {
        format!("sqlite:{}", self.location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn create_test_record(account_id: &str, card: &str) -> AccountRecord {
        AccountRecord {
            account_id: account_id.to_string(),
            account_type: "Checking".to_string(),
            balance: Some(1500),
            tier: Some("Gold".to_string()),
            card_number: card.to_string(),
            pin: "1234".to_string(),
        }
    }

    #[test]
    fn test_csv_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::new(dir.path().join("absent.csv"));

        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_csv_blank_fields_read_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bank.csv");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "account_id,account_type,balance,tier,card_number,pin").unwrap();
        writeln!(file, "C1,Checking,,,4444,1234").unwrap();
        writeln!(file, "C2,Saving,300,Platinum,5555,0000").unwrap();
        drop(file);

        let records = CsvStore::new(&path).load().unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].balance, None);
        assert_eq!(records[0].tier_name(), None);
        assert_eq!(records[0].balance_or_default(), 0);
        assert_eq!(records[1].account_type, "Saving");
        assert_eq!(records[1].balance, Some(300));
        assert_eq!(records[1].tier_name(), Some("Platinum"));
    }

    #[test]
    fn test_csv_values_are_not_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bank.csv");
        fs::write(
            &path,
            " account_id ,account_type,balance,tier,card_number,pin\nC1,Checking,10,Gold,4444, 1234\n",
        )
        .unwrap();

        let records = CsvStore::new(&path).load().unwrap();

        assert_eq!(records[0].account_id, "C1");
        assert_eq!(records[0].pin, " 1234");
    }

    #[test]
    fn test_csv_missing_columns_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bank.csv");
        fs::write(&path, "account_id,account_type,card_number,pin\nC1,Checking,4444,1234\n").unwrap();

        let records = CsvStore::new(&path).load().unwrap();

        assert_eq!(records[0].balance, None);
        assert_eq!(records[0].tier, None);
    }

    #[test]
    fn test_csv_bad_balance_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bank.csv");
        fs::write(
            &path,
            "account_id,account_type,balance,tier,card_number,pin\nC1,Checking,lots,Gold,4444,1234\n",
        )
        .unwrap();

        assert!(matches!(CsvStore::new(&path).load(), Err(StorageError::Csv(_))));
    }

    #[test]
    fn test_csv_save_writes_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("bank.csv");
        let store = CsvStore::new(&path);

        store.save(&[]).unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.trim(), "account_id,account_type,balance,tier,card_number,pin");

        let records = vec![create_test_record("C1", "4444"), create_test_record("C1", "9999")];
        store.save(&records).unwrap();

        assert_eq!(store.load().unwrap(), records);
        assert!(!store.temp_path().exists());
    }

    #[test]
    fn test_record_validation() {
        let record = create_test_record("C1", "4444");
        assert!(record.validate(1).is_ok());

        let mut missing_id = record.clone();
        missing_id.account_id = "  ".to_string();
        match missing_id.validate(7) {
            Err(StorageError::InvalidRecord { row, reason }) => {
                assert_eq!(row, 7);
                assert_eq!(reason, "account_id is empty");
            }
            other => panic!("unexpected: {other:?}"),
        }

        let mut missing_card = record;
        missing_card.card_number.clear();
        assert!(missing_card.validate(1).is_err());
    }

    #[test]
    fn test_memory_store_clones_share_rows() {
        let store = MemoryStore::new();
        let other = store.clone();

        store.save(&[create_test_record("C1", "4444")]).unwrap();

        assert_eq!(other.load().unwrap().len(), 1);
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn test_sqlite_round_trip_keeps_order() {
        let store = SqliteStore::from_connection(Connection::open_in_memory().unwrap()).unwrap();
        let mut records = vec![
            create_test_record("C2", "1111"),
            create_test_record("C1", "2222"),
            create_test_record("C1", "3333"),
        ];
        records[1].balance = None;
        records[1].tier = None;

        store.save(&records).unwrap();
        assert_eq!(store.load().unwrap(), records);

        // Second save replaces everything
        store.save(&records[..1]).unwrap();
        assert_eq!(store.load().unwrap().len(), 1);
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn test_sqlite_file_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bank.db");

        SqliteStore::open(&path)
            .unwrap()
            .save(&[create_test_record("C1", "4444")])
            .unwrap();

        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(reopened.load().unwrap(), vec![create_test_record("C1", "4444")]);
    }
}
