// ⚙️ Configuration - Where the catalog lives and who opened it
//
// Environment:
//   ATM_BANK_DATA      data file path (default: bank_data.csv)
//   ATM_BANK_BACKEND   csv | sqlite (default: inferred from the file extension)
//   ATM_BANK_OPERATOR  banker | atm (default: banker)

use crate::bank::{BankStore, Operator};
use crate::db::{CsvStore, RecordStore};
use crate::error::{BankError, BankResult};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[cfg(feature = "sqlite")]
use crate::db::SqliteStore;

pub const ENV_DATA: &str = "ATM_BANK_DATA";
pub const ENV_BACKEND: &str = "ATM_BANK_BACKEND";
pub const ENV_OPERATOR: &str = "ATM_BANK_OPERATOR";

pub const DEFAULT_DATA_PATH: &str = "bank_data.csv";

// ============================================================================
// BACKEND
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Backend {
    Csv,
    Sqlite,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Csv => "csv",
            Backend::Sqlite => "sqlite",
        }
    }

    /// `.db`, `.sqlite`, `.sqlite3` → Sqlite; anything else → Csv
    pub fn infer(path: &Path) -> Backend {
        match path.extension().and_then(|e| e.to_str()) {
            Some("db" | "sqlite" | "sqlite3") => Backend::Sqlite,
            _ => Backend::Csv,
        }
    }
}

impl FromStr for Backend {
    type Err = BankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "csv" => Ok(Backend::Csv),
            "sqlite" => Ok(Backend::Sqlite),
            other => Err(BankError::InvalidBackend(other.to_string())),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// BANK CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankConfig {
    pub data_path: PathBuf,

    /// `None` → inferred from `data_path`
    pub backend: Option<Backend>,

    pub operator: Operator,
}

impl Default for BankConfig {
    fn default() -> Self {
        BankConfig {
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            backend: None,
            operator: Operator::default(),
        }
    }
}

impl BankConfig {
    pub fn new(data_path: impl Into<PathBuf>) -> Self {
        BankConfig {
            data_path: data_path.into(),
            ..BankConfig::default()
        }
    }

    pub fn with_operator(mut self, operator: Operator) -> Self {
        self.operator = operator;
        self
    }

    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Build from ATM_BANK_* variables supplied by `lookup`; unset or empty
    /// values keep the defaults
    pub fn from_lookup<F>(lookup: F) -> BankResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = BankConfig::default();

        if let Some(path) = lookup(ENV_DATA).filter(|v| !v.is_empty()) {
            config.data_path = PathBuf::from(path);
        }
        if let Some(backend) = lookup(ENV_BACKEND).filter(|v| !v.is_empty()) {
            config.backend = Some(backend.parse()?);
        }
        if let Some(operator) = lookup(ENV_OPERATOR).filter(|v| !v.is_empty()) {
            config.operator = operator.parse()?;
        }

        Ok(config)
    }

    pub fn backend(&self) -> Backend {
        self.backend.unwrap_or_else(|| Backend::infer(&self.data_path))
    }

    pub fn open_record_store(&self) -> BankResult<Box<dyn RecordStore>> {
        match self.backend() {
            Backend::Csv => Ok(Box::new(CsvStore::new(&self.data_path))),
            #[cfg(feature = "sqlite")]
            Backend::Sqlite => Ok(Box::new(SqliteStore::open(&self.data_path)?)),
            #[cfg(not(feature = "sqlite"))]
            Backend::Sqlite => Err(BankError::BackendUnavailable("sqlite")),
        }
    }

    pub fn open_bank(&self) -> BankResult<BankStore> {
        BankStore::load(self.open_record_store()?, self.operator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Tier;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = BankConfig::from_lookup(lookup_from(&[])).unwrap();

        assert_eq!(config.data_path, PathBuf::from("bank_data.csv"));
        assert_eq!(config.backend(), Backend::Csv);
        assert_eq!(config.operator, Operator::Banker);
    }

    #[test]
    fn test_env_overrides() {
        let config = BankConfig::from_lookup(lookup_from(&[
            (ENV_DATA, "/var/lib/bank/accounts.db"),
            (ENV_OPERATOR, "atm"),
        ]))
        .unwrap();

        assert_eq!(config.backend(), Backend::Sqlite);
        assert_eq!(config.operator, Operator::Atm);

        let forced = BankConfig::from_lookup(lookup_from(&[
            (ENV_DATA, "accounts.db"),
            (ENV_BACKEND, "csv"),
        ]))
        .unwrap();
        assert_eq!(forced.backend(), Backend::Csv);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = BankConfig::from_lookup(lookup_from(&[(ENV_OPERATOR, "janitor")])).unwrap_err();
        assert!(matches!(err, BankError::InvalidOperator(_)));

        let err = BankConfig::from_lookup(lookup_from(&[(ENV_BACKEND, "parquet")])).unwrap_err();
        assert!(matches!(err, BankError::InvalidBackend(_)));
    }

    #[test]
    fn test_backend_inference() {
        assert_eq!(Backend::infer(Path::new("bank.csv")), Backend::Csv);
        assert_eq!(Backend::infer(Path::new("bank.sqlite3")), Backend::Sqlite);
        assert_eq!(Backend::infer(Path::new("bank")), Backend::Csv);
    }

    #[test]
    fn test_open_bank_from_csv_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = BankConfig::new(dir.path().join("bank.data"))
            .with_backend(Backend::Csv)
            .with_operator(Operator::Atm);

        let mut bank = config.open_bank().unwrap();
        assert!(bank.is_empty());
        bank.create_account("C1", "Checking", 10, Tier::Standard, "4444", "1234")
            .unwrap();

        let reopened = config.open_bank().unwrap();
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.operator(), Operator::Atm);
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn test_open_bank_from_sqlite_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = BankConfig::new(dir.path().join("bank.db"));

        let mut bank = config.open_bank().unwrap();
        bank.create_account("C1", "Checking", 1500, Tier::Platinum, "4444", "1234")
            .unwrap();
        bank.get_account("C1", "Checking").unwrap().withdraw(2000).unwrap();
        bank.save_all().unwrap();

        let reopened = config.open_bank().unwrap();
        let account = reopened.get_account("C1", "Checking").unwrap();
        assert_eq!(account.balance(), -500);
        assert_eq!(account.read().tier(), Tier::Platinum);
    }
}
