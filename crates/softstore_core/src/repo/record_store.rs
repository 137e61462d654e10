//! Record store contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide marker read/write, scoped selects, hard deletes and the
//!   transaction primitive the lifecycle engine builds on.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - `try_new` validates every registered record type against the live
//!   schema; misconfiguration surfaces at setup, not at call time.
//! - Read paths reject persisted marker values whose shape disagrees with
//!   the registered scheme instead of masking them.
//! - The store mutates nothing but marker columns, except for the
//!   unguarded hard-delete path.

use crate::db::DbError;
use crate::extension::hooks::ChainFlow;
use crate::model::marker::{MarkerScheme, MarkerValue};
use crate::model::record::{RecordId, RecordRow};
use crate::model::schema::{ConfigError, TypeRegistry};
use crate::repo::scope::ScopedQuery;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type StoreResult<T> = Result<T, StoreError>;

/// Store and lifecycle operation errors.
#[derive(Debug)]
pub enum StoreError {
    /// Setup-time misconfiguration; unrecoverable until configuration is
    /// fixed.
    Config(ConfigError),
    /// Underlying SQLite error. During a transactional operation this is
    /// reported after the rollback completed.
    Db(DbError),
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
    /// Operation attempted on a record that was never saved.
    NotPersisted { type_name: String },
    /// Target record absent from the requested scope.
    NotFound { type_name: String, id: RecordId },
    /// Strict destroy found that no state change occurred.
    RecordNotDestroyed { type_name: String, id: RecordId },
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted record data: {message}"),
            Self::NotPersisted { type_name } => {
                write!(f, "record of type `{type_name}` was never persisted")
            }
            Self::NotFound { type_name, id } => {
                write!(f, "record not found: {type_name}/{id}")
            }
            Self::RecordNotDestroyed { type_name, id } => {
                write!(f, "record was not destroyed: {type_name}/{id}")
            }
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ConfigError> for StoreError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Persistence capability consumed by the lifecycle engine.
pub trait RecordStore {
    /// Registry this store was configured with.
    fn registry(&self) -> &TypeRegistry;

    /// Reads the marker value of one row. `None` means the row is absent.
    fn read_marker(&self, type_name: &str, id: RecordId) -> StoreResult<Option<MarkerValue>>;

    /// Writes the marker value of one row; returns whether a row matched.
    fn write_marker(&self, type_name: &str, id: RecordId, value: &MarkerValue)
        -> StoreResult<bool>;

    /// Executes one scoped select.
    fn select(&self, query: &ScopedQuery) -> StoreResult<Vec<RecordRow>>;

    /// Permanently removes one row; returns whether a row matched.
    fn delete_row(&self, type_name: &str, id: RecordId) -> StoreResult<bool>;

    /// Runs `body` inside one transaction. Commits on `Completed`; rolls
    /// back on `Halted` or error, leaving the store untouched.
    fn run_in_transaction(
        &self,
        body: &mut dyn FnMut(&dyn RecordStore) -> StoreResult<ChainFlow>,
    ) -> StoreResult<ChainFlow>;
}

/// SQLite-backed record store.
pub struct SqliteRecordStore<'a> {
    conn: &'a Connection,
    registry: &'a TypeRegistry,
}

impl std::fmt::Debug for SqliteRecordStore<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteRecordStore").finish_non_exhaustive()
    }
}

impl<'a> SqliteRecordStore<'a> {
    /// Creates a store after validating the registry against the live
    /// schema: every registered table, id column, marker column and
    /// association target must exist.
    pub fn try_new(conn: &'a Connection, registry: &'a TypeRegistry) -> StoreResult<Self> {
        for record_type in registry.iter() {
            let mut required = vec![record_type.id_column.as_str()];
            if let Some(config) = &record_type.soft_delete {
                required.push(config.marker_column.as_str());
            }
            ensure_table_ready(conn, record_type.table.as_str(), &required)?;
            for edge in &record_type.associations {
                let dependent = registry.get(edge.dependent_type.as_str()).ok_or_else(|| {
                    ConfigError::UnknownAssociationTarget {
                        owner: record_type.name.clone(),
                        association: edge.name.clone(),
                        dependent: edge.dependent_type.clone(),
                    }
                })?;
                ensure_table_ready(conn, dependent.table.as_str(), &[edge.foreign_key.as_str()])?;
            }
        }
        Ok(Self { conn, registry })
    }

    /// Store view over an already-validated connection; used for the
    /// transaction-scoped store handed to `run_in_transaction` bodies.
    fn scoped<'t>(conn: &'t Connection, registry: &'t TypeRegistry) -> SqliteRecordStore<'t> {
        SqliteRecordStore { conn, registry }
    }
}

impl RecordStore for SqliteRecordStore<'_> {
    fn registry(&self) -> &TypeRegistry {
        self.registry
    }

    fn read_marker(&self, type_name: &str, id: RecordId) -> StoreResult<Option<MarkerValue>> {
        let record_type = self.registry.require(type_name)?;
        let config = self.registry.soft_delete_config(type_name)?;

        let raw: Option<Option<i64>> = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM {} WHERE {} = ?1;",
                    config.marker_column, record_type.table, record_type.id_column
                ),
                [id.to_string()],
                |row| row.get(0),
            )
            .optional()?;

        match raw {
            None => Ok(None),
            Some(value) => Ok(Some(marker_from_sql(
                config.scheme,
                value,
                record_type.table.as_str(),
                config.marker_column.as_str(),
            )?)),
        }
    }

    fn write_marker(
        &self,
        type_name: &str,
        id: RecordId,
        value: &MarkerValue,
    ) -> StoreResult<bool> {
        let record_type = self.registry.require(type_name)?;
        let config = self.registry.soft_delete_config(type_name)?;

        let changed = self.conn.execute(
            &format!(
                "UPDATE {} SET {} = ?1 WHERE {} = ?2;",
                record_type.table, config.marker_column, record_type.id_column
            ),
            params![marker_to_sql(value), id.to_string()],
        )?;
        Ok(changed > 0)
    }

    fn select(&self, query: &ScopedQuery) -> StoreResult<Vec<RecordRow>> {
        let mut stmt = self.conn.prepare(&query.sql())?;
        let mut rows = stmt.query(params_from_iter(query.params().iter()))?;

        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            let id_text: String = row.get("id")?;
            let id = Uuid::parse_str(&id_text).map_err(|_| {
                StoreError::InvalidData(format!(
                    "invalid uuid value `{id_text}` in {}",
                    query.table()
                ))
            })?;

            let marker = match query.marker_scheme() {
                None => None,
                Some(scheme) => {
                    let raw: Option<i64> = row.get("marker")?;
                    Some(marker_from_sql(scheme, raw, query.table(), "marker")?)
                }
            };

            items.push(RecordRow { id, marker });
        }
        Ok(items)
    }

    fn delete_row(&self, type_name: &str, id: RecordId) -> StoreResult<bool> {
        let record_type = self.registry.require(type_name)?;
        let changed = self.conn.execute(
            &format!(
                "DELETE FROM {} WHERE {} = ?1;",
                record_type.table, record_type.id_column
            ),
            [id.to_string()],
        )?;
        Ok(changed > 0)
    }

    fn run_in_transaction(
        &self,
        body: &mut dyn FnMut(&dyn RecordStore) -> StoreResult<ChainFlow>,
    ) -> StoreResult<ChainFlow> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let outcome = {
            let scoped = SqliteRecordStore::scoped(&tx, self.registry);
            body(&scoped)
        };

        match outcome {
            Ok(ChainFlow::Completed) => {
                tx.commit()?;
                Ok(ChainFlow::Completed)
            }
            Ok(ChainFlow::Halted) => {
                tx.rollback()?;
                Ok(ChainFlow::Halted)
            }
            // Dropping the transaction rolls back without masking the
            // original error.
            Err(err) => Err(err),
        }
    }
}

fn ensure_table_ready(
    conn: &Connection,
    table: &str,
    columns: &[&str],
) -> StoreResult<()> {
    let table_exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    if table_exists == 0 {
        return Err(ConfigError::MissingRequiredTable(table.to_string()).into());
    }

    for column in columns {
        let column_exists: i64 = conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM pragma_table_info(?1) WHERE name = ?2
            );",
            params![table, column],
            |row| row.get(0),
        )?;
        if column_exists == 0 {
            return Err(ConfigError::MissingRequiredColumn {
                table: table.to_string(),
                column: (*column).to_string(),
            }
            .into());
        }
    }
    Ok(())
}

fn marker_from_sql(
    scheme: MarkerScheme,
    raw: Option<i64>,
    table: &str,
    column: &str,
) -> StoreResult<MarkerValue> {
    match scheme {
        MarkerScheme::Timestamp => Ok(raw.map_or(MarkerValue::Null, MarkerValue::Timestamp)),
        MarkerScheme::Flag => match raw {
            Some(0) => Ok(MarkerValue::Flag(false)),
            Some(1) => Ok(MarkerValue::Flag(true)),
            other => Err(StoreError::InvalidData(format!(
                "invalid flag marker value `{other:?}` in {table}.{column}"
            ))),
        },
    }
}

fn marker_to_sql(value: &MarkerValue) -> Value {
    match value {
        MarkerValue::Null => Value::Null,
        MarkerValue::Timestamp(epoch_ms) => Value::Integer(*epoch_ms),
        MarkerValue::Flag(deleted) => Value::Integer(i64::from(*deleted)),
    }
}
