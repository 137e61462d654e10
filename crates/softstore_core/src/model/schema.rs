//! Per-type soft-delete configuration registry.
//!
//! # Responsibility
//! - Describe record types: table, id column, optional soft-delete marker
//!   configuration and association edges.
//! - Hold the registry consulted by store, engine and cascade walk.
//!
//! # Invariants
//! - Registration happens once per type at setup; duplicates are rejected.
//! - The registry is an explicit value passed to its consumers; there is no
//!   process-global configuration state.
//! - A type is soft-delete-capable exactly when its entry carries a
//!   `SoftDeleteConfig`.

use crate::model::marker::{parse_marker_scheme, MarkerScheme, MarkerSchemeError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Cascade behavior of one association edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CascadeKind {
    /// Dependents are unaffected by the owner's lifecycle.
    None,
    /// Dependents are soft-deleted with the owner and eligible for
    /// cascade restore.
    CascadeDestroy,
}

/// One owner-to-dependent association edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociationEdge {
    /// Association name, unique within the owning type.
    pub name: String,
    /// Registered name of the dependent record type.
    pub dependent_type: String,
    /// Column on the dependent table referencing the owner's id.
    pub foreign_key: String,
    pub cascade: CascadeKind,
}

/// Soft-delete marker declaration for one record type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoftDeleteConfig {
    pub marker_column: String,
    pub scheme: MarkerScheme,
}

impl SoftDeleteConfig {
    pub fn new(marker_column: impl Into<String>, scheme: MarkerScheme) -> Self {
        Self {
            marker_column: marker_column.into(),
            scheme,
        }
    }

    /// Builds a config from declaration strings (`column`, `column_type`).
    ///
    /// Unrecognized scheme declarations fail here, at setup time.
    pub fn from_declaration(marker_column: &str, scheme: &str) -> Result<Self, ConfigError> {
        let scheme = parse_marker_scheme(scheme).map_err(ConfigError::Scheme)?;
        Ok(Self::new(marker_column, scheme))
    }
}

/// Registered description of one record type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordType {
    /// Registry key, also used in record handles.
    pub name: String,
    /// Backing table name.
    pub table: String,
    /// Identity column, text-encoded UUID.
    pub id_column: String,
    /// Present exactly when the type opts into soft deletion.
    pub soft_delete: Option<SoftDeleteConfig>,
    /// Association edges in declared order; cascade walks honor this order.
    pub associations: Vec<AssociationEdge>,
}

impl RecordType {
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            id_column: "uuid".to_string(),
            soft_delete: None,
            associations: Vec::new(),
        }
    }

    pub fn with_id_column(mut self, id_column: impl Into<String>) -> Self {
        self.id_column = id_column.into();
        self
    }

    pub fn with_soft_delete(mut self, marker_column: impl Into<String>, scheme: MarkerScheme) -> Self {
        self.soft_delete = Some(SoftDeleteConfig::new(marker_column, scheme));
        self
    }

    /// Adds a `CascadeDestroy` edge; dependents follow the owner's
    /// destroy/restore lifecycle.
    pub fn with_cascade_destroy(
        mut self,
        name: impl Into<String>,
        dependent_type: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        self.associations.push(AssociationEdge {
            name: name.into(),
            dependent_type: dependent_type.into(),
            foreign_key: foreign_key.into(),
            cascade: CascadeKind::CascadeDestroy,
        });
        self
    }

    /// Adds a plain edge that does not participate in cascades.
    pub fn with_association(
        mut self,
        name: impl Into<String>,
        dependent_type: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        self.associations.push(AssociationEdge {
            name: name.into(),
            dependent_type: dependent_type.into(),
            foreign_key: foreign_key.into(),
            cascade: CascadeKind::None,
        });
        self
    }

    pub fn is_soft_deletable(&self) -> bool {
        self.soft_delete.is_some()
    }
}

/// In-process registry of record type configurations.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    entries: BTreeMap<String, RecordType>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one record type. Duplicate names are rejected.
    pub fn register(&mut self, record_type: RecordType) -> Result<(), ConfigError> {
        if self.entries.contains_key(record_type.name.as_str()) {
            return Err(ConfigError::DuplicateType(record_type.name));
        }
        self.entries.insert(record_type.name.clone(), record_type);
        Ok(())
    }

    pub fn get(&self, type_name: &str) -> Option<&RecordType> {
        self.entries.get(type_name)
    }

    /// Looks up a type that must be registered.
    pub fn require(&self, type_name: &str) -> Result<&RecordType, ConfigError> {
        self.get(type_name)
            .ok_or_else(|| ConfigError::UnknownType(type_name.to_string()))
    }

    /// Capability probe consulted before cascade recursion.
    pub fn is_soft_deletable(&self, type_name: &str) -> bool {
        self.get(type_name)
            .is_some_and(RecordType::is_soft_deletable)
    }

    /// Soft-delete config for a type that must have opted in.
    pub fn soft_delete_config(&self, type_name: &str) -> Result<&SoftDeleteConfig, ConfigError> {
        self.require(type_name)?
            .soft_delete
            .as_ref()
            .ok_or_else(|| ConfigError::NotSoftDeletable(type_name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &RecordType> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Configuration errors. All of these surface at setup time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Scheme(MarkerSchemeError),
    DuplicateType(String),
    UnknownType(String),
    NotSoftDeletable(String),
    UnknownAssociationTarget {
        owner: String,
        association: String,
        dependent: String,
    },
    MissingRequiredTable(String),
    MissingRequiredColumn { table: String, column: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scheme(err) => write!(f, "{err}"),
            Self::DuplicateType(name) => write!(f, "record type already registered: {name}"),
            Self::UnknownType(name) => write!(f, "record type not registered: {name}"),
            Self::NotSoftDeletable(name) => {
                write!(f, "record type is not soft-delete-capable: {name}")
            }
            Self::UnknownAssociationTarget {
                owner,
                association,
                dependent,
            } => write!(
                f,
                "association `{association}` on `{owner}` targets unregistered type `{dependent}`"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "registered record type requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "registered record type requires column `{column}` in table `{table}`")
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Scheme(err) => Some(err),
            _ => None,
        }
    }
}
