//! Visibility scopes as composable query assembly.
//!
//! # Responsibility
//! - Build the SQL restriction for live-only, with-deleted and only-deleted
//!   lookups over one record type.
//! - Compose with caller-supplied predicates without disturbing them.
//!
//! # Invariants
//! - Assembly is pure; executing the query is the store's job.
//! - Ordinary lookups use `Visibility::Default`, which excludes soft-deleted
//!   rows for capable types and restricts nothing otherwise.

use crate::model::marker::MarkerScheme;
use crate::model::record::RecordId;
use crate::model::schema::{ConfigError, RecordType};
use rusqlite::types::Value;

/// Row visibility requested by a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    /// Live rows only; applied to every ordinary lookup.
    #[default]
    Default,
    /// Live and soft-deleted rows.
    WithDeleted,
    /// Soft-deleted rows only.
    OnlyDeleted,
}

/// Scoped select over one record type's table.
///
/// Produces `SELECT <id>[, <marker>] FROM <table> WHERE ...` with the
/// visibility restriction first and caller predicates appended with `AND`.
#[derive(Debug, Clone)]
pub struct ScopedQuery {
    table: String,
    id_column: String,
    marker: Option<(String, MarkerScheme)>,
    visibility: Visibility,
    predicates: Vec<String>,
    params: Vec<Value>,
}

impl ScopedQuery {
    /// Builds a scoped query for one registered type.
    ///
    /// `OnlyDeleted` on a type without soft-delete config is a
    /// configuration error; there is no marker to filter on.
    pub fn for_type(record_type: &RecordType, visibility: Visibility) -> Result<Self, ConfigError> {
        if record_type.soft_delete.is_none() && visibility == Visibility::OnlyDeleted {
            return Err(ConfigError::NotSoftDeletable(record_type.name.clone()));
        }

        Ok(Self {
            table: record_type.table.clone(),
            id_column: record_type.id_column.clone(),
            marker: record_type
                .soft_delete
                .as_ref()
                .map(|config| (config.marker_column.clone(), config.scheme)),
            visibility,
            predicates: Vec::new(),
            params: Vec::new(),
        })
    }

    /// Appends one caller predicate with its bind values.
    ///
    /// The fragment uses positional `?` placeholders; bind order follows
    /// append order.
    pub fn and_where(mut self, fragment: &str, params: Vec<Value>) -> Self {
        self.predicates.push(fragment.to_string());
        self.params.extend(params);
        self
    }

    /// Restricts the query to one identity.
    pub fn by_id(self, id: RecordId) -> Self {
        let fragment = format!("{} = ?", self.id_column);
        self.and_where(&fragment, vec![Value::Text(id.to_string())])
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    /// Scheme of the selected marker column, when the type carries one.
    pub fn marker_scheme(&self) -> Option<MarkerScheme> {
        self.marker.as_ref().map(|(_, scheme)| *scheme)
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Renders the SELECT statement.
    pub fn sql(&self) -> String {
        let mut sql = format!("SELECT {} AS id", self.id_column);
        if let Some((column, _)) = &self.marker {
            sql.push_str(&format!(", {column} AS marker"));
        }
        sql.push_str(&format!(" FROM {} WHERE 1 = 1", self.table));

        if let Some(restriction) = self.marker_restriction() {
            sql.push_str(" AND ");
            sql.push_str(&restriction);
        }
        for predicate in &self.predicates {
            sql.push_str(" AND ");
            sql.push_str(predicate);
        }

        sql.push_str(&format!(" ORDER BY {} ASC", self.id_column));
        sql
    }

    fn marker_restriction(&self) -> Option<String> {
        let (column, scheme) = self.marker.as_ref()?;
        match (self.visibility, scheme) {
            (Visibility::WithDeleted, _) => None,
            (Visibility::Default, MarkerScheme::Timestamp) => Some(format!("{column} IS NULL")),
            (Visibility::Default, MarkerScheme::Flag) => Some(format!("{column} = 0")),
            (Visibility::OnlyDeleted, MarkerScheme::Timestamp) => {
                Some(format!("{column} IS NOT NULL"))
            }
            (Visibility::OnlyDeleted, MarkerScheme::Flag) => Some(format!("{column} = 1")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ScopedQuery, Visibility};
    use crate::model::marker::MarkerScheme;
    use crate::model::schema::{ConfigError, RecordType};
    use rusqlite::types::Value;
    use uuid::Uuid;

    fn timestamp_type() -> RecordType {
        RecordType::new("posts", "posts").with_soft_delete("deleted_at", MarkerScheme::Timestamp)
    }

    fn flag_type() -> RecordType {
        RecordType::new("gadgets", "gadgets").with_soft_delete("is_deleted", MarkerScheme::Flag)
    }

    #[test]
    fn default_scope_excludes_deleted_rows() {
        let query = ScopedQuery::for_type(&timestamp_type(), Visibility::Default)
            .expect("timestamp scope");
        assert_eq!(
            query.sql(),
            "SELECT uuid AS id, deleted_at AS marker FROM posts \
             WHERE 1 = 1 AND deleted_at IS NULL ORDER BY uuid ASC"
        );

        let query = ScopedQuery::for_type(&flag_type(), Visibility::Default).expect("flag scope");
        assert_eq!(
            query.sql(),
            "SELECT uuid AS id, is_deleted AS marker FROM gadgets \
             WHERE 1 = 1 AND is_deleted = 0 ORDER BY uuid ASC"
        );
    }

    #[test]
    fn only_deleted_scope_inverts_the_restriction() {
        let query = ScopedQuery::for_type(&timestamp_type(), Visibility::OnlyDeleted)
            .expect("timestamp scope");
        assert!(query.sql().contains("deleted_at IS NOT NULL"));

        let query =
            ScopedQuery::for_type(&flag_type(), Visibility::OnlyDeleted).expect("flag scope");
        assert!(query.sql().contains("is_deleted = 1"));
    }

    #[test]
    fn with_deleted_scope_drops_the_marker_restriction() {
        let query = ScopedQuery::for_type(&timestamp_type(), Visibility::WithDeleted)
            .expect("timestamp scope");
        assert_eq!(
            query.sql(),
            "SELECT uuid AS id, deleted_at AS marker FROM posts WHERE 1 = 1 ORDER BY uuid ASC"
        );
    }

    #[test]
    fn caller_predicates_compose_without_touching_the_scope() {
        let id = Uuid::parse_str("00000000-0000-4000-8000-000000000001").expect("fixed uuid");
        let query = ScopedQuery::for_type(&timestamp_type(), Visibility::OnlyDeleted)
            .expect("timestamp scope")
            .and_where("author_uuid = ?", vec![Value::Text("a".to_string())])
            .by_id(id);

        assert_eq!(
            query.sql(),
            "SELECT uuid AS id, deleted_at AS marker FROM posts \
             WHERE 1 = 1 AND deleted_at IS NOT NULL AND author_uuid = ? AND uuid = ? \
             ORDER BY uuid ASC"
        );
        assert_eq!(query.params().len(), 2);
    }

    #[test]
    fn non_capable_type_has_no_marker_restriction() {
        let plain = RecordType::new("authors", "authors");
        let query = ScopedQuery::for_type(&plain, Visibility::Default).expect("default scope");
        assert_eq!(
            query.sql(),
            "SELECT uuid AS id FROM authors WHERE 1 = 1 ORDER BY uuid ASC"
        );
        assert_eq!(query.marker_scheme(), None);
    }

    #[test]
    fn only_deleted_rejects_non_capable_type() {
        let plain = RecordType::new("authors", "authors");
        let err = ScopedQuery::for_type(&plain, Visibility::OnlyDeleted)
            .expect_err("only-deleted needs a marker");
        assert_eq!(err, ConfigError::NotSoftDeletable("authors".to_string()));
    }
}
