//! Type mapping between SQLite and PostgreSQL.
//!
//! SQLite declared types are free-form, so mapping works on substrings: the
//! upper-cased declared type is checked against an ordered token list and the
//! first token found anywhere in it wins. Order matters (`INTEGER` before
//! `INT`, `DATETIME` before `DATE`) and changing it changes generated DDL.

/// Target type used when no token matches.
pub const DEFAULT_TYPE: &str = "TEXT";

/// Ordered `(token, postgres_type)` pairs. First match wins.
const SQLITE_TO_PG: &[(&str, &str)] = &[
    ("INTEGER", "BIGINT"),
    ("INT", "BIGINT"),
    ("TEXT", "TEXT"),
    ("NUMERIC", "NUMERIC"),
    ("REAL", "DOUBLE PRECISION"),
    ("DOUBLE", "DOUBLE PRECISION"),
    ("BOOLEAN", "BOOLEAN"),
    ("DATETIME", "TIMESTAMP"),
    ("DATE", "DATE"),
];

/// Maps source column types to target column types.
#[derive(Debug, Clone, Copy)]
pub struct TypeMapper {
    mappings: &'static [(&'static str, &'static str)],
    default_type: &'static str,
}

impl Default for TypeMapper {
    fn default() -> Self {
        Self {
            mappings: SQLITE_TO_PG,
            default_type: DEFAULT_TYPE,
        }
    }
}

impl TypeMapper {
    /// Create the SQLite → PostgreSQL mapper.
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a declared source type to a target type. Never fails; unknown and
    /// empty types resolve to the default.
    pub fn map(&self, source_type: &str) -> &'static str {
        let upper = source_type.to_uppercase();
        self.mappings
            .iter()
            .find(|(token, _)| upper.contains(token))
            .map(|(_, target)| *target)
            .unwrap_or(self.default_type)
    }

    /// Every type this mapper can produce, default included.
    pub fn target_types(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.mappings
            .iter()
            .map(|(_, target)| *target)
            .chain(std::iter::once(self.default_type))
    }
}

/// Map a SQLite declared type to PostgreSQL using the default mapper.
pub fn sqlite_to_postgres(sqlite_type: &str) -> &'static str {
    TypeMapper::default().map(sqlite_type)
}
