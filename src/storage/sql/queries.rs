//! SQL statements per dialect.
//!
//! Postgres, MSSQL and SQLite share one table layout; only placeholder
//! syntax, identifier casing and column types differ.

use crate::storage::StoreError;
use regex::Regex;
use std::fmt;

/// Table identifiers must be plain names; they are interpolated into SQL.
static VALID_TABLE_REGEX: std::sync::LazyLock<Option<Regex>> =
    std::sync::LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,127}$").ok());

/// SQL dialect a store speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    Mssql,
    Sqlite,
}

impl Dialect {
    /// Table name used when none is configured
    pub fn default_table(&self) -> &'static str {
        match self {
            Self::Mssql => "Secrets",
            Self::Postgres | Self::Sqlite => "secrets",
        }
    }

    /// Positional parameter `n` (1-based)
    pub fn placeholder(&self, n: usize) -> String {
        match self {
            Self::Postgres => format!("${}", n),
            Self::Mssql => format!("@P{}", n),
            Self::Sqlite => format!("?{}", n),
        }
    }

    fn columns(&self) -> Columns {
        match self {
            Self::Mssql => Columns { id: "ID", value: "Value", expires_at: "ExpiresAt" },
            Self::Postgres | Self::Sqlite => {
                Columns { id: "id", value: "value", expires_at: "expires_at" }
            }
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Postgres => "postgres",
            Self::Mssql => "mssql",
            Self::Sqlite => "sqlite",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy)]
struct Columns {
    id: &'static str,
    value: &'static str,
    expires_at: &'static str,
}

/// Prepared statement text for one dialect and table
#[derive(Debug, Clone)]
pub struct Queries {
    pub dialect: Dialect,
    pub table: String,
    pub create_table: String,
    pub select: String,
    pub insert: String,
    pub delete: String,
    pub delete_expired: String,
}

impl Queries {
    /// Build the statements for `dialect`, using `table` or the dialect's
    /// default table name.
    pub fn new(dialect: Dialect, table: Option<&str>) -> Result<Self, StoreError> {
        let table = table.unwrap_or_else(|| dialect.default_table()).to_string();
        let valid = VALID_TABLE_REGEX.as_ref().map(|re| re.is_match(&table)).unwrap_or(false);
        if !valid {
            return Err(StoreError::query(format!("invalid table name '{}'", table)));
        }

        let Columns { id, value, expires_at } = dialect.columns();
        let p = |n| dialect.placeholder(n);

        let create_table = match dialect {
            Dialect::Postgres => format!(
                "CREATE TABLE IF NOT EXISTS {table} (\
                 {id} VARCHAR(36) PRIMARY KEY NOT NULL, \
                 {value} TEXT NOT NULL, \
                 {expires_at} TIMESTAMPTZ NOT NULL)"
            ),
            Dialect::Mssql => format!(
                "IF NOT EXISTS (SELECT * FROM sysobjects WHERE name='{table}' AND xtype='U') \
                 CREATE TABLE {table} (\
                 {id} VARCHAR(36) NOT NULL PRIMARY KEY, \
                 {value} NVARCHAR(MAX) NOT NULL, \
                 {expires_at} DATETIMEOFFSET NOT NULL)"
            ),
            Dialect::Sqlite => format!(
                "CREATE TABLE IF NOT EXISTS {table} (\
                 {id} TEXT PRIMARY KEY NOT NULL, \
                 {value} TEXT NOT NULL, \
                 {expires_at} DATETIME NOT NULL)"
            ),
        };

        Ok(Self {
            dialect,
            select: format!(
                "SELECT {id}, {value}, {expires_at} FROM {table} WHERE {id} = {}",
                p(1)
            ),
            insert: format!(
                "INSERT INTO {table} ({id}, {value}, {expires_at}) VALUES ({}, {}, {})",
                p(1),
                p(2),
                p(3)
            ),
            delete: format!("DELETE FROM {table} WHERE {id} = {}", p(1)),
            delete_expired: format!("DELETE FROM {table} WHERE {expires_at} < {}", p(1)),
            create_table,
            table,
        })
    }
}
