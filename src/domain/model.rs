use crate::utils::error::Result;
use crate::utils::validation::validate_identifier;
use serde::Deserialize;
use serde_json::value::RawValue;
use std::fmt;

/// One source record, kept as the JSON text the API sent.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct RawRecord(Box<RawValue>);

impl RawRecord {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self(RawValue::from_string(json.to_string())?))
    }

    pub fn as_json(&self) -> &str {
        self.0.get()
    }
}

/// Records fetched from one endpoint, in source order.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub name: String,
    pub table: Identifier,
    pub records: Vec<RawRecord>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// A database, schema or table name that passed the identifier allow-list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(String);

impl Identifier {
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        validate_identifier(&value)?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The (database, schema) pair selected before table operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    pub database: Identifier,
    pub schema: Identifier,
}

impl Namespace {
    pub fn new(database: &str, schema: &str) -> Result<Self> {
        Ok(Self {
            database: Identifier::new(database)?,
            schema: Identifier::new(schema)?,
        })
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.schema)
    }
}

/// SQL text plus positional text bindings for its `?` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub sql: String,
    pub bindings: Vec<String>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            bindings: Vec::new(),
        }
    }

    pub fn bind(mut self, value: impl Into<String>) -> Self {
        self.bindings.push(value.into());
        self
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded { rows: usize },
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetReport {
    pub dataset: String,
    pub table: String,
    pub outcome: LoadOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub datasets: Vec<DatasetReport>,
}

impl IngestReport {
    pub fn rows_loaded(&self) -> usize {
        self.datasets
            .iter()
            .map(|d| match d.outcome {
                LoadOutcome::Loaded { rows } => rows,
                LoadOutcome::Skipped => 0,
            })
            .sum()
    }
}
