use crate::core::{Namespace, Result, Statement, Warehouse, WarehouseConnection};
use crate::utils::error::IngestError;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

/// Everything the in-memory warehouse has seen, shared by all of its connections.
#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    /// Every statement attempted, including ones that failed.
    pub statements: Vec<Statement>,
    pub schemas: BTreeSet<String>,
    /// Rows keyed by `DATABASE.SCHEMA.TABLE`.
    pub tables: BTreeMap<String, Vec<String>>,
    pub connects: usize,
    pub closes: usize,
}

impl MemoryState {
    pub fn count_statements(&self, prefix: &str) -> usize {
        self.statements
            .iter()
            .filter(|s| s.sql.starts_with(prefix))
            .count()
    }
}

/// In-process stand-in for a warehouse that understands the loader's statements.
#[derive(Debug, Clone)]
pub struct MemoryWarehouse {
    namespace: Namespace,
    state: Arc<Mutex<MemoryState>>,
    fail_on: Option<String>,
    refuse_connections: bool,
}

impl MemoryWarehouse {
    pub fn new(namespace: Namespace) -> Self {
        Self {
            namespace,
            state: Arc::new(Mutex::new(MemoryState::default())),
            fail_on: None,
            refuse_connections: false,
        }
    }

    /// Fails any statement whose SQL or bindings contain `fragment`.
    pub fn failing_on(mut self, fragment: &str) -> Self {
        self.fail_on = Some(fragment.to_string());
        self
    }

    pub fn refusing_connections(mut self) -> Self {
        self.refuse_connections = true;
        self
    }

    /// Creates `table` in the warehouse namespace with pre-existing rows.
    pub fn seed_table(&self, table: &str, rows: Vec<String>) {
        let mut state = lock(&self.state);
        state.schemas.insert(format!(
            "{}.{}",
            self.namespace.database, self.namespace.schema
        ));
        state.tables.insert(self.table_key(table), rows);
    }

    pub fn rows(&self, table: &str) -> Option<Vec<String>> {
        lock(&self.state).tables.get(&self.table_key(table)).cloned()
    }

    pub fn snapshot(&self) -> MemoryState {
        lock(&self.state).clone()
    }

    fn table_key(&self, table: &str) -> String {
        format!(
            "{}.{}.{}",
            self.namespace.database, self.namespace.schema, table
        )
    }
}

fn lock(state: &Mutex<MemoryState>) -> MutexGuard<'_, MemoryState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl Warehouse for MemoryWarehouse {
    type Connection = MemoryConnection;

    async fn connect(&self) -> Result<MemoryConnection> {
        if self.refuse_connections {
            return Err(IngestError::ConnectionError {
                message: "in-memory warehouse is refusing connections".to_string(),
            });
        }

        lock(&self.state).connects += 1;
        Ok(MemoryConnection {
            namespace: self.namespace.clone(),
            state: Arc::clone(&self.state),
            fail_on: self.fail_on.clone(),
            database: None,
            schema: None,
        })
    }
}

pub struct MemoryConnection {
    namespace: Namespace,
    state: Arc<Mutex<MemoryState>>,
    fail_on: Option<String>,
    database: Option<String>,
    schema: Option<String>,
}

impl MemoryConnection {
    fn qualified_table(&self, table: &str) -> Result<String> {
        match (&self.database, &self.schema) {
            (Some(db), Some(schema)) => Ok(format!("{}.{}.{}", db, schema, table)),
            _ => Err(statement_error(format!(
                "Cannot perform operation on {}. This session does not have a current schema.",
                table
            ))),
        }
    }

    fn apply(&mut self, statement: &Statement, state: &mut MemoryState) -> Result<()> {
        let sql = statement.sql.trim().trim_end_matches(';');
        let tokens: Vec<&str> = sql.split_whitespace().collect();
        let upper: Vec<String> = tokens.iter().map(|t| t.to_ascii_uppercase()).collect();
        let keywords: Vec<&str> = upper.iter().map(String::as_str).collect();

        match keywords.as_slice() {
            ["USE", "DATABASE", _] => {
                self.database = Some(tokens[2].to_string());
                Ok(())
            }
            ["CREATE", "SCHEMA", "IF", "NOT", "EXISTS", _] => {
                let database = self.database.clone().ok_or_else(|| {
                    statement_error("This session does not have a current database.".to_string())
                })?;
                state.schemas.insert(format!("{}.{}", database, tokens[5]));
                Ok(())
            }
            ["USE", "SCHEMA", _] => {
                let database = self.database.clone().ok_or_else(|| {
                    statement_error("This session does not have a current database.".to_string())
                })?;
                let key = format!("{}.{}", database, tokens[2]);
                if !state.schemas.contains(&key) {
                    return Err(statement_error(format!(
                        "Schema '{}' does not exist or not authorized.",
                        key
                    )));
                }
                self.schema = Some(tokens[2].to_string());
                Ok(())
            }
            ["CREATE", "TABLE", "IF", "NOT", "EXISTS", _, "(RAW_JSON", "VARIANT)"] => {
                let key = self.qualified_table(tokens[5])?;
                state.tables.entry(key).or_default();
                Ok(())
            }
            ["TRUNCATE", "TABLE", _] => {
                let key = self.qualified_table(tokens[2])?;
                let rows = state.tables.get_mut(&key).ok_or_else(|| {
                    statement_error(format!("Table '{}' does not exist.", key))
                })?;
                rows.clear();
                Ok(())
            }
            ["INSERT", "INTO", _, "(RAW_JSON)", "SELECT", "PARSE_JSON(?)"] => {
                let key = self.qualified_table(tokens[2])?;
                let value = match statement.bindings.as_slice() {
                    [value] => value,
                    other => {
                        return Err(statement_error(format!(
                            "expected 1 binding, got {}",
                            other.len()
                        )))
                    }
                };
                serde_json::from_str::<serde::de::IgnoredAny>(value).map_err(|e| {
                    statement_error(format!("Error parsing JSON: {}", e))
                })?;
                let rows = state.tables.get_mut(&key).ok_or_else(|| {
                    statement_error(format!("Table '{}' does not exist.", key))
                })?;
                rows.push(value.clone());
                Ok(())
            }
            _ => Err(statement_error(format!("unsupported statement: {}", sql))),
        }
    }
}

fn statement_error(message: String) -> IngestError {
    IngestError::StatementError {
        code: None,
        message,
    }
}

#[async_trait]
impl WarehouseConnection for MemoryConnection {
    fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    async fn execute(&mut self, statement: &Statement) -> Result<()> {
        let state = Arc::clone(&self.state);
        let mut state = lock(&state);
        state.statements.push(statement.clone());

        if let Some(fragment) = &self.fail_on {
            let hit = statement.sql.contains(fragment.as_str())
                || statement.bindings.iter().any(|b| b.contains(fragment.as_str()));
            if hit {
                return Err(statement_error(format!(
                    "injected failure on: {}",
                    statement.sql
                )));
            }
        }

        self.apply(statement, &mut state)
    }

    async fn close(self) -> Result<()> {
        lock(&self.state).closes += 1;
        Ok(())
    }
}
