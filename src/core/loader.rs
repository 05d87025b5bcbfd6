use crate::core::{Dataset, LoadOutcome, Namespace, RawRecord, Result, Statement, WarehouseConnection};
use crate::domain::model::Identifier;

/// Statements that select the namespace, ensure the table exists and empty it.
pub fn setup_statements(namespace: &Namespace, table: &Identifier) -> Vec<Statement> {
    vec![
        Statement::new(format!("USE DATABASE {};", namespace.database)),
        Statement::new(format!("CREATE SCHEMA IF NOT EXISTS {};", namespace.schema)),
        Statement::new(format!("USE SCHEMA {};", namespace.schema)),
        Statement::new(format!(
            "CREATE TABLE IF NOT EXISTS {} (RAW_JSON VARIANT);",
            table
        )),
        Statement::new(format!("TRUNCATE TABLE {};", table)),
    ]
}

pub fn insert_statement(table: &Identifier, record: &RawRecord) -> Statement {
    Statement::new(format!(
        "INSERT INTO {} (RAW_JSON) SELECT PARSE_JSON(?);",
        table
    ))
    .bind(record.as_json())
}

/// Replaces the contents of `dataset.table` with the dataset's records.
///
/// An empty dataset runs nothing and leaves the table as it was. Inserts are
/// not wrapped in a transaction: a failure part way through leaves the rows
/// inserted so far in place.
pub async fn load_dataset<C>(conn: &mut C, dataset: &Dataset) -> Result<LoadOutcome>
where
    C: WarehouseConnection,
{
    let table = &dataset.table;

    if dataset.is_empty() {
        tracing::warn!("No data provided to load into {}. Skipping.", table);
        return Ok(LoadOutcome::Skipped);
    }

    let namespace = conn.namespace().clone();
    tracing::info!(
        "Preparing to load {} records into {}.{}...",
        dataset.len(),
        namespace,
        table
    );

    for statement in setup_statements(&namespace, table) {
        tracing::debug!("Executing: {}", statement);
        conn.execute(&statement)
            .await
            .map_err(|e| e.in_table(table.as_str()))?;
    }

    for (index, record) in dataset.records.iter().enumerate() {
        conn.execute(&insert_statement(table, record))
            .await
            .map_err(|e| {
                tracing::error!(
                    "Insert {} of {} into {} failed; table is partially loaded",
                    index + 1,
                    dataset.len(),
                    table
                );
                e.in_table(table.as_str())
            })?;
    }

    tracing::info!("Successfully loaded {} records into {}.", dataset.len(), table);
    Ok(LoadOutcome::Loaded {
        rows: dataset.len(),
    })
}
