//! Statement builders for job databases.
//!
//! Table and column names come from job definitions, so they are quoted as
//! identifiers. Values always travel as bind parameters.

/// Quote a possibly schema-qualified name: `sales.orders` -> `"sales"."orders"`.
pub fn quote_ident(name: &str) -> String {
    name.split('.')
        .map(|part| format!("\"{}\"", part.trim().replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(".")
}

/// A single column name; dots are kept as part of the name.
pub fn quote_column(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Each source row comes back as one JSON object keyed by column name.
/// An empty column list is valid and yields `{}` per row.
pub fn select_rows(table: &str, columns: &[&str]) -> String {
    let cols = columns
        .iter()
        .map(|c| quote_column(c))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "SELECT to_jsonb(s) FROM (SELECT {cols} FROM {}) AS s",
        quote_ident(table)
    )
}

/// `$1` is a JSON object; Postgres converts each field to the column type.
pub fn insert_row(table: &str, columns: &[&str]) -> String {
    let table = quote_ident(table);
    let cols = columns
        .iter()
        .map(|c| quote_column(c))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {table} ({cols}) SELECT {cols} FROM json_populate_record(NULL::{table}, $1::json)"
    )
}

/// Equality on every key column, values taken from the JSON object in `$1`.
pub fn row_exists(table: &str, key_columns: &[&str]) -> String {
    let table = quote_ident(table);
    let conds = key_columns
        .iter()
        .map(|c| {
            let c = quote_column(c);
            format!("t.{c} = k.{c}")
        })
        .collect::<Vec<_>>()
        .join(" AND ");
    format!(
        "SELECT EXISTS (SELECT 1 FROM {table} AS t, json_populate_record(NULL::{table}, $1::json) AS k WHERE {conds})"
    )
}

/// Trigger predicate; the column is compared as text.
pub fn value_exists(table: &str, column: &str) -> String {
    format!(
        "SELECT EXISTS (SELECT 1 FROM {} WHERE {}::text = $1)",
        quote_ident(table),
        quote_column(column)
    )
}
