//! Shared helpers for decoding migrator bookkeeping rows.
//!
//! Rows follow the column order documented on [`crate::Dialect`]. The
//! closures handed to DuckDB can only fail with `duckdb::Error`, so rows are
//! read into plain tuples first and converted into domain types afterwards.

use crate::error::{DbError, DbResult};
use chrono::{DateTime, Utc};
use mg_core::{AppliedMigration, MigrationDefinition, MigrationKind, Version};

pub(crate) type VersionRow = (i64, String, i64);

pub(crate) struct AppliedRow {
    id: i64,
    name: String,
    source_dir: String,
    file: String,
    kind: i32,
    schema: String,
    created: i64,
    contents: String,
    checksum: String,
    version: VersionRow,
}

pub(crate) fn read_version_row(row: &duckdb::Row<'_>) -> duckdb::Result<VersionRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

pub(crate) fn read_applied_row(row: &duckdb::Row<'_>) -> duckdb::Result<AppliedRow> {
    Ok(AppliedRow {
        id: row.get(0)?,
        name: row.get(1)?,
        source_dir: row.get(2)?,
        file: row.get(3)?,
        kind: row.get(4)?,
        schema: row.get(5)?,
        created: row.get(6)?,
        contents: row.get(7)?,
        checksum: row.get(8)?,
        version: (row.get(9)?, row.get(10)?, row.get(11)?),
    })
}

fn timestamp(millis: i64) -> DbResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| DbError::QueryError(format!("timestamp out of range: {millis}ms")))
}

pub(crate) fn into_version((id, name, created): VersionRow) -> DbResult<Version> {
    Ok(Version {
        id,
        name,
        created: timestamp(created)?,
    })
}

pub(crate) fn into_applied(row: AppliedRow) -> DbResult<AppliedMigration> {
    let kind = MigrationKind::from_code(row.kind)
        .map_err(|e| DbError::QueryError(format!("migration record {}: {e}", row.id)))?;
    Ok(AppliedMigration {
        id: row.id,
        definition: MigrationDefinition {
            name: row.name,
            source_dir: row.source_dir,
            file: row.file,
            kind,
            contents: row.contents,
            checksum: row.checksum,
        },
        schema: row.schema,
        created: timestamp(row.created)?,
        version: into_version(row.version)?,
    })
}
