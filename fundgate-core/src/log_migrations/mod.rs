//! Schema of the transfer event history (logs.duckdb)
//!
//! SQL files are embedded with include_str! and applied in name order.

/// (filename, sql_content); keep entries sorted by filename
pub const LOG_MIGRATIONS: &[(&str, &str)] = &[
    ("000_migrations.sql", include_str!("000_migrations.sql")),
    (
        "001_initial_schema.sql",
        include_str!("001_initial_schema.sql"),
    ),
];
