//! Database schema definitions

/// SQL to create the key-value table
pub const CREATE_KV_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS mpw_storage (
    key             TEXT NOT NULL PRIMARY KEY,
    value           TEXT NOT NULL
)
"#;

/// All table creation statements
pub const CREATE_ALL_TABLES: &[&str] = &[
    CREATE_KV_TABLE,
];
