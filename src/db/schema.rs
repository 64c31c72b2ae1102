//! Database schema

/// SQL schema for initialization
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS contexts (
    id INTEGER PRIMARY KEY,
    context TEXT NOT NULL
);
";
