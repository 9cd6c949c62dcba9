/// Schema for the durable session store.
pub const SCHEMA: &str = r#"
-- Opaque string values keyed by name (e.g. "token", "refreshToken")
CREATE TABLE IF NOT EXISTS kv (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;
