use rusqlite::Connection;

use crate::error::DictError;

pub const DICT_TABLE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS dict (
    username TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (username, key)
);
"#;

pub fn init_database(conn: &Connection) -> Result<(), DictError> {
    conn.execute_batch(DICT_TABLE_SCHEMA)?;
    Ok(())
}
