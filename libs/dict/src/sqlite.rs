use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::anyhow;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::debug;

use crate::error::DictError;
use crate::schema::init_database;
use crate::transaction::{DictOp, DictTransaction};
use crate::{increment_integer, scoped_owner, Dict, DictLookup, DictValueType};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SELECT_VALUE: &str = r#"
    SELECT value
    FROM dict
    WHERE username = ?1 AND key = ?2
"#;

/// Dictionary stored in a SQLite database file.
///
/// Several processes may open the same file; write transactions take the
/// database write lock up front so concurrent increments serialize.
pub struct SqliteDict {
    conn: Connection,
    username: String,
    value_type: DictValueType,
}

impl SqliteDict {
    pub fn open(
        location: &str,
        value_type: DictValueType,
        username: &str,
    ) -> Result<Self, DictError> {
        if location.is_empty() {
            return Err(DictError::Connect {
                uri: format!("sqlite:{location}"),
                source: anyhow!("database path is empty"),
            });
        }

        let path = PathBuf::from(location);
        let conn = connect(&path).map_err(|err| DictError::Connect {
            uri: format!("sqlite:{location}"),
            source: err.into(),
        })?;
        debug!(path = %path.display(), username, "opened sqlite dict");

        Ok(Self {
            conn,
            username: username.to_string(),
            value_type,
        })
    }
}

fn connect(path: &Path) -> Result<Connection, DictError> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    init_database(&conn)?;
    Ok(conn)
}

impl Dict for SqliteDict {
    fn username(&self) -> &str {
        &self.username
    }

    fn value_type(&self) -> DictValueType {
        self.value_type
    }

    fn lookup(&mut self, key: &str) -> Result<DictLookup, DictError> {
        let owner = scoped_owner(key, &self.username)?;
        let value = self
            .conn
            .query_row(SELECT_VALUE, params![owner, key], |row| row.get::<_, String>(0))
            .optional()?;

        Ok(match value {
            Some(value) => DictLookup::Found(value),
            None => DictLookup::Absent,
        })
    }

    fn commit(&mut self, txn: DictTransaction) -> Result<(), DictError> {
        if txn.is_empty() {
            return Ok(());
        }

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let now = Utc::now().to_rfc3339();

        for op in txn.into_ops() {
            let owner = scoped_owner(op.key(), &self.username)?;
            match op {
                DictOp::Set { key, value } => {
                    tx.execute(
                        r#"
                        INSERT INTO dict (username, key, value, updated_at)
                        VALUES (?1, ?2, ?3, ?4)
                        ON CONFLICT(username, key) DO UPDATE SET
                            value = excluded.value,
                            updated_at = excluded.updated_at
                        "#,
                        params![owner, key, value, now],
                    )?;
                }
                DictOp::Unset { key } => {
                    tx.execute(
                        "DELETE FROM dict WHERE username = ?1 AND key = ?2",
                        params![owner, key],
                    )?;
                }
                DictOp::AtomicInc { key, delta } => {
                    let current = tx
                        .query_row(SELECT_VALUE, params![owner, key], |row| {
                            row.get::<_, String>(0)
                        })
                        .optional()?;

                    if let Some(current) = current {
                        let value = increment_integer(&key, &current, delta)?;
                        tx.execute(
                            r#"
                            UPDATE dict
                            SET value = ?3,
                                updated_at = ?4
                            WHERE username = ?1 AND key = ?2
                            "#,
                            params![owner, key, value, now],
                        )?;
                    }
                }
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<(), DictError> {
        let this = *self;
        this.conn
            .close()
            .map_err(|(_, err)| DictError::Database(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open(dir: &Path, username: &str) -> SqliteDict {
        let path = dir.join("dict.db");
        SqliteDict::open(path.to_str().unwrap(), DictValueType::String, username).unwrap()
    }

    #[test]
    fn test_set_and_lookup() {
        let temp = tempdir().unwrap();
        let mut dict = open(temp.path(), "alice");

        assert_eq!(dict.lookup("priv/quota/storage").unwrap(), DictLookup::Absent);

        let mut txn = dict.transaction_begin();
        txn.set("priv/quota/storage", "18446744073709551615");
        dict.commit(txn).unwrap();

        assert_eq!(
            dict.lookup("priv/quota/storage").unwrap(),
            DictLookup::Found("18446744073709551615".into())
        );
    }

    #[test]
    fn test_private_keys_not_visible_to_other_users() {
        let temp = tempdir().unwrap();
        let mut alice = open(temp.path(), "alice");
        let mut bob = open(temp.path(), "bob");

        let mut txn = alice.transaction_begin();
        txn.set("priv/quota/messages", "4");
        txn.set("shared/notice", "maintenance");
        alice.commit(txn).unwrap();

        assert_eq!(bob.lookup("priv/quota/messages").unwrap(), DictLookup::Absent);
        assert_eq!(
            bob.lookup("shared/notice").unwrap(),
            DictLookup::Found("maintenance".into())
        );
    }

    #[test]
    fn test_failed_increment_rolls_back_whole_transaction() {
        let temp = tempdir().unwrap();
        let mut dict = open(temp.path(), "alice");

        let mut txn = dict.transaction_begin();
        txn.set("priv/quota/storage", "1000");
        txn.set("priv/quota/messages", "garbage");
        dict.commit(txn).unwrap();

        let mut txn = dict.transaction_begin();
        txn.atomic_inc("priv/quota/storage", 500);
        txn.atomic_inc("priv/quota/messages", 1);
        assert!(matches!(
            dict.commit(txn),
            Err(DictError::InvalidValue { .. })
        ));

        assert_eq!(
            dict.lookup("priv/quota/storage").unwrap(),
            DictLookup::Found("1000".into())
        );
    }

    #[test]
    fn test_increment_full_width_counter() {
        let temp = tempdir().unwrap();
        let mut dict = open(temp.path(), "alice");

        let mut txn = dict.transaction_begin();
        txn.set("priv/quota/storage", (u64::MAX - 1).to_string());
        dict.commit(txn).unwrap();

        let mut txn = dict.transaction_begin();
        txn.atomic_inc("priv/quota/storage", -1);
        dict.commit(txn).unwrap();
        assert_eq!(
            dict.lookup("priv/quota/storage").unwrap(),
            DictLookup::Found((u64::MAX - 2).to_string())
        );

        let mut txn = dict.transaction_begin();
        txn.atomic_inc("priv/quota/storage", 3);
        assert!(matches!(dict.commit(txn), Err(DictError::Overflow { .. })));
        assert_eq!(
            dict.lookup("priv/quota/storage").unwrap(),
            DictLookup::Found((u64::MAX - 2).to_string())
        );
    }

    #[test]
    fn test_increment_absent_key_is_noop() {
        let temp = tempdir().unwrap();
        let mut dict = open(temp.path(), "alice");

        let mut txn = dict.transaction_begin();
        txn.atomic_inc("priv/quota/storage", 10);
        dict.commit(txn).unwrap();

        assert_eq!(dict.lookup("priv/quota/storage").unwrap(), DictLookup::Absent);
    }

    #[test]
    fn test_unset_and_close() {
        let temp = tempdir().unwrap();
        let mut dict = open(temp.path(), "alice");

        let mut txn = dict.transaction_begin();
        txn.set("priv/a", "1");
        dict.commit(txn).unwrap();

        let mut txn = dict.transaction_begin();
        txn.unset("priv/a");
        dict.commit(txn).unwrap();
        assert_eq!(dict.lookup("priv/a").unwrap(), DictLookup::Absent);

        Box::new(dict).close().unwrap();
    }

    #[test]
    fn test_empty_location_rejected() {
        assert!(matches!(
            SqliteDict::open("", DictValueType::String, "alice"),
            Err(DictError::Connect { .. })
        ));
    }
}
