/// A single queued write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DictOp {
    Set { key: String, value: String },
    Unset { key: String },
    AtomicInc { key: String, delta: i64 },
}

impl DictOp {
    pub fn key(&self) -> &str {
        match self {
            DictOp::Set { key, .. } | DictOp::Unset { key } | DictOp::AtomicInc { key, .. } => key,
        }
    }
}

/// Writes buffered until [`crate::Dict::commit`].
///
/// Dropping a transaction without committing it discards every queued write.
#[derive(Debug, Default, Clone)]
pub struct DictTransaction {
    ops: Vec<DictOp>,
}

impl DictTransaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.ops.push(DictOp::Set {
            key: key.to_string(),
            value: value.into(),
        });
    }

    pub fn unset(&mut self, key: &str) {
        self.ops.push(DictOp::Unset {
            key: key.to_string(),
        });
    }

    /// Adds `delta` to the integer stored at `key`.
    ///
    /// Increments on an absent key leave it absent.
    pub fn atomic_inc(&mut self, key: &str, delta: i64) {
        self.ops.push(DictOp::AtomicInc {
            key: key.to_string(),
            delta,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn into_ops(self) -> Vec<DictOp> {
        self.ops
    }
}
