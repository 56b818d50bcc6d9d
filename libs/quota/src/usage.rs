use serde::{Deserialize, Serialize};

/// Authoritative usage of one owner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub bytes: u64,
    pub messages: u64,
}

/// Signed change in usage caused by one mail transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageDelta {
    pub bytes: i64,
    pub messages: i64,
}

impl UsageDelta {
    pub fn new(bytes: i64, messages: i64) -> Self {
        Self { bytes, messages }
    }

    pub fn message_added(&mut self, size: u64) {
        self.bytes = self.bytes.saturating_add_unsigned(size);
        self.messages = self.messages.saturating_add(1);
    }

    pub fn message_expunged(&mut self, size: u64) {
        self.bytes = self.bytes.saturating_sub_unsigned(size);
        self.messages = self.messages.saturating_sub(1);
    }

    pub fn is_empty(&self) -> bool {
        self.bytes == 0 && self.messages == 0
    }
}
