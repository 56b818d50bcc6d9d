//! Conversion between counter values and their stored text form.
//!
//! Counters are kept as decimal strings because the dictionary is declared
//! string-typed. Nothing outside this module formats or parses them.

/// Formats a counter for storage.
pub fn encode(value: u64) -> String {
    value.to_string()
}

/// Parses a stored counter. Anything that is not a non-negative decimal
/// integer is untrusted and yields `None`.
pub fn decode(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_valid() {
        assert_eq!(decode("0"), Some(0));
        assert_eq!(decode("500"), Some(500));
        assert_eq!(decode(" 7\n"), Some(7));
        assert_eq!(decode(&encode(u64::MAX)), Some(u64::MAX));
    }

    #[test]
    fn test_decode_untrusted() {
        assert_eq!(decode(""), None);
        assert_eq!(decode("-12"), None);
        assert_eq!(decode("+12"), None);
        assert_eq!(decode("12kb"), None);
        assert_eq!(decode("18446744073709551616"), None);
    }
}
