//! Time helpers. The order store keeps every timestamp as `i64` Unix millis.

/// Current wall-clock time in Unix millis
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_millis_is_recent() {
        // 2023-11-14
        assert!(now_millis() > 1_700_000_000_000);
    }
}
