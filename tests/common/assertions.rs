//! Response validation and assertion utilities

use reqwest::{Response, StatusCode};

/// Response validation helpers
pub trait ResponseAssertions {
    /// Assert response has expected status code
    fn assert_status(&self, expected: StatusCode) -> &Self;

    /// Assert response contains expected header
    fn assert_header(&self, name: &str, expected: &str) -> &Self;

    /// Value of a header, or "" when it is absent
    fn header_str(&self, name: &str) -> &str;
}

impl ResponseAssertions for Response {
    fn assert_status(&self, expected: StatusCode) -> &Self {
        assert_eq!(
            self.status(),
            expected,
            "Expected status {}, got {}",
            expected,
            self.status()
        );
        self
    }

    fn assert_header(&self, name: &str, expected: &str) -> &Self {
        let header_value = self
            .headers()
            .get(name)
            .unwrap_or_else(|| panic!("Header '{}' not found", name))
            .to_str()
            .unwrap_or_else(|_| panic!("Header '{}' contains invalid characters", name));

        assert_eq!(
            header_value, expected,
            "Expected header '{}' to be '{}', got '{}'",
            name, expected, header_value
        );
        self
    }

    fn header_str(&self, name: &str) -> &str {
        self.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
    }
}
