// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use regex::Regex;
use std::sync::LazyLock;

static RECIPIENT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("static pattern"));

/// Loose `local@domain.tld` shape check run before anything is sent:
/// no whitespace, a single `@`, and a dot in the domain part.
pub fn is_valid_recipient(value: &str) -> bool {
    RECIPIENT_PATTERN.is_match(value)
}

#[cfg(test)]
mod tests {
    use super::is_valid_recipient;

    #[test]
    fn accepts_ordinary_addresses() {
        for addr in [
            "user@example.com",
            "first.last@mail.example.co.uk",
            "a+tag@b.io",
            "x@y.z",
        ] {
            assert!(is_valid_recipient(addr), "{addr} should be accepted");
        }
    }

    #[test]
    fn rejects_missing_at_or_domain_dot() {
        for addr in [
            "",
            "not-an-email",
            "user@localhost",
            "@example.com",
            "user@",
            "user@.",
            "two@@example.com",
            "user name@example.com",
            "user@exa mple.com",
        ] {
            assert!(!is_valid_recipient(addr), "{addr:?} should be rejected");
        }
    }
}
