//! Sender address extraction.

/// Extract the bare address from a `Display Name <addr>` sender.
///
/// Returns the text between the first `<` and the next `>`, trimmed. Input
/// without that bracket pair (including `>` only before `<`) comes back
/// trimmed but otherwise unchanged.
pub fn extract_address(raw: &str) -> &str {
    if let Some(open) = raw.find('<')
        && let Some(len) = raw[open + 1..].find('>')
    {
        return raw[open + 1..open + 1 + len].trim();
    }
    raw.trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_form() {
        assert_eq!(extract_address("Jane Doe <jane@example.com>"), "jane@example.com");
    }

    #[test]
    fn inner_whitespace_trimmed() {
        assert_eq!(extract_address("Bob < bob@x.com >"), "bob@x.com");
    }

    #[test]
    fn bare_address_trimmed() {
        assert_eq!(extract_address("  jane@example.com  "), "jane@example.com");
    }

    #[test]
    fn open_bracket_without_close_returns_trimmed_input() {
        assert_eq!(extract_address(" Jane <jane@example.com "), "Jane <jane@example.com");
    }

    #[test]
    fn close_before_open_returns_trimmed_input() {
        assert_eq!(extract_address(" a> b <c "), "a> b <c");
    }

    #[test]
    fn close_only_returns_trimmed_input() {
        assert_eq!(extract_address("jane@example.com>"), "jane@example.com>");
    }

    #[test]
    fn first_close_after_open_wins() {
        assert_eq!(extract_address("x <a@b.c> <d@e.f>"), "a@b.c");
    }

    #[test]
    fn empty_brackets_yield_empty() {
        assert_eq!(extract_address("Nobody <>"), "");
    }

    #[test]
    fn empty_input() {
        assert_eq!(extract_address(""), "");
    }
}
