//! Phone number normalization for the messaging transport.

/// Turns a subscriber-entered phone number into the digits-only international
/// form the transport addresses chats by.
pub trait PhoneNormalizer: Send + Sync {
    /// ISO 3166-1 alpha-2 region this rule applies to.
    fn region(&self) -> &'static str;

    fn normalize(&self, raw: &str) -> String;
}

/// Indonesia: national numbers start with trunk prefix `0`, replaced by `62`.
#[derive(Debug, Default, Clone, Copy)]
pub struct IndonesiaNormalizer;

impl PhoneNormalizer for IndonesiaNormalizer {
    fn region(&self) -> &'static str {
        "ID"
    }

    fn normalize(&self, raw: &str) -> String {
        let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
        match digits.strip_prefix('0') {
            Some(national) => format!("62{national}"),
            None => digits,
        }
    }
}

/// Look up the normalization rule for a region code (case-insensitive).
pub fn normalizer_for_region(region: &str) -> Option<Box<dyn PhoneNormalizer>> {
    match region.trim().to_ascii_uppercase().as_str() {
        "ID" => Some(Box::new(IndonesiaNormalizer)),
        _ => None,
    }
}

/// Transport chat address for a normalized number.
pub fn chat_address(normalized: &str) -> String {
    format!("{normalized}@c.us")
}
