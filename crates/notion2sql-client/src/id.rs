//! Notion object ids.

use notion2sql_core::{Error, Result};

/// Normalise a page or database id to the dashed 8-4-4-4-12 form.
///
/// Accepts dashed or undashed ids and notion.so URLs, where the id is the
/// last 32 hex digits of the final path segment.
///
/// ```
/// use notion2sql_client::normalize_id;
///
/// let id = normalize_id("https://www.notion.so/team/Roadmap-0123456789abcdef0123456789ABCDEF?pvs=4").unwrap();
/// assert_eq!(id, "01234567-89ab-cdef-0123-456789abcdef");
/// ```
pub fn normalize_id(input: &str) -> Result<String> {
    let trimmed = input.trim();
    let without_query = trimmed
        .split(['?', '#'])
        .next()
        .unwrap_or_default();
    let segment = without_query
        .rsplit('/')
        .find(|s| !s.is_empty())
        .unwrap_or_default();

    let compact: Vec<char> = segment.chars().filter(|c| *c != '-').collect();
    if compact.len() < 32 {
        return Err(invalid(input));
    }

    let hex = &compact[compact.len() - 32..];
    if !hex.iter().all(char::is_ascii_hexdigit) {
        return Err(invalid(input));
    }
    // bare ids must be exactly 32 digits; only URL slugs carry a title prefix
    if compact.len() > 32 && !trimmed.contains('/') {
        return Err(invalid(input));
    }

    let hex: String = hex.iter().collect::<String>().to_ascii_lowercase();
    Ok(format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    ))
}

fn invalid(input: &str) -> Error {
    Error::InvalidInput(format!("not a Notion id: {input:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DASHED: &str = "1a2b3c4d-5e6f-7a8b-9c0d-1e2f3a4b5c6d";

    #[test]
    fn test_accepts_dashed_and_undashed() {
        assert_eq!(normalize_id(DASHED).unwrap(), DASHED);
        assert_eq!(
            normalize_id("1A2B3C4D5E6F7A8B9C0D1E2F3A4B5C6D").unwrap(),
            DASHED
        );
        assert_eq!(normalize_id(&format!("  {DASHED}\n")).unwrap(), DASHED);
    }

    #[test]
    fn test_accepts_urls() {
        assert_eq!(
            normalize_id("https://www.notion.so/My-Tasks-1a2b3c4d5e6f7a8b9c0d1e2f3a4b5c6d").unwrap(),
            DASHED
        );
        assert_eq!(
            normalize_id("https://notion.so/ws/1a2b3c4d5e6f7a8b9c0d1e2f3a4b5c6d?v=abc#frag").unwrap(),
            DASHED
        );
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(normalize_id("").is_err());
        assert!(normalize_id("not-an-id").is_err());
        assert!(normalize_id("1a2b3c4d5e6f7a8b9c0d1e2f3a4b5c6z").is_err());
        assert!(normalize_id("ff1a2b3c4d5e6f7a8b9c0d1e2f3a4b5c6d").is_err());
    }
}
