/// Input validation for user-supplied ids, keys, SQL text and names
///
/// Everything that reaches the Notion API or the SQL engine from the caller
/// passes through one of these checks first.
use notion2sql_core::{Error, Result};

pub use notion2sql_client::config::MAX_PAGE_SIZE;
pub use notion2sql_client::normalize_id;

/// Upper bound on SQL text accepted by [`validate_query`]
pub const MAX_QUERY_LENGTH: usize = 1024 * 1024; // 1 MiB

/// Upper bound on property and table names
pub const MAX_NAME_LENGTH: usize = 256;

/// Validates SQL query string
///
/// # Security
///
/// - Prevents oversized queries (>1 MiB)
/// - Prevents empty queries
///
/// # Errors
///
/// Returns Error::InvalidInput if validation fails
#[inline]
pub fn validate_query(query: &str) -> Result<()> {
    if query.trim().is_empty() {
        return Err(Error::InvalidInput("Query cannot be empty".to_string()));
    }

    if query.len() > MAX_QUERY_LENGTH {
        return Err(Error::InvalidInput(format!(
            "Query length {} exceeds maximum {}",
            query.len(),
            MAX_QUERY_LENGTH
        )));
    }

    Ok(())
}

/// Validates a Notion integration token
///
/// Only the shape is checked; Notion decides whether the key is valid.
///
/// # Errors
///
/// Returns Error::InvalidInput for empty keys or keys containing whitespace
#[inline]
pub fn validate_api_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::InvalidInput("API key cannot be empty".to_string()));
    }

    if key.chars().any(char::is_whitespace) {
        return Err(Error::InvalidInput(
            "API key cannot contain whitespace".to_string(),
        ));
    }

    Ok(())
}

/// Validates a query page size against Notion's `1..=MAX_PAGE_SIZE` range
#[inline]
pub fn validate_page_size(page_size: u32) -> Result<()> {
    if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
        return Err(Error::InvalidInput(format!(
            "Page size {} must be between 1 and {}",
            page_size, MAX_PAGE_SIZE
        )));
    }
    Ok(())
}

/// Validates a property or table name
///
/// # Security
///
/// - Prevents empty and oversized names
/// - Prevents null bytes
///
/// # Errors
///
/// Returns Error::InvalidInput if validation fails
#[inline]
pub fn validate_property_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidInput(
            "Property name cannot be empty".to_string(),
        ));
    }

    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(Error::InvalidInput(format!(
            "Property name length {} exceeds maximum {}",
            name.chars().count(),
            MAX_NAME_LENGTH
        )));
    }

    if name.contains('\0') {
        return Err(Error::InvalidInput(
            "Property name cannot contain null bytes".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_query() {
        assert!(validate_query("SELECT * FROM notion_data").is_ok());
        assert!(validate_query("").is_err());
        assert!(validate_query("   \n").is_err());

        let large = "a".repeat(MAX_QUERY_LENGTH + 1);
        assert!(validate_query(&large).is_err());
    }

    #[test]
    fn test_validate_api_key() {
        assert!(validate_api_key("secret_abc123").is_ok());
        assert!(validate_api_key("ntn_abc123").is_ok());
        assert!(validate_api_key("").is_err());
        assert!(validate_api_key("secret abc").is_err());
        assert!(validate_api_key("secret_abc\n").is_err());
    }

    #[test]
    fn test_validate_page_size() {
        assert!(validate_page_size(1).is_ok());
        assert!(validate_page_size(MAX_PAGE_SIZE).is_ok());
        assert!(validate_page_size(0).is_err());
        assert!(validate_page_size(MAX_PAGE_SIZE + 1).is_err());
    }

    #[test]
    fn test_validate_property_name() {
        assert!(validate_property_name("Name").is_ok());
        assert!(validate_property_name("Due date").is_ok());
        assert!(validate_property_name("").is_err());
        assert!(validate_property_name("bad\0name").is_err());

        // the limit counts characters, not bytes
        assert!(validate_property_name(&"é".repeat(MAX_NAME_LENGTH)).is_ok());
        assert!(validate_property_name(&"x".repeat(MAX_NAME_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_normalize_id_reexport() {
        assert_eq!(
            normalize_id("1a2b3c4d5e6f7a8b9c0d1e2f3a4b5c6d").unwrap(),
            "1a2b3c4d-5e6f-7a8b-9c0d-1e2f3a4b5c6d"
        );
        assert!(normalize_id("../../etc/passwd").is_err());
    }
}
