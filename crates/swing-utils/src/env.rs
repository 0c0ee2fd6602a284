//! Environment helpers
//!
//! Configuration layers read overrides from the process environment. A `.env`
//! file in the working directory (or any parent) is loaded first when present.

/// Load variables from a `.env` file if one can be found
///
/// Returns `true` when a file was loaded. Variables already present in the
/// environment are not overwritten.
pub fn load_dotenv() -> bool {
    match dotenvy::dotenv() {
        Ok(path) => {
            tracing::debug!("Loaded environment from {}", path.display());
            true
        }
        Err(e) if e.not_found() => false,
        Err(e) => {
            tracing::warn!("Failed to load .env file: {}", e);
            false
        }
    }
}

/// Read a non-empty string variable
pub fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_variable() {
        assert_eq!(env_string("SWING_UTILS_TEST_DEFINITELY_UNSET"), None);
    }
}
