//! Error types produced by the resolution engine.
//!
//! | Error | When |
//! |-------|------|
//! | [`StoreRequired`](MatchError::StoreRequired) | A catalog needs lazy loading but no store was configured |
//! | [`Store`](MatchError::Store) | The backing store failed; propagated without retry |
//! | [`Timeout`](MatchError::Timeout) | A store call exceeded its deadline |
//! | [`InvalidIdentifier`](MatchError::InvalidIdentifier) | A table or column name is not a plain SQL identifier |

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MatchError {
    #[error("{catalog} matching requires a catalog store, but none is configured")]
    StoreRequired { catalog: String },

    /// The cause is the error source, so `{:#}` prints it once.
    #[error("catalog store error")]
    Store(#[from] anyhow::Error),

    #[error("{what} timed out after {secs}s")]
    Timeout { what: String, secs: u64 },

    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),
}

pub type Result<T> = std::result::Result<T, MatchError>;

/// Check that `name` is a plain SQL identifier (`[A-Za-z_][A-Za-z0-9_]*`).
///
/// Table and column names are interpolated into SQL text, so every name
/// coming from configuration passes through here first.
pub fn validate_identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let ok = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        Err(MatchError::InvalidIdentifier(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("machine_details").is_ok());
        assert!(validate_identifier("_x1").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("1abc").is_err());
        assert!(validate_identifier("item; DROP TABLE x").is_err());
        assert!(validate_identifier("name-part").is_err());
    }

    #[test]
    fn test_store_required_message() {
        let err = MatchError::StoreRequired {
            catalog: "supplier".to_string(),
        };
        assert!(err.to_string().contains("supplier"));
        assert!(err.to_string().contains("store"));
    }

    #[test]
    fn test_store_error_prints_cause_once() {
        let inner = anyhow::anyhow!("disk I/O error").context("loading machine_details");
        let err = anyhow::Error::from(MatchError::from(inner));
        assert_eq!(
            format!("{:#}", err),
            "catalog store error: loading machine_details: disk I/O error"
        );
    }
}
