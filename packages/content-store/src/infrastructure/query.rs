//! XPath full-text statement parsing
//!
//! Only the `//*[jcr:contains(., '<expr>')]` form is understood. Wildcards
//! around the expression are dropped; the term is then matched as a
//! case-insensitive substring of property values.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::{Result, StorageError};

static CONTAINS_STATEMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*//\*\[\s*jcr:contains\(\s*\.\s*,\s*'((?:[^']|'')*)'\s*\)\s*\]\s*$")
        .expect("valid contains-statement regex")
});

/// Parsed full-text statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainsQuery {
    pub term: String,
}

impl ContainsQuery {
    pub fn parse(statement: &str) -> Result<Self> {
        let captures = CONTAINS_STATEMENT.captures(statement).ok_or_else(|| {
            StorageError::query(format!("Unsupported XPath statement: {}", statement))
        })?;
        let literal = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
        let term = literal.replace("''", "'").trim_matches('*').to_string();
        if term.is_empty() {
            return Err(StorageError::query(format!(
                "Empty full-text expression in statement: {}",
                statement
            )));
        }
        Ok(Self { term })
    }
}
