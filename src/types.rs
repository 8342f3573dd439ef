use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Project-wide Result type
pub type Result<T> = std::result::Result<T, crate::error::Error>;

/// Language used when rendering errors for the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    /// English
    En,
    /// Russian
    Ru,
}

impl Default for Locale {
    fn default() -> Self {
        Locale::En
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locale::En => write!(f, "en"),
            Locale::Ru => write!(f, "ru"),
        }
    }
}

/// A named document handed in by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Original file name, used to derive output names
    pub name: String,
    /// Raw file content
    pub content: Bytes,
}

impl Document {
    /// Create a new document
    pub fn new(name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}
