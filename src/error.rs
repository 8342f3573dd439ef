use std::io;
use thiserror::Error;

use crate::types::Locale;

/// Generic error type
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The signing engine could not be obtained for this process
    #[error("Signing engine unavailable: {0}")]
    EngineUnavailable(String),

    /// No certificate in the store carries the fingerprint
    #[error("Certificate \"{fingerprint}\" is not found")]
    NotFound {
        /// Requested fingerprint
        fingerprint: String,
    },

    /// More than one certificate in the store carries the fingerprint
    #[error("More than one certificate \"{fingerprint}\" found ({count} matches)")]
    Ambiguous {
        /// Requested fingerprint
        fingerprint: String,
        /// Number of matches reported by the store
        count: usize,
    },

    /// A field read failed while listing the store
    #[error("Failed to read certificate #{index} ({}): {reason}", fingerprint.as_deref().unwrap_or("unknown fingerprint"))]
    DirectoryRead {
        /// 1-based store index of the entry
        index: usize,
        /// Fingerprint, when it was read before the failure
        fingerprint: Option<String>,
        /// Underlying failure
        reason: String,
    },

    /// The engine rejected or could not complete signing
    #[error("Signing failed: {0}")]
    SigningFailed(String),

    /// The engine rejected the signature during verification
    #[error("Signature verification failed: {0}")]
    VerificationFailed(String),

    /// Malformed text-safe data
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Rejected combination of signing options
    #[error("Invalid sign configuration: {0}")]
    InvalidConfiguration(String),

    /// Raw engine or store failure
    #[error("Engine error: {0}")]
    Engine(String),

    /// Archive packaging error
    #[error("Archive error: {0}")]
    Archive(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Message to show to the user in the requested language.
    ///
    /// Variants without a translation fall back to the English `Display` text.
    pub fn localized_message(&self, locale: Locale) -> String {
        if locale == Locale::En {
            return self.to_string();
        }

        match self {
            Error::NotFound { fingerprint } => {
                format!("Сертификат \"{}\" не найден", fingerprint)
            }
            Error::Ambiguous { fingerprint, .. } => {
                format!("Найдено более одного сертификата \"{}\"", fingerprint)
            }
            Error::EngineUnavailable(_) => {
                "Не удалось подключиться к CryptoPro Extension for CAdES Browser plug-in".to_string()
            }
            Error::DirectoryRead { index, .. } => {
                format!("Не удалось прочитать сертификат №{}", index)
            }
            Error::SigningFailed(reason) => format!("Не удалось подписать документ: {}", reason),
            Error::InvalidConfiguration(reason) => {
                format!("Недопустимые параметры подписи: {}", reason)
            }
            other => other.to_string(),
        }
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Error::Encoding(err.to_string())
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Error::Archive(err.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for Error {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        Error::EngineUnavailable(format!("plugin did not load in time ({})", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message_names_fingerprint() {
        let err = Error::NotFound { fingerprint: "ABCDEF".to_string() };

        assert_eq!(err.to_string(), "Certificate \"ABCDEF\" is not found");
        assert_eq!(
            err.localized_message(Locale::Ru),
            "Сертификат \"ABCDEF\" не найден"
        );
    }

    #[test]
    fn test_directory_read_message_without_fingerprint() {
        let err = Error::DirectoryRead {
            index: 3,
            fingerprint: None,
            reason: "property unavailable".to_string(),
        };

        assert_eq!(
            err.to_string(),
            "Failed to read certificate #3 (unknown fingerprint): property unavailable"
        );
    }

    #[test]
    fn test_untranslated_variant_falls_back_to_display() {
        let err = Error::Encoding("bad padding".to_string());

        assert_eq!(err.localized_message(Locale::Ru), err.to_string());
    }
}
