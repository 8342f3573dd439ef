use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Name-info selectors accepted by the certificate `GetInfo` primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CertInfoType {
    /// Subject simple name
    SubjectSimpleName = 0,
    /// Issuer simple name
    IssuerSimpleName = 1,
    /// Subject e-mail
    SubjectEmailName = 2,
    /// Issuer e-mail
    IssuerEmailName = 3,
    /// Subject user principal name
    SubjectUpn = 4,
    /// Issuer user principal name
    IssuerUpn = 5,
    /// Subject DNS name
    SubjectDnsName = 6,
    /// Issuer DNS name
    IssuerDnsName = 7,
}

/// A single readable property of a native certificate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CertField {
    /// Certificate version
    Version,
    /// Fingerprint
    Thumbprint,
    /// Subject distinguished name
    SubjectName,
    /// Issuer distinguished name
    IssuerName,
    /// Serial number
    SerialNumber,
    /// Start of validity
    ValidFrom,
    /// End of validity
    ValidTo,
    /// Name read through `GetInfo`
    Info(CertInfoType),
    /// OID of the public key algorithm
    PublicKeyAlgorithm,
}

impl CertField {
    /// Every field that makes up a certificate record, in read order.
    ///
    /// The thumbprint comes second so that later failures can name it.
    pub const RECORD_FIELDS: [CertField; 16] = [
        CertField::Version,
        CertField::Thumbprint,
        CertField::SubjectName,
        CertField::SerialNumber,
        CertField::IssuerName,
        CertField::ValidFrom,
        CertField::ValidTo,
        CertField::Info(CertInfoType::SubjectSimpleName),
        CertField::Info(CertInfoType::SubjectEmailName),
        CertField::Info(CertInfoType::SubjectUpn),
        CertField::Info(CertInfoType::SubjectDnsName),
        CertField::Info(CertInfoType::IssuerSimpleName),
        CertField::Info(CertInfoType::IssuerEmailName),
        CertField::Info(CertInfoType::IssuerUpn),
        CertField::Info(CertInfoType::IssuerDnsName),
        CertField::PublicKeyAlgorithm,
    ];
}

impl fmt::Display for CertField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CertField::Version => write!(f, "Version"),
            CertField::Thumbprint => write!(f, "Thumbprint"),
            CertField::SubjectName => write!(f, "SubjectName"),
            CertField::IssuerName => write!(f, "IssuerName"),
            CertField::SerialNumber => write!(f, "SerialNumber"),
            CertField::ValidFrom => write!(f, "ValidFromDate"),
            CertField::ValidTo => write!(f, "ValidToDate"),
            CertField::Info(info) => write!(f, "GetInfo({})", *info as u8),
            CertField::PublicKeyAlgorithm => write!(f, "PublicKey.Algorithm"),
        }
    }
}

/// Value returned by a field read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// Integer property
    Int(u32),
    /// Text property
    Text(String),
    /// Date property
    Time(DateTime<Utc>),
}

/// Store location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreLocation {
    /// Stores of the current user
    CurrentUser,
    /// Stores of the local machine
    LocalMachine,
}

/// Store open mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenMode {
    /// Read only
    ReadOnly,
    /// Read and write
    ReadWrite,
    /// Highest access the caller is granted
    MaximumAllowed,
}

/// Which store to open and how
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSpec {
    /// Store location
    pub location: StoreLocation,
    /// Store name ("My" holds personal certificates)
    pub name: String,
    /// Open mode
    pub open_mode: OpenMode,
}

impl Default for StoreSpec {
    fn default() -> Self {
        Self {
            location: StoreLocation::CurrentUser,
            name: "My".to_string(),
            open_mode: OpenMode::MaximumAllowed,
        }
    }
}

/// Search criteria understood by the store's find primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindType {
    /// SHA-1 thumbprint
    Sha1Hash = 0,
}

/// Signature format requested from the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureProfile {
    /// CAdES-BES
    CadesBes,
}

/// How much of the certificate chain goes into the signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainPolicy {
    /// Every certificate up to the root
    WholeChain,
    /// Only the signer's certificate
    EndEntityOnly,
}

impl Default for ChainPolicy {
    fn default() -> Self {
        ChainPolicy::WholeChain
    }
}
