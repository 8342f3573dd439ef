use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::types::{CertField, CertInfoType, FieldValue};

/// Backend-agnostic snapshot of one certificate store entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateRecord {
    /// Certificate version
    pub version: u32,
    /// Fingerprint (hex)
    pub thumbprint: String,
    /// Subject distinguished name
    pub subject_name: String,
    /// Serial number
    pub serial_number: String,
    /// Issuer distinguished name
    pub issuer_name: String,
    /// Start of validity
    pub valid_from_date: DateTime<Utc>,
    /// End of validity
    pub valid_to_date: DateTime<Utc>,
    /// Subject simple name
    pub subject_simple_name: String,
    /// Subject e-mail
    pub subject_email_name: String,
    /// Subject user principal name
    pub subject_upn: String,
    /// Subject DNS name
    pub subject_dns_name: String,
    /// Issuer simple name
    pub issuer_simple_name: String,
    /// Issuer e-mail
    pub issuer_email_name: String,
    /// Issuer user principal name
    pub issuer_upn: String,
    /// Issuer DNS name
    pub issuer_dns_name: String,

    /// Public key algorithm OID
    pub public_key_algorithm: String,
}

impl CertificateRecord {
    /// Check whether `now` falls inside the validity window, bounds included
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.valid_from_date <= now && now <= self.valid_to_date
    }
}

/// Collects field reads into a [`CertificateRecord`].
///
/// Errors are plain strings; the directory reader attaches the store index
/// and fingerprint.
#[derive(Debug, Default)]
pub struct RecordBuilder {
    version: Option<u32>,
    thumbprint: Option<String>,
    subject_name: Option<String>,
    serial_number: Option<String>,
    issuer_name: Option<String>,
    valid_from_date: Option<DateTime<Utc>>,
    valid_to_date: Option<DateTime<Utc>>,
    subject_simple_name: Option<String>,
    subject_email_name: Option<String>,
    subject_upn: Option<String>,
    subject_dns_name: Option<String>,
    issuer_simple_name: Option<String>,
    issuer_email_name: Option<String>,
    issuer_upn: Option<String>,
    issuer_dns_name: Option<String>,
    public_key_algorithm: Option<String>,
}

impl RecordBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Fingerprint, once it has been read
    pub fn thumbprint(&self) -> Option<&str> {
        self.thumbprint.as_deref()
    }

    /// Store one field value
    pub fn set(&mut self, field: CertField, value: FieldValue) -> Result<(), String> {
        match (field, value) {
            (CertField::Version, FieldValue::Int(version)) => self.version = Some(version),
            (CertField::ValidFrom, FieldValue::Time(time)) => self.valid_from_date = Some(time),
            (CertField::ValidTo, FieldValue::Time(time)) => self.valid_to_date = Some(time),
            (field, FieldValue::Text(text)) => {
                let slot = match field {
                    CertField::Thumbprint => &mut self.thumbprint,
                    CertField::SubjectName => &mut self.subject_name,
                    CertField::SerialNumber => &mut self.serial_number,
                    CertField::IssuerName => &mut self.issuer_name,
                    CertField::Info(CertInfoType::SubjectSimpleName) => &mut self.subject_simple_name,
                    CertField::Info(CertInfoType::SubjectEmailName) => &mut self.subject_email_name,
                    CertField::Info(CertInfoType::SubjectUpn) => &mut self.subject_upn,
                    CertField::Info(CertInfoType::SubjectDnsName) => &mut self.subject_dns_name,
                    CertField::Info(CertInfoType::IssuerSimpleName) => &mut self.issuer_simple_name,
                    CertField::Info(CertInfoType::IssuerEmailName) => &mut self.issuer_email_name,
                    CertField::Info(CertInfoType::IssuerUpn) => &mut self.issuer_upn,
                    CertField::Info(CertInfoType::IssuerDnsName) => &mut self.issuer_dns_name,
                    CertField::PublicKeyAlgorithm => &mut self.public_key_algorithm,
                    other => return Err(format!("{} cannot hold a text value", other)),
                };
                *slot = Some(text);
            }
            (field, value) => {
                return Err(format!("unexpected value {:?} for {}", value, field));
            }
        }

        Ok(())
    }

    /// Finish the record, checking that every field was read
    pub fn build(self) -> Result<CertificateRecord, String> {
        fn required<T>(value: Option<T>, field: CertField) -> Result<T, String> {
            value.ok_or_else(|| format!("{} was not read", field))
        }

        let valid_from_date = required(self.valid_from_date, CertField::ValidFrom)?;
        let valid_to_date = required(self.valid_to_date, CertField::ValidTo)?;
        if valid_from_date > valid_to_date {
            return Err(format!(
                "validity window is inverted ({} > {})",
                valid_from_date, valid_to_date
            ));
        }

        Ok(CertificateRecord {
            version: required(self.version, CertField::Version)?,
            thumbprint: required(self.thumbprint, CertField::Thumbprint)?,
            subject_name: required(self.subject_name, CertField::SubjectName)?,
            serial_number: required(self.serial_number, CertField::SerialNumber)?,
            issuer_name: required(self.issuer_name, CertField::IssuerName)?,
            valid_from_date,
            valid_to_date,
            subject_simple_name: required(
                self.subject_simple_name,
                CertField::Info(CertInfoType::SubjectSimpleName),
            )?,
            subject_email_name: required(
                self.subject_email_name,
                CertField::Info(CertInfoType::SubjectEmailName),
            )?,
            subject_upn: required(self.subject_upn, CertField::Info(CertInfoType::SubjectUpn))?,
            subject_dns_name: required(
                self.subject_dns_name,
                CertField::Info(CertInfoType::SubjectDnsName),
            )?,
            issuer_simple_name: required(
                self.issuer_simple_name,
                CertField::Info(CertInfoType::IssuerSimpleName),
            )?,
            issuer_email_name: required(
                self.issuer_email_name,
                CertField::Info(CertInfoType::IssuerEmailName),
            )?,
            issuer_upn: required(self.issuer_upn, CertField::Info(CertInfoType::IssuerUpn))?,
            issuer_dns_name: required(
                self.issuer_dns_name,
                CertField::Info(CertInfoType::IssuerDnsName),
            )?,
            public_key_algorithm: required(self.public_key_algorithm, CertField::PublicKeyAlgorithm)?,
        })
    }
}
