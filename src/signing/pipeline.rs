use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Error;
use crate::signing::archive::Archiver;
use crate::signing::codec;
use crate::types::{Document, Result};

/// Output shape requested for a signature
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignCreateConfiguration {
    /// Emit only the signature, without the signed content
    pub detached: bool,
    /// Pack the source document and the signature into one archive
    pub archive: bool,
    /// Keep the engine's base64 output instead of decoding it to binary
    pub base64_output: bool,
}

impl SignCreateConfiguration {
    /// Reject option combinations that have no meaning
    pub fn validate(&self) -> Result<()> {
        if self.archive && !self.detached {
            return Err(Error::InvalidConfiguration(
                "archiving requires a detached signature".to_string(),
            ));
        }

        Ok(())
    }
}

/// Everything needed to sign one document
#[derive(Debug, Clone)]
pub struct SigningRequest {
    /// Fingerprint of the signing certificate
    pub fingerprint: String,
    /// Document to sign
    pub document: Document,
    /// Output shape
    pub configuration: SignCreateConfiguration,
}

/// Encoding of a signature artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureEncoding {
    /// Base64 text as produced by the engine
    Base64,
    /// Raw DER bytes
    Binary,
}

impl fmt::Display for SignatureEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignatureEncoding::Base64 => write!(f, "base64"),
            SignatureEncoding::Binary => write!(f, "binary"),
        }
    }
}

/// What a signed artifact contains
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// A signature on its own
    Signature(SignatureEncoding),
    /// The source document and its detached signature in one container
    Archive(SignatureEncoding),
}

/// Result of a signing request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedArtifact {
    /// Output file name derived from the source name
    pub file_name: String,
    /// Artifact bytes
    pub content: Bytes,
    /// Artifact kind
    pub kind: ArtifactKind,
}

/// Name of a signature-only output: the source name plus the signature extension
pub fn signature_file_name(file_name: &str, extension: &str) -> String {
    format!("{}.{}", file_name, extension)
}

/// Replace a trailing `.word` extension of `file_name`, or append one if absent
pub fn file_name_with_extension(file_name: &str, extension: &str) -> String {
    let stem = match file_name.rfind('.') {
        Some(dot) => {
            let suffix = &file_name[dot + 1..];
            let is_word = !suffix.is_empty()
                && suffix.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
            if is_word {
                &file_name[..dot]
            } else {
                file_name
            }
        }
        None => file_name,
    };

    format!("{}.{}", stem, extension)
}

/// Extensions used for output names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactNaming {
    /// Appended to signature-only outputs
    pub signature_extension: String,
    /// Replaces the source extension of archives
    pub archive_extension: String,
}

impl Default for ArtifactNaming {
    fn default() -> Self {
        Self {
            signature_extension: "sig".to_string(),
            archive_extension: "zip".to_string(),
        }
    }
}

/// Deterministic pre- and post-processing around the engine's sign call.
///
/// Backends call [`SignaturePipeline::encode`] before signing and
/// [`SignaturePipeline::finish`] with the engine output once the store is
/// closed.
#[derive(Clone)]
pub struct SignaturePipeline {
    naming: ArtifactNaming,
    archiver: Arc<dyn Archiver>,
}

impl SignaturePipeline {
    /// Create a pipeline
    pub fn new(naming: ArtifactNaming, archiver: Arc<dyn Archiver>) -> Self {
        Self { naming, archiver }
    }

    /// Stage 1: the document content in the form the engine ingests
    pub fn encode(&self, document: &Document) -> String {
        codec::encode(&document.content)
    }

    /// Stages 3 and 4: decode and package the engine's signature
    pub fn finish(
        &self,
        document: &Document,
        signature_base64: String,
        configuration: &SignCreateConfiguration,
    ) -> Result<SignedArtifact> {
        let (signature, encoding) = if configuration.base64_output {
            (Bytes::from(signature_base64.into_bytes()), SignatureEncoding::Base64)
        } else {
            (Bytes::from(codec::decode(&signature_base64)?), SignatureEncoding::Binary)
        };

        let signature_name =
            signature_file_name(&document.name, &self.naming.signature_extension);

        if !(configuration.detached && configuration.archive) {
            debug!("Produced {} signature {}", encoding, signature_name);
            return Ok(SignedArtifact {
                file_name: signature_name,
                content: signature,
                kind: ArtifactKind::Signature(encoding),
            });
        }

        let archive_name =
            file_name_with_extension(&document.name, &self.naming.archive_extension);
        let entries = [document.clone(), Document::new(signature_name, signature)];
        let archive = self.archiver.archive(&archive_name, &entries)?;

        debug!("Packed {} signature with {} into {}", encoding, document.name, archive.name);
        Ok(SignedArtifact {
            file_name: archive.name,
            content: archive.content,
            kind: ArtifactKind::Archive(encoding),
        })
    }
}

impl fmt::Debug for SignaturePipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignaturePipeline")
            .field("naming", &self.naming)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signing::archive::ZipArchiver;
    use std::io::{Cursor, Read};

    fn pipeline() -> SignaturePipeline {
        SignaturePipeline::new(ArtifactNaming::default(), Arc::new(ZipArchiver::new()))
    }

    fn report() -> Document {
        Document::new("report.pdf", &b"%PDF-1.7 quarterly report"[..])
    }

    #[test]
    fn test_archive_requires_detached() {
        let config = SignCreateConfiguration { detached: false, archive: true, base64_output: false };

        assert!(matches!(config.validate(), Err(Error::InvalidConfiguration(_))));
        assert!(SignCreateConfiguration { detached: true, archive: true, base64_output: true }
            .validate()
            .is_ok());
    }

    #[test]
    fn test_file_name_with_extension() {
        assert_eq!(file_name_with_extension("report.pdf", "zip"), "report.zip");
        assert_eq!(file_name_with_extension("archive.tar.gz", "zip"), "archive.tar.zip");
        assert_eq!(file_name_with_extension("README", "zip"), "README.zip");
        assert_eq!(file_name_with_extension("notes.", "zip"), "notes..zip");
        assert_eq!(file_name_with_extension("scan.v-2", "zip"), "scan.v-2.zip");
    }

    #[test]
    fn test_signature_file_name_appends() {
        assert_eq!(signature_file_name("report.pdf", "sig"), "report.pdf.sig");
    }

    #[test]
    fn test_finish_decodes_to_binary() {
        let config = SignCreateConfiguration { detached: true, archive: false, base64_output: false };

        let artifact = pipeline().finish(&report(), "MIIB\nAQ==".to_string(), &config).unwrap();

        assert_eq!(artifact.file_name, "report.pdf.sig");
        assert_eq!(artifact.kind, ArtifactKind::Signature(SignatureEncoding::Binary));
        assert_eq!(&artifact.content[..], &[0x30u8, 0x82, 0x01, 0x01][..]);
    }

    #[test]
    fn test_finish_keeps_base64_untouched() {
        let config = SignCreateConfiguration { detached: false, archive: false, base64_output: true };

        let artifact = pipeline().finish(&report(), "MIIB\r\nAQ==".to_string(), &config).unwrap();

        assert_eq!(artifact.file_name, "report.pdf.sig");
        assert_eq!(artifact.kind, ArtifactKind::Signature(SignatureEncoding::Base64));
        assert_eq!(&artifact.content[..], b"MIIB\r\nAQ==");
    }

    #[test]
    fn test_finish_packs_archive() {
        let config = SignCreateConfiguration { detached: true, archive: true, base64_output: false };

        let artifact = pipeline().finish(&report(), "MIIBAQ==".to_string(), &config).unwrap();

        assert_eq!(artifact.file_name, "report.zip");
        assert_eq!(artifact.kind, ArtifactKind::Archive(SignatureEncoding::Binary));

        let mut zip = zip::ZipArchive::new(Cursor::new(artifact.content.to_vec())).unwrap();
        assert_eq!(zip.len(), 2);

        let mut document = Vec::new();
        zip.by_name("report.pdf").unwrap().read_to_end(&mut document).unwrap();
        assert_eq!(document, b"%PDF-1.7 quarterly report");

        let mut signature = Vec::new();
        zip.by_name("report.pdf.sig").unwrap().read_to_end(&mut signature).unwrap();
        assert_eq!(signature, vec![0x30u8, 0x82, 0x01, 0x01]);
    }

    #[test]
    fn test_finish_rejects_malformed_signature() {
        let config = SignCreateConfiguration { detached: true, archive: false, base64_output: false };

        let result = pipeline().finish(&report(), "@@@@".to_string(), &config);

        assert!(matches!(result, Err(Error::Encoding(_))));
    }
}
