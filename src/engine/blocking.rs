use std::sync::Arc;

use crate::engine::types::{CertField, FieldValue, FindType, SignatureProfile, StoreSpec};
use crate::signing::SignerDescriptor;
use crate::types::Result;

/// Native certificate exposed by a blocking engine
pub trait CertificateHandle: Send + Sync {
    /// Read one property of the certificate
    fn read_field(&self, field: CertField) -> Result<FieldValue>;
}

/// Native certificate store exposed by a blocking engine
pub trait StoreHandle: Send {
    /// Open the store
    fn open(&mut self, spec: &StoreSpec) -> Result<()>;

    /// Close the store
    fn close(&mut self) -> Result<()>;

    /// Number of certificates in the open store
    fn count(&self) -> Result<usize>;

    /// Certificate at a 1-based index
    fn item(&self, index: usize) -> Result<Arc<dyn CertificateHandle>>;

    /// Every certificate matching the criteria
    fn find(&self, find_type: FindType, query: &str) -> Result<Vec<Arc<dyn CertificateHandle>>>;
}

/// Signing engine whose calls occupy the calling thread
pub trait BlockingEngine: Send + Sync {
    /// Create a fresh, unopened store object
    fn create_store(&self) -> Result<Box<dyn StoreHandle>>;

    /// Produce a CAdES signature over base64 content, returned base64 encoded
    fn sign_cades(
        &self,
        signer: &SignerDescriptor<Arc<dyn CertificateHandle>>,
        content_base64: &str,
        profile: SignatureProfile,
        detached: bool,
    ) -> Result<String>;

    /// Check a base64 CAdES signature, with the base64 content for detached ones
    fn verify_cades(
        &self,
        signature_base64: &str,
        content_base64: Option<&str>,
        profile: SignatureProfile,
        detached: bool,
    ) -> Result<()>;
}
