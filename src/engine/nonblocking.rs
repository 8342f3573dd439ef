use std::sync::Arc;

use async_trait::async_trait;

use crate::engine::types::{CertField, FieldValue, FindType, SignatureProfile, StoreSpec};
use crate::signing::SignerDescriptor;
use crate::types::Result;

/// Native certificate exposed by a suspend-capable engine
#[async_trait]
pub trait AsyncCertificateHandle: Send + Sync {
    /// Read one property of the certificate
    async fn read_field(&self, field: CertField) -> Result<FieldValue>;
}

/// Native certificate store exposed by a suspend-capable engine
#[async_trait]
pub trait AsyncStoreHandle: Send + Sync {
    /// Open the store
    async fn open(&mut self, spec: &StoreSpec) -> Result<()>;

    /// Close the store
    async fn close(&mut self) -> Result<()>;

    /// Number of certificates in the open store
    async fn count(&self) -> Result<usize>;

    /// Certificate at a 1-based index
    async fn item(&self, index: usize) -> Result<Arc<dyn AsyncCertificateHandle>>;

    /// Every certificate matching the criteria
    async fn find(
        &self,
        find_type: FindType,
        query: &str,
    ) -> Result<Vec<Arc<dyn AsyncCertificateHandle>>>;
}

/// Signing engine whose calls may suspend the calling task
#[async_trait]
pub trait AsyncEngine: Send + Sync {
    /// Create a fresh, unopened store object
    async fn create_store(&self) -> Result<Box<dyn AsyncStoreHandle>>;

    /// Produce a CAdES signature over base64 content, returned base64 encoded
    async fn sign_cades(
        &self,
        signer: &SignerDescriptor<Arc<dyn AsyncCertificateHandle>>,
        content_base64: &str,
        profile: SignatureProfile,
        detached: bool,
    ) -> Result<String>;

    /// Check a base64 CAdES signature, with the base64 content for detached ones
    async fn verify_cades(
        &self,
        signature_base64: &str,
        content_base64: Option<&str>,
        profile: SignatureProfile,
        detached: bool,
    ) -> Result<()>;
}
