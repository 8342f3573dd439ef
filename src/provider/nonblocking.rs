use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::certificate::directory::{list_records_async, read_record_async};
use crate::certificate::filter::filter_certificates;
use crate::certificate::record::CertificateRecord;
use crate::certificate::resolver::resolve_unique;
use crate::engine::nonblocking::{AsyncCertificateHandle, AsyncEngine, AsyncStoreHandle};
use crate::engine::types::{FindType, SignatureProfile};
use crate::provider::{
    merge_close, signing_failure, verification_failure, Backend, ProviderOptions,
    SignatureProvider, VerifyRequest,
};
use crate::signing::pipeline::{SignaturePipeline, SignedArtifact, SigningRequest};
use crate::signing::SignerDescriptor;
use crate::types::Result;

/// Provider over an engine whose calls suspend the calling task
pub struct AsyncProvider {
    engine: Arc<dyn AsyncEngine>,
    options: ProviderOptions,
    pipeline: SignaturePipeline,
}

impl AsyncProvider {
    /// Create a provider
    pub fn new(engine: Arc<dyn AsyncEngine>, options: ProviderOptions) -> Self {
        let pipeline = options.pipeline();
        Self {
            engine,
            options,
            pipeline,
        }
    }

    async fn find_one(
        &self,
        store: &dyn AsyncStoreHandle,
        fingerprint: &str,
    ) -> Result<Arc<dyn AsyncCertificateHandle>> {
        let matches = store.find(FindType::Sha1Hash, fingerprint).await?;
        resolve_unique(fingerprint, matches)
    }

    async fn read_directory(&self, store: &mut dyn AsyncStoreHandle) -> Result<Vec<CertificateRecord>> {
        store.open(&self.options.store).await?;
        list_records_async(store).await
    }

    async fn read_one(&self, store: &mut dyn AsyncStoreHandle, fingerprint: &str) -> Result<CertificateRecord> {
        store.open(&self.options.store).await?;
        let certificate = self.find_one(store, fingerprint).await?;
        read_record_async(certificate.as_ref(), 1).await
    }

    async fn sign_in_store(
        &self,
        store: &mut dyn AsyncStoreHandle,
        request: &SigningRequest,
    ) -> Result<String> {
        store.open(&self.options.store).await?;
        let certificate = self.find_one(store, &request.fingerprint).await?;
        let signer = SignerDescriptor::new(certificate, self.options.chain_policy);
        let content = self.pipeline.encode(&request.document);

        self.engine
            .sign_cades(
                &signer,
                &content,
                SignatureProfile::CadesBes,
                request.configuration.detached,
            )
            .await
            .map_err(signing_failure)
    }
}

#[async_trait]
impl SignatureProvider for AsyncProvider {
    fn backend(&self) -> Backend {
        Backend::Async
    }

    async fn list_certificates(&self, algorithm_restricted: bool) -> Result<Vec<CertificateRecord>> {
        let mut store = self.engine.create_store().await?;
        let result = self.read_directory(store.as_mut()).await;
        let closed = store.close().await;
        let records = merge_close(result, closed)?;

        let total = records.len();
        let kept = filter_certificates(records, &self.options.predicates(algorithm_restricted));
        debug!("Kept {} of {} certificates", kept.len(), total);
        Ok(kept)
    }

    async fn find_certificate(&self, fingerprint: &str) -> Result<CertificateRecord> {
        let mut store = self.engine.create_store().await?;
        let result = self.read_one(store.as_mut(), fingerprint).await;
        let closed = store.close().await;
        merge_close(result, closed)
    }

    async fn sign_create_extended(&self, request: SigningRequest) -> Result<SignedArtifact> {
        request.configuration.validate()?;

        let mut store = self.engine.create_store().await?;
        let result = self.sign_in_store(store.as_mut(), &request).await;
        let closed = store.close().await;
        let signature = merge_close(result, closed)?;

        info!("Signed {} with certificate {}", request.document.name, request.fingerprint);
        self.pipeline
            .finish(&request.document, signature, &request.configuration)
    }

    async fn sign_verify(&self, request: VerifyRequest) -> Result<()> {
        let signature = request.signature_base64()?;
        let content = self.pipeline.encode(&request.document);
        let detached_content = request.detached.then_some(content.as_str());

        self.engine
            .verify_cades(
                &signature,
                detached_content,
                SignatureProfile::CadesBes,
                request.detached,
            )
            .await
            .map_err(verification_failure)?;

        debug!("Verified signature over {}", request.document.name);
        Ok(())
    }
}
