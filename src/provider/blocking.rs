use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::certificate::directory::{list_records, read_record};
use crate::certificate::filter::filter_certificates;
use crate::certificate::record::CertificateRecord;
use crate::certificate::resolver::resolve_unique;
use crate::engine::blocking::{BlockingEngine, CertificateHandle, StoreHandle};
use crate::engine::types::{FindType, SignatureProfile};
use crate::error::Error;
use crate::provider::{
    merge_close, signing_failure, verification_failure, Backend, ProviderOptions,
    SignatureProvider, VerifyRequest,
};
use crate::signing::pipeline::{SignaturePipeline, SignedArtifact, SigningRequest};
use crate::signing::SignerDescriptor;
use crate::types::Result;

/// Provider over an engine whose calls occupy the calling thread.
///
/// The inherent methods run on the caller's thread. The
/// [`SignatureProvider`] impl moves them onto tokio's blocking pool.
#[derive(Clone)]
pub struct BlockingProvider {
    engine: Arc<dyn BlockingEngine>,
    options: ProviderOptions,
    pipeline: SignaturePipeline,
}

impl BlockingProvider {
    /// Create a provider
    pub fn new(engine: Arc<dyn BlockingEngine>, options: ProviderOptions) -> Self {
        let pipeline = options.pipeline();
        Self {
            engine,
            options,
            pipeline,
        }
    }

    /// Open the configured store, run `body`, and close the store on every path
    fn with_store<T>(&self, body: impl FnOnce(&dyn StoreHandle) -> Result<T>) -> Result<T> {
        let mut store = self.engine.create_store()?;
        let result = store
            .open(&self.options.store)
            .and_then(|_| body(store.as_ref()));
        let closed = store.close();
        merge_close(result, closed)
    }

    fn find_one(&self, store: &dyn StoreHandle, fingerprint: &str) -> Result<Arc<dyn CertificateHandle>> {
        let matches = store.find(FindType::Sha1Hash, fingerprint)?;
        resolve_unique(fingerprint, matches)
    }

    /// List certificates valid now
    pub fn certificates(&self, algorithm_restricted: bool) -> Result<Vec<CertificateRecord>> {
        let records = self.with_store(list_records)?;
        let total = records.len();
        let kept = filter_certificates(records, &self.options.predicates(algorithm_restricted));

        debug!("Kept {} of {} certificates", kept.len(), total);
        Ok(kept)
    }

    /// Look up one certificate by fingerprint
    pub fn find(&self, fingerprint: &str) -> Result<CertificateRecord> {
        self.with_store(|store| {
            let certificate = self.find_one(store, fingerprint)?;
            read_record(certificate.as_ref(), 1)
        })
    }

    /// Sign a document
    pub fn sign(&self, request: &SigningRequest) -> Result<SignedArtifact> {
        request.configuration.validate()?;

        let signature = self.with_store(|store| {
            let certificate = self.find_one(store, &request.fingerprint)?;
            let signer = SignerDescriptor::new(certificate, self.options.chain_policy);
            let content = self.pipeline.encode(&request.document);

            self.engine
                .sign_cades(
                    &signer,
                    &content,
                    SignatureProfile::CadesBes,
                    request.configuration.detached,
                )
                .map_err(signing_failure)
        })?;

        info!("Signed {} with certificate {}", request.document.name, request.fingerprint);
        self.pipeline
            .finish(&request.document, signature, &request.configuration)
    }

    /// Verify a CAdES-BES signature
    pub fn verify(&self, request: &VerifyRequest) -> Result<()> {
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
            .map_err(verification_failure)?;

        debug!("Verified signature over {}", request.document.name);
        Ok(())
    }

    async fn offload<T, F>(&self, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(BlockingProvider) -> Result<T> + Send + 'static,
    {
        let provider = self.clone();
        tokio::task::spawn_blocking(move || work(provider))
            .await
            .map_err(|e| Error::Internal(format!("blocking engine task failed: {}", e)))?
    }
}

#[async_trait]
impl SignatureProvider for BlockingProvider {
    fn backend(&self) -> Backend {
        Backend::Blocking
    }

    async fn list_certificates(&self, algorithm_restricted: bool) -> Result<Vec<CertificateRecord>> {
        self.offload(move |provider| provider.certificates(algorithm_restricted))
            .await
    }

    async fn find_certificate(&self, fingerprint: &str) -> Result<CertificateRecord> {
        let fingerprint = fingerprint.to_string();
        self.offload(move |provider| provider.find(&fingerprint)).await
    }

    async fn sign_create_extended(&self, request: SigningRequest) -> Result<SignedArtifact> {
        self.offload(move |provider| provider.sign(&request)).await
    }

    async fn sign_verify(&self, request: VerifyRequest) -> Result<()> {
        self.offload(move |provider| provider.verify(&request)).await
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Read};

    use super::*;
    use crate::engine::mock::{MockCertificate, MockEngine};
    use crate::signing::pipeline::{ArtifactKind, SignCreateConfiguration, SignatureEncoding};
    use crate::signing::codec;
    use crate::types::Document;

    fn provider(engine: &MockEngine) -> BlockingProvider {
        BlockingProvider::new(Arc::new(engine.clone()), ProviderOptions::default())
    }

    fn report() -> Document {
        Document::new("report.pdf", &b"%PDF-1.7 signed contract"[..])
    }

    #[test]
    fn test_sign_runs_on_calling_thread() {
        let alice = MockCertificate::new("Alice");
        let engine = MockEngine::new(vec![alice.clone()]);
        let request = SigningRequest {
            fingerprint: alice.thumbprint.clone(),
            document: report(),
            configuration: SignCreateConfiguration { detached: true, archive: false, base64_output: false },
        };

        let artifact = provider(&engine).sign(&request).unwrap();

        assert_eq!(artifact.file_name, "report.pdf.sig");
        assert_eq!(artifact.kind, ArtifactKind::Signature(SignatureEncoding::Binary));
        assert_eq!(
            artifact.content.to_vec(),
            MockEngine::expected_signature(&alice.thumbprint, b"%PDF-1.7 signed contract", true)
        );
        assert_eq!(engine.stats().opened(), 1);
        assert_eq!(engine.stats().closed(), 1);
    }

    #[test]
    fn test_find_uses_fingerprint_case_insensitively() {
        let bob = MockCertificate::new("Bob");
        let engine = MockEngine::new(vec![MockCertificate::new("Alice"), bob.clone()]);

        let record = provider(&engine).find(&bob.thumbprint.to_lowercase()).unwrap();

        assert_eq!(record.subject_simple_name, "Bob");
        assert_eq!(engine.stats().closed(), 1);
    }

    #[test]
    fn test_store_closed_when_engine_rejects() {
        let alice = MockCertificate::new("Alice");
        let engine = MockEngine::new(vec![alice.clone()]).failing_sign("key container is locked");
        let request = SigningRequest {
            fingerprint: alice.thumbprint,
            document: report(),
            configuration: SignCreateConfiguration::default(),
        };

        let result = provider(&engine).sign(&request);

        match result {
            Err(Error::SigningFailed(reason)) => assert!(reason.contains("key container is locked")),
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(engine.stats().opened(), engine.stats().closed());
    }

    #[test]
    fn test_store_closed_when_open_fails() {
        let engine = MockEngine::new(vec![]).failing_open();

        assert!(provider(&engine).certificates(false).is_err());
        assert_eq!(engine.stats().closed(), 1);
    }

    #[test]
    fn test_verify_round_trip() {
        let alice = MockCertificate::new("Alice");
        let engine = MockEngine::new(vec![alice.clone()]);
        let provider = provider(&engine);
        let request = SigningRequest {
            fingerprint: alice.thumbprint,
            document: report(),
            configuration: SignCreateConfiguration { detached: true, archive: false, base64_output: true },
        };
        let artifact = provider.sign(&request).unwrap();

        let verify = |document: Document| VerifyRequest {
            document,
            signature: artifact.content.clone(),
            encoding: SignatureEncoding::Base64,
            detached: true,
        };

        assert!(provider.verify(&verify(report())).is_ok());
        assert!(matches!(
            provider.verify(&verify(Document::new("report.pdf", &b"forged"[..]))),
            Err(Error::VerificationFailed(_))
        ));
        assert!(codec::decode(std::str::from_utf8(&artifact.content).unwrap()).is_ok());
    }

    #[test]
    fn test_archive_without_detached_rejected_before_store() {
        let alice = MockCertificate::new("Alice");
        let engine = MockEngine::new(vec![alice.clone()]);
        let request = SigningRequest {
            fingerprint: alice.thumbprint,
            document: report(),
            configuration: SignCreateConfiguration { detached: false, archive: true, base64_output: false },
        };

        let result = provider(&engine).sign(&request);

        assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
        assert_eq!(engine.stats().opened(), 0);
    }

    #[test]
    fn test_detached_archive_packs_document_and_signature() {
        let alice = MockCertificate::new("Alice");
        let engine = MockEngine::new(vec![alice.clone()]);
        let request = SigningRequest {
            fingerprint: alice.thumbprint.clone(),
            document: report(),
            configuration: SignCreateConfiguration { detached: true, archive: true, base64_output: false },
        };

        let artifact = provider(&engine).sign(&request).unwrap();

        assert_eq!(artifact.file_name, "report.zip");
        assert_eq!(artifact.kind, ArtifactKind::Archive(SignatureEncoding::Binary));

        let mut zip = zip::ZipArchive::new(Cursor::new(artifact.content.to_vec())).unwrap();
        let mut document = Vec::new();
        zip.by_name("report.pdf").unwrap().read_to_end(&mut document).unwrap();
        assert_eq!(document, b"%PDF-1.7 signed contract");

        let mut signature = Vec::new();
        zip.by_name("report.pdf.sig").unwrap().read_to_end(&mut signature).unwrap();
        assert_eq!(
            signature,
            MockEngine::expected_signature(&alice.thumbprint, b"%PDF-1.7 signed contract", true)
        );
    }

    #[test]
    fn test_listing_reads_store_afresh() {
        let engine = MockEngine::new(vec![MockCertificate::new("Alice")]);
        let provider = provider(&engine);

        assert_eq!(provider.certificates(false).unwrap().len(), 1);

        engine
            .set_certificates(vec![MockCertificate::new("Alice"), MockCertificate::new("Bob")])
            .unwrap();
        let names: Vec<_> = provider
            .certificates(false)
            .unwrap()
            .into_iter()
            .map(|r| r.subject_simple_name)
            .collect();

        assert_eq!(names, vec!["Alice", "Bob"]);
    }

    #[tokio::test]
    async fn test_trait_offloads_to_blocking_pool() {
        let engine = MockEngine::new(vec![MockCertificate::new("Alice")]);
        let provider: Arc<dyn SignatureProvider> = Arc::new(provider(&engine));

        let records = provider.list_certificates(true).await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(provider.backend(), Backend::Blocking);
    }
}
