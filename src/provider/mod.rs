//! Signature providers over the two engine flavours.
//!
//! Both backends share the directory codec, the filter chain, the resolver,
//! the signer configurator and the signature pipeline. They differ only in
//! how engine calls are awaited. Callers obtain one through
//! [`create_signature_provider`] or, more usually, a [`gate::ProviderGate`].

pub mod blocking;
pub mod gate;
pub mod nonblocking;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{info, warn};

use crate::certificate::filter::{CertificatePredicate, ALGORITHM_GOST_2012_256};
use crate::certificate::record::CertificateRecord;
use crate::engine::host::EngineHost;
use crate::engine::types::{ChainPolicy, StoreSpec};
use crate::error::Error;
use crate::signing::archive::{Archiver, ZipArchiver};
use crate::signing::codec;
use crate::signing::pipeline::{
    ArtifactNaming, SignCreateConfiguration, SignaturePipeline, SignatureEncoding, SignedArtifact,
    SigningRequest,
};
use crate::types::{Document, Result};

pub use blocking::BlockingProvider;
pub use gate::{ProviderAvailability, ProviderGate};
pub use nonblocking::AsyncProvider;

/// Engine flavour behind a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Engine calls occupy the calling thread
    Blocking,
    /// Engine calls suspend the calling task
    Async,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Blocking => write!(f, "blocking"),
            Backend::Async => write!(f, "async"),
        }
    }
}

/// A signature to check against its document
#[derive(Debug, Clone)]
pub struct VerifyRequest {
    /// Signed document
    pub document: Document,
    /// Signature bytes, as produced by signing
    pub signature: Bytes,
    /// Encoding of `signature`
    pub encoding: SignatureEncoding,
    /// Whether the signature was produced without embedded content
    pub detached: bool,
}

impl VerifyRequest {
    /// The signature in the text-safe form the engine ingests
    pub fn signature_base64(&self) -> Result<String> {
        match self.encoding {
            SignatureEncoding::Base64 => {
                if !codec::is_text_safe(&self.signature) {
                    return Err(Error::Encoding("signature is not valid base64".to_string()));
                }
                String::from_utf8(self.signature.to_vec())
                    .map_err(|e| Error::Encoding(format!("signature is not text: {}", e)))
            }
            SignatureEncoding::Binary => Ok(codec::encode(&self.signature)),
        }
    }
}

/// Settings shared by both backends
#[derive(Clone)]
pub struct ProviderOptions {
    /// Store to open for every operation
    pub store: StoreSpec,
    /// Algorithm OID kept by restricted listings
    pub algorithm_oid: String,
    /// Chain inclusion policy for new signatures
    pub chain_policy: ChainPolicy,
    /// Output file naming
    pub naming: ArtifactNaming,
    /// Archive format for detached signatures
    pub archiver: Arc<dyn Archiver>,
}

impl Default for ProviderOptions {
    fn default() -> Self {
        Self {
            store: StoreSpec::default(),
            algorithm_oid: ALGORITHM_GOST_2012_256.to_string(),
            chain_policy: ChainPolicy::default(),
            naming: ArtifactNaming::default(),
            archiver: Arc::new(ZipArchiver::new()),
        }
    }
}

impl fmt::Debug for ProviderOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderOptions")
            .field("store", &self.store)
            .field("algorithm_oid", &self.algorithm_oid)
            .field("chain_policy", &self.chain_policy)
            .field("naming", &self.naming)
            .finish_non_exhaustive()
    }
}

impl ProviderOptions {
    /// Pipeline configured with these options
    pub fn pipeline(&self) -> SignaturePipeline {
        SignaturePipeline::new(self.naming.clone(), self.archiver.clone())
    }

    /// Predicate chain for a listing
    pub fn predicates(&self, algorithm_restricted: bool) -> Vec<CertificatePredicate> {
        let mut predicates = vec![CertificatePredicate::valid_now()];
        if algorithm_restricted {
            predicates.push(CertificatePredicate::algorithm(self.algorithm_oid.clone()));
        }
        predicates
    }
}

/// Certificate lookup and CAdES signing over a store-backed engine
#[async_trait]
pub trait SignatureProvider: Send + Sync {
    /// Engine flavour, for diagnostics
    fn backend(&self) -> Backend;

    /// Every certificate valid now, optionally restricted to the configured algorithm
    async fn list_certificates(&self, algorithm_restricted: bool) -> Result<Vec<CertificateRecord>>;

    /// The single certificate carrying `fingerprint`
    async fn find_certificate(&self, fingerprint: &str) -> Result<CertificateRecord>;

    /// Sign with base64 output and no archive
    async fn sign_create(
        &self,
        fingerprint: &str,
        document: Document,
        detached: bool,
    ) -> Result<SignedArtifact> {
        let request = SigningRequest {
            fingerprint: fingerprint.to_string(),
            document,
            configuration: SignCreateConfiguration {
                detached,
                archive: false,
                base64_output: true,
            },
        };
        self.sign_create_extended(request).await
    }

    /// Sign with an explicit output configuration
    async fn sign_create_extended(&self, request: SigningRequest) -> Result<SignedArtifact>;

    /// Check a CAdES-BES signature
    async fn sign_verify(&self, request: VerifyRequest) -> Result<()>;
}

/// Pick a provider for whatever engine the host exposes.
///
/// The suspend-capable engine wins when both are present.
pub fn create_signature_provider(
    host: &dyn EngineHost,
    options: ProviderOptions,
) -> Result<Arc<dyn SignatureProvider>> {
    if let Some(engine) = host.async_engine() {
        info!("Using async signing backend");
        return Ok(Arc::new(AsyncProvider::new(engine, options)));
    }

    if let Some(engine) = host.blocking_engine() {
        info!("Using blocking signing backend");
        return Ok(Arc::new(BlockingProvider::new(engine, options)));
    }

    Err(Error::EngineUnavailable(
        "engine exposes neither an async nor a blocking interface".to_string(),
    ))
}

/// Combine the outcome of a store session with the result of closing the store.
///
/// The body's error wins; a close failure only surfaces when the body succeeded.
pub(crate) fn merge_close<T>(result: Result<T>, closed: Result<()>) -> Result<T> {
    match (result, closed) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), Err(close_err)) => {
            warn!("Failed to close store after error: {}", close_err);
            Err(e)
        }
        (Err(e), Ok(())) => Err(e),
    }
}

/// Wrap an engine failure during signing, keeping errors already classified
pub(crate) fn signing_failure(err: Error) -> Error {
    match err {
        Error::SigningFailed(_) => err,
        other => Error::SigningFailed(other.to_string()),
    }
}

/// Wrap an engine failure during verification
pub(crate) fn verification_failure(err: Error) -> Error {
    match err {
        Error::VerificationFailed(_) => err,
        other => Error::VerificationFailed(other.to_string()),
    }
}
