use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::certificate::filter::ALGORITHM_GOST_2012_256;
use crate::engine::blocking::{BlockingEngine, CertificateHandle, StoreHandle};
use crate::engine::host::EngineHost;
use crate::engine::nonblocking::{AsyncCertificateHandle, AsyncEngine, AsyncStoreHandle};
use crate::engine::types::{
    CertField, CertInfoType, ChainPolicy, FieldValue, FindType, SignatureProfile, StoreSpec,
};
use crate::error::Error;
use crate::signing::{codec, SignerDescriptor};
use crate::types::Result;

const SIGNATURE_LINE_WIDTH: usize = 64;
const CONTENT_MARKER: &[u8] = b";content=";

/// Mock certificate information
#[derive(Debug, Clone)]
pub struct MockCertificate {
    /// Certificate fingerprint
    pub thumbprint: String,
    /// Subject common name
    pub subject: String,
    /// Issuer common name
    pub issuer: String,
    /// Serial number
    pub serial_number: String,
    /// Start of validity
    pub valid_from: DateTime<Utc>,
    /// End of validity
    pub valid_to: DateTime<Utc>,
    /// Public key algorithm OID
    pub algorithm: String,
    /// Field whose read fails, if any
    failing: Option<CertField>,
}

impl MockCertificate {
    /// A GOST certificate valid from thirty days ago for one year.
    ///
    /// The thumbprint is derived from the subject so fixtures stay stable.
    pub fn new(subject: &str) -> Self {
        let now = Utc::now();
        Self {
            thumbprint: format!("{:x}", md5::compute(subject.as_bytes())).to_uppercase(),
            subject: subject.to_string(),
            issuer: "Mock CA".to_string(),
            serial_number: format!("{:x}", md5::compute(format!("serial:{}", subject)))[..16]
                .to_string(),
            valid_from: now - chrono::Duration::days(30),
            valid_to: now + chrono::Duration::days(335),
            algorithm: ALGORITHM_GOST_2012_256.to_string(),
            failing: None,
        }
    }

    /// Override the fingerprint
    pub fn with_thumbprint(mut self, thumbprint: &str) -> Self {
        self.thumbprint = thumbprint.to_string();
        self
    }

    /// Override the validity window
    pub fn with_validity(mut self, valid_from: DateTime<Utc>, valid_to: DateTime<Utc>) -> Self {
        self.valid_from = valid_from;
        self.valid_to = valid_to;
        self
    }

    /// Override the public key algorithm
    pub fn with_algorithm(mut self, oid: &str) -> Self {
        self.algorithm = oid.to_string();
        self
    }

    /// Make reads of `field` fail
    pub fn failing_field(mut self, field: CertField) -> Self {
        self.failing = Some(field);
        self
    }

    fn value(&self, field: CertField) -> Result<FieldValue> {
        if self.failing == Some(field) {
            return Err(Error::Engine(format!("property {} is unavailable", field)));
        }

        let email = format!("{}@example.org", self.subject.to_lowercase().replace(' ', "."));
        let value = match field {
            CertField::Version => FieldValue::Int(3),
            CertField::Thumbprint => FieldValue::Text(self.thumbprint.clone()),
            CertField::SubjectName => FieldValue::Text(format!("CN={}, E={}", self.subject, email)),
            CertField::IssuerName => FieldValue::Text(format!("CN={}", self.issuer)),
            CertField::SerialNumber => FieldValue::Text(self.serial_number.clone()),
            CertField::ValidFrom => FieldValue::Time(self.valid_from),
            CertField::ValidTo => FieldValue::Time(self.valid_to),
            CertField::Info(CertInfoType::SubjectSimpleName) => FieldValue::Text(self.subject.clone()),
            CertField::Info(CertInfoType::SubjectEmailName) => FieldValue::Text(email),
            CertField::Info(CertInfoType::IssuerSimpleName) => FieldValue::Text(self.issuer.clone()),
            CertField::Info(_) => FieldValue::Text(String::new()),
            CertField::PublicKeyAlgorithm => FieldValue::Text(self.algorithm.clone()),
        };

        Ok(value)
    }
}

impl CertificateHandle for MockCertificate {
    fn read_field(&self, field: CertField) -> Result<FieldValue> {
        self.value(field)
    }
}

#[async_trait]
impl AsyncCertificateHandle for MockCertificate {
    async fn read_field(&self, field: CertField) -> Result<FieldValue> {
        tokio::task::yield_now().await;
        self.value(field)
    }
}

/// Signer details captured by the mock engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedSigner {
    /// Fingerprint of the signing certificate
    pub thumbprint: String,
    /// Signing time attribute
    pub signing_time: Option<DateTime<Utc>>,
    /// Chain inclusion policy
    pub chain_policy: ChainPolicy,
    /// Detached flag passed to the sign call
    pub detached: bool,
}

/// Call counters shared by a mock engine and the stores it creates
#[derive(Debug, Default)]
pub struct MockStats {
    opened: AtomicUsize,
    closed: AtomicUsize,
    signed: AtomicUsize,
    last_signer: Mutex<Option<RecordedSigner>>,
}

impl MockStats {
    /// Number of store open calls
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Number of store close calls
    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// Number of sign calls
    pub fn signed(&self) -> usize {
        self.signed.load(Ordering::SeqCst)
    }

    /// Signer used by the latest sign call
    pub fn last_signer(&self) -> Option<RecordedSigner> {
        self.last_signer.lock().ok().and_then(|signer| signer.clone())
    }

    fn record_signer(&self, signer: RecordedSigner) -> Result<()> {
        self.signed.fetch_add(1, Ordering::SeqCst);
        let mut last = self
            .last_signer
            .lock()
            .map_err(|e| Error::Internal(format!("mock signer lock poisoned: {}", e)))?;
        *last = Some(signer);
        Ok(())
    }
}

/// Mock certificate store over a snapshot of the engine's certificates
pub struct MockStore {
    certificates: Vec<MockCertificate>,
    open: bool,
    fail_open: bool,
    stats: Arc<MockStats>,
}

impl MockStore {
    fn open_store(&mut self, spec: &StoreSpec) -> Result<()> {
        self.stats.opened.fetch_add(1, Ordering::SeqCst);
        if self.fail_open {
            return Err(Error::Engine(format!("access to store {} denied", spec.name)));
        }
        self.open = true;
        Ok(())
    }

    fn close_store(&mut self) -> Result<()> {
        self.stats.closed.fetch_add(1, Ordering::SeqCst);
        self.open = false;
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(Error::Engine("store is not open".to_string()))
        }
    }

    fn entry(&self, index: usize) -> Result<MockCertificate> {
        self.ensure_open()?;
        index
            .checked_sub(1)
            .and_then(|i| self.certificates.get(i))
            .cloned()
            .ok_or_else(|| Error::Engine(format!("no certificate at index {}", index)))
    }

    fn matches(&self, find_type: FindType, query: &str) -> Result<Vec<MockCertificate>> {
        self.ensure_open()?;
        match find_type {
            FindType::Sha1Hash => Ok(self
                .certificates
                .iter()
                .filter(|c| c.thumbprint.eq_ignore_ascii_case(query))
                .cloned()
                .collect()),
        }
    }
}

impl StoreHandle for MockStore {
    fn open(&mut self, spec: &StoreSpec) -> Result<()> {
        self.open_store(spec)
    }

    fn close(&mut self) -> Result<()> {
        self.close_store()
    }

    fn count(&self) -> Result<usize> {
        self.ensure_open()?;
        Ok(self.certificates.len())
    }

    fn item(&self, index: usize) -> Result<Arc<dyn CertificateHandle>> {
        Ok(Arc::new(self.entry(index)?))
    }

    fn find(&self, find_type: FindType, query: &str) -> Result<Vec<Arc<dyn CertificateHandle>>> {
        Ok(self
            .matches(find_type, query)?
            .into_iter()
            .map(|c| Arc::new(c) as Arc<dyn CertificateHandle>)
            .collect())
    }
}

#[async_trait]
impl AsyncStoreHandle for MockStore {
    async fn open(&mut self, spec: &StoreSpec) -> Result<()> {
        tokio::task::yield_now().await;
        self.open_store(spec)
    }

    async fn close(&mut self) -> Result<()> {
        tokio::task::yield_now().await;
        self.close_store()
    }

    async fn count(&self) -> Result<usize> {
        tokio::task::yield_now().await;
        self.ensure_open()?;
        Ok(self.certificates.len())
    }

    async fn item(&self, index: usize) -> Result<Arc<dyn AsyncCertificateHandle>> {
        tokio::task::yield_now().await;
        Ok(Arc::new(self.entry(index)?))
    }

    async fn find(
        &self,
        find_type: FindType,
        query: &str,
    ) -> Result<Vec<Arc<dyn AsyncCertificateHandle>>> {
        tokio::task::yield_now().await;
        Ok(self
            .matches(find_type, query)?
            .into_iter()
            .map(|c| Arc::new(c) as Arc<dyn AsyncCertificateHandle>)
            .collect())
    }
}

/// In-memory signing engine for tests.
///
/// Signatures are deterministic: they encode the signer's thumbprint, the
/// detached flag and an MD5 digest of the content, plus the content itself
/// for attached signatures. Output is wrapped at 64 columns like the real
/// engine's.
#[derive(Debug, Clone)]
pub struct MockEngine {
    certificates: Arc<Mutex<Vec<MockCertificate>>>,
    sign_error: Option<String>,
    fail_open: bool,
    stats: Arc<MockStats>,
}

impl MockEngine {
    /// Create an engine whose store holds `certificates`
    pub fn new(certificates: Vec<MockCertificate>) -> Self {
        Self {
            certificates: Arc::new(Mutex::new(certificates)),
            sign_error: None,
            fail_open: false,
            stats: Arc::new(MockStats::default()),
        }
    }

    /// Make every sign call fail with `diagnostic`
    pub fn failing_sign(mut self, diagnostic: &str) -> Self {
        self.sign_error = Some(diagnostic.to_string());
        self
    }

    /// Make every store open fail
    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// Shared call counters
    pub fn stats(&self) -> Arc<MockStats> {
        self.stats.clone()
    }

    /// Replace the store contents seen by stores created afterwards
    pub fn set_certificates(&self, certificates: Vec<MockCertificate>) -> Result<()> {
        let mut current = self
            .certificates
            .lock()
            .map_err(|e| Error::Internal(format!("mock store lock poisoned: {}", e)))?;
        *current = certificates;
        Ok(())
    }

    /// Raw signature bytes the engine produces for the given input
    pub fn expected_signature(thumbprint: &str, content: &[u8], detached: bool) -> Vec<u8> {
        let mut signature = format!(
            "CAdES-BES;signer={};detached={};digest={:x}",
            thumbprint,
            detached,
            md5::compute(content)
        )
        .into_bytes();

        if !detached {
            signature.extend_from_slice(CONTENT_MARKER);
            signature.extend_from_slice(content);
        }

        signature
    }

    fn create(&self) -> Result<MockStore> {
        let certificates = self
            .certificates
            .lock()
            .map_err(|e| Error::Internal(format!("mock store lock poisoned: {}", e)))?
            .clone();

        Ok(MockStore {
            certificates,
            open: false,
            fail_open: self.fail_open,
            stats: self.stats.clone(),
        })
    }

    fn sign(
        &self,
        signer: RecordedSigner,
        content_base64: &str,
        profile: SignatureProfile,
    ) -> Result<String> {
        if let Some(diagnostic) = &self.sign_error {
            return Err(Error::Engine(diagnostic.clone()));
        }
        if profile != SignatureProfile::CadesBes {
            return Err(Error::Engine(format!("unsupported profile {:?}", profile)));
        }

        let content = codec::decode(content_base64)?;
        let signature = Self::expected_signature(&signer.thumbprint, &content, signer.detached);
        debug!("Mock engine signed {} bytes for {}", content.len(), signer.thumbprint);
        self.stats.record_signer(signer)?;

        Ok(wrap_lines(&codec::encode(&signature)))
    }

    fn verify(
        &self,
        signature_base64: &str,
        content_base64: Option<&str>,
        detached: bool,
    ) -> Result<()> {
        let signature = codec::decode(signature_base64)?;
        let (header, embedded) = match find_marker(&signature) {
            Some(at) => (&signature[..at], Some(&signature[at + CONTENT_MARKER.len()..])),
            None => (&signature[..], None),
        };
        let header = std::str::from_utf8(header)
            .map_err(|_| Error::Engine("signature is not a CAdES-BES message".to_string()))?;

        let digest = header
            .split(';')
            .find_map(|part| part.strip_prefix("digest="))
            .ok_or_else(|| Error::Engine("signature has no message digest".to_string()))?;

        let content = if detached {
            let encoded = content_base64
                .ok_or_else(|| Error::Engine("detached signature needs content".to_string()))?;
            codec::decode(encoded)?
        } else {
            embedded
                .map(|bytes| bytes.to_vec())
                .ok_or_else(|| Error::Engine("signature carries no content".to_string()))?
        };

        if format!("{:x}", md5::compute(&content)) != digest {
            return Err(Error::Engine("message digest does not match content".to_string()));
        }

        Ok(())
    }
}

fn find_marker(signature: &[u8]) -> Option<usize> {
    signature
        .windows(CONTENT_MARKER.len())
        .position(|window| window == CONTENT_MARKER)
}

fn wrap_lines(text: &str) -> String {
    text.as_bytes()
        .chunks(SIGNATURE_LINE_WIDTH)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect::<Vec<_>>()
        .join("\r\n")
}

fn recorded<C>(
    signer: &SignerDescriptor<C>,
    thumbprint: String,
    detached: bool,
) -> RecordedSigner {
    RecordedSigner {
        thumbprint,
        signing_time: signer.signing_time(),
        chain_policy: signer.chain_policy,
        detached,
    }
}

fn thumbprint_of(value: FieldValue) -> Result<String> {
    match value {
        FieldValue::Text(thumbprint) => Ok(thumbprint),
        other => Err(Error::Engine(format!("unexpected thumbprint value {:?}", other))),
    }
}

impl BlockingEngine for MockEngine {
    fn create_store(&self) -> Result<Box<dyn StoreHandle>> {
        Ok(Box::new(self.create()?))
    }

    fn sign_cades(
        &self,
        signer: &SignerDescriptor<Arc<dyn CertificateHandle>>,
        content_base64: &str,
        profile: SignatureProfile,
        detached: bool,
    ) -> Result<String> {
        let thumbprint = thumbprint_of(signer.certificate.read_field(CertField::Thumbprint)?)?;
        self.sign(recorded(signer, thumbprint, detached), content_base64, profile)
    }

    fn verify_cades(
        &self,
        signature_base64: &str,
        content_base64: Option<&str>,
        _profile: SignatureProfile,
        detached: bool,
    ) -> Result<()> {
        self.verify(signature_base64, content_base64, detached)
    }
}

#[async_trait]
impl AsyncEngine for MockEngine {
    async fn create_store(&self) -> Result<Box<dyn AsyncStoreHandle>> {
        tokio::task::yield_now().await;
        Ok(Box::new(self.create()?))
    }

    async fn sign_cades(
        &self,
        signer: &SignerDescriptor<Arc<dyn AsyncCertificateHandle>>,
        content_base64: &str,
        profile: SignatureProfile,
        detached: bool,
    ) -> Result<String> {
        let thumbprint = thumbprint_of(signer.certificate.read_field(CertField::Thumbprint).await?)?;
        tokio::task::yield_now().await;
        self.sign(recorded(signer, thumbprint, detached), content_base64, profile)
    }

    async fn verify_cades(
        &self,
        signature_base64: &str,
        content_base64: Option<&str>,
        _profile: SignatureProfile,
        detached: bool,
    ) -> Result<()> {
        tokio::task::yield_now().await;
        self.verify(signature_base64, content_base64, detached)
    }
}

/// How the mock host's engine finishes loading
#[derive(Debug, Clone)]
pub enum MockLoad {
    /// Loaded immediately
    Ready,
    /// Loaded after a delay
    Delayed(Duration),
    /// Load fails with the given message
    Fails(String),
    /// Load never completes
    Never,
}

/// Mock host environment
#[derive(Debug)]
pub struct MockHost {
    installed: bool,
    load: MockLoad,
    async_engine: Option<MockEngine>,
    blocking_engine: Option<MockEngine>,
    load_waits: AtomicUsize,
}

impl MockHost {
    /// Host exposing the suspend-capable engine
    pub fn with_async(engine: MockEngine) -> Self {
        Self::build(true, Some(engine), None)
    }

    /// Host exposing only the blocking engine
    pub fn with_blocking(engine: MockEngine) -> Self {
        Self::build(true, None, Some(engine))
    }

    /// Host without any engine installed
    pub fn not_installed() -> Self {
        Self::build(false, None, None)
    }

    /// Host that loads but exposes no usable engine
    pub fn without_engine() -> Self {
        Self::build(true, None, None)
    }

    fn build(installed: bool, async_engine: Option<MockEngine>, blocking_engine: Option<MockEngine>) -> Self {
        Self {
            installed,
            load: MockLoad::Ready,
            async_engine,
            blocking_engine,
            load_waits: AtomicUsize::new(0),
        }
    }

    /// Set the load behaviour
    pub fn load(mut self, load: MockLoad) -> Self {
        self.load = load;
        self
    }

    /// Number of times the load signal was awaited
    pub fn load_waits(&self) -> usize {
        self.load_waits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EngineHost for MockHost {
    fn is_installed(&self) -> bool {
        self.installed
    }

    async fn wait_loaded(&self) -> Result<()> {
        self.load_waits.fetch_add(1, Ordering::SeqCst);

        match &self.load {
            MockLoad::Ready => Ok(()),
            MockLoad::Delayed(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(())
            }
            MockLoad::Fails(message) => Err(Error::Engine(message.clone())),
            MockLoad::Never => std::future::pending().await,
        }
    }

    fn async_engine(&self) -> Option<Arc<dyn AsyncEngine>> {
        self.async_engine
            .clone()
            .map(|engine| Arc::new(engine) as Arc<dyn AsyncEngine>)
    }

    fn blocking_engine(&self) -> Option<Arc<dyn BlockingEngine>> {
        self.blocking_engine
            .clone()
            .map(|engine| Arc::new(engine) as Arc<dyn BlockingEngine>)
    }
}
