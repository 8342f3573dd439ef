use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::engine::host::EngineHost;
use crate::error::Error;
use crate::provider::{create_signature_provider, Backend, ProviderOptions, SignatureProvider};
use crate::types::Result;

/// Availability of the signature provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderAvailability {
    /// Nobody has asked for the provider yet, or resolution is in flight
    Unresolved,
    /// Provider resolved over the given backend
    Ready(Backend),
    /// Resolution failed for good
    Unavailable(String),
}

type Resolution = std::result::Result<Arc<dyn SignatureProvider>, String>;

/// Resolves the signature provider exactly once.
///
/// The first call spawns the resolution task: it waits for the host's engine
/// to load (bounded by the load timeout) and picks a backend. The task runs
/// to completion even if every caller stops waiting. All callers, early or
/// late, observe the single outcome, which is kept for the lifetime of the
/// gate.
pub struct ProviderGate {
    host: Arc<dyn EngineHost>,
    options: ProviderOptions,
    load_timeout: Duration,
    /// Taken by the call that starts resolution
    pending: Mutex<Option<watch::Sender<Option<Resolution>>>>,
    resolved: watch::Receiver<Option<Resolution>>,
}

impl ProviderGate {
    /// Create a gate; the host is not consulted until [`ProviderGate::provider`] is called
    pub fn new(host: Arc<dyn EngineHost>, options: ProviderOptions, load_timeout: Duration) -> Self {
        let (sender, resolved) = watch::channel(None);
        Self {
            host,
            options,
            load_timeout,
            pending: Mutex::new(Some(sender)),
            resolved,
        }
    }

    /// The shared provider, resolving it on first use
    pub async fn provider(&self) -> Result<Arc<dyn SignatureProvider>> {
        self.start()?;

        let mut resolved = self.resolved.clone();
        let outcome = resolved.wait_for(Option::is_some).await.map_err(|_| {
            Error::EngineUnavailable("provider resolution ended without an outcome".to_string())
        })?;

        match &*outcome {
            Some(Ok(provider)) => Ok(provider.clone()),
            Some(Err(reason)) => Err(Error::EngineUnavailable(reason.clone())),
            None => Err(Error::Internal("provider resolution is still pending".to_string())),
        }
    }

    /// Current availability, without triggering resolution
    pub fn state(&self) -> ProviderAvailability {
        match &*self.resolved.borrow() {
            None => ProviderAvailability::Unresolved,
            Some(Ok(provider)) => ProviderAvailability::Ready(provider.backend()),
            Some(Err(reason)) => ProviderAvailability::Unavailable(reason.clone()),
        }
    }

    fn start(&self) -> Result<()> {
        let sender = self
            .pending
            .lock()
            .map_err(|e| Error::Internal(format!("gate lock poisoned: {}", e)))?
            .take();

        if let Some(sender) = sender {
            debug!("Starting signature provider resolution");
            let host = self.host.clone();
            let options = self.options.clone();
            let load_timeout = self.load_timeout;

            tokio::spawn(async move {
                let outcome = resolve(host, options, load_timeout).await;
                sender.send_replace(Some(outcome));
            });
        }

        Ok(())
    }
}

async fn resolve(
    host: Arc<dyn EngineHost>,
    options: ProviderOptions,
    load_timeout: Duration,
) -> Resolution {
    if !host.is_installed() {
        warn!("Signing engine is not installed");
        return Err("signing engine is not installed".to_string());
    }

    let loaded = match timeout(load_timeout, host.wait_loaded()).await {
        Ok(loaded) => loaded,
        Err(elapsed) => Err(Error::from(elapsed)),
    };

    let provider = loaded
        .map_err(|e| match e {
            Error::EngineUnavailable(reason) => reason,
            other => format!("signing engine failed to load: {}", other),
        })
        .and_then(|_| {
            create_signature_provider(host.as_ref(), options).map_err(|e| match e {
                Error::EngineUnavailable(reason) => reason,
                other => other.to_string(),
            })
        });

    match &provider {
        Ok(p) => info!("Signature provider ready ({} backend)", p.backend()),
        Err(reason) => warn!("Signature provider unavailable: {}", reason),
    }
    provider
}

impl fmt::Debug for ProviderGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderGate")
            .field("load_timeout", &self.load_timeout)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::host::MockEngineHost;
    use crate::engine::mock::{MockCertificate, MockEngine, MockHost, MockLoad};
    use crate::types::Document;

    fn gate(host: MockHost) -> (Arc<MockHost>, ProviderGate) {
        let host = Arc::new(host);
        let gate = ProviderGate::new(host.clone(), ProviderOptions::default(), Duration::from_millis(200));
        (host, gate)
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_resolution() {
        let engine = MockEngine::new(vec![MockCertificate::new("Alice")]);
        let host = MockHost::with_async(engine).load(MockLoad::Delayed(Duration::from_millis(20)));
        let (host, gate) = gate(host);
        let gate = Arc::new(gate);

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let gate = gate.clone();
            tasks.push(tokio::spawn(async move { gate.provider().await }));
        }

        let mut providers = Vec::new();
        for task in tasks {
            providers.push(task.await.unwrap().unwrap());
        }

        assert!(providers.iter().all(|p| Arc::ptr_eq(p, &providers[0])));
        assert_eq!(host.load_waits(), 1);
        assert_eq!(gate.state(), ProviderAvailability::Ready(Backend::Async));
    }

    #[tokio::test]
    async fn test_state_unresolved_until_first_call() {
        let (host, gate) = gate(MockHost::with_blocking(MockEngine::new(vec![])));

        assert_eq!(gate.state(), ProviderAvailability::Unresolved);
        assert_eq!(host.load_waits(), 0);

        let provider = gate.provider().await.unwrap();
        assert_eq!(provider.backend(), Backend::Blocking);
        assert_eq!(gate.state(), ProviderAvailability::Ready(Backend::Blocking));
    }

    #[tokio::test]
    async fn test_not_installed_fails_without_waiting() {
        let (host, gate) = gate(MockHost::not_installed());

        for _ in 0..3 {
            assert!(matches!(gate.provider().await, Err(Error::EngineUnavailable(_))));
        }
        assert!(matches!(gate.state(), ProviderAvailability::Unavailable(_)));
        assert_eq!(host.load_waits(), 0);
    }

    #[tokio::test]
    async fn test_abandoned_first_caller_keeps_single_resolution() {
        let engine = MockEngine::new(vec![MockCertificate::new("Alice")]);
        let host = MockHost::with_async(engine).load(MockLoad::Delayed(Duration::from_millis(100)));
        let (host, gate) = gate(host);

        let abandoned = tokio::time::timeout(Duration::from_millis(10), gate.provider()).await;
        assert!(abandoned.is_err());
        assert_eq!(gate.state(), ProviderAvailability::Unresolved);

        let provider = gate.provider().await.unwrap();

        assert_eq!(provider.backend(), Backend::Async);
        assert_eq!(host.load_waits(), 1);
    }

    #[tokio::test]
    async fn test_host_seam_not_consulted_after_failure() {
        let mut host = MockEngineHost::new();
        host.expect_is_installed().times(1).returning(|| false);
        host.expect_wait_loaded().never();
        let gate = ProviderGate::new(Arc::new(host), ProviderOptions::default(), Duration::from_secs(60));

        assert!(gate.provider().await.is_err());
        assert!(gate.provider().await.is_err());
    }

    #[tokio::test]
    async fn test_load_failure_is_permanent() {
        let engine = MockEngine::new(vec![]);
        let host = MockHost::with_async(engine).load(MockLoad::Fails("cadesplugin_load_error".to_string()));
        let (host, gate) = gate(host);

        let first = gate.provider().await;
        let second = gate.provider().await;

        match first {
            Err(Error::EngineUnavailable(reason)) => assert!(reason.contains("cadesplugin_load_error")),
            other => panic!("unexpected result: {:?}", other.map(|p| p.backend())),
        }
        assert!(second.is_err());
        assert_eq!(host.load_waits(), 1);
    }

    #[tokio::test]
    async fn test_load_timeout_is_permanent() {
        let host = MockHost::with_async(MockEngine::new(vec![])).load(MockLoad::Never);
        let (host, gate) = gate(host);

        assert!(matches!(gate.provider().await, Err(Error::EngineUnavailable(_))));
        assert!(matches!(gate.state(), ProviderAvailability::Unavailable(_)));

        assert!(gate.provider().await.is_err());
        assert_eq!(host.load_waits(), 1);
    }

    #[tokio::test]
    async fn test_loaded_host_without_engine() {
        let (_, gate) = gate(MockHost::without_engine());

        match gate.provider().await {
            Err(Error::EngineUnavailable(reason)) => assert!(reason.contains("neither")),
            other => panic!("unexpected result: {:?}", other.map(|p| p.backend())),
        }
    }

    #[tokio::test]
    async fn test_provider_signs_through_gate() {
        let alice = MockCertificate::new("Alice");
        let engine = MockEngine::new(vec![alice.clone()]);
        let stats = engine.stats();
        let (_, gate) = gate(MockHost::with_async(engine));

        let provider = gate.provider().await.unwrap();
        let artifact = provider
            .sign_create(&alice.thumbprint, Document::new("report.pdf", &b"content"[..]), true)
            .await
            .unwrap();

        assert_eq!(artifact.file_name, "report.pdf.sig");
        assert_eq!(stats.signed(), 1);
    }
}
