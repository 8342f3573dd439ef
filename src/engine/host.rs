use std::sync::Arc;

use async_trait::async_trait;

use crate::engine::blocking::BlockingEngine;
use crate::engine::nonblocking::AsyncEngine;
use crate::types::Result;

/// Host environment that supplies the signing engine.
///
/// The engine loads asynchronously after the host starts. Until
/// [`EngineHost::wait_loaded`] completes, neither engine accessor is
/// meaningful.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EngineHost: Send + Sync {
    /// False when the engine is definitely absent from this host
    fn is_installed(&self) -> bool;

    /// Resolve once the engine has signalled that it finished loading
    async fn wait_loaded(&self) -> Result<()>;

    /// The suspend-capable engine, when the host exposes one
    fn async_engine(&self) -> Option<Arc<dyn AsyncEngine>>;

    /// The blocking engine, when the host exposes one
    fn blocking_engine(&self) -> Option<Arc<dyn BlockingEngine>>;
}
