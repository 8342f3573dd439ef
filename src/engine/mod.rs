pub mod types;
pub mod blocking;
pub mod nonblocking;
pub mod host;
pub mod mock;

// Re-export key types
pub use types::{
    CertField, CertInfoType, ChainPolicy, FieldValue, FindType, OpenMode, SignatureProfile,
    StoreLocation, StoreSpec,
};
pub use blocking::{BlockingEngine, CertificateHandle, StoreHandle};
pub use nonblocking::{AsyncCertificateHandle, AsyncEngine, AsyncStoreHandle};
pub use host::EngineHost;
pub use mock::{MockCertificate, MockEngine, MockHost, MockLoad, MockStats};
