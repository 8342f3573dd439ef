//! CAdES Provider - certificate lookup and CAdES-BES signing over a host-supplied engine
//!
//! Lists and resolves certificates from the engine's store and produces
//! detached or attached signatures, optionally packed with the source
//! document into an archive.

// Foundational layer
pub mod error;
pub mod types;
pub mod config;
pub mod telemetry;

// Engine contract
pub mod engine;

// Core layer
pub mod certificate;
pub mod signing;

// Application layer
pub mod provider;

// Public key types
pub use crate::error::Error;
pub use crate::types::{Document, Locale, Result};
pub use crate::config::Settings;
pub use crate::certificate::{CertificatePredicate, CertificateRecord};
pub use crate::engine::{EngineHost, StoreSpec};
pub use crate::signing::{SignCreateConfiguration, SignedArtifact, SigningRequest};
pub use crate::provider::{
    create_signature_provider, Backend, ProviderAvailability, ProviderGate, ProviderOptions,
    SignatureProvider, VerifyRequest,
};
