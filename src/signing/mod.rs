pub mod archive;
pub mod codec;
pub mod pipeline;
pub mod signer;

// Re-export key types
pub use archive::{Archiver, ZipArchiver};
pub use pipeline::{
    ArtifactKind, ArtifactNaming, SignCreateConfiguration, SignatureEncoding, SignaturePipeline,
    SignedArtifact, SigningRequest,
};
pub use signer::{SignedAttribute, SignerDescriptor};
