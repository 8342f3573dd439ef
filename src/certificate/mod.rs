pub mod directory;
pub mod filter;
pub mod record;
pub mod resolver;

// Re-export key types
pub use directory::{list_records, list_records_async, read_record, read_record_async};
pub use filter::{filter_certificates, CertificatePredicate, ALGORITHM_GOST_2012_256};
pub use record::{CertificateRecord, RecordBuilder};
pub use resolver::resolve_unique;
