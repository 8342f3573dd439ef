//! Conversion of native store entries into [`CertificateRecord`]s.
//!
//! Listing is all-or-nothing: the first failed read aborts the whole call so
//! callers never see a partial directory.

use tracing::debug;

use crate::certificate::record::{CertificateRecord, RecordBuilder};
use crate::engine::blocking::{CertificateHandle, StoreHandle};
use crate::engine::nonblocking::{AsyncCertificateHandle, AsyncStoreHandle};
use crate::engine::types::CertField;
use crate::error::Error;
use crate::types::Result;

fn read_failure(index: usize, builder: &RecordBuilder, reason: String) -> Error {
    Error::DirectoryRead {
        index,
        fingerprint: builder.thumbprint().map(str::to_string),
        reason,
    }
}

/// Read every record field from a blocking certificate handle
pub fn read_record(certificate: &dyn CertificateHandle, index: usize) -> Result<CertificateRecord> {
    let mut builder = RecordBuilder::new();

    for field in CertField::RECORD_FIELDS {
        let value = certificate
            .read_field(field)
            .map_err(|e| read_failure(index, &builder, format!("{}: {}", field, e)))?;
        builder
            .set(field, value)
            .map_err(|reason| read_failure(index, &builder, reason))?;
    }

    let thumbprint = builder.thumbprint().map(str::to_string);
    builder.build().map_err(|reason| Error::DirectoryRead {
        index,
        fingerprint: thumbprint,
        reason,
    })
}

/// Read every record field from a suspend-capable certificate handle
pub async fn read_record_async(
    certificate: &dyn AsyncCertificateHandle,
    index: usize,
) -> Result<CertificateRecord> {
    let mut builder = RecordBuilder::new();

    for field in CertField::RECORD_FIELDS {
        let value = certificate
            .read_field(field)
            .await
            .map_err(|e| read_failure(index, &builder, format!("{}: {}", field, e)))?;
        builder
            .set(field, value)
            .map_err(|reason| read_failure(index, &builder, reason))?;
    }

    let thumbprint = builder.thumbprint().map(str::to_string);
    builder.build().map_err(|reason| Error::DirectoryRead {
        index,
        fingerprint: thumbprint,
        reason,
    })
}

/// Read all entries of an open blocking store, in index order
pub fn list_records(store: &dyn StoreHandle) -> Result<Vec<CertificateRecord>> {
    let count = store.count()?;
    let mut records = Vec::with_capacity(count);

    for index in 1..=count {
        let certificate = store.item(index).map_err(|e| Error::DirectoryRead {
            index,
            fingerprint: None,
            reason: e.to_string(),
        })?;
        records.push(read_record(certificate.as_ref(), index)?);
    }

    debug!("Read {} certificates from store", records.len());
    Ok(records)
}

/// Read all entries of an open suspend-capable store, in index order
pub async fn list_records_async(store: &dyn AsyncStoreHandle) -> Result<Vec<CertificateRecord>> {
    let count = store.count().await?;
    let mut records = Vec::with_capacity(count);

    for index in 1..=count {
        let certificate = store.item(index).await.map_err(|e| Error::DirectoryRead {
            index,
            fingerprint: None,
            reason: e.to_string(),
        })?;
        records.push(read_record_async(certificate.as_ref(), index).await?);
    }

    debug!("Read {} certificates from store", records.len());
    Ok(records)
}
