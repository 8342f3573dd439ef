use std::io::{Cursor, Write};

use bytes::Bytes;
use tracing::debug;
use zip::{write::FileOptions, CompressionMethod, ZipWriter};

use crate::types::{Document, Result};

/// Packs named entries into a single named container
pub trait Archiver: Send + Sync {
    /// Build the container `file_name` holding `entries` in order
    fn archive(&self, file_name: &str, entries: &[Document]) -> Result<Document>;
}

/// In-memory zip packaging
#[derive(Debug, Clone, Copy)]
pub struct ZipArchiver {
    /// Compression for every entry
    compression: CompressionMethod,
}

impl ZipArchiver {
    /// Create an archiver that deflates entries
    pub fn new() -> Self {
        Self {
            compression: CompressionMethod::Deflated,
        }
    }

    /// Create an archiver that stores entries uncompressed
    pub fn stored() -> Self {
        Self {
            compression: CompressionMethod::Stored,
        }
    }
}

impl Default for ZipArchiver {
    fn default() -> Self {
        Self::new()
    }
}

impl Archiver for ZipArchiver {
    fn archive(&self, file_name: &str, entries: &[Document]) -> Result<Document> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default().compression_method(self.compression);

        for entry in entries {
            writer.start_file(entry.name.as_str(), options)?;
            writer.write_all(&entry.content)?;
        }

        let content = writer.finish()?.into_inner();
        debug!("Packed {} entries into {} ({} bytes)", entries.len(), file_name, content.len());

        Ok(Document::new(file_name, Bytes::from(content)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use zip::ZipArchive;

    #[test]
    fn test_archive_keeps_entry_order_and_content() {
        let entries = vec![
            Document::new("report.pdf", &b"%PDF-1.7 body"[..]),
            Document::new("report.pdf.sig", vec![0x30u8, 0x82, 0x01, 0x00]),
        ];

        let archive = ZipArchiver::new().archive("report.zip", &entries).unwrap();
        assert_eq!(archive.name, "report.zip");

        let mut reader = ZipArchive::new(Cursor::new(archive.content.to_vec())).unwrap();
        assert_eq!(reader.len(), 2);
        assert_eq!(reader.by_index(0).unwrap().name(), "report.pdf");
        assert_eq!(reader.by_index(1).unwrap().name(), "report.pdf.sig");

        let mut body = Vec::new();
        reader.by_name("report.pdf").unwrap().read_to_end(&mut body).unwrap();
        assert_eq!(body, b"%PDF-1.7 body");
    }

    #[test]
    fn test_stored_archive_with_no_entries() {
        let archive = ZipArchiver::stored().archive("empty.zip", &[]).unwrap();

        let reader = ZipArchive::new(Cursor::new(archive.content.to_vec())).unwrap();
        assert_eq!(reader.len(), 0);
    }
}
