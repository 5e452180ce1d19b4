//! Encrypted document wire format.
//!
//! Layout: 4-byte magic, 1-byte format version, 2-byte big-endian header
//! length, CBOR header, then the CBOR-encoded encrypted payload. The
//! header is not encrypted: the document id must be recoverable from the
//! bytes alone.

use serde::{Deserialize, Serialize};

use sealkit_core::{DocumentId, EncryptedPayload};

use crate::error::{DocumentError, Result};

/// Magic bytes at the start of every encrypted document.
pub const DOCUMENT_MAGIC: [u8; 4] = *b"SKIT";

/// Current wire format version.
pub const DOCUMENT_FORMAT_VERSION: u8 = 1;

/// The unencrypted document header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentHeader {
    /// The document's id.
    pub id: DocumentId,

    /// When the document was encrypted (Unix milliseconds).
    pub created: i64,
}

impl DocumentHeader {
    /// Encode header + payload into the wire form.
    pub fn encode(&self, payload: &EncryptedPayload) -> Result<Vec<u8>> {
        let mut header_bytes = Vec::new();
        ciborium::into_writer(self, &mut header_bytes)
            .map_err(|e| DocumentError::MalformedDocument(e.to_string()))?;
        let header_len = u16::try_from(header_bytes.len()).map_err(|_| {
            DocumentError::MalformedDocument("header exceeds 64 KiB".into())
        })?;

        let payload_bytes = payload.to_bytes()?;

        let mut out = Vec::with_capacity(7 + header_bytes.len() + payload_bytes.len());
        out.extend_from_slice(&DOCUMENT_MAGIC);
        out.push(DOCUMENT_FORMAT_VERSION);
        out.extend_from_slice(&header_len.to_be_bytes());
        out.extend_from_slice(&header_bytes);
        out.extend_from_slice(&payload_bytes);
        Ok(out)
    }

    /// Decode the wire form into header + payload.
    pub fn decode(bytes: &[u8]) -> Result<(Self, EncryptedPayload)> {
        let (header, header_end) = Self::decode_prefix(bytes)?;
        let payload = EncryptedPayload::from_bytes(&bytes[header_end..])
            .map_err(|e| DocumentError::MalformedDocument(format!("bad payload: {e}")))?;
        Ok((header, payload))
    }

    /// Decode only the header, returning it and the payload offset.
    fn decode_prefix(bytes: &[u8]) -> Result<(Self, usize)> {
        if bytes.len() < 7 {
            return Err(DocumentError::MalformedDocument(
                "too short for a document header".into(),
            ));
        }
        if bytes[..4] != DOCUMENT_MAGIC {
            return Err(DocumentError::MalformedDocument("bad magic".into()));
        }
        let version = bytes[4];
        if version != DOCUMENT_FORMAT_VERSION {
            return Err(DocumentError::MalformedDocument(format!(
                "unsupported format version {version}"
            )));
        }

        let header_len = u16::from_be_bytes([bytes[5], bytes[6]]) as usize;
        let header_end = 7 + header_len;
        if bytes.len() < header_end {
            return Err(DocumentError::MalformedDocument(
                "truncated header".into(),
            ));
        }

        let header: DocumentHeader = ciborium::from_reader(&bytes[7..header_end])
            .map_err(|e| DocumentError::MalformedDocument(format!("bad header: {e}")))?;
        Ok((header, header_end))
    }
}

/// Extract the document id from encrypted document bytes.
///
/// Fails if the bytes are not an encrypted document or have no header.
pub fn document_id_from_bytes(bytes: &[u8]) -> Result<DocumentId> {
    let (header, _) = DocumentHeader::decode_prefix(bytes)?;
    Ok(header.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sealkit_core::SymmetricKey;

    fn header() -> DocumentHeader {
        DocumentHeader {
            id: DocumentId::new("doc-1").unwrap(),
            created: 1736870400000,
        }
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let key = SymmetricKey::generate().unwrap();
        let payload = EncryptedPayload::encrypt(b"body", &key).unwrap();

        let wire = header().encode(&payload).unwrap();
        let (decoded_header, decoded_payload) = DocumentHeader::decode(&wire).unwrap();

        assert_eq!(decoded_header, header());
        assert_eq!(decoded_payload.decrypt(&key).unwrap(), b"body");
    }

    #[test]
    fn test_id_from_bytes() {
        let key = SymmetricKey::generate().unwrap();
        let payload = EncryptedPayload::encrypt(b"body", &key).unwrap();
        let wire = header().encode(&payload).unwrap();

        assert_eq!(
            document_id_from_bytes(&wire).unwrap(),
            DocumentId::new("doc-1").unwrap()
        );
    }

    #[test]
    fn test_bad_magic_rejected() {
        let mut wire = {
            let key = SymmetricKey::generate().unwrap();
            let payload = EncryptedPayload::encrypt(b"body", &key).unwrap();
            header().encode(&payload).unwrap()
        };
        wire[0] = b'X';

        assert!(matches!(
            document_id_from_bytes(&wire),
            Err(DocumentError::MalformedDocument(_))
        ));
    }

    #[test]
    fn test_unsupported_version_rejected() {
        let key = SymmetricKey::generate().unwrap();
        let payload = EncryptedPayload::encrypt(b"body", &key).unwrap();
        let mut wire = header().encode(&payload).unwrap();
        wire[4] = 9;

        assert!(matches!(
            DocumentHeader::decode(&wire),
            Err(DocumentError::MalformedDocument(_))
        ));
    }

    #[test]
    fn test_truncated_rejected() {
        let key = SymmetricKey::generate().unwrap();
        let payload = EncryptedPayload::encrypt(b"body", &key).unwrap();
        let wire = header().encode(&payload).unwrap();

        assert!(DocumentHeader::decode(&wire[..5]).is_err());
        assert!(document_id_from_bytes(&wire[..6]).is_err());
    }
}
