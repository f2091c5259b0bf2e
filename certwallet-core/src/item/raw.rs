//! Persisted wallet records.

use serde::{Deserialize, Serialize};

/// A stored certificate, optionally paired with a short-lived light variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct CertificateRecord {
    /// The full certificate payload as scanned or imported.
    pub qr_payload: String,
    /// Payload of the light certificate derived from the full one.
    pub light_payload: Option<String>,
    /// Pre-rendered QR image of the light certificate.
    pub light_qr_image: Option<String>,
    /// PDF export returned alongside the certificate, if any.
    pub pdf_payload: Option<String>,
}

impl CertificateRecord {
    /// Creates a record holding only the full payload.
    #[must_use]
    pub fn new(qr_payload: impl Into<String>) -> Self {
        Self {
            qr_payload: qr_payload.into(),
            light_payload: None,
            light_qr_image: None,
            pdf_payload: None,
        }
    }

    /// Returns a copy of this record with the light certificate removed.
    #[must_use]
    pub fn without_light(&self) -> Self {
        Self {
            qr_payload: self.qr_payload.clone(),
            light_payload: None,
            light_qr_image: None,
            pdf_payload: self.pdf_payload.clone(),
        }
    }
}

/// A transfer code waiting to be exchanged for a certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct TransferCodeRecord {
    /// The code shown to the user and sent to the delivery backend.
    pub code: String,
    /// Unix seconds at which the code was created.
    pub created_at: u64,
    /// Unix seconds at which the code was last touched.
    pub last_updated_at: u64,
}

impl TransferCodeRecord {
    /// Creates a fresh record stamped with `now`.
    #[must_use]
    pub fn new(code: impl Into<String>, now: u64) -> Self {
        Self {
            code: code.into(),
            created_at: now,
            last_updated_at: now,
        }
    }
}

/// An entry of the persisted, ordered wallet list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum RawItem {
    /// A certificate.
    Certificate(CertificateRecord),
    /// A pending transfer code.
    TransferCode(TransferCodeRecord),
}

impl RawItem {
    /// Returns the matcher selecting exactly this item.
    #[must_use]
    pub fn matcher(&self) -> ItemMatcher {
        match self {
            Self::Certificate(record) => ItemMatcher::certificate(&record.qr_payload),
            Self::TransferCode(record) => ItemMatcher::transfer_code(&record.code),
        }
    }
}

impl From<CertificateRecord> for RawItem {
    fn from(record: CertificateRecord) -> Self {
        Self::Certificate(record)
    }
}

impl From<TransferCodeRecord> for RawItem {
    fn from(record: TransferCodeRecord) -> Self {
        Self::TransferCode(record)
    }
}

/// Selects a stored item by its identity.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum ItemMatcher {
    /// Matches the certificate with this full payload.
    Certificate {
        /// Full certificate payload.
        qr_payload: String,
    },
    /// Matches the transfer code with this value.
    TransferCode {
        /// Transfer code value.
        code: String,
    },
}

impl ItemMatcher {
    /// Matcher for a certificate payload.
    #[must_use]
    pub fn certificate(qr_payload: &str) -> Self {
        Self::Certificate {
            qr_payload: qr_payload.to_string(),
        }
    }

    /// Matcher for a transfer code.
    #[must_use]
    pub fn transfer_code(code: &str) -> Self {
        Self::TransferCode {
            code: code.to_string(),
        }
    }

    /// Returns `true` if `item` is the item this matcher selects.
    #[must_use]
    pub fn matches(&self, item: &RawItem) -> bool {
        match (self, item) {
            (Self::Certificate { qr_payload }, RawItem::Certificate(record)) => {
                record.qr_payload == *qr_payload
            }
            (Self::TransferCode { code }, RawItem::TransferCode(record)) => {
                record.code == *code
            }
            _ => false,
        }
    }
}
