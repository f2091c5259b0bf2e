//! In-memory items derived from the store on every reconciliation pass.

use super::{CertificateRecord, DecodedHolder, ItemKey, TransferCodeRecord};

/// A certificate after decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateItem {
    /// Stable identity of the stored record.
    pub identity: ItemKey,
    /// The full certificate payload.
    pub qr_payload: String,
    /// QR image of the light certificate when it is the one in use.
    pub light_qr_image: Option<String>,
    /// Decoded holder, `None` when decoding failed.
    pub holder: Option<DecodedHolder>,
}

/// A transfer code awaiting conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferItem {
    /// Stable identity of the stored record.
    pub identity: ItemKey,
    /// The stored record.
    pub transfer_code: TransferCodeRecord,
}

/// A decoded view of one stored item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveItem {
    /// See [`CertificateItem`].
    Certificate(CertificateItem),
    /// See [`TransferItem`].
    Transfer(TransferItem),
}

impl LiveItem {
    /// Live item for a certificate record, given the outcome of decoding.
    #[must_use]
    pub fn certificate(
        record: &CertificateRecord,
        light_qr_image: Option<String>,
        holder: Option<DecodedHolder>,
    ) -> Self {
        Self::Certificate(CertificateItem {
            identity: ItemKey::certificate(&record.qr_payload),
            qr_payload: record.qr_payload.clone(),
            light_qr_image,
            holder,
        })
    }

    /// Live item for a transfer code record.
    #[must_use]
    pub fn transfer(record: TransferCodeRecord) -> Self {
        Self::Transfer(TransferItem {
            identity: ItemKey::transfer_code(&record.code),
            transfer_code: record,
        })
    }

    /// Stable identity of the underlying stored record.
    #[must_use]
    pub const fn identity(&self) -> &ItemKey {
        match self {
            Self::Certificate(item) => &item.identity,
            Self::Transfer(item) => &item.identity,
        }
    }
}
