use std::fmt;

use sha2::{Digest, Sha256};

/// Stable identity of a wallet item, independent of decoding.
///
/// Derived from the hex SHA-256 of the certificate's full payload or of the
/// transfer code, so it survives reconciliation passes unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ItemKey {
    /// Identity of a certificate.
    Certificate(String),
    /// Identity of a transfer code.
    TransferCode(String),
}

impl ItemKey {
    /// Identity of the certificate with this full payload.
    #[must_use]
    pub fn certificate(qr_payload: &str) -> Self {
        Self::Certificate(content_hash(qr_payload))
    }

    /// Identity of this transfer code.
    #[must_use]
    pub fn transfer_code(code: &str) -> Self {
        Self::TransferCode(content_hash(code))
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (kind, hash) = match self {
            Self::Certificate(hash) => ("certificate", hash),
            Self::TransferCode(hash) => ("transfer", hash),
        };
        write!(f, "{kind}:{}", hash.get(..12).unwrap_or(hash))
    }
}

fn content_hash(value: &str) -> String {
    hex::encode(Sha256::digest(value.as_bytes()))
}
