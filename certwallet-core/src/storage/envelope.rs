//! Wallet list envelope persistence helpers.

use serde::{Deserialize, Serialize};

use super::error::{StorageError, StorageResult};
use crate::item::RawItem;

const ENVELOPE_VERSION: u32 = 1;

/// On-disk container: a version tag around the sealed, CBOR-encoded item list.
#[derive(Clone, Serialize, Deserialize)]
pub(crate) struct WalletEnvelope {
    pub(crate) version: u32,
    pub(crate) sealed_items: Vec<u8>,
}

impl WalletEnvelope {
    pub(crate) const fn new(sealed_items: Vec<u8>) -> Self {
        Self {
            version: ENVELOPE_VERSION,
            sealed_items,
        }
    }

    pub(crate) fn serialize(&self) -> StorageResult<Vec<u8>> {
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(self, &mut bytes)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        Ok(bytes)
    }

    pub(crate) fn deserialize(bytes: &[u8]) -> StorageResult<Self> {
        let envelope: Self = ciborium::de::from_reader(bytes)
            .map_err(|err| StorageError::InvalidEnvelope(err.to_string()))?;
        if envelope.version != ENVELOPE_VERSION {
            return Err(StorageError::UnsupportedEnvelopeVersion(envelope.version));
        }
        Ok(envelope)
    }
}

pub(crate) fn encode_items(items: &[RawItem]) -> StorageResult<Vec<u8>> {
    let mut bytes = Vec::new();
    ciborium::ser::into_writer(items, &mut bytes)
        .map_err(|err| StorageError::Serialization(err.to_string()))?;
    Ok(bytes)
}

pub(crate) fn decode_items(bytes: &[u8]) -> StorageResult<Vec<RawItem>> {
    ciborium::de::from_reader(bytes).map_err(|err| StorageError::Serialization(err.to_string()))
}
