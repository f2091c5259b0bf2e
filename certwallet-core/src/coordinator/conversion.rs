//! Transfer code conversion tasks.

use std::collections::HashSet;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::merge::merge_conversion;
use super::reconcile::Dispatch;
use super::registry::TaskRegistry;
use super::Shared;
use crate::item::{
    CertificateRecord, ConversionPhase, ConversionState, ErrorKind, ItemKey, ItemMatcher,
    TransferCodeRecord,
};
use crate::services::{ConnectivityProbe, DeliveredCertificate, DeliveryError, KeyPair};
use crate::storage::{ItemStore, StorageResult};

impl Shared {
    /// Starts converting a transfer code, replacing any task running for it.
    pub(crate) fn spawn_conversion(
        self: &Arc<Self>,
        registry: &mut TaskRegistry,
        transfer_code: TransferCodeRecord,
    ) {
        let key = ItemKey::transfer_code(&transfer_code.code);
        let (generation, token) = registry.reserve(key.clone());
        log::debug!("starting conversion for {key}");

        let task = ConversionTask {
            shared: Arc::clone(self),
            key: key.clone(),
            generation,
            token,
            transfer_code,
        };
        let handle = self.runtime.spawn(task.run());
        registry.attach(&key, generation, handle);
    }
}

/// Final state of a conversion and whether it wrote to the store.
struct Outcome {
    state: ConversionState,
    store_changed: bool,
}

impl Outcome {
    const fn unchanged(state: ConversionState) -> Self {
        Self {
            state,
            store_changed: false,
        }
    }
}

/// Result of the network phase of a conversion.
enum Fetch {
    Done(Outcome),
    Delivered {
        key_pair: KeyPair,
        certificates: Vec<DeliveredCertificate>,
    },
}

struct ConversionTask {
    shared: Arc<Shared>,
    key: ItemKey,
    generation: u64,
    token: CancellationToken,
    transfer_code: TransferCodeRecord,
}

impl ConversionTask {
    async fn run(self) {
        let fetched = tokio::select! {
            biased;
            () = self.token.cancelled() => {
                log::debug!("conversion for {} cancelled", self.key);
                return;
            }
            fetched = self.fetch() => fetched,
        };

        let mut converted = HashSet::new();
        let outcome = match fetched {
            Fetch::Done(outcome) => outcome,
            Fetch::Delivered {
                key_pair,
                certificates,
            } => {
                let Some(outcome) = self.commit(&key_pair, &certificates).await else {
                    log::debug!("conversion for {} cancelled before storing", self.key);
                    return;
                };
                converted.extend(
                    certificates
                        .iter()
                        .map(|certificate| ItemKey::certificate(&certificate.qr_payload)),
                );
                outcome
            }
        };

        log::debug!(
            "conversion for {} finished: {}",
            self.key,
            ConversionPhase::from(&outcome.state)
        );
        let Outcome {
            state,
            store_changed,
        } = outcome;
        let transfer_code = &self.transfer_code;
        let published = self
            .shared
            .publish_terminal(&self.key, self.generation, |items| {
                // only a pass after the store write drops a current task's entry
                if !items
                    .iter()
                    .any(|item| item.is_transfer_code(&transfer_code.code))
                {
                    return items.to_vec();
                }
                merge_conversion(items, transfer_code, state)
            });

        if published && store_changed && self.shared.config.reload_after_conversion {
            if let Err(err) = self.shared.reconcile(&Dispatch::FreshAnd(converted)) {
                log::warn!("reload after conversion failed: {err}");
            }
        }
    }

    /// Looks up the key pair and downloads the delivered certificates.
    async fn fetch(&self) -> Fetch {
        let services = &self.shared.services;
        let code = self.transfer_code.code.as_str();

        let Some(key_pair) = services.keys.load_key_pair(code).await else {
            log::warn!("no key pair for {}", self.key);
            return Fetch::Done(Outcome::unchanged(ConversionState::Error {
                kind: ErrorKind::KeypairGenerationFailed,
            }));
        };

        match services.delivery.download(code, &key_pair).await {
            Ok(certificates) if certificates.is_empty() => {
                Fetch::Done(Outcome::unchanged(ConversionState::NotConverted))
            }
            Ok(certificates) => Fetch::Delivered {
                key_pair,
                certificates,
            },
            Err(err) => {
                log::warn!("download for {} failed: {err}", self.key);
                Fetch::Done(Outcome::unchanged(ConversionState::Error {
                    kind: classify_delivery_failure(&err, services.connectivity.as_ref()),
                }))
            }
        }
    }

    /// Stores the delivered certificates, then completes the delivery and
    /// deletes the key pair.
    ///
    /// Returns `None` if the task was cancelled before writing. Once the
    /// store is written the task is committed and runs to the end.
    async fn commit(
        &self,
        key_pair: &KeyPair,
        certificates: &[DeliveredCertificate],
    ) -> Option<Outcome> {
        let services = &self.shared.services;
        let code = self.transfer_code.code.as_str();
        let (first, rest) = certificates.split_first()?;

        let stored = {
            let _reconciling = self.shared.lock_reconcile();
            if !self.shared.lock_registry().commit(&self.key, self.generation) {
                return None;
            }
            store_delivered(services.store.as_ref(), &self.transfer_code, first, rest)
        };
        let store_changed = match stored {
            Ok(changed) => changed,
            Err(err) => {
                log::warn!("failed to store certificates for {}: {err}", self.key);
                return Some(Outcome {
                    state: ConversionState::Error {
                        kind: ErrorKind::Storage,
                    },
                    store_changed: true,
                });
            }
        };

        let state = match services.decoder.decode(&first.qr_payload) {
            Ok(holder) => ConversionState::Converted { holder },
            Err(err) => {
                log::warn!("delivered certificate did not decode: {err}");
                ConversionState::NotConverted
            }
        };

        // the backend expires the code on its own
        if let Err(err) = services.delivery.complete(code, key_pair).await {
            log::warn!("completing delivery for {} failed: {err}", self.key);
        }
        if let Err(err) = services.keys.delete_key_entry(code).await {
            log::warn!("deleting key pair for {} failed: {err}", self.key);
        }

        Some(Outcome {
            state,
            store_changed,
        })
    }
}

/// Writes delivered certificates to the store.
///
/// Additional certificates go to the front of the list, keeping their
/// delivered order. The first one then takes the place of the transfer code,
/// so a failure part way leaves the code in the store for a later retry.
fn store_delivered(
    store: &dyn ItemStore,
    transfer_code: &TransferCodeRecord,
    first: &DeliveredCertificate,
    rest: &[DeliveredCertificate],
) -> StorageResult<bool> {
    let mut changed = false;
    for certificate in rest.iter().rev() {
        changed |= store.insert_front(record_for(certificate).into())?;
    }

    let matcher = ItemMatcher::transfer_code(&transfer_code.code);
    let first = record_for(first);
    if store.replace(&matcher, first.clone().into())? {
        return Ok(true);
    }
    log::warn!("transfer code vanished during conversion, inserting certificate at front");
    Ok(store.insert_front(first.into())? || changed)
}

fn record_for(certificate: &DeliveredCertificate) -> CertificateRecord {
    CertificateRecord {
        pdf_payload: certificate.pdf_payload.clone(),
        ..CertificateRecord::new(certificate.qr_payload.clone())
    }
}

/// Maps a failed download to the error shown for the transfer code.
pub(crate) fn classify_delivery_failure(
    err: &DeliveryError,
    connectivity: &dyn ConnectivityProbe,
) -> ErrorKind {
    match err {
        DeliveryError::TimeDeviation => ErrorKind::InvalidTime,
        DeliveryError::Timeout | DeliveryError::Network(_) => {
            if connectivity.is_connected() {
                ErrorKind::NetworkFailure
            } else {
                ErrorKind::Offline
            }
        }
    }
}
