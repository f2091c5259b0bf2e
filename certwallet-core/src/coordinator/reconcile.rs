//! Rebuilding the observable list from the stored one.

use std::collections::HashSet;

use crate::item::{
    CertificateRecord, ConversionState, ItemKey, ItemMatcher, LiveItem, RawItem, StatefulItem,
    TransferConversion, VerificationState, VerifiedCertificate,
};
use crate::services::DecodeService;
use crate::storage::ItemStore;

/// Which items get a task after a reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Dispatch {
    /// Every item without a live task.
    All,
    /// Items that had no entry in the previous list.
    Fresh,
    /// Fresh items, and the listed ones that have no final state yet.
    FreshAnd(HashSet<ItemKey>),
    /// No item.
    None,
}

/// Outcome of [`reconcile_items`].
#[derive(Debug)]
pub(crate) struct Reconciliation {
    pub(crate) items: Vec<StatefulItem>,
    /// Items that had no previous entry and start out in `Loading`.
    pub(crate) fresh: HashSet<ItemKey>,
}

/// Decodes every stored record into its live form.
///
/// A light certificate is used only if it decodes and expires after
/// `light_threshold`; otherwise the light fields are dropped from the store
/// and the full payload is decoded instead.
pub(crate) fn resolve_items(
    raw: &[RawItem],
    decoder: &dyn DecodeService,
    store: &dyn ItemStore,
    light_threshold: u64,
) -> Vec<LiveItem> {
    raw.iter()
        .map(|item| match item {
            RawItem::Certificate(record) => {
                resolve_certificate(record, decoder, store, light_threshold)
            }
            RawItem::TransferCode(record) => LiveItem::transfer(record.clone()),
        })
        .collect()
}

fn resolve_certificate(
    record: &CertificateRecord,
    decoder: &dyn DecodeService,
    store: &dyn ItemStore,
    light_threshold: u64,
) -> LiveItem {
    if let Some(light_payload) = &record.light_payload {
        match decoder.decode(light_payload) {
            Ok(holder) if holder.expires_after(light_threshold) => {
                return LiveItem::certificate(record, record.light_qr_image.clone(), Some(holder));
            }
            Ok(_) => log::debug!("light certificate expired, falling back to full payload"),
            Err(err) => log::debug!("light certificate did not decode: {err}"),
        }
        let matcher = ItemMatcher::certificate(&record.qr_payload);
        if let Err(err) = store.replace(&matcher, record.without_light().into()) {
            log::warn!("failed to discard light certificate: {err}");
        }
    }

    let holder = match decoder.decode(&record.qr_payload) {
        Ok(holder) => Some(holder),
        Err(err) => {
            log::debug!("certificate did not decode: {err}");
            None
        }
    };
    LiveItem::certificate(record, None, holder)
}

/// Maps live items onto the previous list.
///
/// The result follows the order of `live`. Entries matching a previous entry
/// keep its state verbatim; the others start in `Loading`, except certificates
/// that did not decode, which get a permanent decode error.
pub(crate) fn reconcile_items(live: &[LiveItem], previous: &[StatefulItem]) -> Reconciliation {
    let mut fresh = HashSet::new();
    let items = live
        .iter()
        .map(|item| match item {
            LiveItem::Certificate(certificate) => {
                let verification = match &certificate.holder {
                    None => VerificationState::decode_error(),
                    Some(holder) => previous
                        .iter()
                        .find(|entry| entry.is_holder(holder))
                        .and_then(StatefulItem::as_certificate)
                        .map_or_else(
                            || {
                                fresh.insert(certificate.identity.clone());
                                VerificationState::Loading
                            },
                            |entry| entry.verification.clone(),
                        ),
                };
                StatefulItem::VerifiedCertificate(VerifiedCertificate {
                    qr_payload: certificate.qr_payload.clone(),
                    light_qr_image: certificate.light_qr_image.clone(),
                    holder: certificate.holder.clone(),
                    verification,
                })
            }
            LiveItem::Transfer(transfer) => {
                let conversion = previous
                    .iter()
                    .find(|entry| entry.is_transfer_code(&transfer.transfer_code.code))
                    .and_then(StatefulItem::as_conversion)
                    .map_or_else(
                        || {
                            fresh.insert(transfer.identity.clone());
                            ConversionState::Loading
                        },
                        |entry| entry.conversion.clone(),
                    );
                StatefulItem::TransferConversion(TransferConversion {
                    transfer_code: transfer.transfer_code.clone(),
                    conversion,
                })
            }
        })
        .collect();
    Reconciliation { items, fresh }
}
