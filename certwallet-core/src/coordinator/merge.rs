//! Pure functions folding one task result into the observable list.
//!
//! Both merges are total: the matching entry is updated in place, otherwise a
//! new entry is appended. Unaffected entries keep their relative order.

use crate::item::{
    ConversionState, DecodedHolder, StatefulItem, TransferCodeRecord, TransferConversion,
    VerificationState, VerifiedCertificate,
};

/// Sets the verification state of the certificate entry for `holder`.
pub(crate) fn merge_verification(
    items: &[StatefulItem],
    qr_payload: &str,
    holder: &DecodedHolder,
    state: VerificationState,
) -> Vec<StatefulItem> {
    let mut merged = items.to_vec();
    match merged.iter_mut().find(|item| item.is_holder(holder)) {
        Some(StatefulItem::VerifiedCertificate(entry)) => entry.verification = state,
        _ => merged.push(StatefulItem::VerifiedCertificate(VerifiedCertificate {
            qr_payload: qr_payload.to_string(),
            light_qr_image: None,
            holder: Some(holder.clone()),
            verification: state,
        })),
    }
    merged
}

/// Sets the conversion state of the entry for `transfer_code`.
pub(crate) fn merge_conversion(
    items: &[StatefulItem],
    transfer_code: &TransferCodeRecord,
    state: ConversionState,
) -> Vec<StatefulItem> {
    let mut merged = items.to_vec();
    match merged
        .iter_mut()
        .find(|item| item.is_transfer_code(&transfer_code.code))
    {
        Some(StatefulItem::TransferConversion(entry)) => entry.conversion = state,
        _ => merged.push(StatefulItem::TransferConversion(TransferConversion {
            transfer_code: transfer_code.clone(),
            conversion: state,
        })),
    }
    merged
}
