use super::{ConversionState, DecodedHolder, TransferCodeRecord, VerificationState};

/// A certificate together with its verification progress.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct VerifiedCertificate {
    /// The full certificate payload.
    pub qr_payload: String,
    /// QR image of the light certificate when it is the one in use.
    pub light_qr_image: Option<String>,
    /// Decoded holder, `None` when decoding failed.
    pub holder: Option<DecodedHolder>,
    /// Current verification state.
    pub verification: VerificationState,
}

/// A transfer code together with its conversion progress.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct TransferConversion {
    /// The stored transfer code.
    pub transfer_code: TransferCodeRecord,
    /// Current conversion state.
    pub conversion: ConversionState,
}

/// Entry of the observable wallet list.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum StatefulItem {
    /// See [`VerifiedCertificate`].
    VerifiedCertificate(VerifiedCertificate),
    /// See [`TransferConversion`].
    TransferConversion(TransferConversion),
}

impl StatefulItem {
    /// Returns `true` if this is the certificate entry for `holder`.
    #[must_use]
    pub fn is_holder(&self, holder: &DecodedHolder) -> bool {
        matches!(self, Self::VerifiedCertificate(entry) if entry.holder.as_ref() == Some(holder))
    }

    /// Returns `true` if this is the conversion entry for `code`.
    #[must_use]
    pub fn is_transfer_code(&self, code: &str) -> bool {
        matches!(self, Self::TransferConversion(entry) if entry.transfer_code.code == code)
    }

    /// Returns `true` once the entry holds a final state.
    #[must_use]
    pub const fn is_settled(&self) -> bool {
        match self {
            Self::VerifiedCertificate(entry) => entry.verification.is_terminal(),
            Self::TransferConversion(entry) => entry.conversion.is_terminal(),
        }
    }

    /// Certificate entry view, if this is one.
    #[must_use]
    pub const fn as_certificate(&self) -> Option<&VerifiedCertificate> {
        match self {
            Self::VerifiedCertificate(entry) => Some(entry),
            Self::TransferConversion(_) => None,
        }
    }

    /// Conversion entry view, if this is one.
    #[must_use]
    pub const fn as_conversion(&self) -> Option<&TransferConversion> {
        match self {
            Self::TransferConversion(entry) => Some(entry),
            Self::VerifiedCertificate(_) => None,
        }
    }
}
