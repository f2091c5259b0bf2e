//! Wallet item model.
//!
//! Three layers describe the same item:
//!
//! 1. [`RawItem`]: the persisted, ordered record.
//! 2. [`LiveItem`]: the record after decoding, rebuilt on every reconciliation pass.
//! 3. [`StatefulItem`]: the observable entry carrying the latest task outcome.

mod holder;
mod key;
mod live;
mod raw;
mod state;
mod stateful;

pub use holder::DecodedHolder;
pub use key::ItemKey;
pub use live::{CertificateItem, LiveItem, TransferItem};
pub use raw::{CertificateRecord, ItemMatcher, RawItem, TransferCodeRecord};
pub use state::{
    ConversionPhase, ConversionState, ErrorKind, TimeRange, VerificationPhase,
    VerificationState,
};
pub use stateful::{StatefulItem, TransferConversion, VerifiedCertificate};
