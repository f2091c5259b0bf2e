//! `certwallet-core` coordinates the certificates and transfer codes held in
//! a health certificate wallet.
//!
//! The [`WalletCoordinator`] reconciles the encrypted [`storage`] with an
//! observable list of [`StatefulItem`]s and runs verification and conversion
//! tasks against the injected [`services`].

#![deny(clippy::all, clippy::pedantic, clippy::nursery)]

mod coordinator;
pub use coordinator::{
    CoordinatorConfig, CoordinatorServices, ItemSnapshot, WalletCoordinator,
};

mod error;
pub use error::*;

pub mod item;
pub use item::*;

/// Forwarding of log records to the host application.
pub mod logger;

pub mod services;

pub mod storage;

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!("certwallet_core");
