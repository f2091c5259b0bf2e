//! Common test utilities shared across integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use certwallet_core::services::{
    Clock, ConnectivityProbe, DecodeError, DecodeService, DeliveredCertificate, DeliveryError,
    DeliveryService, KeyPair, KeyService, ServiceError, VerificationService,
};
use certwallet_core::storage::{
    DeviceKeystore, ItemStore, MemoryItemStore, StorageError, StorageResult,
};
use certwallet_core::{
    ConversionState, CoordinatorConfig, CoordinatorServices, DecodedHolder, ItemMatcher,
    ItemSnapshot, RawItem, StatefulItem, TimeRange, VerificationState, WalletCoordinator,
};
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    Key, XChaCha20Poly1305, XNonce,
};
use futures::stream::{self, BoxStream, StreamExt};
use rand::{rngs::OsRng, RngCore};
use tokio::sync::{watch, Notify};
use uuid::Uuid;

pub const NOW: u64 = 1_700_000_000;

/// Payload of a full certificate understood by [`FakeDecoder`].
pub fn certificate_payload(id: &str, expires_at: u64) -> String {
    format!("cert:{id}:{expires_at}")
}

/// Payload of a light certificate understood by [`FakeDecoder`].
pub fn light_payload(id: &str, expires_at: u64) -> String {
    format!("light:{id}:{expires_at}")
}

/// Holder that [`FakeDecoder`] produces for a full certificate.
pub fn holder(id: &str, expires_at: u64) -> DecodedHolder {
    holder_of_kind("cert", id, expires_at)
}

fn holder_of_kind(kind: &str, id: &str, expires_at: u64) -> DecodedHolder {
    DecodedHolder {
        certificate_identifier: format!("{kind}-{id}"),
        family_name: "Muster".to_string(),
        given_name: id.to_string(),
        date_of_birth: "1990-01-01".to_string(),
        issued_at: Some(NOW - 1_000),
        expires_at: Some(expires_at),
    }
}

pub fn success() -> VerificationState {
    VerificationState::Success {
        forced: false,
        validity: TimeRange {
            valid_from: NOW,
            valid_until: NOW + 3_600,
        },
    }
}

/// Decodes `<kind>:<id>:<expiry>` payloads where kind is `cert` or `light`.
pub struct FakeDecoder;

impl DecodeService for FakeDecoder {
    fn decode(&self, payload: &str) -> Result<DecodedHolder, DecodeError> {
        let mut parts = payload.splitn(3, ':');
        let (Some(kind), Some(id), Some(expiry)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(DecodeError::Malformed(payload.to_string()));
        };
        if kind != "cert" && kind != "light" {
            return Err(DecodeError::Unsupported(kind.to_string()));
        }
        let expires_at = expiry
            .parse()
            .map_err(|_| DecodeError::Malformed(payload.to_string()))?;
        Ok(holder_of_kind(kind, id, expires_at))
    }
}

/// What the verifier emits for one holder.
#[derive(Debug, Clone)]
pub enum Script {
    /// Emit the states, then end the stream.
    Emit(Vec<VerificationState>),
    /// Emit the states, then stay open forever.
    HoldOpen(Vec<VerificationState>),
}

/// Verifier replaying scripted state sequences, keyed by certificate identifier.
pub struct ScriptedVerifier {
    scripts: Mutex<HashMap<String, Script>>,
    default_script: Mutex<Script>,
    calls: Mutex<Vec<(String, bool)>>,
    open_streams: Arc<AtomicUsize>,
    refresh_fails: AtomicBool,
    refresh_calls: AtomicUsize,
}

impl ScriptedVerifier {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            default_script: Mutex::new(Script::Emit(vec![VerificationState::Loading, success()])),
            calls: Mutex::new(Vec::new()),
            open_streams: Arc::new(AtomicUsize::new(0)),
            refresh_fails: AtomicBool::new(false),
            refresh_calls: AtomicUsize::new(0),
        }
    }

    pub fn script(&self, certificate_identifier: &str, script: Script) {
        self.scripts
            .lock()
            .expect("scripts")
            .insert(certificate_identifier.to_string(), script);
    }

    pub fn set_default(&self, script: Script) {
        *self.default_script.lock().expect("default script") = script;
    }

    pub fn fail_refresh(&self, fail: bool) {
        self.refresh_fails.store(fail, Ordering::SeqCst);
    }

    /// Certificate identifier and ignore-trust-list flag of each `verify` call.
    pub fn calls(&self) -> Vec<(String, bool)> {
        self.calls.lock().expect("calls").clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("calls").len()
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    /// Number of verification streams not yet dropped.
    pub fn open_streams(&self) -> usize {
        self.open_streams.load(Ordering::SeqCst)
    }
}

struct StreamGuard(Arc<AtomicUsize>);

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl VerificationService for ScriptedVerifier {
    fn verify(
        &self,
        holder: &DecodedHolder,
        ignore_local_trust_list: bool,
    ) -> BoxStream<'static, VerificationState> {
        let id = holder.certificate_identifier.clone();
        self.calls
            .lock()
            .expect("calls")
            .push((id.clone(), ignore_local_trust_list));
        let script = self
            .scripts
            .lock()
            .expect("scripts")
            .get(&id)
            .cloned()
            .unwrap_or_else(|| self.default_script.lock().expect("default script").clone());

        self.open_streams.fetch_add(1, Ordering::SeqCst);
        let guard = StreamGuard(Arc::clone(&self.open_streams));
        let states = match script {
            Script::Emit(states) => stream::iter(states).boxed(),
            Script::HoldOpen(states) => stream::iter(states).chain(stream::pending()).boxed(),
        };
        states
            .map(move |state| {
                let _open = &guard;
                state
            })
            .boxed()
    }

    async fn refresh_trust_data(&self) -> Result<(), ServiceError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if self.refresh_fails.load(Ordering::SeqCst) {
            return Err(ServiceError::Unreachable("trust list".to_string()));
        }
        Ok(())
    }
}

/// Delivery backend returning a configurable result.
pub struct FakeDelivery {
    response: Mutex<Result<Vec<DeliveredCertificate>, DeliveryError>>,
    hold: AtomicBool,
    complete_gate: Mutex<Option<Arc<Notify>>>,
    complete_fails: AtomicBool,
    download_calls: AtomicUsize,
    complete_calls: AtomicUsize,
}

impl FakeDelivery {
    pub fn new() -> Self {
        Self {
            response: Mutex::new(Ok(Vec::new())),
            hold: AtomicBool::new(false),
            complete_gate: Mutex::new(None),
            complete_fails: AtomicBool::new(false),
            download_calls: AtomicUsize::new(0),
            complete_calls: AtomicUsize::new(0),
        }
    }

    pub fn respond(&self, response: Result<Vec<DeliveredCertificate>, DeliveryError>) {
        *self.response.lock().expect("response") = response;
    }

    /// Makes downloads wait forever.
    pub fn hold(&self, hold: bool) {
        self.hold.store(hold, Ordering::SeqCst);
    }

    /// Makes `complete` wait until the returned handle is notified.
    pub fn hold_complete(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.complete_gate.lock().expect("complete gate") = Some(Arc::clone(&gate));
        gate
    }

    pub fn fail_complete(&self, fail: bool) {
        self.complete_fails.store(fail, Ordering::SeqCst);
    }

    pub fn download_calls(&self) -> usize {
        self.download_calls.load(Ordering::SeqCst)
    }

    pub fn complete_calls(&self) -> usize {
        self.complete_calls.load(Ordering::SeqCst)
    }
}

pub fn delivered(payload: &str) -> DeliveredCertificate {
    DeliveredCertificate {
        qr_payload: payload.to_string(),
        pdf_payload: None,
    }
}

#[async_trait]
impl DeliveryService for FakeDelivery {
    async fn download(
        &self,
        _code: &str,
        _key_pair: &KeyPair,
    ) -> Result<Vec<DeliveredCertificate>, DeliveryError> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        if self.hold.load(Ordering::SeqCst) {
            futures::future::pending::<()>().await;
        }
        self.response.lock().expect("response").clone()
    }

    async fn complete(&self, _code: &str, _key_pair: &KeyPair) -> Result<(), DeliveryError> {
        self.complete_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.complete_gate.lock().expect("complete gate").clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.complete_fails.load(Ordering::SeqCst) {
            return Err(DeliveryError::Network("503".to_string()));
        }
        Ok(())
    }
}

/// Key service holding key pairs in memory.
pub struct FakeKeys {
    pairs: Mutex<HashMap<String, KeyPair>>,
    generate_fails: AtomicBool,
}

impl FakeKeys {
    pub fn new() -> Self {
        Self {
            pairs: Mutex::new(HashMap::new()),
            generate_fails: AtomicBool::new(false),
        }
    }

    pub fn insert(&self, code: &str) {
        self.pairs
            .lock()
            .expect("pairs")
            .insert(code.to_string(), key_pair(code));
    }

    pub fn contains(&self, code: &str) -> bool {
        self.pairs.lock().expect("pairs").contains_key(code)
    }

    pub fn fail_generate(&self, fail: bool) {
        self.generate_fails.store(fail, Ordering::SeqCst);
    }
}

fn key_pair(code: &str) -> KeyPair {
    KeyPair {
        alias: format!("transfer-{code}"),
        public_key: code.as_bytes().to_vec(),
    }
}

#[async_trait]
impl KeyService for FakeKeys {
    async fn generate_key_pair(&self, code: &str) -> Result<KeyPair, ServiceError> {
        if self.generate_fails.load(Ordering::SeqCst) {
            return Err(ServiceError::Failed("keystore locked".to_string()));
        }
        self.insert(code);
        Ok(key_pair(code))
    }

    async fn load_key_pair(&self, code: &str) -> Option<KeyPair> {
        self.pairs.lock().expect("pairs").get(code).cloned()
    }

    async fn delete_key_entry(&self, code: &str) -> Result<(), ServiceError> {
        self.pairs.lock().expect("pairs").remove(code);
        Ok(())
    }
}

pub struct FakeConnectivity(AtomicBool);

impl FakeConnectivity {
    pub fn new(connected: bool) -> Self {
        Self(AtomicBool::new(connected))
    }

    pub fn set(&self, connected: bool) {
        self.0.store(connected, Ordering::SeqCst);
    }
}

impl ConnectivityProbe for FakeConnectivity {
    fn is_connected(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct FixedClock(AtomicU64);

impl FixedClock {
    pub fn new(now: u64) -> Self {
        Self(AtomicU64::new(now))
    }
}

impl Clock for FixedClock {
    fn now(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Item store whose writes can be switched to fail.
pub struct FlakyItemStore {
    inner: MemoryItemStore,
    fail_writes: AtomicBool,
}

impl FlakyItemStore {
    pub fn with_items(items: Vec<RawItem>) -> Self {
        Self {
            inner: MemoryItemStore::with_items(items),
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check(&self) -> StorageResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::BlobStore("disk full".to_string()));
        }
        Ok(())
    }
}

impl ItemStore for FlakyItemStore {
    fn list(&self) -> StorageResult<Vec<RawItem>> {
        self.inner.list()
    }

    fn insert_front(&self, item: RawItem) -> StorageResult<bool> {
        self.check()?;
        self.inner.insert_front(item)
    }

    fn delete(&self, matcher: &ItemMatcher) -> StorageResult<bool> {
        self.check()?;
        self.inner.delete(matcher)
    }

    fn replace(&self, matcher: &ItemMatcher, item: RawItem) -> StorageResult<bool> {
        self.check()?;
        self.inner.replace(matcher, item)
    }

    fn reorder(&self, from: usize, to: usize) -> StorageResult<()> {
        self.check()?;
        self.inner.reorder(from, to)
    }
}

/// Item store that can park the next `list` call after taking its snapshot.
pub struct GatedItemStore {
    inner: MemoryItemStore,
    gate: Mutex<Option<(mpsc::Sender<()>, mpsc::Receiver<()>)>>,
}

/// Test side of a parked `list` call.
pub struct ListGate {
    listed: mpsc::Receiver<()>,
    release: mpsc::Sender<()>,
}

impl ListGate {
    /// Blocks until the parked call has read the store.
    pub fn wait_listed(&self) {
        self.listed
            .recv_timeout(Duration::from_secs(5))
            .expect("list was not called");
    }

    pub fn release(&self) {
        self.release.send(()).expect("list call gone");
    }
}

impl GatedItemStore {
    pub fn with_items(items: Vec<RawItem>) -> Self {
        Self {
            inner: MemoryItemStore::with_items(items),
            gate: Mutex::new(None),
        }
    }

    pub fn hold_next_list(&self) -> ListGate {
        let (listed_tx, listed) = mpsc::channel();
        let (release, release_rx) = mpsc::channel();
        *self.gate.lock().expect("gate") = Some((listed_tx, release_rx));
        ListGate { listed, release }
    }
}

impl ItemStore for GatedItemStore {
    fn list(&self) -> StorageResult<Vec<RawItem>> {
        let snapshot = self.inner.list();
        let gate = self.gate.lock().expect("gate").take();
        if let Some((listed, release)) = gate {
            listed.send(()).expect("gate dropped");
            release
                .recv_timeout(Duration::from_secs(5))
                .expect("list was not released");
        }
        snapshot
    }

    fn insert_front(&self, item: RawItem) -> StorageResult<bool> {
        self.inner.insert_front(item)
    }

    fn delete(&self, matcher: &ItemMatcher) -> StorageResult<bool> {
        self.inner.delete(matcher)
    }

    fn replace(&self, matcher: &ItemMatcher, item: RawItem) -> StorageResult<bool> {
        self.inner.replace(matcher, item)
    }

    fn reorder(&self, from: usize, to: usize) -> StorageResult<()> {
        self.inner.reorder(from, to)
    }
}

/// Keystore sealing with a key derived from a one-byte seed, so a restarted
/// store can open what an earlier one sealed.
pub struct SeededKeystore {
    cipher: XChaCha20Poly1305,
}

impl SeededKeystore {
    pub fn new(seed: u8) -> Self {
        Self {
            cipher: XChaCha20Poly1305::new(Key::from_slice(&[seed; 32])),
        }
    }
}

impl DeviceKeystore for SeededKeystore {
    fn seal(
        &self,
        associated_data: Vec<u8>,
        plaintext: Vec<u8>,
    ) -> Result<Vec<u8>, StorageError> {
        let mut sealed = vec![0u8; 24];
        OsRng.fill_bytes(&mut sealed);
        let ciphertext = self
            .cipher
            .encrypt(
                XNonce::from_slice(&sealed),
                Payload {
                    msg: &plaintext,
                    aad: &associated_data,
                },
            )
            .map_err(|err| StorageError::Keystore(err.to_string()))?;
        sealed.extend(ciphertext);
        Ok(sealed)
    }

    fn open_sealed(
        &self,
        associated_data: Vec<u8>,
        ciphertext: Vec<u8>,
    ) -> Result<Vec<u8>, StorageError> {
        if ciphertext.len() < 24 {
            return Err(StorageError::Keystore("sealed blob too short".to_string()));
        }
        let (nonce, payload) = ciphertext.split_at(24);
        self.cipher
            .decrypt(
                XNonce::from_slice(nonce),
                Payload {
                    msg: payload,
                    aad: &associated_data,
                },
            )
            .map_err(|err| StorageError::Keystore(err.to_string()))
    }
}

/// Fresh directory path under the system temp dir.
pub fn temp_root() -> PathBuf {
    std::env::temp_dir().join(format!("certwallet-test-{}", Uuid::new_v4()))
}

/// A coordinator wired to fakes for every collaborator.
pub struct Harness {
    pub coordinator: WalletCoordinator,
    pub store: Arc<dyn ItemStore>,
    pub verifier: Arc<ScriptedVerifier>,
    pub delivery: Arc<FakeDelivery>,
    pub keys: Arc<FakeKeys>,
    pub connectivity: Arc<FakeConnectivity>,
    pub clock: Arc<FixedClock>,
}

impl Harness {
    pub fn new(items: Vec<RawItem>) -> Self {
        Self::with_config(items, CoordinatorConfig::default())
    }

    pub fn with_config(items: Vec<RawItem>, config: CoordinatorConfig) -> Self {
        Self::with_store(Arc::new(MemoryItemStore::with_items(items)), config)
    }

    pub fn with_store(store: Arc<dyn ItemStore>, config: CoordinatorConfig) -> Self {
        let verifier = Arc::new(ScriptedVerifier::new());
        let delivery = Arc::new(FakeDelivery::new());
        let keys = Arc::new(FakeKeys::new());
        let connectivity = Arc::new(FakeConnectivity::new(true));
        let clock = Arc::new(FixedClock::new(NOW));

        let services = CoordinatorServices {
            store: Arc::clone(&store),
            decoder: Arc::new(FakeDecoder),
            verifier: verifier.clone(),
            delivery: delivery.clone(),
            keys: keys.clone(),
            connectivity: connectivity.clone(),
            clock: clock.clone(),
        };
        let coordinator = WalletCoordinator::new(services, config).expect("coordinator");

        Self {
            coordinator,
            store,
            verifier,
            delivery,
            keys,
            connectivity,
            clock,
        }
    }

    pub fn stored(&self) -> Vec<RawItem> {
        self.store.list().expect("list")
    }
}

/// Waits until the published list satisfies `predicate`.
pub async fn wait_for(
    receiver: &mut watch::Receiver<ItemSnapshot>,
    predicate: impl FnMut(&ItemSnapshot) -> bool,
) -> ItemSnapshot {
    let items = tokio::time::timeout(Duration::from_secs(5), receiver.wait_for(predicate))
        .await
        .expect("timed out waiting for the item list")
        .expect("coordinator dropped");
    Arc::clone(&items)
}

/// Polls `condition` until it holds.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

/// Verification state of the entry with payload `qr_payload`.
pub fn verification_of(items: &[StatefulItem], qr_payload: &str) -> Option<VerificationState> {
    items
        .iter()
        .filter_map(StatefulItem::as_certificate)
        .find(|entry| entry.qr_payload == qr_payload)
        .map(|entry| entry.verification.clone())
}

/// Conversion state of the entry for `code`.
pub fn conversion_of(items: &[StatefulItem], code: &str) -> Option<ConversionState> {
    items
        .iter()
        .filter_map(StatefulItem::as_conversion)
        .find(|entry| entry.transfer_code.code == code)
        .map(|entry| entry.conversion.clone())
}

/// True once every entry left `Loading`.
pub fn all_settled(items: &ItemSnapshot) -> bool {
    items.iter().all(|item| match item {
        StatefulItem::VerifiedCertificate(entry) => entry.verification.is_terminal(),
        StatefulItem::TransferConversion(entry) => entry.conversion.is_terminal(),
    })
}
