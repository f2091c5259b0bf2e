//! Certificate verification tasks.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use super::merge::merge_verification;
use super::registry::TaskRegistry;
use super::Shared;
use crate::item::{DecodedHolder, ItemKey, TimeRange, VerificationPhase, VerificationState};

/// Parameters of one verification run.
#[derive(Debug, Clone)]
pub(crate) struct VerificationRequest {
    pub(crate) qr_payload: String,
    pub(crate) holder: DecodedHolder,
    pub(crate) delay: Option<Duration>,
    pub(crate) force: bool,
}

impl VerificationRequest {
    /// Plain verification started by a reconciliation pass.
    pub(crate) fn on_load(qr_payload: &str, holder: &DecodedHolder) -> Self {
        Self {
            qr_payload: qr_payload.to_string(),
            holder: holder.clone(),
            delay: None,
            force: false,
        }
    }
}

impl Shared {
    /// Starts verifying a certificate, replacing any task running for it.
    pub(crate) fn spawn_verification(
        self: &Arc<Self>,
        registry: &mut TaskRegistry,
        request: VerificationRequest,
    ) {
        let key = ItemKey::certificate(&request.qr_payload);
        let (generation, token) = registry.reserve(key.clone());
        log::debug!("starting verification for {key} (force: {})", request.force);

        let task = VerificationTask {
            shared: Arc::clone(self),
            key: key.clone(),
            generation,
            token,
            request,
        };
        let handle = self.runtime.spawn(task.run());
        registry.attach(&key, generation, handle);
    }
}

struct VerificationTask {
    shared: Arc<Shared>,
    key: ItemKey,
    generation: u64,
    token: CancellationToken,
    request: VerificationRequest,
}

impl VerificationTask {
    async fn run(self) {
        let mut ignore_local_trust_list = false;

        if self.request.force {
            let now = self.shared.services.clock.now();
            let optimistic = VerificationState::Success {
                forced: false,
                validity: TimeRange::starting_at(now, self.shared.config.forced_validity),
            };
            if !self.publish(optimistic) {
                return;
            }

            let refreshed = tokio::select! {
                biased;
                () = self.token.cancelled() => return,
                result = self.shared.services.verifier.refresh_trust_data() => result,
            };
            if let Err(err) = refreshed {
                log::warn!("trust data refresh failed, verifying without local trust list: {err}");
                ignore_local_trust_list = true;
            }
        } else if let Some(delay) = self.request.delay.filter(|delay| !delay.is_zero()) {
            tokio::select! {
                biased;
                () = self.token.cancelled() => return,
                () = tokio::time::sleep(delay) => {}
            }
        }

        let mut states = self
            .shared
            .services
            .verifier
            .verify(&self.request.holder, ignore_local_trust_list);

        loop {
            let next = tokio::select! {
                biased;
                () = self.token.cancelled() => {
                    log::debug!("verification for {} cancelled", self.key);
                    return;
                }
                next = states.next() => next,
            };
            let Some(state) = next else {
                log::debug!("verification stream for {} ended early", self.key);
                self.shared.finish(&self.key, self.generation);
                return;
            };

            if state.is_terminal() {
                self.publish_terminal(state);
                return;
            }
            if !self.publish(state) {
                return;
            }
        }
    }

    fn publish(&self, state: VerificationState) -> bool {
        let request = &self.request;
        self.shared.publish(&self.key, self.generation, |items| {
            merge_verification(items, &request.qr_payload, &request.holder, state)
        })
    }

    fn publish_terminal(&self, state: VerificationState) {
        log::debug!(
            "verification for {} finished: {}",
            self.key,
            VerificationPhase::from(&state)
        );
        let request = &self.request;
        self.shared
            .publish_terminal(&self.key, self.generation, |items| {
                merge_verification(items, &request.qr_payload, &request.holder, state)
            });
    }
}
