//! The off-chain per-slot timer loop. Owns the only wall-clock reads in
//! this crate; everything it computes is handed to `BeaconContract::call` as plain calldata, so the
//! contract itself stays a pure function of `(store, input, wall_time)`.
//!
//! Grounded on `threshold_bls::state_machine::keygen`/`sign`'s round-driving loops
//! (`proceed`-on-timeout state machines), generalized from "drive one protocol run to completion"
//! to "drive a recurring per-epoch cycle for as long as the process is alive".

pub mod crypto_helper;

use std::sync::Arc;

use curv::BigInt;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::contract::{BeaconContract, BeaconEnv, ContractError};
use crate::epoch_clock::{EpochClock, SlotWindow};
use crate::proposer_group::ProposerGroupSource;
use crate::store::BeaconStore;
use crate::types::{Address, DkgBundle, EpochId, PointG1, ProposerId, SigShare};

/// Builds this validator's DKG bundle for an epoch, given the epoch's proposer group and the
/// polynomial degree the contract will check against. Implemented by `crypto_helper::LocalCryptoHelper`.
pub trait DkgBundleBuilder: Send + Sync {
    fn build(&self, epoch: EpochId, group: &[PointG1], degree: usize) -> DkgBundle;
}

/// Builds this validator's signature share for an epoch, decrypting its own component out of every
/// bundle it has already seen persisted. Implemented by `crypto_helper::LocalCryptoHelper`.
pub trait SigShareBuilder: Send + Sync {
    fn build(&self, epoch: EpochId, m: &BigInt, bundles: &[DkgBundle]) -> SigShare;
}

/// Whether this validator should act for a given slot — a seam for whatever leader-election scheme
/// the surrounding chain runs, queried once per tick.
#[async_trait::async_trait]
pub trait SlotLeaderGate: Send + Sync {
    async fn should_act(&self, epoch: EpochId, proposer: ProposerId) -> bool;
}

/// Submits the three precompile calls as transactions. Production code wraps a real mempool client;
/// tests and the demo wrap a plain in-process `BeaconContract::call`.
#[async_trait::async_trait]
pub trait TxSubmitter: Send + Sync {
    async fn submit_dkg(&self, bundle: &DkgBundle);
    async fn submit_sigshare(&self, share: &SigShare);
    async fn submit_gen_r(&self, epoch: EpochId, r: &BigInt);
}

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("epoch clock config is inconsistent: windows overlap or exceed the epoch length")]
    InconsistentClock,
    #[error("contract call failed: {0}")]
    Contract(#[from] ContractError),
}

/// One validator's per-slot loop. Ticks once per slot boundary, submitting at most one
/// of `dkg`/`sigshare`/`genR` per tick depending on the active window, and is idempotent across
/// repeated ticks within the same window (duplicate submissions are rejected harmlessly by the
/// contract's own state checks).
pub struct BeaconDriver<E> {
    pub address: Address,
    pub clock: EpochClock,
    pub store: Arc<tokio::sync::Mutex<Box<dyn BeaconStore>>>,
    pub proposer_groups: Arc<dyn ProposerGroupSource>,
    pub env: Arc<E>,
    pub gate: Arc<dyn SlotLeaderGate>,
    pub submitter: Arc<dyn TxSubmitter>,
    pub dkg_builder: Arc<dyn DkgBundleBuilder>,
    pub sig_builder: Arc<dyn SigShareBuilder>,
    pub proposer_index: ProposerId,
    pub polynomial_degree: usize,
}

impl<E: BeaconEnv + 'static> BeaconDriver<E> {
    /// Runs until `shutdown` is signalled, sleeping to the next slot boundary between ticks
    /// (the same `proceed`-on-timeout pattern as above, here driven by `tokio::time::sleep_until`
    /// against a real wall clock rather than a round-counter).
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<(), DriverError> {
        if !self.clock.config().is_consistent() {
            return Err(DriverError::InconsistentClock);
        }

        loop {
            let now = wall_now_secs();
            let (epoch, slot) = self.clock.now(now);
            let next_boundary = self.clock.slot_boundary(epoch, slot + 1);
            let sleep_secs = next_boundary.saturating_sub(now).max(1);
            let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(sleep_secs);

            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {
                    self.tick().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("beacon driver shutting down");
                        return Ok(());
                    }
                }
            }
        }
    }

    async fn tick(&self) {
        let now = wall_now_secs();
        let (epoch, slot) = self.clock.now(now);
        if !self.gate.should_act(epoch, self.proposer_index).await {
            return;
        }

        match self.clock.window(slot) {
            SlotWindow::Dkg => self.maybe_submit_dkg(epoch).await,
            SlotWindow::SigShare => self.maybe_submit_sigshare(epoch).await,
            SlotWindow::Finalize => self.maybe_finalize(epoch).await,
        }
    }

    async fn maybe_submit_dkg(&self, epoch: EpochId) {
        let Some(group) = self.proposer_groups.group(epoch) else {
            warn!(epoch = epoch.0, "no proposer group registered yet, skipping dkg");
            return;
        };
        {
            let store = self.store.lock().await;
            if store
                .get(self.address, crate::contract::dkg_key(epoch, self.proposer_index))
                .is_some()
            {
                return;
            }
        }
        let bundle = self.dkg_builder.build(epoch, &group, self.polynomial_degree);
        self.submitter.submit_dkg(&bundle).await;
    }

    async fn maybe_submit_sigshare(&self, epoch: EpochId) {
        let Some(group) = self.proposer_groups.group(epoch) else {
            return;
        };
        let store = self.store.lock().await;
        if store
            .get(self.address, crate::contract::sig_key(epoch, self.proposer_index))
            .is_some()
        {
            return;
        }
        let Some(m) = self.env.message_digest(&*store, self.address, epoch) else {
            warn!(epoch = epoch.0, "no message digest available yet, skipping sigshare");
            return;
        };

        let mut bundles = Vec::with_capacity(group.len());
        for j in 0..group.len() {
            if let Some(bytes) = store.get(self.address, crate::contract::dkg_key(epoch, ProposerId(j as u32))) {
                if let Ok(bundle) = crate::codec::decode_dkg_bundle(&bytes) {
                    bundles.push(bundle);
                }
            }
        }
        drop(store);
        if bundles.is_empty() {
            return;
        }

        let share = self.sig_builder.build(epoch, &m, &bundles);
        self.submitter.submit_sigshare(&share).await;
    }

    /// Aggregates persisted sigshares and submits `genR`, if this validator is the epoch's
    /// designated aggregator (`SlotLeaderGate`) and at least `polynomial_degree + 1` shares are
    /// already persisted. Leader-election itself is left entirely to the caller's `SlotLeaderGate`,
    /// since which validator aggregates depends on the surrounding chain's own scheme.
    async fn maybe_finalize(&self, epoch: EpochId) {
        let Some(group) = self.proposer_groups.group(epoch) else {
            return;
        };
        let store = self.store.lock().await;
        if store.get(self.address, crate::contract::randomness_key(epoch)).is_some() {
            return;
        }

        let threshold = self.polynomial_degree + 1;
        let mut shares = Vec::with_capacity(group.len());
        for j in 0..group.len() {
            if let Some(bytes) = store.get(self.address, crate::contract::sig_key(epoch, ProposerId(j as u32))) {
                if let Ok(share) = crate::codec::decode_sig_share(&bytes) {
                    shares.push(share);
                }
            }
        }
        drop(store);
        if shares.len() < threshold {
            return;
        }

        let xs: Vec<BigInt> = group
            .iter()
            .enumerate()
            .map(|(j, pk)| crate::curve_ops::evaluation_point(pk, j as u32))
            .collect();
        let sigma = crypto_helper::aggregate(&shares[0..threshold], &xs);
        let r = crypto_helper::randomness_from_signature(&sigma);
        self.submitter.submit_gen_r(epoch, &r).await;
    }
}

/// The driver's only wall-clock read.
fn wall_now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .expect("system clock is before the unix epoch")
        .as_secs()
}

/// Submits by calling straight into an in-process `BeaconContract`, for tests and the demo binary.
pub struct LocalTxSubmitter<E> {
    pub contract: BeaconContract,
    pub env: Arc<E>,
    pub store: Arc<tokio::sync::Mutex<Box<dyn BeaconStore>>>,
}

#[async_trait::async_trait]
impl<E: BeaconEnv> TxSubmitter for LocalTxSubmitter<E> {
    async fn submit_dkg(&self, bundle: &DkgBundle) {
        let payload = crate::codec::encode_dkg_bundle(bundle);
        let input = build_input(&crate::contract::method_ids().dkg, &payload);
        let mut store = self.store.lock().await;
        let now = wall_now_secs();
        if let Err(err) = self.contract.call(&input, &*self.env, &mut *store, now) {
            warn!(?err, "dkg submission rejected");
        }
    }

    async fn submit_sigshare(&self, share: &SigShare) {
        let payload = crate::codec::encode_sig_share(share);
        let input = build_input(&crate::contract::method_ids().sigshare, &payload);
        let mut store = self.store.lock().await;
        let now = wall_now_secs();
        if let Err(err) = self.contract.call(&input, &*self.env, &mut *store, now) {
            warn!(?err, "sigshare submission rejected");
        }
    }

    async fn submit_gen_r(&self, epoch: EpochId, r: &BigInt) {
        let mut payload = [0u8; 64];
        payload[24..32].copy_from_slice(&epoch.0.to_be_bytes());
        let r_bytes = curv::arithmetic::traits::Converter::to_bytes(r);
        let len = r_bytes.len().min(32);
        payload[64 - len..64].copy_from_slice(&r_bytes[r_bytes.len() - len..]);
        let input = build_input(&crate::contract::method_ids().gen_r, &payload);
        let mut store = self.store.lock().await;
        let now = wall_now_secs();
        if let Err(err) = self.contract.call(&input, &*self.env, &mut *store, now) {
            warn!(?err, "genR submission rejected");
        }
    }
}

fn build_input(method_id: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut input = Vec::with_capacity(4 + payload.len());
    input.extend_from_slice(method_id);
    input.extend_from_slice(payload);
    input
}
