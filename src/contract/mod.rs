//! The beacon precompile: the consensus-critical on-chain entry points `dkg`, `sigshare`, and
//! `genR`. Ported almost directly from
//! `examples/original_source/core/vm/random_beacon_contract.go`, re-expressed with `thiserror`
//! structured errors the way `threshold_bls::state_machine::keygen::rounds::ProceedError` is, and
//! with the original's mutable global hooks (`getRBProposerGroupVar`, `getRBMVar`) replaced by the
//! `BeaconEnv` capability.

use std::sync::OnceLock;

use curv::arithmetic::traits::Converter;
use curv::elliptic::curves::traits::ECScalar;
use curv::BigInt;
use sha3::{Digest, Keccak256};
use thiserror::Error;
use tracing::{info, warn};

use crate::codec::{self, CodecError};
use crate::curve_ops;
use crate::epoch_clock::EpochClock;
use crate::store::BeaconStore;
use crate::types::{Address, EpochId, PointG1, ProposerId, ScalarG1, ScalarG2};

/// Tunable parameters of the on-chain checks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ContractConfig {
    /// `k`: the Reed-Solomon/VSS polynomial degree. Threshold is `k + 1`.
    pub polynomial_degree: usize,
    /// Minimum number of persisted DKG bundles required before a sigshare may be accepted.
    pub min_proposer_count: usize,
}

/// Errors a contract call can fail with. Every variant aborts the call and rolls back
/// any state changes made within it; none of them panic on attacker-controlled input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContractError {
    #[error("calldata shorter than 4 bytes or unknown method id")]
    BadParams,
    #[error("payload decode failed: {0}")]
    Decode(#[from] CodecError),
    #[error("epoch {0:?} is outside the currently active window for this call")]
    EpochWindow(EpochId),
    #[error("no proposer group is registered for epoch {0:?}")]
    UnknownGroup(EpochId),
    #[error("proposer {proposer:?} is not a member of epoch {epoch:?}'s group")]
    NotInGroup { epoch: EpochId, proposer: ProposerId },
    #[error("dkg bundle vectors for epoch {epoch:?} proposer {proposer:?} have mismatched lengths")]
    ShapeMismatch { epoch: EpochId, proposer: ProposerId },
    #[error("dleq proof {index} rejected for epoch {epoch:?} proposer {proposer:?}")]
    DleqFail {
        epoch: EpochId,
        proposer: ProposerId,
        index: usize,
    },
    #[error("reed-solomon check rejected for epoch {epoch:?} proposer {proposer:?}")]
    RsFail { epoch: EpochId, proposer: ProposerId },
    #[error("no message digest is available yet for epoch {0:?}")]
    UnknownDigest(EpochId),
    #[error("insufficient dkg quorum for epoch {epoch:?}: {counted} < {required}")]
    InsufficientQuorum {
        epoch: EpochId,
        counted: usize,
        required: usize,
    },
    #[error("pairing check failed for epoch {epoch:?} proposer {proposer:?}")]
    PairingMismatch { epoch: EpochId, proposer: ProposerId },
}

/// Replaces the original's `getRBProposerGroupVar` and `getRBMVar` mutable function-pointer hooks
/// with a single capability passed in by the caller. Production code backs this with
/// `StandardBeaconEnv`; tests inject whatever group/digest they need directly.
pub trait BeaconEnv: Send + Sync {
    fn proposer_group(&self, epoch: EpochId) -> Option<Vec<PointG1>>;
    /// `M(e)` reduced to a scalar, or `None` if epoch `e`'s digest cannot yet
    /// be computed (its preceding randomness has not been committed).
    fn message_digest(&self, store: &dyn BeaconStore, addr: Address, epoch: EpochId) -> Option<BigInt>;
}

/// `PreRandom(e)`: the randomness finalized for epoch `e - 1`, chaining each epoch's drawing off
/// the previous one, or the fixed seed `1` for `e = 0` unconditionally (the original's unreachable
/// double branch is not preserved). Reading the *current* epoch's own randomness key here would be
/// circular, since that key is exactly what this epoch's sigshares and `genR` are still in the
/// process of producing.
pub fn pre_random(store: &dyn BeaconStore, addr: Address, epoch: EpochId) -> Option<BigInt> {
    if epoch == EpochId(0) {
        return Some(BigInt::one());
    }
    store
        .get(addr, randomness_key(EpochId(epoch.0 - 1)))
        .map(|bytes| BigInt::from_bytes(&bytes))
}

/// `M(e) = Keccak256(be64(e+1) ‖ be(PreRandom(e)))`.
pub fn message_digest(store: &dyn BeaconStore, addr: Address, epoch: EpochId) -> Option<BigInt> {
    let pre = pre_random(store, addr, epoch)?;
    let mut hasher = Keccak256::new();
    hasher.update((epoch.0 + 1).to_be_bytes());
    hasher.update(pre.to_bytes());
    Some(BigInt::from_bytes(hasher.finalize().as_slice()))
}

/// Default `BeaconEnv`: proposer groups come from an injected `ProposerGroupSource`; the message
/// digest is computed from the contract's own `BeaconStore` (unifying the original's separate
/// `posdb` randomness table with the precompile's own state, since this crate has no analogous
/// external db — see `DESIGN.md`).
pub struct StandardBeaconEnv<P> {
    proposer_groups: P,
}

impl<P: crate::proposer_group::ProposerGroupSource> StandardBeaconEnv<P> {
    pub fn new(proposer_groups: P) -> Self {
        Self { proposer_groups }
    }
}

impl<P: crate::proposer_group::ProposerGroupSource> BeaconEnv for StandardBeaconEnv<P> {
    fn proposer_group(&self, epoch: EpochId) -> Option<Vec<PointG1>> {
        self.proposer_groups.group(epoch)
    }

    fn message_digest(&self, store: &dyn BeaconStore, addr: Address, epoch: EpochId) -> Option<BigInt> {
        message_digest(store, addr, epoch)
    }
}

/// The three dispatch-method selectors, in the shape callers assemble calldata against.
pub struct MethodIds {
    pub dkg: [u8; 4],
    pub sigshare: [u8; 4],
    pub gen_r: [u8; 4],
}

fn method_id(signature: &[u8]) -> [u8; 4] {
    let digest = Keccak256::digest(signature);
    let mut id = [0u8; 4];
    id.copy_from_slice(&digest[0..4]);
    id
}

/// Computed once at first use and cached, mirroring the original's module-level `init()` the
/// idiomatic-Rust way. Public so callers building calldata (the driver, tests) can compute the
/// same selectors without duplicating the preimages.
pub fn method_ids() -> &'static MethodIds {
    static IDS: OnceLock<MethodIds> = OnceLock::new();
    IDS.get_or_init(|| MethodIds {
        dkg: method_id(b"dkg(string)"),
        sigshare: method_id(b"sigshare(string)"),
        gen_r: method_id(b"genR(uint256,uint256)"),
    })
}

/// `Keccak256(funId ‖ le64(e) ‖ le32(i))`. Integers are
/// little-endian here, matching the original's `UIntToByteSlice`/`UInt32ToByteSlice` exactly —
/// this is consensus-observable and must not change.
fn function_key(fun_id: &[u8; 4], epoch: EpochId, proposer: ProposerId) -> [u8; 32] {
    let mut bytes = [0u8; 16];
    bytes[0..4].copy_from_slice(fun_id);
    bytes[4..12].copy_from_slice(&epoch.0.to_le_bytes());
    bytes[12..16].copy_from_slice(&proposer.0.to_le_bytes());
    let digest = Keccak256::digest(bytes);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

pub fn dkg_key(epoch: EpochId, proposer: ProposerId) -> [u8; 32] {
    function_key(&method_ids().dkg, epoch, proposer)
}

pub fn sig_key(epoch: EpochId, proposer: ProposerId) -> [u8; 32] {
    function_key(&method_ids().sigshare, epoch, proposer)
}

/// `Keccak256(genRId ‖ le64(e))`.
pub fn randomness_key(epoch: EpochId) -> [u8; 32] {
    let mut bytes = [0u8; 12];
    bytes[0..4].copy_from_slice(&method_ids().gen_r);
    bytes[4..12].copy_from_slice(&epoch.0.to_le_bytes());
    let digest = Keccak256::digest(bytes);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// The beacon precompile. `call` is the single dispatch entry point; it is a plain
/// synchronous function with no interior mutability beyond the caller-supplied store, so it cannot
/// accidentally read anything nondeterministic.
pub struct BeaconContract {
    pub address: Address,
    pub clock: EpochClock,
    pub config: ContractConfig,
}

impl BeaconContract {
    pub fn new(address: Address, clock: EpochClock, config: ContractConfig) -> Self {
        Self {
            address,
            clock,
            config,
        }
    }

    /// Dispatches on the first 4 bytes of `input`.
    pub fn call(
        &self,
        input: &[u8],
        env: &dyn BeaconEnv,
        store: &mut dyn BeaconStore,
        wall_time_secs: u64,
    ) -> Result<(), ContractError> {
        if input.len() < 4 {
            return Err(ContractError::BadParams);
        }
        let (id, payload) = input.split_at(4);
        let ids = method_ids();
        if id == ids.dkg {
            self.dkg(payload, env, store, wall_time_secs)
        } else if id == ids.sigshare {
            self.sigshare(payload, env, store, wall_time_secs)
        } else if id == ids.gen_r {
            self.gen_r(payload, store)
        } else {
            Err(ContractError::BadParams)
        }
    }

    fn dkg(
        &self,
        payload: &[u8],
        env: &dyn BeaconEnv,
        store: &mut dyn BeaconStore,
        wall_time_secs: u64,
    ) -> Result<(), ContractError> {
        let bundle = codec::decode_dkg_bundle(payload)?;
        info!(epoch = bundle.epoch.0, proposer = bundle.proposer.0, "contract do dkg begin");

        let (current_epoch, slot) = self.clock.now(wall_time_secs);
        if bundle.epoch != current_epoch || !self.clock.in_dkg_window(slot) {
            warn!(epoch = bundle.epoch.0, "dkg rejected: outside dkg window");
            return Err(ContractError::EpochWindow(bundle.epoch));
        }

        let group = env
            .proposer_group(bundle.epoch)
            .ok_or(ContractError::UnknownGroup(bundle.epoch))?;
        let n = group.len();
        if bundle.proposer.0 as usize >= n {
            return Err(ContractError::NotInGroup {
                epoch: bundle.epoch,
                proposer: bundle.proposer,
            });
        }
        if bundle.enshare.len() != n || bundle.commit.len() != n || bundle.proof.len() != n {
            return Err(ContractError::ShapeMismatch {
                epoch: bundle.epoch,
                proposer: bundle.proposer,
            });
        }

        let h = curve_ops::fixed_h();
        for j in 0..n {
            if !curve_ops::verify_dleq(&bundle.proof[j], &group[j], &h, &bundle.enshare[j], &bundle.commit[j]) {
                return Err(ContractError::DleqFail {
                    epoch: bundle.epoch,
                    proposer: bundle.proposer,
                    index: j,
                });
            }
        }

        let xs: Vec<BigInt> = group
            .iter()
            .enumerate()
            .map(|(j, pk)| curve_ops::evaluation_point(pk, j as u32))
            .collect();
        if !curve_ops::verify_reed_solomon(&bundle.commit, &xs, self.config.polynomial_degree) {
            return Err(ContractError::RsFail {
                epoch: bundle.epoch,
                proposer: bundle.proposer,
            });
        }

        store.put(self.address, dkg_key(bundle.epoch, bundle.proposer), payload.to_vec());
        info!(epoch = bundle.epoch.0, proposer = bundle.proposer.0, "contract do dkg end");
        Ok(())
    }

    fn sigshare(
        &self,
        payload: &[u8],
        env: &dyn BeaconEnv,
        store: &mut dyn BeaconStore,
        wall_time_secs: u64,
    ) -> Result<(), ContractError> {
        let share = codec::decode_sig_share(payload)?;
        info!(epoch = share.epoch.0, proposer = share.proposer.0, "contract do sig begin");

        let (current_epoch, slot) = self.clock.now(wall_time_secs);
        if share.epoch != current_epoch || !self.clock.in_sigshare_window(slot) {
            return Err(ContractError::EpochWindow(share.epoch));
        }

        let group = env
            .proposer_group(share.epoch)
            .ok_or(ContractError::UnknownGroup(share.epoch))?;
        let n = group.len();
        if share.proposer.0 as usize >= n {
            return Err(ContractError::NotInGroup {
                epoch: share.epoch,
                proposer: share.proposer,
            });
        }

        let m = env
            .message_digest(store, self.address, share.epoch)
            .ok_or(ContractError::UnknownDigest(share.epoch))?;

        // GPKshare_i = sum over j of commit_j[i], for every j whose dkg bundle is persisted,
        // iterated in strictly ascending order.
        let mut gpkshare = curve_ops::fixed_h() * &ScalarG2::zero();
        let mut counted = 0usize;
        for j in 0..n {
            if let Some(bytes) = store.get(self.address, dkg_key(share.epoch, ProposerId(j as u32))) {
                let bundle_j = codec::decode_dkg_bundle(&bytes)?;
                gpkshare = gpkshare + &bundle_j.commit[share.proposer.0 as usize];
                counted += 1;
            }
        }
        if counted < self.config.min_proposer_count {
            return Err(ContractError::InsufficientQuorum {
                epoch: share.epoch,
                counted,
                required: self.config.min_proposer_count,
            });
        }

        let m_scalar: ScalarG1 = ECScalar::from(&m);
        let m_g = curve_ops::fixed_g() * &m_scalar;
        if !curve_ops::pairing_equal(&share.gsigshare, &curve_ops::fixed_h(), &m_g, &gpkshare) {
            return Err(ContractError::PairingMismatch {
                epoch: share.epoch,
                proposer: share.proposer,
            });
        }

        store.put(self.address, sig_key(share.epoch, share.proposer), payload.to_vec());
        info!(epoch = share.epoch.0, proposer = share.proposer.0, "contract do sig end");
        Ok(())
    }

    /// No mathematical check: the validity of `r` is enforced upstream, by the consensus path that
    /// combined `≥ t` signature shares off-chain before submitting this transaction.
    fn gen_r(&self, payload: &[u8], store: &mut dyn BeaconStore) -> Result<(), ContractError> {
        if payload.len() != 64 {
            return Err(ContractError::BadParams);
        }
        let (epoch_word, r_word) = payload.split_at(32);
        let mut epoch_bytes = [0u8; 8];
        epoch_bytes.copy_from_slice(&epoch_word[24..32]);
        let epoch = EpochId(u64::from_be_bytes(epoch_bytes));

        store.put(self.address, randomness_key(epoch), r_word.to_vec());
        info!(epoch = epoch.0, "contract do genR end");
        Ok(())
    }
}
