//! A BLS12-381 threshold-signature random beacon: a consensus-critical precompile contract
//! (`contract::BeaconContract`) that verifies publicly-verifiable DKG bundles and aggregated
//! signature shares, plus an off-chain per-slot driver (`driver::BeaconDriver`) that builds and
//! submits them.
//!
//! ### Usage sketch
//! ```no_run
//! use random_beacon::contract::{BeaconContract, ContractConfig, StandardBeaconEnv};
//! use random_beacon::epoch_clock::{EpochClock, EpochClockConfig};
//! use random_beacon::proposer_group::StaticProposerGroup;
//! use random_beacon::store::InMemoryBeaconStore;
//! use random_beacon::types::Address;
//!
//! let clock = EpochClock::new(EpochClockConfig {
//!     genesis_time: 0,
//!     slot_duration_secs: 12,
//!     slots_per_epoch: 32,
//!     dkg_slots: 8,
//!     sigshare_slots: 8,
//! });
//! let contract = BeaconContract::new(
//!     Address([0u8; 20]),
//!     clock,
//!     ContractConfig { polynomial_degree: 2, min_proposer_count: 3 },
//! );
//! let env = StandardBeaconEnv::new(StaticProposerGroup::new());
//! let mut store = InMemoryBeaconStore::new();
//! // contract.call(&calldata, &env, &mut store, wall_time_secs)?;
//! # let _ = (contract, env, store);
//! ```

pub mod codec;
pub mod contract;
pub mod curve_ops;
pub mod driver;
pub mod epoch_clock;
pub mod proposer_group;
pub mod store;
pub mod types;
