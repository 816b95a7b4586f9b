//! Runs an in-process simulation of a proposer group driving the beacon across several epochs,
//! logging every DKG/sigshare/genR submission. Grounded on `examples/cli.rs`'s
//! structopt/tokio-runtime scaffolding, with the mediator/gRPC transport dropped in favor of
//! direct in-process `BeaconContract::call` (no network transport is in scope here).

use std::path::PathBuf;
use std::process::exit;
use std::sync::Arc;

use serde::Deserialize;
use structopt::StructOpt;
use tokio::sync::{watch, Mutex};
use tracing::{error, info};

use random_beacon::contract::{BeaconContract, ContractConfig, StandardBeaconEnv};
use random_beacon::driver::crypto_helper::LocalCryptoHelper;
use random_beacon::driver::{BeaconDriver, LocalTxSubmitter, SlotLeaderGate};
use random_beacon::epoch_clock::{EpochClock, EpochClockConfig};
use random_beacon::proposer_group::StaticProposerGroup;
use random_beacon::store::{BeaconStore, InMemoryBeaconStore};
use random_beacon::types::{Address, EpochId, ProposerId};

#[derive(StructOpt, Debug)]
/// Local beacon simulation
struct App {
    /// Number of validators in the simulated proposer group
    #[structopt(short = "n", long, default_value = "5")]
    parties: u32,

    /// Reed-Solomon/VSS polynomial degree; threshold is degree + 1
    #[structopt(short = "k", long, default_value = "2")]
    degree: usize,

    /// Slot duration, in seconds
    #[structopt(long, default_value = "1")]
    slot_duration_secs: u64,

    /// Slots per epoch
    #[structopt(long, default_value = "10")]
    slots_per_epoch: u64,

    /// How many epochs to simulate before exiting
    #[structopt(long, default_value = "2")]
    epochs: u64,

    /// Optional TOML file overriding any of the above; unset fields keep their CLI/default value
    #[structopt(long, parse(from_os_str))]
    config: Option<PathBuf>,
}

/// On-disk override for `App`'s timing/sizing knobs, loaded from `--config`. Every field is
/// optional so a config file only needs to mention what it wants to change.
#[derive(Debug, Deserialize)]
struct FileConfig {
    parties: Option<u32>,
    degree: Option<usize>,
    slot_duration_secs: Option<u64>,
    slots_per_epoch: Option<u64>,
    epochs: Option<u64>,
}

impl App {
    fn apply_file_config(&mut self, file: FileConfig) {
        if let Some(v) = file.parties {
            self.parties = v;
        }
        if let Some(v) = file.degree {
            self.degree = v;
        }
        if let Some(v) = file.slot_duration_secs {
            self.slot_duration_secs = v;
        }
        if let Some(v) = file.slots_per_epoch {
            self.slots_per_epoch = v;
        }
        if let Some(v) = file.epochs {
            self.epochs = v;
        }
    }
}

/// Every validator is always willing to act; a real deployment plugs in the chain's own
/// leader-election predicate here.
struct AlwaysActive;

#[async_trait::async_trait]
impl SlotLeaderGate for AlwaysActive {
    async fn should_act(&self, _epoch: EpochId, _proposer: ProposerId) -> bool {
        true
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    let mut app = App::from_args();

    if let Some(path) = app.config.clone() {
        match load_file_config(&path) {
            Ok(file) => app.apply_file_config(file),
            Err(e) => {
                error!("failed to load config file {}: {}", path.display(), e);
                exit(1);
            }
        }
    }

    if let Err(e) = run(app).await {
        error!("{}", e);
        exit(1);
    }
}

fn load_file_config(path: &PathBuf) -> anyhow::Result<FileConfig> {
    let text = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&text)?)
}

async fn run(app: App) -> anyhow::Result<()> {
    let address = Address([1u8; 20]);
    let clock = EpochClock::new(EpochClockConfig {
        genesis_time: now_secs(),
        slot_duration_secs: app.slot_duration_secs,
        slots_per_epoch: app.slots_per_epoch,
        dkg_slots: app.slots_per_epoch / 2,
        sigshare_slots: app.slots_per_epoch - app.slots_per_epoch / 2,
    });
    if !clock.config().is_consistent() {
        anyhow::bail!("epoch clock configuration is inconsistent");
    }

    let keys: Vec<Arc<LocalCryptoHelper>> = (0..app.parties)
        .map(|i| Arc::new(LocalCryptoHelper::new(ProposerId(i))))
        .collect();
    let group: Vec<_> = keys.iter().map(|k| k.public_key.clone()).collect();

    let mut groups = StaticProposerGroup::new();
    for epoch in 0..=app.epochs {
        groups.set_group(EpochId(epoch), group.clone());
    }
    let proposer_groups = Arc::new(groups);
    let env = Arc::new(StandardBeaconEnv::new(StaticProposerGroupRef(proposer_groups.clone())));
    let store: Arc<Mutex<Box<dyn BeaconStore>>> = Arc::new(Mutex::new(Box::new(InMemoryBeaconStore::new())));

    let contract = BeaconContract::new(
        address,
        clock,
        ContractConfig {
            polynomial_degree: app.degree,
            min_proposer_count: app.degree + 1,
        },
    );
    let submitter = Arc::new(LocalTxSubmitter {
        contract,
        env: env.clone(),
        store: store.clone(),
    });

    info!(parties = app.parties, degree = app.degree, "starting beacon simulation");

    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut handles = Vec::new();
    for key in &keys {
        let driver = BeaconDriver {
            address,
            clock,
            store: store.clone(),
            proposer_groups: proposer_groups.clone(),
            env: env.clone(),
            gate: Arc::new(AlwaysActive),
            submitter: submitter.clone(),
            dkg_builder: key.clone(),
            sig_builder: key.clone(),
            proposer_index: key.proposer_index,
            polynomial_degree: app.degree,
        };
        let rx = shutdown_rx.clone();
        handles.push(tokio::spawn(async move {
            if let Err(e) = driver.run(rx).await {
                error!("driver exited: {}", e);
            }
        }));
    }

    let run_seconds = app.epochs * app.slots_per_epoch * app.slot_duration_secs;
    tokio::time::sleep(std::time::Duration::from_secs(run_seconds + 1)).await;

    for epoch in 0..app.epochs {
        let store = store.lock().await;
        let mut persisted = 0usize;
        for i in 0..app.parties {
            if store
                .get(address, random_beacon::contract::dkg_key(EpochId(epoch), ProposerId(i)))
                .is_some()
            {
                persisted += 1;
            }
        }
        info!(epoch, persisted, "dkg bundles observed");
    }

    Ok(())
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .expect("system clock is before the unix epoch")
        .as_secs()
}

/// Adapter so the same `Arc<StaticProposerGroup>` can back both the driver's `proposer_groups`
/// field and `StandardBeaconEnv`, which owns its source rather than sharing it.
struct StaticProposerGroupRef(Arc<StaticProposerGroup>);

impl random_beacon::proposer_group::ProposerGroupSource for StaticProposerGroupRef {
    fn group(&self, epoch: EpochId) -> Option<Vec<random_beacon::types::PointG1>> {
        self.0.group(epoch)
    }
}
