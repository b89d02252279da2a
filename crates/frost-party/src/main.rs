//! FROST Party CLI
//!
//! Simulates a whole cohort in one process, every member running as its own
//! task over an in-memory relay:
//! - Distributed Key Generation (DKG)
//! - Key Refresh
//! - Threshold signing and verification

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use frost_core::curves::{Curve, Point};
use frost_core::encoding::{point_to_bytes, scalar_to_bytes};
use frost_core::mpc::MemoryRelay;
use frost_core::{
    keygen, sign, Ciphersuite, CohortConfig, CurveId, Ed25519AuthKey, Ed25519IdentityKey, Ed25519Sha512,
    IdentityHash, IdentityKey, P256Sha256, Secp256k1Sha256, SessionId, Shard, SharingId, Signature,
};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};

/// FROST Party - threshold Schnorr cohort simulator
#[derive(Parser)]
#[command(name = "frost-party")]
#[command(about = "Pedersen DKG and FROST threshold signing")]
#[command(version)]
struct Cli {
    /// Data directory for the cohort, identities and shards
    #[arg(short, long, env = "FROST_DEST", default_value = "./data")]
    dest: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run distributed key generation for a fresh cohort
    Keygen {
        /// Number of parties
        #[arg(short = 'n', long)]
        parties: usize,

        /// Threshold (t-of-n)
        #[arg(short, long)]
        threshold: usize,

        /// edwards25519, secp256k1 or p256
        #[arg(short, long, env = "FROST_CURVE", default_value = "edwards25519")]
        curve: CurveId,
    },

    /// Refresh every shard, keeping the public key
    Refresh,

    /// Sign a message with exactly `threshold` parties
    Sign {
        /// Message to sign (UTF-8)
        #[arg(short, long)]
        message: String,

        /// Signing sharing ids (comma-separated, e.g. 1,3)
        #[arg(short, long, value_delimiter = ',')]
        signers: Vec<u32>,
    },

    /// Show shard info
    Info {
        /// Sharing id of the party
        #[arg(short, long)]
        party: u32,
    },

    /// Verify the last signature
    Verify {
        /// Verify this message instead of the one that was signed
        #[arg(short, long)]
        message: Option<String>,
    },
}

#[derive(Deserialize)]
struct CohortHeader {
    curve: CurveId,
}

#[derive(Serialize, Deserialize)]
#[serde(bound = "")]
struct SignatureRecord<C: Ciphersuite> {
    message: String,
    signers: Vec<u32>,
    signature: Signature<C>,
}

/// Files under `--dest`
struct Store {
    dest: PathBuf,
}

impl Store {
    fn path(&self, name: &str) -> PathBuf {
        self.dest.join(name)
    }

    fn save<T: Serialize>(&self, name: &str, value: &T) -> Result<PathBuf> {
        let path = self.path(name);
        std::fs::write(&path, serde_json::to_string_pretty(value)?)
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(path)
    }

    fn load<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let path = self.path(name);
        let json = std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
        Ok(serde_json::from_str(&json)?)
    }

    fn curve(&self) -> Result<CurveId> {
        Ok(self.load::<CohortHeader>("cohort.json")?.curve)
    }

    fn cohort<C: Ciphersuite>(&self) -> Result<CohortConfig<C>> {
        let cohort: CohortConfig<C> = self.load("cohort.json")?;
        cohort.validate()?;
        Ok(cohort)
    }

    /// Auth keys in sharing id order
    fn identities(&self) -> Result<Vec<Ed25519AuthKey>> {
        let seeds: Vec<String> = self.load("identities.json")?;
        seeds
            .iter()
            .map(|seed| {
                let bytes: [u8; 32] = hex::decode(seed)?
                    .try_into()
                    .map_err(|_| anyhow::anyhow!("identity seed must be 32 bytes"))?;
                Ok(Ed25519AuthKey::from_bytes(&bytes))
            })
            .collect()
    }

    fn save_identities(&self, keys: &[Ed25519AuthKey]) -> Result<PathBuf> {
        let seeds: Vec<String> = keys.iter().map(|key| hex::encode(*key.to_bytes())).collect();
        self.save("identities.json", &seeds)
    }

    fn shard_name(id: SharingId) -> String {
        format!("shard.{}.json", id)
    }

    fn shard<C: Ciphersuite>(&self, id: SharingId) -> Result<Shard<C>> {
        self.load(&Self::shard_name(id))
    }
}

/// Run a generic command for the suite of `curve`
macro_rules! with_suite {
    ($curve:expr, $f:ident ( $($arg:expr),* )) => {
        match $curve {
            CurveId::Edwards25519 => $f::<Ed25519Sha512>($($arg),*).await,
            CurveId::Secp256k1 => $f::<Secp256k1Sha256>($($arg),*).await,
            CurveId::P256 => $f::<P256Sha256>($($arg),*).await,
        }
    };
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    std::fs::create_dir_all(&cli.dest)?;
    let store = Store { dest: cli.dest };

    match cli.command {
        Commands::Keygen {
            parties,
            threshold,
            curve,
        } => with_suite!(curve, run_keygen(&store, parties, threshold)),
        Commands::Refresh => with_suite!(store.curve()?, run_refresh(&store)),
        Commands::Sign {
            ref message,
            ref signers,
        } => with_suite!(store.curve()?, run_sign(&store, message, signers)),
        Commands::Info { party } => with_suite!(store.curve()?, show_info(&store, party)),
        Commands::Verify { ref message } => {
            with_suite!(store.curve()?, run_verify(&store, message.as_deref()))
        }
    }
}

fn fresh_session_id() -> SessionId {
    let mut session_id = [0u8; 32];
    OsRng.fill_bytes(&mut session_id);
    session_id
}

fn peers_of(keys: &[Ed25519AuthKey]) -> Arc<Vec<Ed25519IdentityKey>> {
    Arc::new(keys.iter().map(|key| key.identity_key()).collect())
}

fn point_hex<C: Ciphersuite>(point: &Point<C>) -> String {
    hex::encode(point_to_bytes(point))
}

async fn run_keygen<C: Ciphersuite>(store: &Store, parties: usize, threshold: usize) -> Result<()> {
    info!(
        curve = %<C::Curve as Curve>::ID,
        n_parties = parties,
        threshold = threshold,
        "Starting DKG"
    );

    let mut keys: Vec<Ed25519AuthKey> = (0..parties).map(|_| Ed25519AuthKey::generate(&mut OsRng)).collect();
    keys.sort_by_key(|key| key.hash());
    let cohort = CohortConfig::<C>::new(threshold, &keys, &keys)?;
    let peers = peers_of(&keys);
    let relay = MemoryRelay::new();
    let session_id = fresh_session_id();

    let tasks: Vec<_> = keys
        .iter()
        .cloned()
        .map(|key| {
            let peers = Arc::clone(&peers);
            let cohort = cohort.clone();
            let relay = relay.clone();
            tokio::spawn(async move { keygen::run_dkg(&key, &peers, &cohort, session_id, &relay, &mut OsRng).await })
        })
        .collect();

    let mut public_key = None;
    for ((id, _), task) in cohort.sharing_ids().zip(tasks) {
        let shard: Shard<C> = task.await??;
        let path = store.save(&Store::shard_name(id), &shard)?;
        info!(sharing_id = %id, path = ?path, "shard saved");
        public_key = Some(*shard.public_key());
    }
    store.save("cohort.json", &cohort)?;
    store.save_identities(&keys)?;

    let public_key = public_key.context("cohort has no members")?;
    info!(public_key = %point_hex::<C>(&public_key), "DKG completed");
    println!("Public Key: {}", point_hex::<C>(&public_key));

    Ok(())
}

async fn run_refresh<C: Ciphersuite>(store: &Store) -> Result<()> {
    let cohort = store.cohort::<C>()?;
    let keys = store.identities()?;
    let peers = peers_of(&keys);
    let relay = MemoryRelay::new();
    let session_id = fresh_session_id();

    info!(n_parties = cohort.total_parties(), "Starting key refresh");

    let mut tasks = Vec::with_capacity(keys.len());
    for ((id, _), key) in cohort.sharing_ids().zip(keys.iter().cloned()) {
        let shard = store.shard::<C>(id)?;
        let peers = Arc::clone(&peers);
        let cohort = cohort.clone();
        let relay = relay.clone();
        tasks.push((
            id,
            tokio::spawn(async move {
                keygen::run_key_refresh(&key, &peers, &cohort, &shard, session_id, &relay, &mut OsRng).await
            }),
        ));
    }

    for (id, task) in tasks {
        let refreshed: Shard<C> = task.await??;
        store.save(&Store::shard_name(id), &refreshed)?;
    }

    info!("Key refresh completed");
    Ok(())
}

async fn run_sign<C: Ciphersuite>(store: &Store, message: &str, signers: &[u32]) -> Result<()> {
    let cohort = store.cohort::<C>()?;
    let keys = store.identities()?;
    let peers = peers_of(&keys);

    let mut participants: Vec<(SharingId, IdentityHash, Ed25519AuthKey)> = Vec::with_capacity(signers.len());
    for signer in signers {
        let id = SharingId::new(*signer)?;
        let identity = cohort
            .identity(id)
            .with_context(|| format!("no party with sharing id {}", id))?;
        let key = keys
            .iter()
            .find(|key| key.hash() == identity)
            .with_context(|| format!("no identity key for party {}", id))?;
        participants.push((id, identity, key.clone()));
    }
    let members: Arc<Vec<IdentityHash>> = Arc::new(participants.iter().map(|(_, identity, _)| *identity).collect());

    info!(signers = ?signers, message = message, "Starting signing");

    let relay = MemoryRelay::new();
    let session_id = fresh_session_id();
    let message_bytes = Arc::new(message.as_bytes().to_vec());

    let mut tasks = Vec::with_capacity(participants.len());
    for (id, _, key) in participants {
        let shard = store.shard::<C>(id)?;
        let peers = Arc::clone(&peers);
        let cohort = cohort.clone();
        let relay = relay.clone();
        let members = Arc::clone(&members);
        let message_bytes = Arc::clone(&message_bytes);
        tasks.push(tokio::spawn(async move {
            sign::run_signing(&key, &peers, &cohort, &shard, &members, session_id, &message_bytes, &relay, &mut OsRng)
                .await
        }));
    }

    let mut signature = None;
    for task in tasks {
        if let Some(produced) = task.await?? {
            signature = Some(produced);
        }
    }
    let Some(signature) = signature else {
        bail!("no signer is a signature aggregator");
    };

    store.save(
        "signature.json",
        &SignatureRecord::<C> {
            message: message.to_string(),
            signers: signers.to_vec(),
            signature,
        },
    )?;

    info!(signature = %hex::encode(signature.to_bytes()), "Signature generated");

    println!("Signature:");
    println!("  R: {}", point_hex::<C>(&signature.r));
    println!("  z: {}", hex::encode(scalar_to_bytes(&signature.z)));
    println!("  bytes: {}", hex::encode(signature.to_bytes()));

    Ok(())
}

async fn show_info<C: Ciphersuite>(store: &Store, party: u32) -> Result<()> {
    let cohort = store.cohort::<C>()?;
    let id = SharingId::new(party)?;
    let identity = cohort
        .identity(id)
        .with_context(|| format!("no party with sharing id {}", id))?;
    let shard = store.shard::<C>(id)?;
    shard.validate(&cohort, &identity)?;
    let share = shard
        .public_key_shares
        .share_of(&identity)
        .context("missing own public key share")?;

    println!("Shard Info:");
    println!("  Curve: {}", cohort.curve());
    println!("  Sharing ID: {}", id);
    println!("  Identity: {}", identity);
    println!("  N Parties: {}", cohort.total_parties());
    println!("  Threshold: {}", cohort.threshold());
    println!("  Aggregator: {}", cohort.is_signature_aggregator(&identity));
    println!("  Public Key: {}", point_hex::<C>(shard.public_key()));
    println!("  Public Key Share: {}", point_hex::<C>(share));

    Ok(())
}

async fn run_verify<C: Ciphersuite>(store: &Store, message: Option<&str>) -> Result<()> {
    let cohort = store.cohort::<C>()?;
    let record: SignatureRecord<C> = store.load("signature.json")?;
    let (id, _) = cohort.sharing_ids().next().context("cohort has no members")?;
    let public_key = *store.shard::<C>(id)?.public_key();
    let message = message.unwrap_or(&record.message);

    match record.signature.verify(&public_key, message.as_bytes()) {
        Ok(()) => {
            println!("Signature valid for {}", point_hex::<C>(&public_key));
            Ok(())
        }
        Err(err) => bail!("signature invalid: {}", err),
    }
}
