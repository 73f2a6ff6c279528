//! dhali-node — reference wiring binary for the claim-validation engine.
//!
//! This does not serve HTTP: the gateway that terminates `PUT
//! {gateway_base}/{asset_uuid}/run/` requests and forwards `Payment-Claim`
//! headers into the engine is out of scope here. What this binary does:
//!
//!   1. Load `EngineConfig` from a file (or defaults/env).
//!   2. Open a `SledStore` at a configured data directory.
//!   3. Build a `JsonRpcLedgerClient` against a configured ledger RPC URL.
//!   4. Wire `ClaimValidator` / `Reconciler` / `Consolidator` into one `Engine`.
//!   5. Run a periodic consolidation sweep over the exact-claim records this
//!      process itself staged, on a timer.
//!
//! A caller embedding this crate behind its own HTTP surface would reach for
//! `Engine::validator`, `Engine::reconciler`, and `Engine::consolidator`
//! directly rather than this binary's `main`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use dhali_core::{Cid, Rid};
use dhali_engine::{Engine, EngineConfig};
use dhali_ledger::JsonRpcLedgerClient;
use dhali_ratelimit::{RateLimitStrategy, RateLimiter};
use dhali_store::{DocRef, SledStore};

#[derive(Parser, Debug)]
#[command(
    name = "dhali-node",
    version,
    about = "Dhali claim-validation engine — reference wiring, no HTTP surface"
)]
struct Args {
    /// Directory for the persistent document store.
    #[arg(long, default_value = "~/.dhali/data")]
    data_dir: PathBuf,

    /// JSON-RPC URL of the ledger node the `LedgerClient` talks to.
    #[arg(long, default_value = "http://127.0.0.1:5005")]
    ledger_rpc_url: String,

    /// Destination account every admitted claim must name.
    #[arg(long)]
    destination_account: String,

    /// Optional path to a JSON `EngineConfig`. Falls back to `DHALI_*` env
    /// overrides of [`EngineConfig::default`] when absent.
    #[arg(long)]
    config: Option<PathBuf>,

    /// How often the consolidation sweep runs.
    #[arg(long, default_value_t = 300)]
    consolidation_interval_secs: u64,
}

/// Tracks the exact-claim `Rid`s this process has staged per channel, so the
/// sweep loop knows what to fold into the canonical record. A production
/// deployment would instead enumerate `private/{CID}/exact/*` directly
/// against its document store; that listing operation is not part of the
/// `Store` seam this engine is specified against (see DESIGN.md), so this
/// reference binary keeps its own in-memory index instead.
#[derive(Default)]
struct PendingExactIndex {
    by_channel: Mutex<HashMap<Cid, Vec<Rid>>>,
}

impl PendingExactIndex {
    fn record(&self, cid: Cid, rid: Rid) {
        self.by_channel.lock().unwrap().entry(cid).or_default().push(rid);
    }

    fn drain(&self, cid: Cid) -> Vec<Rid> {
        self.by_channel
            .lock()
            .unwrap()
            .remove(&cid)
            .unwrap_or_default()
    }

    fn known_channels(&self) -> Vec<Cid> {
        self.by_channel.lock().unwrap().keys().copied().collect()
    }
}

fn now_secs() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

/// Per-request lifecycle an embedding HTTP surface would call on admission:
/// reconcile the claim against stored accounting and return the new
/// cumulative `to_claim` (§4.5). Exposed as a plain function rather than a
/// trait method since the engine has no inbound transport of its own.
#[allow(dead_code)]
async fn admit_request<S, L>(
    engine: &Engine<S, L>,
    claim_json: &str,
    single_request_cost_estimate: f64,
    destination_account: &str,
) -> Result<dhali_core::ToClaim, dhali_core::DhaliError>
where
    S: dhali_store::Store,
    L: dhali_ledger::LedgerClient + 'static,
{
    engine
        .validator
        .validate_claim(
            claim_json,
            single_request_cost_estimate,
            destination_account,
            now_secs(),
        )
        .await
}

/// Post-execution lifecycle step: stages the measured exact cost and records
/// its `Rid` against the claim's channel so the next sweep tick folds it into
/// the canonical record (§4.6, §4.8).
#[allow(dead_code)]
async fn stage_exact_cost<S, L>(
    engine: &Engine<S, L>,
    pending: &PendingExactIndex,
    claim_json: &str,
    exact_cost: f64,
) -> Result<Rid, dhali_core::DhaliError>
where
    S: dhali_store::Store,
    L: dhali_ledger::LedgerClient + 'static,
{
    let claim = dhali_core::Claim::parse(claim_json)?;
    let cid = Cid::derive(&claim.channel_id);
    let rid = engine
        .reconciler
        .store_exact_claim(claim_json, exact_cost, now_secs())
        .await?;
    pending.record(cid, rid);
    Ok(rid)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,dhali=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    info!("dhali-node starting");

    let config = match &args.config {
        Some(path) => EngineConfig::from_file(path).context("loading engine config")?,
        None => EngineConfig::from_env().context("loading engine config from environment")?,
    };

    let data_dir = expand_tilde(&args.data_dir);
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("creating data dir {}", data_dir.display()))?;
    let store = Arc::new(SledStore::open(&data_dir).context("opening document store")?);

    let ledger = Arc::new(JsonRpcLedgerClient::new(args.ledger_rpc_url.clone()));

    let rate_limiter = RateLimiter::new(RateLimitStrategy::StagedClaimBuffer {
        limit: config.staged_buffer_limit,
        window_secs: config.rate_limit_window,
    });

    let engine = Arc::new(Engine::new(store.clone(), ledger, &config, rate_limiter));
    let pending = Arc::new(PendingExactIndex::default());

    // Periodic consolidation sweep: folds every exact-claim record staged
    // since the last tick into each channel's canonical private/public pair.
    {
        let engine = engine.clone();
        let pending = pending.clone();
        let interval = Duration::from_secs(args.consolidation_interval_secs.max(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                for cid in pending.known_channels() {
                    let rids = pending.drain(cid);
                    if rids.is_empty() {
                        continue;
                    }
                    let sources: Vec<DocRef> =
                        rids.into_iter().map(|rid| DocRef::Exact(cid, rid)).collect();
                    let private_target = DocRef::Private(cid);
                    let public_target = DocRef::Public(cid);
                    match engine
                        .consolidator
                        .consolidate(sources, private_target, public_target, now_secs())
                        .await
                    {
                        Ok(()) => info!(%cid, "consolidation sweep committed"),
                        Err(e) => warn!(%cid, error = %e, "consolidation sweep failed"),
                    }
                }
            }
        });
    }

    info!(destination_account = %args.destination_account, "dhali-node ready");

    // No HTTP surface: this reference binary idles, holding the engine ready
    // for an embedding process to call `engine.validator`/`engine.reconciler`
    // directly, until asked to shut down.
    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("shutting down");
    Ok(())
}

fn expand_tilde(path: &PathBuf) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(stripped);
        }
    }
    path.clone()
}
