use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use chainfolio_chain_data::{
    BalanceProvider, Chain, ChainId, ChainRegistry, ChainType, ConnectedAccount,
    EvmRpcBalanceProvider, LifiProvider, TokenMetadataProvider,
};

use super::aggregation::AggregationEngine;
use super::epoch::{Epoch, EpochManager};
use super::model::TokenWithBalance;
use super::progress::{ProgressState, ProgressTracker};
use super::scheduler::{connected_wallets, BalanceFetchScheduler, BatchOutcome, BatchUnit, BatchWarning};
use crate::catalog::CatalogService;
use crate::config::{AppConfig, FetchConfig};
use crate::errors::Result;

/// Lifecycle of the latest fetch cycle.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "message", rename_all = "camelCase")]
pub enum CycleStatus {
    #[default]
    Idle,
    Loading,
    Ready,
    /// Fatal cycle error; earlier tokens are kept.
    Failed(String),
}

/// What consumers see after every change.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSnapshot {
    pub epoch: Epoch,
    pub tokens: Vec<TokenWithBalance>,
    pub progress: ProgressState,
    pub status: CycleStatus,
    pub warnings: Vec<BatchWarning>,
}

impl PortfolioSnapshot {
    pub fn total_value_usd(&self) -> f64 {
        self.tokens.iter().map(|t| t.total_value_usd).sum()
    }
}

/// Result of one `refresh` call.
#[derive(Clone, Debug, PartialEq)]
pub struct CycleSummary {
    pub epoch: Epoch,
    pub batches: usize,
    pub resolved: usize,
    pub abandoned: usize,
    /// A newer cycle started before this one finished; its results were dropped.
    pub superseded: bool,
}

/// Inputs of the last cycle that got past catalog loading.
struct LastCycle {
    wallets: BTreeSet<(ChainType, String)>,
    chain_ids: Vec<ChainId>,
}

struct CycleState {
    epoch: Epoch,
    engine: AggregationEngine,
    progress: ProgressTracker,
    status: CycleStatus,
    tokens: Vec<TokenWithBalance>,
    warnings: Vec<BatchWarning>,
}

impl CycleState {
    fn snapshot(&self) -> PortfolioSnapshot {
        PortfolioSnapshot {
            epoch: self.epoch,
            tokens: self.tokens.clone(),
            progress: self.progress.state().clone(),
            status: self.status.clone(),
            warnings: self.warnings.clone(),
        }
    }
}

/// Drives fetch cycles and publishes portfolio snapshots.
///
/// Every `refresh` starts a new epoch. Batch outcomes are committed under a
/// mutex that is never held across an await, and outcomes from a superseded
/// epoch are dropped.
pub struct PortfolioService {
    catalog: CatalogService,
    registry: Arc<dyn ChainRegistry>,
    scheduler: BalanceFetchScheduler,
    config: FetchConfig,
    epochs: EpochManager,
    state: Mutex<CycleState>,
    last_cycle: Mutex<Option<LastCycle>>,
    sender: watch::Sender<PortfolioSnapshot>,
}

impl PortfolioService {
    pub fn new(
        metadata: Arc<dyn TokenMetadataProvider>,
        registry: Arc<dyn ChainRegistry>,
        balances: Arc<dyn BalanceProvider>,
        config: FetchConfig,
    ) -> Self {
        let catalog = CatalogService::new(metadata, config.dedup_policy, config.catalog_ttl);
        Self::with_catalog(catalog, registry, balances, config)
    }

    /// Service backed by the configured LI.FI API and public EVM RPC gateways.
    pub fn from_config(config: &AppConfig) -> Self {
        let lifi = Arc::new(LifiProvider::new(config.api_url.clone()));
        Self::new(
            lifi.clone(),
            lifi,
            Arc::new(EvmRpcBalanceProvider::with_public_endpoints()),
            config.fetch.clone(),
        )
    }

    pub fn with_catalog(
        catalog: CatalogService,
        registry: Arc<dyn ChainRegistry>,
        balances: Arc<dyn BalanceProvider>,
        config: FetchConfig,
    ) -> Self {
        let scheduler = BalanceFetchScheduler::new(balances, &config);
        let (sender, _) = watch::channel(PortfolioSnapshot::default());
        Self {
            catalog,
            registry,
            scheduler,
            epochs: EpochManager::new(),
            state: Mutex::new(CycleState {
                epoch: Epoch::default(),
                engine: AggregationEngine::empty(config.listing_mode),
                progress: ProgressTracker::new(),
                status: CycleStatus::Idle,
                tokens: Vec::new(),
                warnings: Vec::new(),
            }),
            last_cycle: Mutex::new(None),
            sender,
            config,
        }
    }

    /// Live snapshots; the receiver always holds the latest one.
    pub fn subscribe(&self) -> watch::Receiver<PortfolioSnapshot> {
        self.sender.subscribe()
    }

    pub fn snapshot(&self) -> PortfolioSnapshot {
        self.sender.borrow().clone()
    }

    pub fn current_epoch(&self) -> Epoch {
        self.epochs.current()
    }

    /// Drop cached catalogs so the next cycle refetches token metadata.
    pub fn invalidate_catalog(&self) {
        self.catalog.invalidate();
    }

    /// Refresh unless the connected wallets are the same as in the last
    /// loaded cycle and that cycle's catalog is still fresh.
    pub async fn refresh_if_changed(
        &self,
        accounts: &[ConnectedAccount],
    ) -> Result<Option<CycleSummary>> {
        let wallets: BTreeSet<_> = connected_wallets(accounts).into_iter().collect();
        let unchanged = self
            .lock_last_cycle()
            .as_ref()
            .is_some_and(|last| {
                last.wallets == wallets && self.catalog.is_fresh(&last.chain_ids)
            });
        if unchanged {
            debug!("Connected wallets and catalog unchanged, skipping refresh");
            return Ok(None);
        }
        self.refresh(accounts).await.map(Some)
    }

    /// Run one full fetch cycle for the connected accounts.
    ///
    /// Fails only when the token catalog cannot be loaded. Batch failures are
    /// recorded as warnings on the snapshot.
    pub async fn refresh(&self, accounts: &[ConnectedAccount]) -> Result<CycleSummary> {
        let wallets = connected_wallets(accounts);

        // The epoch is taken under the state lock so that cycles install
        // their epochs in the order they were handed out.
        let epoch = {
            let mut state = self.lock_state();
            let epoch = self.epochs.begin();
            state.epoch = epoch;
            state.progress.reset(epoch);
            state.status = CycleStatus::Loading;
            self.publish(&state);
            epoch
        };
        info!(
            "Starting portfolio cycle {} for {} wallets",
            epoch,
            wallets.len()
        );

        let mut ecosystems: Vec<ChainType> = wallets.iter().map(|(ct, _)| *ct).collect();
        ecosystems.sort();
        ecosystems.dedup();
        let chains = self.load_chains(&ecosystems).await;
        let chain_ids: Vec<ChainId> = chains.values().flatten().map(|c| c.id).collect();

        let catalog = match self.catalog.get_catalog(&chain_ids).await {
            Ok(catalog) => catalog,
            Err(e) => {
                error!("Portfolio cycle {} failed: {}", epoch, e);
                let mut state = self.lock_state();
                if self.is_current(&state, epoch) {
                    state.status = CycleStatus::Failed(e.to_string());
                    *self.lock_last_cycle() = None;
                    self.publish(&state);
                }
                return Err(e);
            }
        };

        let plan = self.scheduler.plan(accounts, &chains, &catalog);
        {
            let mut state = self.lock_state();
            if !self.is_current(&state, epoch) {
                return Ok(self.superseded(epoch, plan.len()));
            }
            *self.lock_last_cycle() = Some(LastCycle {
                wallets: wallets.iter().cloned().collect(),
                chain_ids: chain_ids.clone(),
            });
            state.engine = AggregationEngine::new(&catalog, self.config.listing_mode);
            state.tokens = state.engine.view();
            state.warnings.clear();
            state.progress.start(epoch, plan.total_tokens());
            if state.progress.state().is_complete() {
                state.status = CycleStatus::Ready;
            }
            self.publish(&state);
        }

        let report = self
            .scheduler
            .execute(&plan, |unit, outcome| self.commit(epoch, unit, outcome))
            .await;

        let mut state = self.lock_state();
        if !self.is_current(&state, epoch) {
            return Ok(self.superseded(epoch, plan.len()));
        }
        state.status = CycleStatus::Ready;
        self.publish(&state);
        info!(
            "Portfolio cycle {} done: {} batches resolved, {} abandoned, ${:.2} total",
            epoch,
            report.resolved,
            report.abandoned,
            state.engine.total_value_usd()
        );

        Ok(CycleSummary {
            epoch,
            batches: plan.len(),
            resolved: report.resolved,
            abandoned: report.abandoned,
            superseded: false,
        })
    }

    async fn load_chains(&self, ecosystems: &[ChainType]) -> HashMap<ChainType, Vec<Chain>> {
        let mut chains = HashMap::new();
        for chain_type in ecosystems {
            match self.registry.list_chains(*chain_type).await {
                Ok(list) => {
                    chains.insert(*chain_type, list);
                }
                Err(e) => {
                    warn!(
                        "Chain registry {} failed for {}: {}",
                        self.registry.id(),
                        chain_type,
                        e
                    );
                    chains.insert(*chain_type, Vec::new());
                }
            }
        }
        chains
    }

    /// Apply one batch outcome to the running collection.
    fn commit(&self, epoch: Epoch, unit: &BatchUnit, outcome: &BatchOutcome) {
        let mut state = self.lock_state();
        if !self.is_current(&state, epoch) {
            debug!(
                "Dropping stale outcome from cycle {} (chain {}, batch {})",
                epoch, unit.chain_id, unit.lane_index
            );
            return;
        }

        match outcome {
            BatchOutcome::Resolved { balances, .. } => {
                state.engine.merge(balances);
                state.tokens = state.engine.view();
            }
            BatchOutcome::Abandoned(warning) => state.warnings.push(warning.clone()),
        }
        state.progress.advance(epoch, outcome.token_count());
        self.publish(&state);
    }

    fn is_current(&self, state: &CycleState, epoch: Epoch) -> bool {
        state.epoch == epoch && self.epochs.is_current(epoch)
    }

    fn superseded(&self, epoch: Epoch, batches: usize) -> CycleSummary {
        info!("Portfolio cycle {} superseded, results dropped", epoch);
        CycleSummary {
            epoch,
            batches,
            resolved: 0,
            abandoned: 0,
            superseded: true,
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, CycleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_last_cycle(&self) -> MutexGuard<'_, Option<LastCycle>> {
        self.last_cycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &CycleState) {
        self.sender.send_replace(state.snapshot());
    }
}
