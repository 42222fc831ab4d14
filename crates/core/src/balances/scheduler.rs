//! Balance fetch scheduling.
//!
//! Work is split into (wallet, chain, batch) units. Every unit is an
//! independent future; all of them are awaited together on the calling
//! task. Batches of the same (wallet, chain) lane are staggered by the
//! configured delay so one RPC endpoint is not hit with a burst.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use chainfolio_chain_data::{
    BalanceProvider, BalancesByChain, Chain, ChainDataError, ChainId, ChainType, ConnectedAccount,
    TokenDescriptor, TokensByChain,
};

use super::retry::RetryPolicy;
use crate::catalog::ConsolidatedToken;
use crate::config::FetchConfig;

/// One batch request: up to `batch_size` tokens of one chain for one wallet.
#[derive(Clone, Debug, PartialEq)]
pub struct BatchUnit {
    pub wallet: String,
    pub chain_type: ChainType,
    pub chain_id: ChainId,
    /// Position of this batch within its (wallet, chain) lane.
    pub lane_index: usize,
    pub tokens: Vec<TokenDescriptor>,
}

impl BatchUnit {
    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    fn request(&self) -> TokensByChain {
        let mut request = TokensByChain::new();
        request.insert(self.chain_id, self.tokens.clone());
        request
    }
}

/// All units of one fetch cycle.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FetchPlan {
    pub units: Vec<BatchUnit>,
}

impl FetchPlan {
    /// Sum of token counts over every unit; the cycle's progress total.
    pub fn total_tokens(&self) -> usize {
        self.units.iter().map(BatchUnit::token_count).sum()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// A batch that was given up on after exhausting its retries.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchWarning {
    pub wallet: String,
    pub chain_id: ChainId,
    pub token_count: usize,
    pub attempts: u32,
    pub message: String,
}

/// Terminal outcome of one unit.
#[derive(Clone, Debug, PartialEq)]
pub enum BatchOutcome {
    Resolved {
        balances: BalancesByChain,
        token_count: usize,
        attempts: u32,
    },
    Abandoned(BatchWarning),
}

impl BatchOutcome {
    pub fn token_count(&self) -> usize {
        match self {
            BatchOutcome::Resolved { token_count, .. } => *token_count,
            BatchOutcome::Abandoned(warning) => warning.token_count,
        }
    }
}

/// Aggregate result of executing a plan.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FetchReport {
    pub resolved: usize,
    pub abandoned: usize,
    pub tokens_processed: usize,
    pub warnings: Vec<BatchWarning>,
}

pub struct BalanceFetchScheduler {
    provider: Arc<dyn BalanceProvider>,
    retry: RetryPolicy<ChainDataError>,
    batch_size: usize,
    fetch_delay: Duration,
}

impl BalanceFetchScheduler {
    pub fn new(provider: Arc<dyn BalanceProvider>, config: &FetchConfig) -> Self {
        Self {
            provider,
            retry: RetryPolicy::for_chain_data(config.max_retries, config.fetch_delay),
            batch_size: config.batch_size.max(1),
            fetch_delay: config.fetch_delay,
        }
    }

    /// Replace the default retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy<ChainDataError>) -> Self {
        self.retry = retry;
        self
    }

    /// Partition the work for the connected wallets.
    ///
    /// Each wallet is paired with the chains of its ecosystem; every network
    /// entry of a catalog token on that chain is queried.
    pub fn plan(
        &self,
        accounts: &[ConnectedAccount],
        chains: &HashMap<ChainType, Vec<Chain>>,
        catalog: &[ConsolidatedToken],
    ) -> FetchPlan {
        let tokens_by_chain = tokens_by_chain(catalog);
        let mut units = Vec::new();

        for (chain_type, wallet) in connected_wallets(accounts) {
            let Some(ecosystem_chains) = chains.get(&chain_type) else {
                debug!("No chains known for {} wallet {}", chain_type, wallet);
                continue;
            };

            for chain in ecosystem_chains {
                let Some(tokens) = tokens_by_chain.get(&chain.id) else {
                    continue;
                };
                for (lane_index, batch) in tokens.chunks(self.batch_size).enumerate() {
                    units.push(BatchUnit {
                        wallet: wallet.clone(),
                        chain_type,
                        chain_id: chain.id,
                        lane_index,
                        tokens: batch.to_vec(),
                    });
                }
            }
        }

        let plan = FetchPlan { units };
        info!(
            "Planned {} balance batches covering {} tokens",
            plan.len(),
            plan.total_tokens()
        );
        plan
    }

    /// Run every unit of `plan`, calling `on_outcome` exactly once per unit.
    ///
    /// Failures are absorbed: a unit that exhausts its retries is reported as
    /// [`BatchOutcome::Abandoned`] and the others carry on.
    pub async fn execute<F>(&self, plan: &FetchPlan, on_outcome: F) -> FetchReport
    where
        F: Fn(&BatchUnit, &BatchOutcome) + Sync,
    {
        let on_outcome = &on_outcome;
        let outcomes = join_all(plan.units.iter().map(|unit| async move {
            let outcome = self.run_unit(unit).await;
            on_outcome(unit, &outcome);
            outcome
        }))
        .await;

        let mut report = FetchReport::default();
        for outcome in outcomes {
            report.tokens_processed += outcome.token_count();
            match outcome {
                BatchOutcome::Resolved { .. } => report.resolved += 1,
                BatchOutcome::Abandoned(warning) => {
                    report.abandoned += 1;
                    report.warnings.push(warning);
                }
            }
        }
        report
    }

    async fn run_unit(&self, unit: &BatchUnit) -> BatchOutcome {
        let stagger = self
            .fetch_delay
            .saturating_mul(u32::try_from(unit.lane_index).unwrap_or(u32::MAX));
        if !stagger.is_zero() {
            tokio::time::sleep(stagger).await;
        }

        let request = unit.request();
        let mut attempts = 0;
        let result = self
            .retry
            .run(|attempt| {
                attempts = attempt;
                self.provider.get_balances(&unit.wallet, &request)
            })
            .await;

        match result {
            Ok(balances) => BatchOutcome::Resolved {
                balances,
                token_count: unit.token_count(),
                attempts,
            },
            Err(exhausted) => {
                warn!(
                    "Abandoning batch {} for chain {} of {} after {} attempts: {}",
                    unit.lane_index,
                    unit.chain_id,
                    unit.wallet,
                    exhausted.attempts,
                    exhausted.last_error
                );
                BatchOutcome::Abandoned(BatchWarning {
                    wallet: unit.wallet.clone(),
                    chain_id: unit.chain_id,
                    token_count: unit.token_count(),
                    attempts: exhausted.attempts,
                    message: exhausted.last_error.to_string(),
                })
            }
        }
    }
}

/// Connected wallets as (ecosystem, address), first occurrence order.
pub(crate) fn connected_wallets(accounts: &[ConnectedAccount]) -> Vec<(ChainType, String)> {
    let mut seen = HashSet::new();
    accounts
        .iter()
        .filter_map(|account| {
            let address = account.active_address()?;
            Some((account.chain_type, address.to_string()))
        })
        .filter(|wallet| seen.insert(wallet.clone()))
        .collect()
}

fn tokens_by_chain(catalog: &[ConsolidatedToken]) -> BTreeMap<ChainId, Vec<TokenDescriptor>> {
    let mut by_chain: BTreeMap<ChainId, Vec<TokenDescriptor>> = BTreeMap::new();
    for token in catalog {
        for network in &token.networks {
            by_chain
                .entry(network.chain_id)
                .or_default()
                .push(token.descriptor_for(network));
        }
    }
    by_chain
}
