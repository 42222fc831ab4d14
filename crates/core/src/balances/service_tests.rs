//! Tests for PortfolioService fetch cycles.
//!
//! # Contract Points
//!
//! 1. Cross-chain positions: balances of one symbol on several chains end up
//!    in one entry whose total is the sum of its per-chain values
//! 2. Batch failures are retried, then abandoned without losing other data
//! 3. Progress only moves forward and ends at its total
//! 4. A newer cycle discards everything a superseded cycle produces
//! 5. A catalog failure is fatal for the cycle but keeps earlier tokens
//! 6. `refresh_if_changed` reruns after a failed or expired catalog

#[cfg(test)]
mod tests {
    use crate::balances::{
        BalanceFetchScheduler, CycleStatus, ListingMode, PortfolioService, ProgressPhase,
        RetryPolicy,
    };
    use crate::cache::ManualClock;
    use crate::catalog::{CatalogService, ConsolidatedToken, DedupPolicy};
    use crate::config::FetchConfig;
    use crate::errors::Error;
    use async_trait::async_trait;
    use chainfolio_chain_data::{
        BalanceProvider, BalancesByChain, Chain, ChainDataError, ChainId, ChainRegistry,
        ChainType, ConnectedAccount, TokenAmount, TokenDescriptor, TokenMetadataProvider,
        TokensByChain,
    };
    use chrono::{TimeZone, Utc};
    use num_bigint::BigUint;
    use std::collections::{HashMap, HashSet, VecDeque};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::sync::Notify;

    // =========================================================================
    // Mock token metadata provider
    // =========================================================================

    struct MockTokens {
        tokens: TokensByChain,
        fail: AtomicBool,
        calls: AtomicUsize,
    }

    impl MockTokens {
        fn new(tokens: TokensByChain) -> Self {
            Self {
                tokens,
                fail: AtomicBool::new(false),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl TokenMetadataProvider for MockTokens {
        fn id(&self) -> &'static str {
            "MOCK_TOKENS"
        }

        async fn get_tokens_for_chains(
            &self,
            chain_ids: &[ChainId],
        ) -> Result<TokensByChain, ChainDataError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(ChainDataError::Http {
                    provider: "MOCK_TOKENS".to_string(),
                    status: 500,
                    message: "internal error".to_string(),
                });
            }
            Ok(self
                .tokens
                .iter()
                .filter(|(chain_id, _)| chain_ids.contains(chain_id))
                .map(|(chain_id, tokens)| (*chain_id, tokens.clone()))
                .collect())
        }
    }

    // =========================================================================
    // Mock chain registry
    // =========================================================================

    struct MockRegistry {
        fail: bool,
    }

    #[async_trait]
    impl ChainRegistry for MockRegistry {
        fn id(&self) -> &'static str {
            "MOCK_CHAINS"
        }

        async fn list_chains(&self, chain_type: ChainType) -> Result<Vec<Chain>, ChainDataError> {
            if self.fail {
                return Err(ChainDataError::Timeout {
                    provider: "MOCK_CHAINS".to_string(),
                });
            }
            if chain_type != ChainType::Evm {
                return Ok(Vec::new());
            }
            Ok([1, 10, 42161]
                .into_iter()
                .map(|id| Chain {
                    id,
                    chain_type,
                    name: format!("chain-{}", id),
                    logo_uri: String::new(),
                    key: String::new(),
                })
                .collect())
        }
    }

    // =========================================================================
    // Mock balance provider
    // =========================================================================

    #[derive(Clone, Copy)]
    enum Failure {
        RateLimited,
        Timeout,
    }

    impl Failure {
        fn error(self) -> ChainDataError {
            match self {
                Failure::RateLimited => ChainDataError::RateLimited {
                    provider: "MOCK_BALANCES".to_string(),
                    status: Some(429),
                },
                Failure::Timeout => ChainDataError::Timeout {
                    provider: "MOCK_BALANCES".to_string(),
                },
            }
        }
    }

    #[derive(Default)]
    struct MockBalances {
        /// (wallet, chain, lowercase address) -> base units
        holdings: Mutex<HashMap<(String, ChainId, String), u64>>,
        /// Failures returned, in order, before a chain succeeds
        scripted: Mutex<HashMap<ChainId, VecDeque<Failure>>>,
        always_fail: Mutex<HashSet<ChainId>>,
        calls: Mutex<HashMap<ChainId, usize>>,
        gated_wallet: Mutex<Option<String>>,
        started: Notify,
        release: Notify,
    }

    impl MockBalances {
        fn hold(&self, wallet: &str, chain_id: ChainId, address: &str, units: u64) {
            self.holdings.lock().unwrap().insert(
                (wallet.to_string(), chain_id, address.to_lowercase()),
                units,
            );
        }

        fn fail_times(&self, chain_id: ChainId, failures: &[Failure]) {
            self.scripted
                .lock()
                .unwrap()
                .insert(chain_id, failures.iter().copied().collect());
        }

        fn fail_always(&self, chain_id: ChainId) {
            self.always_fail.lock().unwrap().insert(chain_id);
        }

        fn gate(&self, wallet: &str) {
            *self.gated_wallet.lock().unwrap() = Some(wallet.to_string());
        }

        fn calls(&self, chain_id: ChainId) -> usize {
            self.calls.lock().unwrap().get(&chain_id).copied().unwrap_or(0)
        }
    }

    #[async_trait]
    impl BalanceProvider for MockBalances {
        fn id(&self) -> &'static str {
            "MOCK_BALANCES"
        }

        async fn get_balances(
            &self,
            wallet: &str,
            tokens_by_chain: &TokensByChain,
        ) -> Result<BalancesByChain, ChainDataError> {
            {
                let mut calls = self.calls.lock().unwrap();
                for chain_id in tokens_by_chain.keys() {
                    *calls.entry(*chain_id).or_default() += 1;
                }
            }

            let gated = self.gated_wallet.lock().unwrap().as_deref() == Some(wallet);
            if gated {
                self.started.notify_one();
                self.release.notified().await;
            }

            for chain_id in tokens_by_chain.keys() {
                let scripted = self
                    .scripted
                    .lock()
                    .unwrap()
                    .get_mut(chain_id)
                    .and_then(VecDeque::pop_front);
                if let Some(failure) = scripted {
                    return Err(failure.error());
                }
                if self.always_fail.lock().unwrap().contains(chain_id) {
                    return Err(Failure::Timeout.error());
                }
            }

            let holdings = self.holdings.lock().unwrap();
            Ok(tokens_by_chain
                .iter()
                .map(|(chain_id, tokens)| {
                    let amounts = tokens
                        .iter()
                        .map(|token| {
                            let key = (wallet.to_string(), *chain_id, token.address.to_lowercase());
                            let units = holdings.get(&key).copied().unwrap_or(0);
                            TokenAmount::new(token.clone(), Some(BigUint::from(units)))
                        })
                        .collect();
                    (*chain_id, amounts)
                })
                .collect())
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn listing(symbol: &str, chain_id: ChainId, address: &str, decimals: u8, price: &str) -> TokenDescriptor {
        TokenDescriptor {
            address: address.to_string(),
            decimals,
            symbol: symbol.to_string(),
            chain_id,
            coin_key: symbol.to_string(),
            name: symbol.to_string(),
            logo_uri: String::new(),
            price_usd: Some(price.to_string()),
        }
    }

    fn tokens(listings: Vec<TokenDescriptor>) -> TokensByChain {
        let mut by_chain = TokensByChain::new();
        for token in listings {
            by_chain.entry(token.chain_id).or_default().push(token);
        }
        by_chain
    }

    fn usdc_catalog() -> TokensByChain {
        tokens(vec![
            listing("USDC", 1, "0xA", 6, "1.00"),
            listing("USDC", 10, "0xB", 6, "1.00"),
            listing("WETH", 42161, "0xC", 18, "2000"),
            listing("ARB", 42161, "0xD", 18, "0.5"),
        ])
    }

    fn config() -> FetchConfig {
        FetchConfig {
            batch_size: 20,
            fetch_delay: Duration::ZERO,
            max_retries: 3,
            ..FetchConfig::default()
        }
    }

    fn service_with(
        metadata: Arc<MockTokens>,
        balances: Arc<MockBalances>,
        config: FetchConfig,
    ) -> PortfolioService {
        PortfolioService::new(
            metadata,
            Arc::new(MockRegistry { fail: false }),
            balances,
            config,
        )
    }

    fn evm(address: &str) -> ConnectedAccount {
        ConnectedAccount::connected(address, ChainType::Evm)
    }

    fn find<'a>(
        tokens: &'a [crate::balances::TokenWithBalance],
        symbol: &str,
    ) -> &'a crate::balances::TokenWithBalance {
        tokens
            .iter()
            .find(|t| t.token.symbol == symbol)
            .unwrap_or_else(|| panic!("{} missing from snapshot", symbol))
    }

    // =========================================================================
    // Cross-chain aggregation
    // =========================================================================

    #[tokio::test]
    async fn test_usdc_on_two_chains_is_one_position() {
        let balances = Arc::new(MockBalances::default());
        balances.hold("0xwallet", 1, "0xa", 100_000_000);
        balances.hold("0xwallet", 10, "0xB", 50_000_000);
        let service = service_with(
            Arc::new(MockTokens::new(usdc_catalog())),
            balances,
            config(),
        );

        let summary = service.refresh(&[evm("0xwallet")]).await.unwrap();
        assert!(!summary.superseded);
        assert_eq!(summary.abandoned, 0);

        let snapshot = service.snapshot();
        assert_eq!(snapshot.status, CycleStatus::Ready);
        assert_eq!(snapshot.tokens[0].token.symbol, "USDC");

        let usdc = find(&snapshot.tokens, "USDC");
        assert_eq!(usdc.balances.len(), 2);
        assert_eq!(usdc.balances[&1].amount, "100000000");
        assert!((usdc.balances[&1].value_usd - 100.0).abs() < 1e-9);
        assert_eq!(usdc.balances[&10].amount, "50000000");
        assert!((usdc.balances[&10].value_usd - 50.0).abs() < 1e-9);
        assert!((usdc.total_value_usd - 150.0).abs() < 1e-9);
        assert_eq!(usdc.network_count, 2);
    }

    #[tokio::test]
    async fn test_eth_listings_on_two_chains_consolidate() {
        let catalog = tokens(vec![
            listing("ETH", 1, "0x0000000000000000000000000000000000000000", 18, "2000"),
            listing("ETH", 10, "0xDeadDeAddeAddEAddeadDEaDDEAdDeaDDeAD0000", 18, "2000"),
        ]);
        let service = service_with(
            Arc::new(MockTokens::new(catalog)),
            Arc::new(MockBalances::default()),
            config(),
        );

        service.refresh(&[evm("0xwallet")]).await.unwrap();

        let snapshot = service.snapshot();
        assert_eq!(snapshot.tokens.len(), 1);
        let eth: &ConsolidatedToken = &snapshot.tokens[0].token;
        assert_eq!(eth.networks.len(), 2);
        assert_ne!(eth.networks[0].address, eth.networks[1].address);
    }

    #[tokio::test]
    async fn test_zero_balances_are_not_stored() {
        let balances = Arc::new(MockBalances::default());
        balances.hold("0xwallet", 42161, "0xC", 0);
        balances.hold("0xwallet", 42161, "0xD", 2_000_000_000_000_000_000);
        let service = service_with(
            Arc::new(MockTokens::new(usdc_catalog())),
            balances,
            config(),
        );

        service.refresh(&[evm("0xwallet")]).await.unwrap();

        let snapshot = service.snapshot();
        let weth = find(&snapshot.tokens, "WETH");
        assert!(weth.balances.is_empty());
        assert_eq!(weth.total_value_usd, 0.0);
        let arb = find(&snapshot.tokens, "ARB");
        assert!((arb.total_value_usd - 1.0).abs() < 1e-9);
        assert!((snapshot.total_value_usd() - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_holdings_only_mode_drops_unheld_tokens() {
        let balances = Arc::new(MockBalances::default());
        balances.hold("0xwallet", 1, "0xA", 1_000_000);
        let service = service_with(
            Arc::new(MockTokens::new(usdc_catalog())),
            balances,
            FetchConfig {
                listing_mode: ListingMode::HoldingsOnly,
                ..config()
            },
        );

        service.refresh(&[evm("0xwallet")]).await.unwrap();

        let symbols: Vec<String> = service
            .snapshot()
            .tokens
            .into_iter()
            .map(|t| t.token.symbol)
            .collect();
        assert_eq!(symbols, vec!["USDC"]);
    }

    #[tokio::test]
    async fn test_symbol_per_chain_policy_is_regrouped_for_display() {
        let balances = Arc::new(MockBalances::default());
        balances.hold("0xwallet", 1, "0xA", 1_000_000);
        balances.hold("0xwallet", 10, "0xB", 2_000_000);
        let service = service_with(
            Arc::new(MockTokens::new(usdc_catalog())),
            balances,
            FetchConfig {
                dedup_policy: DedupPolicy::SymbolPerChain,
                ..config()
            },
        );

        service.refresh(&[evm("0xwallet")]).await.unwrap();

        let snapshot = service.snapshot();
        let usdc = find(&snapshot.tokens, "USDC");
        assert_eq!(usdc.token.id, "USDC-1");
        assert_eq!(usdc.network_count, 2);
        assert!((usdc.total_value_usd - 3.0).abs() < 1e-9);
    }

    // =========================================================================
    // Retries and failures
    // =========================================================================

    #[tokio::test]
    async fn test_rate_limited_batch_recovers_and_counts_once() {
        let balances = Arc::new(MockBalances::default());
        balances.hold("0xwallet", 42161, "0xC", 1_000_000_000_000_000_000);
        balances.fail_times(42161, &[Failure::RateLimited, Failure::RateLimited]);
        let metadata = Arc::new(MockTokens::new(usdc_catalog()));
        let service = service_with(metadata.clone(), balances.clone(), config());

        let summary = service.refresh(&[evm("0xwallet")]).await.unwrap();

        assert_eq!(balances.calls(42161), 3);
        assert_eq!(summary.abandoned, 0);
        let snapshot = service.snapshot();
        assert!(snapshot.warnings.is_empty());
        let weth = find(&snapshot.tokens, "WETH");
        assert!((weth.balances[&42161].value_usd - 2000.0).abs() < 1e-9);
        assert_eq!(snapshot.progress.total, 4);
        assert_eq!(snapshot.progress.processed, 4);

        // One terminal outcome for the flaky unit, regardless of failed attempts.
        balances.fail_times(42161, &[Failure::RateLimited, Failure::RateLimited]);
        let scheduler = BalanceFetchScheduler::new(balances.clone(), &config());
        let catalog = CatalogService::new(metadata, DedupPolicy::Symbol, Duration::from_secs(60))
            .get_catalog(&[42161])
            .await
            .unwrap();
        let mut chains = HashMap::new();
        chains.insert(
            ChainType::Evm,
            MockRegistry { fail: false }
                .list_chains(ChainType::Evm)
                .await
                .unwrap(),
        );
        let plan = scheduler.plan(&[evm("0xwallet")], &chains, &catalog);
        let outcomes = Mutex::new(Vec::new());
        scheduler
            .execute(&plan, |unit, outcome| {
                outcomes
                    .lock()
                    .unwrap()
                    .push((unit.chain_id, outcome.token_count()));
            })
            .await;
        assert_eq!(outcomes.into_inner().unwrap(), vec![(42161, 2)]);
    }

    #[tokio::test]
    async fn test_always_failing_batch_is_abandoned_after_r_plus_one_attempts() {
        let balances = Arc::new(MockBalances::default());
        balances.hold("0xwallet", 1, "0xA", 7_000_000);
        balances.fail_always(42161);
        let service = service_with(
            Arc::new(MockTokens::new(usdc_catalog())),
            balances.clone(),
            config(),
        );

        let summary = service.refresh(&[evm("0xwallet")]).await.unwrap();

        assert_eq!(balances.calls(42161), 4);
        assert_eq!(summary.abandoned, 1);
        let snapshot = service.snapshot();
        assert_eq!(snapshot.status, CycleStatus::Ready);
        assert_eq!(snapshot.warnings.len(), 1);
        assert_eq!(snapshot.warnings[0].chain_id, 42161);
        assert_eq!(snapshot.warnings[0].token_count, 2);
        assert_eq!(snapshot.warnings[0].attempts, 4);
        assert_eq!(snapshot.progress.processed, snapshot.progress.total);
        assert_eq!(snapshot.progress.phase, ProgressPhase::Complete);
        assert!((find(&snapshot.tokens, "USDC").total_value_usd - 7.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_custom_retry_policy_is_used() {
        let balances = Arc::new(MockBalances::default());
        balances.fail_always(1);
        let scheduler = BalanceFetchScheduler::new(balances.clone(), &config())
            .with_retry_policy(RetryPolicy::for_chain_data(0, Duration::ZERO));
        let catalog = vec![ConsolidatedToken {
            id: "USDC".to_string(),
            sort_key: "usdc".to_string(),
            symbol: "USDC".to_string(),
            name: String::new(),
            decimals: 6,
            logo_uri: String::new(),
            price_usd: None,
            coin_key: String::new(),
            networks: vec![crate::catalog::NetworkEntry::new(1, "0xA")],
        }];
        let mut chains = HashMap::new();
        chains.insert(
            ChainType::Evm,
            MockRegistry { fail: false }
                .list_chains(ChainType::Evm)
                .await
                .unwrap(),
        );

        let plan = scheduler.plan(&[evm("0xwallet")], &chains, &catalog);
        let report = scheduler.execute(&plan, |_, _| {}).await;

        assert_eq!(report.abandoned, 1);
        assert_eq!(balances.calls(1), 1);
    }

    #[tokio::test]
    async fn test_catalog_failure_is_fatal_and_keeps_previous_tokens() {
        let balances = Arc::new(MockBalances::default());
        balances.hold("0xwallet", 1, "0xA", 1_000_000);
        let metadata = Arc::new(MockTokens::new(usdc_catalog()));
        let service = service_with(metadata.clone(), balances, config());

        service.refresh(&[evm("0xwallet")]).await.unwrap();
        let before = service.snapshot().tokens;
        assert!(!before.is_empty());

        metadata.fail.store(true, Ordering::SeqCst);
        service.invalidate_catalog();
        let err = service.refresh(&[evm("0xwallet")]).await.unwrap_err();

        assert!(matches!(err, Error::Catalog(_)));
        let snapshot = service.snapshot();
        assert!(matches!(snapshot.status, CycleStatus::Failed(_)));
        assert_eq!(snapshot.tokens, before);
    }

    #[tokio::test]
    async fn test_chain_registry_failure_yields_empty_cycle() {
        let service = PortfolioService::new(
            Arc::new(MockTokens::new(usdc_catalog())),
            Arc::new(MockRegistry { fail: true }),
            Arc::new(MockBalances::default()),
            config(),
        );

        let summary = service.refresh(&[evm("0xwallet")]).await.unwrap();

        assert_eq!(summary.batches, 0);
        let snapshot = service.snapshot();
        assert_eq!(snapshot.status, CycleStatus::Ready);
        assert_eq!(snapshot.progress.phase, ProgressPhase::Complete);
        assert_eq!(snapshot.progress.percentage, 100);
    }

    // =========================================================================
    // Progress and epochs
    // =========================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_progress_is_monotonic() {
        let catalog = tokens(
            (0..45)
                .map(|i: u64| {
                    let chain_id = if i % 2 == 0 { 1 } else { 10 };
                    listing(&format!("T{}", i), chain_id, &format!("0x{:02x}", i), 6, "1")
                })
                .collect(),
        );
        let balances = Arc::new(MockBalances::default());
        balances.fail_times(10, &[Failure::Timeout]);
        let service = Arc::new(service_with(
            Arc::new(MockTokens::new(catalog)),
            balances,
            FetchConfig {
                batch_size: 4,
                ..config()
            },
        ));

        let mut rx = service.subscribe();
        let collector = tokio::spawn(async move {
            let mut seen = Vec::new();
            while rx.changed().await.is_ok() {
                let snapshot = rx.borrow_and_update().clone();
                seen.push(snapshot.progress.clone());
                if snapshot.status == CycleStatus::Ready {
                    break;
                }
            }
            seen
        });

        service.refresh(&[evm("0xwallet")]).await.unwrap();
        let seen = tokio::time::timeout(Duration::from_secs(5), collector)
            .await
            .unwrap()
            .unwrap();

        let fetching: Vec<_> = seen.iter().filter(|p| p.phase != ProgressPhase::Idle).collect();
        assert!(!fetching.is_empty());
        for pair in fetching.windows(2) {
            assert!(pair[0].processed <= pair[1].processed);
            assert_eq!(pair[0].total, pair[1].total);
        }
        for progress in &fetching {
            assert!(progress.processed <= progress.total);
        }

        let last = service.snapshot().progress;
        assert_eq!(last.total, 45);
        assert_eq!(last.processed, 45);
        assert_eq!(last.percentage, 100);
    }

    #[tokio::test]
    async fn test_superseded_cycle_results_are_discarded() {
        let balances = Arc::new(MockBalances::default());
        balances.hold("0xslow", 1, "0xA", 999_000_000);
        balances.hold("0xfast", 1, "0xA", 5_000_000);
        balances.gate("0xslow");
        let service = Arc::new(service_with(
            Arc::new(MockTokens::new(tokens(vec![listing("USDC", 1, "0xA", 6, "1")]))),
            balances.clone(),
            config(),
        ));

        let slow = tokio::spawn({
            let service = service.clone();
            async move { service.refresh(&[evm("0xslow")]).await }
        });
        balances.started.notified().await;

        let fast = service.refresh(&[evm("0xfast")]).await.unwrap();
        balances.release.notify_one();
        let slow = slow.await.unwrap().unwrap();

        assert!(slow.superseded);
        assert!(!fast.superseded);
        assert!(fast.epoch > slow.epoch);

        let snapshot = service.snapshot();
        assert_eq!(snapshot.epoch, fast.epoch);
        assert_eq!(snapshot.status, CycleStatus::Ready);
        let usdc = find(&snapshot.tokens, "USDC");
        assert_eq!(usdc.balances[&1].amount, "5000000");
        assert!((usdc.total_value_usd - 5.0).abs() < 1e-9);
        assert_eq!(snapshot.progress.total, 1);
        assert_eq!(snapshot.progress.processed, 1);
    }

    #[tokio::test]
    async fn test_refresh_if_changed_skips_same_wallets() {
        let metadata = Arc::new(MockTokens::new(usdc_catalog()));
        let balances = Arc::new(MockBalances::default());
        let service = service_with(metadata, balances.clone(), config());

        let first = service.refresh_if_changed(&[evm("0xwallet")]).await.unwrap();
        assert!(first.is_some());
        let calls_after_first = balances.calls(1);

        let again = service
            .refresh_if_changed(&[evm("0xwallet"), evm("0xwallet")])
            .await
            .unwrap();
        assert!(again.is_none());
        assert_eq!(balances.calls(1), calls_after_first);

        let changed = service
            .refresh_if_changed(&[evm("0xwallet"), evm("0xother")])
            .await
            .unwrap();
        assert!(changed.is_some());
        assert!(balances.calls(1) > calls_after_first);
    }

    #[tokio::test]
    async fn test_catalog_is_cached_between_cycles() {
        let metadata = Arc::new(MockTokens::new(usdc_catalog()));
        let service = service_with(metadata.clone(), Arc::new(MockBalances::default()), config());

        service.refresh(&[evm("0xwallet")]).await.unwrap();
        service.refresh(&[evm("0xwallet")]).await.unwrap();
        assert_eq!(metadata.calls.load(Ordering::SeqCst), 1);

        service.invalidate_catalog();
        service.refresh(&[evm("0xwallet")]).await.unwrap();
        assert_eq!(metadata.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_refresh_if_changed_retries_after_catalog_failure() {
        let balances = Arc::new(MockBalances::default());
        balances.hold("0xwallet", 1, "0xA", 1_000_000);
        let metadata = Arc::new(MockTokens::new(usdc_catalog()));
        metadata.fail.store(true, Ordering::SeqCst);
        let service = service_with(metadata.clone(), balances, config());

        let err = service
            .refresh_if_changed(&[evm("0xwallet")])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Catalog(_)));
        assert!(matches!(service.snapshot().status, CycleStatus::Failed(_)));

        metadata.fail.store(false, Ordering::SeqCst);
        let retried = service
            .refresh_if_changed(&[evm("0xwallet")])
            .await
            .unwrap();

        assert!(retried.is_some());
        let snapshot = service.snapshot();
        assert_eq!(snapshot.status, CycleStatus::Ready);
        assert!((find(&snapshot.tokens, "USDC").total_value_usd - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_refresh_if_changed_reloads_expired_catalog() {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        ));
        let metadata = Arc::new(MockTokens::new(usdc_catalog()));
        let catalog = CatalogService::with_clock(
            metadata.clone(),
            DedupPolicy::Symbol,
            Duration::from_secs(3600),
            clock.clone(),
        );
        let service = PortfolioService::with_catalog(
            catalog,
            Arc::new(MockRegistry { fail: false }),
            Arc::new(MockBalances::default()),
            config(),
        );
        let wallets = [evm("0xwallet")];

        assert!(service.refresh_if_changed(&wallets).await.unwrap().is_some());
        assert!(service.refresh_if_changed(&wallets).await.unwrap().is_none());
        assert_eq!(metadata.calls.load(Ordering::SeqCst), 1);

        clock.advance(chrono::Duration::hours(2));
        assert!(service.refresh_if_changed(&wallets).await.unwrap().is_some());
        assert_eq!(metadata.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_refreshes_settle_on_newest_cycle() {
        let balances = Arc::new(MockBalances::default());
        balances.hold("0xwallet", 1, "0xA", 1_000_000);
        let service = Arc::new(service_with(
            Arc::new(MockTokens::new(usdc_catalog())),
            balances,
            config(),
        ));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let service = service.clone();
                tokio::spawn(async move { service.refresh(&[evm("0xwallet")]).await })
            })
            .collect();
        let mut summaries = Vec::new();
        for handle in handles {
            summaries.push(handle.await.unwrap().unwrap());
        }

        let newest = summaries
            .iter()
            .max_by_key(|summary| summary.epoch.0)
            .unwrap();
        assert!(!newest.superseded);
        assert_eq!(newest.epoch, service.current_epoch());

        let snapshot = service.snapshot();
        assert_eq!(snapshot.epoch, service.current_epoch());
        assert_eq!(snapshot.status, CycleStatus::Ready);
        assert_eq!(snapshot.progress.percentage, 100);
    }

    #[tokio::test]
    async fn test_from_config_starts_idle() {
        let config = crate::config::AppConfig {
            api_url: "https://li.quest/v1".to_string(),
            fetch: config(),
        };
        let service = PortfolioService::from_config(&config);

        let snapshot = service.snapshot();
        assert_eq!(snapshot.status, CycleStatus::Idle);
        assert!(snapshot.tokens.is_empty());
        assert_eq!(service.current_epoch(), crate::balances::Epoch(0));
    }
}
