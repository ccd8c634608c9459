//! Store, cache, and engine wired together behind one entry point.

use std::sync::Arc;
use std::time::Duration;

use pharma_analytics_core::{
    aggregate, compose_dashboard, AggregateSet, AnalyticsCache, AnalyticsContext, AnalyticsError,
    AnalyticsRequest, AnalyticsResult, CacheError, CancellationToken, DashboardSnapshot, DateRange,
    SaleRecord, SalesStore,
};
use tracing::{debug, info, warn};

use crate::single_flight::SingleFlight;

/// Upper bound for a single cache round trip before it counts as a miss.
const CACHE_OP_TIMEOUT: Duration = Duration::from_millis(500);

/// Serves dashboards from an optional cache, computing them on a miss.
///
/// Cache failures never fail a request: they are logged and treated as a miss.
pub struct DashboardService {
    store: Arc<dyn SalesStore>,
    cache: Option<Arc<dyn AnalyticsCache>>,
    ctx: AnalyticsContext,
    ttl: Duration,
    flights: SingleFlight<DashboardSnapshot>,
}

impl DashboardService {
    #[must_use]
    pub fn new(store: Arc<dyn SalesStore>, ctx: AnalyticsContext) -> Self {
        Self {
            store,
            cache: None,
            ctx,
            ttl: Duration::from_secs(300),
            flights: SingleFlight::new(),
        }
    }

    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn AnalyticsCache>, ttl: Duration) -> Self {
        self.cache = Some(cache);
        self.ttl = ttl;
        self
    }

    #[must_use]
    pub fn context(&self) -> &AnalyticsContext {
        &self.ctx
    }

    /// Dashboard for `request`.
    ///
    /// # Errors
    ///
    /// Returns validation errors, `Store` if records cannot be fetched, and
    /// `Cancelled` if `cancel` fires before the snapshot is complete.
    pub async fn dashboard(
        &self,
        request: &AnalyticsRequest,
        cancel: &CancellationToken,
    ) -> AnalyticsResult<Arc<DashboardSnapshot>> {
        let request = request.validate()?;
        let key = request.cache_key();

        if let Some(hit) = self.cached(&key).await {
            debug!(key = %key, "Dashboard cache hit");
            return Ok(Arc::new(hit));
        }

        self.flights
            .run(&key, cancel, || async {
                // a flight that finished just before this one started may have filled the cache
                if let Some(hit) = self.cached(&key).await {
                    return Ok(hit);
                }
                let snapshot = self.compute(&request, cancel).await?;
                self.store_in_cache(&key, &snapshot).await;
                Ok::<_, AnalyticsError>(snapshot)
            })
            .await
    }

    /// Fetches and aggregates `range` with the request's filters, without caching.
    ///
    /// # Errors
    ///
    /// Returns `Store` if records cannot be fetched and `Cancelled` if
    /// `cancel` fires.
    pub async fn aggregate(
        &self,
        request: &AnalyticsRequest,
        range: &DateRange,
        cancel: &CancellationToken,
    ) -> AnalyticsResult<AggregateSet> {
        let request = request.validate()?;
        let records = self.fetch(&request, range, cancel).await?;
        aggregate(
            &records,
            range,
            request.period,
            &request.dimensions,
            &self.ctx,
            cancel,
        )
    }

    async fn fetch(
        &self,
        request: &AnalyticsRequest,
        range: &DateRange,
        cancel: &CancellationToken,
    ) -> AnalyticsResult<Vec<SaleRecord>> {
        cancel.check()?;
        let query = request.store_query(range, &self.ctx.timezone)?;
        let records = self
            .store
            .fetch(&query)
            .await
            .map_err(|e| AnalyticsError::Store(format!("{e:#}")))?;
        cancel.check()?;
        Ok(records)
    }

    async fn compute(
        &self,
        request: &AnalyticsRequest,
        cancel: &CancellationToken,
    ) -> AnalyticsResult<DashboardSnapshot> {
        let current = self.fetch(request, &request.range, cancel).await?;
        let previous = if request.compare_previous {
            self.fetch(request, &request.range.previous()?, cancel).await?
        } else {
            Vec::new()
        };

        let snapshot = compose_dashboard(&current, &previous, request, &self.ctx, cancel)?;
        info!(
            range = %request.range,
            records = current.len(),
            previous_records = previous.len(),
            "Dashboard computed"
        );
        Ok(snapshot)
    }

    async fn cached(&self, key: &str) -> Option<DashboardSnapshot> {
        let cache = self.cache.as_ref()?;
        let payload = match tokio::time::timeout(CACHE_OP_TIMEOUT, cache.get(key)).await {
            Ok(Ok(payload)) => payload?,
            Ok(Err(e)) => {
                warn!(key, error = %e, "Cache read failed, computing directly");
                return None;
            }
            Err(_) => {
                warn!(key, error = %CacheError::Timeout, "Cache read failed, computing directly");
                return None;
            }
        };

        match serde_json::from_str(&payload) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(key, error = %e, "Discarding unreadable cache entry");
                None
            }
        }
    }

    async fn store_in_cache(&self, key: &str, snapshot: &DashboardSnapshot) {
        let Some(cache) = self.cache.as_ref() else {
            return;
        };
        let payload = match serde_json::to_string(snapshot) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(key, error = %e, "Dashboard could not be serialized for caching");
                return;
            }
        };
        match tokio::time::timeout(CACHE_OP_TIMEOUT, cache.set(key, payload, self.ttl)).await {
            Ok(Ok(())) => debug!(key, ttl_secs = self.ttl.as_secs(), "Dashboard cached"),
            Ok(Err(e)) => warn!(key, error = %e, "Cache write failed"),
            Err(_) => warn!(key, error = %CacheError::Timeout, "Cache write failed"),
        }
    }
}
