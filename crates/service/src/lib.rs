use std::sync::Arc;
use std::time::Instant;

use carbon_core::{
    haversine_km, round_km, Coordinate, EstimateSource, Gazetteer, Item, RecalculationRequest,
    RecalculationResponse, RecalculationResult,
};
use carbon_estimator::{EstimationProvider, FootprintEstimator};
use carbon_observability::AppMetrics;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Resolves distances and footprints for a basket.
///
/// Items are estimated in input order. `concurrency` caps how many item
/// estimations are in flight at once; the default of 1 processes items
/// strictly one after another. Results always come back in input order.
#[derive(Clone)]
pub struct RecalculationService<P> {
    gazetteer: Arc<Gazetteer>,
    estimator: FootprintEstimator<P>,
    metrics: Arc<AppMetrics>,
    concurrency: usize,
}

impl<P> RecalculationService<P>
where
    P: EstimationProvider,
{
    pub fn new(
        gazetteer: Arc<Gazetteer>,
        estimator: FootprintEstimator<P>,
        metrics: Arc<AppMetrics>,
    ) -> Self {
        Self {
            gazetteer,
            estimator,
            metrics,
            concurrency: 1,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn gazetteer(&self) -> &Gazetteer {
        &self.gazetteer
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn estimator_key_present(&self) -> bool {
        self.estimator.key_present()
    }

    /// Rounded kilometres between two pincodes, if both are known.
    pub fn distance_between(&self, from: &str, to: &str) -> Option<f64> {
        let from = self.gazetteer.lookup(from)?;
        let to = self.gazetteer.lookup(to)?;
        Some(round_km(haversine_km(from, to)))
    }

    #[instrument(
        skip(self, request),
        fields(
            recalculation_id = %Uuid::new_v4(),
            user_pincode = %request.pincode,
            items = request.items.len()
        )
    )]
    pub async fn recalculate(&self, request: RecalculationRequest) -> RecalculationResponse {
        let started = Instant::now();
        self.metrics.inc_request();
        self.metrics.add_items(request.items.len());

        let RecalculationRequest { pincode, items } = request;
        let user_coordinate = self.gazetteer.lookup(&pincode);
        if user_coordinate.is_none() {
            debug!("user pincode not in gazetteer; distances will be absent");
        }

        let pending = items
            .into_iter()
            .map(|item| self.recalculate_item(item, &pincode, user_coordinate))
            .collect::<Vec<_>>();
        let results = stream::iter(pending)
            .buffered(self.concurrency)
            .collect::<Vec<_>>()
            .await;

        let fallbacks = results
            .iter()
            .filter(|result| result.estimate_source.is_fallback())
            .count();
        let elapsed = started.elapsed();
        self.metrics.observe_latency(elapsed);
        info!(
            results = results.len(),
            fallbacks,
            latency_ms = elapsed.as_millis() as u64,
            "recalculation handled"
        );

        RecalculationResponse {
            success: true,
            user_pincode: pincode,
            results,
            gemini_key_present: self.estimator.key_present(),
        }
    }

    async fn recalculate_item(
        &self,
        item: Item,
        user_pincode: &str,
        user_coordinate: Option<Coordinate>,
    ) -> RecalculationResult {
        let source_pincode = item.resolved_pincode().map(str::to_string);
        let source_coordinate = source_pincode
            .as_deref()
            .and_then(|code| self.gazetteer.lookup(code));

        let distance_km = match (user_coordinate, source_coordinate) {
            (Some(user), Some(source)) => Some(round_km(haversine_km(user, source))),
            _ => {
                self.metrics.inc_unresolved_distance();
                None
            }
        };

        let estimate = self.estimator.estimate(&item, distance_km).await;
        match estimate.source {
            EstimateSource::Remote => self.metrics.inc_remote_estimate(),
            EstimateSource::Fallback(_) => self.metrics.inc_fallback(),
        }

        RecalculationResult {
            name: item.name.clone(),
            original: item.original(),
            distance_km,
            carbon_footprint: estimate.value,
            source_pincode,
            user_pincode: user_pincode.to_string(),
            estimate_source: estimate.source,
        }
    }
}
