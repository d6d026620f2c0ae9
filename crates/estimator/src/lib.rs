mod fallback;
mod gemini;

use std::future::Future;

use carbon_core::{
    build_estimation_prompt, first_numeral, EstimateSource, FallbackReason, FootprintEstimate,
    Item,
};
use thiserror::Error;
use tracing::{debug, instrument, warn};

pub use fallback::{fallback_footprint, DEFAULT_ESTIMATED_CARBON_KG, TRANSPORT_KG_CO2_PER_KM};
pub use gemini::{
    extract_candidate_text, GeminiConfig, GeminiProvider, DEFAULT_ESTIMATOR_TIMEOUT,
    DEFAULT_GEMINI_ENDPOINT,
};

#[derive(Debug, Error)]
pub enum EstimatorError {
    #[error("invalid estimator endpoint {endpoint}: {source}")]
    InvalidEndpoint {
        endpoint: String,
        #[source]
        source: url::ParseError,
    },
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("estimator request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("estimator returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("estimator response malformed: {0}")]
    MalformedResponse(&'static str),
    #[error("estimator answer contained no numeral")]
    NoNumeral,
}

impl EstimatorError {
    pub fn fallback_reason(&self) -> FallbackReason {
        match self {
            Self::Status { .. } => FallbackReason::Status,
            Self::MalformedResponse(_) => FallbackReason::MalformedResponse,
            Self::NoNumeral => FallbackReason::NoNumeral,
            Self::InvalidEndpoint { .. } | Self::Client(_) | Self::Transport(_) => {
                FallbackReason::Transport
            }
        }
    }
}

/// A remote service that answers an estimation prompt with free text.
pub trait EstimationProvider: Send + Sync {
    fn name(&self) -> &'static str;

    fn generate(&self, prompt: &str)
        -> impl Future<Output = Result<String, EstimatorError>> + Send;
}

/// Produces a footprint for every item, remote when possible.
///
/// With no provider configured the deterministic fallback is used directly.
/// With a provider, one call is made per item; any failure along the way
/// (transport, status, shape, or an answer without a number) resolves to the
/// same fallback value. Failures are logged, never returned.
#[derive(Debug, Clone)]
pub struct FootprintEstimator<P> {
    provider: Option<P>,
}

impl<P> FootprintEstimator<P>
where
    P: EstimationProvider,
{
    pub fn new(provider: Option<P>) -> Self {
        Self { provider }
    }

    pub fn fallback_only() -> Self {
        Self { provider: None }
    }

    pub fn key_present(&self) -> bool {
        self.provider.is_some()
    }

    #[instrument(skip_all, fields(item = item.name.as_deref().unwrap_or("unknown")))]
    pub async fn estimate(&self, item: &Item, distance_km: Option<f64>) -> FootprintEstimate {
        let Some(provider) = self.provider.as_ref() else {
            debug!("no estimator credential configured");
            return fallback(item, distance_km, FallbackReason::NoCredential);
        };

        match remote_estimate(provider, item, distance_km).await {
            Ok(value) => FootprintEstimate {
                value,
                source: EstimateSource::Remote,
            },
            Err(error) => {
                let reason = error.fallback_reason();
                warn!(
                    provider = provider.name(),
                    reason = reason.as_str(),
                    error = %error,
                    "remote estimate failed; using fallback"
                );
                fallback(item, distance_km, reason)
            }
        }
    }
}

async fn remote_estimate<P>(
    provider: &P,
    item: &Item,
    distance_km: Option<f64>,
) -> Result<f64, EstimatorError>
where
    P: EstimationProvider,
{
    let prompt = build_estimation_prompt(item, distance_km);
    let answer = provider.generate(&prompt).await?;
    first_numeral(&answer).ok_or(EstimatorError::NoNumeral)
}

fn fallback(item: &Item, distance_km: Option<f64>, reason: FallbackReason) -> FootprintEstimate {
    FootprintEstimate {
        value: fallback_footprint(item, distance_km),
        source: EstimateSource::Fallback(reason),
    }
}
