use crate::api_client::{build_async_client, truncate_for_log};
use crate::config::ServiceSettings;
use crate::models::{
    AnalysisRequest, AnalysisResponse, BacktestResult, MonteCarloRequest, MonteCarloResult,
    StrategyRequest,
};
use crate::retry::{retry_with_backoff, RetryPolicy};
use anyhow::Result;
use async_trait::async_trait;
use log::debug;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

pub const BACKTEST_PATH: &str = "/backtest";
pub const MONTE_CARLO_PATH: &str = "/monte-carlo";
pub const ANALYSIS_PATH: &str = "/monte-carlo-analysis";

const MAX_ERROR_BODY_CHARS: usize = 500;

/// The three remote stages of the strategy service.
#[async_trait]
pub trait StrategyService: Send + Sync {
    async fn backtest(&self, request: &StrategyRequest) -> Result<BacktestResult>;

    async fn monte_carlo(&self, request: &MonteCarloRequest) -> Result<MonteCarloResult>;

    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResponse>;
}

#[async_trait]
impl<T: StrategyService + ?Sized> StrategyService for Arc<T> {
    async fn backtest(&self, request: &StrategyRequest) -> Result<BacktestResult> {
        (**self).backtest(request).await
    }

    async fn monte_carlo(&self, request: &MonteCarloRequest) -> Result<MonteCarloResult> {
        (**self).monte_carlo(request).await
    }

    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResponse> {
        (**self).analyze(request).await
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{endpoint} request failed")]
    Transport {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{endpoint} returned {status}: {detail}")]
    Status {
        endpoint: &'static str,
        status: StatusCode,
        detail: String,
    },
    #[error("{endpoint} returned an unreadable response")]
    Decode {
        endpoint: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl ServiceError {
    /// Connection problems and gateway errors are worth another attempt; anything the
    /// service answered deliberately is not.
    pub fn is_transient(&self) -> bool {
        match self {
            ServiceError::Transport { source, .. } => source.is_connect() || source.is_timeout(),
            ServiceError::Status { status, .. } => matches!(
                *status,
                StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT
            ),
            ServiceError::Decode { .. } => false,
        }
    }
}

/// Pull a readable message out of an error body: the `detail` field when the service
/// sent one, else the (truncated) body itself.
pub fn error_detail(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        match value.get("detail") {
            Some(Value::String(detail)) => return detail.clone(),
            Some(detail) if !detail.is_null() => return detail.to_string(),
            _ => {}
        }
    }
    let truncated = truncate_for_log(body, MAX_ERROR_BODY_CHARS);
    if truncated.is_empty() {
        "empty response body".to_string()
    } else {
        truncated
    }
}

pub struct HttpStrategyService {
    http: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl HttpStrategyService {
    pub fn new(settings: &ServiceSettings) -> Result<Self> {
        Ok(Self {
            http: build_async_client(settings.connect_timeout)?,
            base_url: settings.api_base_url.trim_end_matches('/').to_string(),
            retry: settings.retry,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<B, T>(&self, endpoint: &'static str, path: &str, body: &B) -> Result<T, ServiceError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let url = url.as_str();
        retry_with_backoff(
            &self.retry,
            endpoint,
            move || self.post_once(endpoint, url, body),
            ServiceError::is_transient,
        )
        .await
    }

    async fn post_once<B, T>(&self, endpoint: &'static str, url: &str, body: &B) -> Result<T, ServiceError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        debug!("POST {}", url);
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|source| ServiceError::Transport { endpoint, source })?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|source| ServiceError::Transport { endpoint, source })?;

        if !status.is_success() {
            return Err(ServiceError::Status {
                endpoint,
                status,
                detail: error_detail(&text),
            });
        }
        serde_json::from_str(&text).map_err(|source| ServiceError::Decode { endpoint, source })
    }
}

#[async_trait]
impl StrategyService for HttpStrategyService {
    async fn backtest(&self, request: &StrategyRequest) -> Result<BacktestResult> {
        Ok(self.post("backtest", BACKTEST_PATH, request).await?)
    }

    async fn monte_carlo(&self, request: &MonteCarloRequest) -> Result<MonteCarloResult> {
        Ok(self.post("monte-carlo", MONTE_CARLO_PATH, request).await?)
    }

    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResponse> {
        Ok(self.post("monte-carlo-analysis", ANALYSIS_PATH, request).await?)
    }
}
