//! Broker session gateway client.
//!
//! Implements [`BrokerSession`] over the broker's REST session gateway. The
//! gateway holds the vendor SDK session; this client only carries its token.
//!
//! Kbar requests mirror the SDK's callback delivery: the request runs on a
//! spawned task and the callback fires when the response arrives. A failed
//! request still fires the callback, with an empty series.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::RwLock;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

use super::api_types::{
    ActivateCaRequest, GatewayErrorResponse, KbarsRequest, LoginRequest, LoginResponse,
    ScannerRequest,
};
use crate::application::ports::{
    BrokerError, BrokerPosition, BrokerSession, KbarCallback, SessionUsage,
};
use crate::domain::bars::KbarSeries;
use crate::domain::market::{ScannerItem, ScannerType};
use crate::infrastructure::config::{BrokerSettings, Environment};

/// Failure talking to the gateway, before mapping to a port error.
#[derive(Debug)]
enum GatewayError {
    Transport(String),
    Status { status: StatusCode, message: String },
    Decode(String),
}

impl From<GatewayError> for BrokerError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Transport(message) => Self::ConnectionError { message },
            GatewayError::Status {
                status: StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN,
                ..
            } => Self::NotLoggedIn,
            GatewayError::Status { status, message } => Self::Unknown {
                message: format!("{}: {message}", status.as_u16()),
            },
            GatewayError::Decode(message) => Self::Unknown {
                message: format!("invalid gateway response: {message}"),
            },
        }
    }
}

/// REST client for the broker session gateway.
pub struct GatewayBrokerSession {
    client: Client,
    base_url: String,
    environment: Environment,
    token: RwLock<Option<String>>,
}

impl GatewayBrokerSession {
    /// Create a client for the configured gateway.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError::ConnectionError` if the HTTP client cannot be built.
    pub fn new(settings: &BrokerSettings, environment: Environment) -> Result<Self, BrokerError> {
        let client = Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| BrokerError::ConnectionError {
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            base_url: settings.gateway_url.trim_end_matches('/').to_string(),
            environment,
            token: RwLock::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, BrokerError> {
        let token = self.token.read().clone().ok_or(BrokerError::NotLoggedIn)?;
        Ok(request.bearer_auth(token))
    }

    async fn send<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, GatewayError> {
        let response = request
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<GatewayErrorResponse>(&body)
                .ok()
                .and_then(|err| err.message)
                .unwrap_or(body);
            return Err(GatewayError::Status { status, message });
        }

        let text = response
            .text()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        let text = if text.is_empty() { "null" } else { text.as_str() };
        serde_json::from_str(text).map_err(|e| GatewayError::Decode(e.to_string()))
    }

    async fn fetch_kbars(
        client: Client,
        url: String,
        token: String,
        symbol: String,
        start: NaiveDate,
        end: NaiveDate,
        timeout: Duration,
    ) -> Result<KbarSeries, BrokerError> {
        let request = client
            .post(url)
            .bearer_auth(token)
            .timeout(timeout)
            .json(&KbarsRequest {
                code: &symbol,
                start,
                end,
            });

        Self::send(request).await.map_err(|err| match err {
            GatewayError::Status {
                status: StatusCode::NOT_FOUND,
                ..
            } => BrokerError::UnknownContract { symbol },
            other => other.into(),
        })
    }
}

impl std::fmt::Debug for GatewayBrokerSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayBrokerSession")
            .field("base_url", &self.base_url)
            .field("environment", &self.environment)
            .field("token", &self.token.read().as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl BrokerSession for GatewayBrokerSession {
    async fn login(&self, api_key: &str, secret_key: &str) -> Result<(), BrokerError> {
        let request = self
            .client
            .post(self.url("/v1/session/login"))
            .json(&LoginRequest {
                api_key,
                secret_key,
                simulation: self.environment.is_simulation(),
            });

        let response: LoginResponse = Self::send(request).await.map_err(|err| match err {
            GatewayError::Status { status, message } if status.is_client_error() => {
                BrokerError::AuthenticationFailed { message }
            }
            other => other.into(),
        })?;

        *self.token.write() = Some(response.token);
        tracing::debug!(environment = self.environment.as_str(), "Gateway login accepted");
        Ok(())
    }

    async fn activate_ca(&self, ca_path: &Path, ca_password: &str) -> Result<(), BrokerError> {
        let ca_path = ca_path.to_string_lossy();
        let request = self.authorized(self.client.post(self.url("/v1/session/ca")))?.json(
            &ActivateCaRequest {
                ca_path: &ca_path,
                ca_password,
            },
        );

        let _: serde_json::Value = Self::send(request).await.map_err(|err| match err {
            GatewayError::Status { status, message } if status.is_client_error() => {
                BrokerError::CertificateRejected { message }
            }
            other => other.into(),
        })?;
        Ok(())
    }

    async fn usage(&self) -> Result<SessionUsage, BrokerError> {
        let request = self.authorized(self.client.get(self.url("/v1/session/usage")))?;
        Ok(Self::send(request).await?)
    }

    async fn list_positions(&self) -> Result<Vec<BrokerPosition>, BrokerError> {
        let request = self.authorized(self.client.get(self.url("/v1/positions")))?;
        Ok(Self::send(request).await?)
    }

    async fn kbars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        timeout: Duration,
        callback: KbarCallback,
    ) -> Result<(), BrokerError> {
        let token = self.token.read().clone().ok_or(BrokerError::NotLoggedIn)?;
        let client = self.client.clone();
        let url = self.url("/v1/kbars");
        let symbol = symbol.to_string();

        tokio::spawn(async move {
            let series =
                match Self::fetch_kbars(client, url, token, symbol.clone(), start, end, timeout)
                    .await
                {
                    Ok(series) => series,
                    Err(e) => {
                        tracing::warn!(symbol = %symbol, error = %e, "Gateway kbar request failed");
                        KbarSeries::default()
                    }
                };
            callback(series);
        });

        Ok(())
    }

    async fn scanners(
        &self,
        scanner_type: ScannerType,
        date: NaiveDate,
        count: u32,
        ascending: bool,
    ) -> Result<Vec<ScannerItem>, BrokerError> {
        let request = self
            .authorized(self.client.post(self.url("/v1/scanners")))?
            .json(&ScannerRequest {
                scanner_type: scanner_type.as_str(),
                date,
                count,
                ascending,
            });
        Ok(Self::send(request).await?)
    }
}

// =============================================================================
// Tests
// =============================================================================
