//! Probing a candidate cluster's metadata API before registration.

use std::sync::Arc;

use reqwest::StatusCode;
use serde::Deserialize;
use url::Url;

use crate::errors::AppError;
use crate::models::cnsi::{ClusterMetadata, CnsiType};
use crate::proxy::upstream::HttpClients;

/// `GET /v2/info` on an HCF cluster.
#[derive(Debug, Deserialize)]
struct V2Info {
    #[serde(alias = "auth_endpoint")]
    authorization_endpoint: String,
    token_endpoint: String,
    #[serde(default, alias = "log_endpoint")]
    doppler_logging_endpoint: String,
}

pub struct Discovery {
    clients: Arc<HttpClients>,
}

impl Discovery {
    pub fn new(clients: Arc<HttpClients>) -> Self {
        Self { clients }
    }

    pub async fn discover(
        &self,
        api_endpoint: &str,
        cnsi_type: CnsiType,
        skip_ssl_validation: bool,
    ) -> Result<ClusterMetadata, AppError> {
        let base = Url::parse(api_endpoint)
            .map_err(|e| AppError::discovery(api_endpoint, format!("invalid url: {}", e)))?;

        match cnsi_type {
            CnsiType::Hcf => {
                let info: V2Info = self
                    .probe(&base, "v2/info", skip_ssl_validation)
                    .await?;
                Ok(ClusterMetadata {
                    authorization_endpoint: info.authorization_endpoint,
                    token_endpoint: info.token_endpoint,
                    doppler_logging_endpoint: info.doppler_logging_endpoint,
                })
            }
            CnsiType::Hce => {
                // Only proves the endpoint answers as an HCE; its content is not kept.
                let _: serde_json::Map<String, serde_json::Value> =
                    self.probe(&base, "info", skip_ssl_validation).await?;
                Ok(ClusterMetadata::default())
            }
        }
    }

    async fn probe<T: serde::de::DeserializeOwned>(
        &self,
        base: &Url,
        info_path: &str,
        skip_ssl_validation: bool,
    ) -> Result<T, AppError> {
        let url = format!("{}/{}", base.as_str().trim_end_matches('/'), info_path);
        tracing::debug!(url = %url, skip_ssl = skip_ssl_validation, "probing cluster");

        let resp = self
            .clients
            .for_policy(skip_ssl_validation)
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| AppError::discovery(base.as_str(), e.without_url().to_string()))?;

        if resp.status() != StatusCode::OK {
            return Err(AppError::discovery(
                base.as_str(),
                format!("{} returned HTTP {}", info_path, resp.status().as_u16()),
            ));
        }

        resp.json::<T>().await.map_err(|e| {
            AppError::discovery(
                base.as_str(),
                format!("unexpected {} body: {}", info_path, e.without_url()),
            )
        })
    }
}
