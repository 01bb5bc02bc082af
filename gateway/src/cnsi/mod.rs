//! CNSI registry: registration, listing and removal of cluster connections.

pub mod discovery;

use std::sync::Arc;

use url::Url;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::cnsi::{CnsiRecord, CnsiType};
use crate::store::CnsiStore;
use discovery::Discovery;

pub struct CnsiRegistry {
    store: Arc<dyn CnsiStore>,
    discovery: Discovery,
}

impl CnsiRegistry {
    pub fn new(store: Arc<dyn CnsiStore>, discovery: Discovery) -> Self {
        Self { store, discovery }
    }

    /// Validates, probes the cluster, then persists it with one insert.
    /// Any failure leaves nothing behind.
    pub async fn register(
        &self,
        name: &str,
        api_endpoint: &str,
        skip_ssl_validation: bool,
        cnsi_type: CnsiType,
    ) -> Result<CnsiRecord, AppError> {
        let name = name.trim();
        let api_endpoint = api_endpoint.trim();
        if name.is_empty() {
            return Err(AppError::Validation("cnsi_name is required".into()));
        }
        if api_endpoint.is_empty() {
            return Err(AppError::Validation("api_endpoint is required".into()));
        }
        if let Err(e) = Url::parse(api_endpoint) {
            return Err(AppError::Validation(format!(
                "api_endpoint is not a valid url: {}",
                e
            )));
        }

        let metadata = self
            .discovery
            .discover(api_endpoint, cnsi_type, skip_ssl_validation)
            .await?;

        let record = CnsiRecord {
            guid: Uuid::new_v4(),
            name: name.to_string(),
            cnsi_type,
            api_endpoint: api_endpoint.to_string(),
            authorization_endpoint: metadata.authorization_endpoint,
            token_endpoint: metadata.token_endpoint,
            doppler_logging_endpoint: metadata.doppler_logging_endpoint,
            skip_ssl_validation,
        };

        self.store.insert_cnsi(&record).await.map_err(|e| {
            tracing::error!(name = %record.name, cnsi_type = %cnsi_type, "failed to save cnsi: {}", e);
            AppError::Persistence(e)
        })?;

        tracing::info!(cnsi_guid = %record.guid, name = %record.name, cnsi_type = %cnsi_type, "registered cnsi");
        Ok(record)
    }

    pub async fn list(&self) -> Result<Vec<CnsiRecord>, AppError> {
        Ok(self.store.list_cnsis().await?)
    }

    pub async fn get(&self, guid: Uuid) -> Result<Option<CnsiRecord>, AppError> {
        Ok(self.store.get_cnsi(guid).await?)
    }

    /// Removes the cluster; its tokens go with it.
    pub async fn unregister(&self, guid: Uuid) -> Result<(), AppError> {
        if !self.store.delete_cnsi(guid).await? {
            return Err(AppError::NotFound(format!("cnsi {}", guid)));
        }
        tracing::info!(cnsi_guid = %guid, "unregistered cnsi");
        Ok(())
    }
}
