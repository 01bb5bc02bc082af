use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The kind of upstream cluster. Each variant has its own discovery path
/// and endpoint-field shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CnsiType {
    /// Cloud Foundry style cluster, discovered through `/v2/info`.
    Hcf,
    /// Code Engine style cluster, probed through `/info` and authenticated
    /// through the shared identity service.
    Hce,
}

impl CnsiType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CnsiType::Hcf => "hcf",
            CnsiType::Hce => "hce",
        }
    }
}

impl fmt::Display for CnsiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CnsiType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hcf" => Ok(CnsiType::Hcf),
            "hce" => Ok(CnsiType::Hce),
            other => Err(format!("unknown cnsi type '{}'", other)),
        }
    }
}

/// A registered cluster connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CnsiRecord {
    pub guid: Uuid,
    pub name: String,
    pub cnsi_type: CnsiType,
    pub api_endpoint: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    /// Only populated for HCF clusters.
    pub doppler_logging_endpoint: String,
    pub skip_ssl_validation: bool,
}

/// Endpoints extracted by probing a candidate cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterMetadata {
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub doppler_logging_endpoint: String,
}
