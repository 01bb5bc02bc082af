use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::models::cnsi::CnsiType;

/// CNSI Gateway: authenticated proxy for registered clusters
#[derive(Parser)]
#[command(name = "cnsi-gateway", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the gateway server
    Serve {
        /// Port to bind (defaults to CNSI_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Manage registered clusters
    Cnsi {
        #[command(subcommand)]
        command: CnsiCommands,
    },
}

#[derive(Subcommand)]
pub enum CnsiCommands {
    /// Probe and register a cluster
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        api_endpoint: String,
        /// Cluster flavor: hcf or hce
        #[arg(long = "type", value_parser = parse_cnsi_type)]
        cnsi_type: CnsiType,
        /// Accept self-signed or otherwise invalid TLS certificates
        #[arg(long)]
        skip_ssl: bool,
    },
    /// List registered clusters
    List,
    /// Remove a cluster and every token issued for it
    Unregister {
        #[arg(long)]
        guid: Uuid,
    },
}

fn parse_cnsi_type(s: &str) -> Result<CnsiType, String> {
    s.parse()
}
