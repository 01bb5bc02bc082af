//! HTTP clients for talking to registered clusters.
//!
//! Two clients share the same timeouts and pooling; they differ only in
//! whether TLS certificates are verified. Callers pick one per call from the
//! cluster's skip-SSL flag.
use std::time::Duration;

use reqwest::Client;

pub struct HttpClients {
    verified: Client,
    skip_ssl: Client,
}

impl HttpClients {
    pub fn new(timeout: Duration, connect_timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            verified: build_client(timeout, connect_timeout, false)?,
            skip_ssl: build_client(timeout, connect_timeout, true)?,
        })
    }

    /// Selects the transport for a cluster's TLS policy.
    pub fn for_policy(&self, skip_ssl_validation: bool) -> &Client {
        if skip_ssl_validation {
            &self.skip_ssl
        } else {
            &self.verified
        }
    }
}

fn build_client(
    timeout: Duration,
    connect_timeout: Duration,
    accept_invalid_certs: bool,
) -> anyhow::Result<Client> {
    let client = Client::builder()
        .use_rustls_tls()
        .danger_accept_invalid_certs(accept_invalid_certs)
        .pool_max_idle_per_host(6)
        .tcp_keepalive(Duration::from_secs(30))
        .timeout(timeout)
        .connect_timeout(connect_timeout)
        .build()?;
    Ok(client)
}
