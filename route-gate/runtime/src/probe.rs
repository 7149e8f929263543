use crate::core::{Probe, ProbeError, StatusCode};
use anyhow::Result;
use tokio::time::Duration;
use tracing::warn;

/// Probes targets over HTTP(S) with `reqwest`, following redirects.
#[derive(Clone, Debug)]
pub struct HttpProbe {
    client: reqwest::Client,
}

// === impl HttpProbe ===

impl HttpProbe {
    pub fn new(timeout: Duration, tls_verify: bool, max_redirects: usize) -> Result<Self> {
        if !tls_verify {
            warn!("TLS certificate verification is disabled for probes");
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            // Targets are dialed directly, never through an environment proxy.
            .no_proxy()
            .redirect(reqwest::redirect::Policy::limited(max_redirects))
            .danger_accept_invalid_certs(!tls_verify)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Probe for HttpProbe {
    async fn get(&self, url: &str) -> Result<StatusCode, ProbeError> {
        match self.client.get(url).send().await {
            Ok(rsp) => Ok(rsp.status()),
            Err(error) => Err(ProbeError(format!("{:#}", anyhow::Error::from(error)))),
        }
    }
}
