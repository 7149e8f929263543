use crate::{
    api::Api,
    core::DerivationMode,
    index::{Config, Index, IndexMetrics, ProbeGate, ProbeMetrics},
    k8s::ClusterRoutes,
    probe::HttpProbe,
    server,
};
use anyhow::{bail, Result};
use clap::Parser;
use prometheus_client::registry::Registry;
use std::net::SocketAddr;
use tokio::time::Duration;
use tracing::{info, info_span, Instrument};

#[derive(Debug, Parser)]
#[clap(
    name = "route-gate",
    about = "Lists HTTPRoute backends and probes the ones they expose"
)]
pub struct Args {
    #[clap(long, default_value = "route_gate=info,warn", env = "ROUTE_GATE_LOG")]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    #[clap(long, default_value = "0.0.0.0:8000")]
    http_addr: SocketAddr,

    /// How long a route snapshot is served before the next request refreshes it.
    #[clap(long, default_value = "5000")]
    cache_ttl_ms: u64,

    #[clap(long, default_value = "5000")]
    probe_timeout_ms: u64,

    /// Bounds each HTTPRoute listing call to the API server.
    #[clap(long, default_value = "10000")]
    list_timeout_ms: u64,

    /// Verify TLS certificates presented by probed targets.
    #[clap(long, default_value = "true", action = clap::ArgAction::Set)]
    tls_verify: bool,

    /// Whether probe targets are composed backend addresses (`address`) or
    /// route hostnames (`hostname`).
    #[clap(long, default_value = "address")]
    derivation_mode: DerivationMode,

    #[clap(long, default_value = "10")]
    max_redirects: usize,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            log_level,
            log_format,
            client,
            admin,
            http_addr,
            cache_ttl_ms,
            probe_timeout_ms,
            list_timeout_ms,
            tls_verify,
            derivation_mode,
            max_redirects,
        } = self;

        if probe_timeout_ms == 0 || list_timeout_ms == 0 {
            bail!("--probe-timeout-ms and --list-timeout-ms must be positive");
        }
        let probe_timeout = Duration::from_millis(probe_timeout_ms);

        let mut prom = <Registry>::default();
        let index_metrics = IndexMetrics::register(prom.sub_registry_with_prefix("route_index"));
        let probe_metrics = ProbeMetrics::register(prom.sub_registry_with_prefix("probe"));

        let runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .build()
            .await?;

        let index = Index::new(
            ClusterRoutes::new(runtime.client()),
            Config {
                mode: derivation_mode,
                ttl: Duration::from_millis(cache_ttl_ms),
                list_timeout: Duration::from_millis(list_timeout_ms),
            },
            index_metrics,
        );
        let probe = HttpProbe::new(probe_timeout, tls_verify, max_redirects)?;
        let gate = ProbeGate::new(index, probe, probe_timeout, probe_metrics);
        info!(
            mode = %derivation_mode,
            cache_ttl_ms,
            probe_timeout_ms,
            tls_verify,
            "Gating probes on HTTPRoute backends"
        );

        let listener = server::bind(http_addr).await?;
        tokio::spawn(
            server::serve(listener, Api::new(gate), runtime.shutdown_handle())
                .instrument(info_span!("http", port = %http_addr.port())),
        );

        // Block the main thread on the shutdown signal. Once it fires, wait for the background tasks to
        // complete before exiting.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}
