//! Wires a store and a connector into a [`SyncOrchestrator`].

use std::sync::Arc;

use syncline_connector_gbp::GbpFetcher;
use syncline_connector_leadgen::{CampaignFetcher, SheetFetcher};
use syncline_connector_openphone::OpenPhoneFetcher;
use syncline_core::Provider;
use syncline_sync::{
    HttpTransport, RemoteFetcher, ReqwestTransport, RetryingTransport, SyncConfig,
    SyncOrchestrator, SyncStore, TokenRefresher,
};

use crate::config::ConnectorConfig;
use crate::error::{CliError, CliResult};

/// Build the orchestrator for `provider`.
///
/// Provider calls go through the retrying transport. Token refresh uses the
/// bare transport since a rejected refresh must not be repeated.
pub fn build_orchestrator(
    provider: Provider,
    connector: ConnectorConfig,
    store: Arc<dyn SyncStore>,
    sync: &SyncConfig,
) -> CliResult<SyncOrchestrator> {
    let raw: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::default());
    let transport: Arc<dyn HttpTransport> =
        Arc::new(RetryingTransport::new(raw.clone(), sync.retry.clone()));

    let mut refresher: Option<Arc<dyn TokenRefresher>> = None;
    let fetcher: Arc<dyn RemoteFetcher> = match (provider, connector) {
        (Provider::GoogleGbp, ConnectorConfig::Gbp(config)) => {
            refresher = Some(Arc::new(config.refresher(raw)));
            Arc::new(GbpFetcher::new(transport, config))
        }
        (Provider::Openphone, ConnectorConfig::OpenPhone(config)) => {
            Arc::new(OpenPhoneFetcher::new(transport, config))
        }
        (Provider::LeadgenSheet, ConnectorConfig::Leadgen(config)) => {
            Arc::new(SheetFetcher::new(transport, config))
        }
        (Provider::LeadgenCampaign, ConnectorConfig::Leadgen(config)) => {
            Arc::new(CampaignFetcher::new(transport, config))
        }
        (provider, connector) => {
            return Err(CliError::Config(format!(
                "{provider} cannot run with {connector:?}"
            )))
        }
    };

    let orchestrator = SyncOrchestrator::new(store, fetcher, sync.clone())?;
    Ok(match refresher {
        Some(refresher) => orchestrator.with_refresher(refresher),
        None => orchestrator,
    })
}
