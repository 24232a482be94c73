use std::sync::Arc;

use crate::core::config::Settings;
use crate::services::backend_client::BackendClient;

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    client: BackendClient,
}

impl AppState {
    pub(crate) fn new(settings: Settings) -> anyhow::Result<Self> {
        let client = BackendClient::from_settings(&settings)?;
        Ok(Self { inner: Arc::new(InnerState { settings, client }) })
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn client(&self) -> &BackendClient {
        &self.inner.client
    }
}
