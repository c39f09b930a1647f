use tracing::info;

use strata_core::config::ClientSettings;
use strata_core::Result;
use strata_store::engine::{StoreEngine, StoreHandle, StoreLocator};

use crate::client::StoreClient;
use crate::mapper::RecordMapper;

/// Builds clients bound to a store.
///
/// Two paths: resolve a locator through an engine, or take an already
/// open handle (which is how tests hand in ephemeral stores). Open
/// failures come back as errors; callers decide whether to retry, pick
/// another locator, or give up.
pub struct ClientFactory {
    settings: ClientSettings,
}

impl ClientFactory {
    pub fn new() -> Self {
        Self {
            settings: ClientSettings::default(),
        }
    }

    pub fn with_settings(settings: ClientSettings) -> Self {
        Self { settings }
    }

    /// Open the store `locator` names through `engine` and bind a client
    /// to it.
    pub fn open_store<E, M>(
        &self,
        engine: &E,
        locator: &StoreLocator,
        mapper: M,
    ) -> Result<StoreClient<E::Handle, M>>
    where
        E: StoreEngine,
        M: RecordMapper<Record = <E::Handle as StoreHandle>::Record>,
    {
        let handle = engine.open_store(locator)?;
        info!("Client bound to store {:?}", locator);
        StoreClient::build(handle, mapper, &self.settings)
    }

    /// Bind a client to an already open store handle.
    pub fn from_handle<H, M>(&self, handle: H, mapper: M) -> Result<StoreClient<H, M>>
    where
        H: StoreHandle,
        M: RecordMapper<Record = H::Record>,
    {
        StoreClient::build(handle, mapper, &self.settings)
    }
}

impl Default for ClientFactory {
    fn default() -> Self {
        Self::new()
    }
}
