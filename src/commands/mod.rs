pub mod auth;
pub mod dashboard;
pub mod invoices;

use anyhow::{anyhow, Result};
use std::sync::Arc;

use crate::config::Settings;
use crate::services::api::ApiClient;
use crate::services::session::{Session, SessionStore, SESSION_FILE};
use crate::services::state::{InvoiceStore, STORAGE_FILE};

/// Everything a command needs, built once from the settings.
pub struct App {
    pub settings: Settings,
    pub session: Arc<SessionStore>,
    pub client: Arc<ApiClient>,
    pub store: InvoiceStore,
}

impl App {
    pub fn open(settings: Settings) -> Result<Self> {
        std::fs::create_dir_all(&settings.data_dir)?;
        let session = Arc::new(SessionStore::open(settings.data_dir.join(SESSION_FILE)));
        let client = ApiClient::new(
            &settings.graphql_url,
            &settings.rest_base_url,
            settings.request_timeout,
            session.clone(),
        )?;
        let store = InvoiceStore::persistent(settings.data_dir.join(STORAGE_FILE));
        Ok(App {
            settings,
            session,
            client: Arc::new(client),
            store,
        })
    }

    pub fn require_session(&self) -> Result<Session> {
        self.session
            .current()
            .ok_or_else(|| anyhow!("Not logged in, run `invoice-dash login` first"))
    }
}
