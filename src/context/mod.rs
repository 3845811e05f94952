//! Application context - the wired-together client.
//!
//! Bundles the session store, HTTP pipeline, query cache, and navigation
//! guard into one handle, so embedders construct the whole stack in one
//! place. Production wiring uses file storage and the `reqwest` transport;
//! every seam is injectable for tests and alternative frontends.

use std::sync::Arc;

use anyhow::{Context as _, Result};

use crate::api;
use crate::config::Config;
use crate::http::{
    HttpClient, Navigator, NoopNavigator, NoopNotifier, Notifier, ReqwestTransport, Transport,
};
use crate::query::QueryCache;
use crate::routes::{NavigationGuard, LOGIN_PATH};
use crate::session::SessionStore;
use crate::storage::{FileStorage, Storage};

/// The assembled client.
pub struct AppContext {
    config: Config,
    session: Arc<SessionStore>,
    http: Arc<HttpClient>,
    cache: QueryCache,
    guard: NavigationGuard,
    navigator: Arc<dyn Navigator>,
}

impl AppContext {
    /// Builds a context with production defaults: environment-derived
    /// configuration, file storage under `~/.devhub`, and the `reqwest`
    /// transport.
    pub fn new() -> Result<Self> {
        AppContextBuilder::default().build()
    }

    /// Starts a builder for custom wiring.
    pub fn builder() -> AppContextBuilder {
        AppContextBuilder::default()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn http(&self) -> &Arc<HttpClient> {
        &self.http
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn guard(&self) -> &NavigationGuard {
        &self.guard
    }

    /// Authenticates against the remote API and stores the session.
    pub async fn login(&self, email: &str, password: &str) -> Result<()> {
        let response = api::auth::login(&self.http, email, password)
            .await
            .context("login request failed")?;
        self.session
            .login(&response.id, &response.token)
            .context("failed to persist session")?;
        tracing::debug!(user = %response.id, "session established");
        Ok(())
    }

    /// Clears the session and returns to the login view.
    pub fn logout(&self) -> Result<()> {
        self.session.logout().context("failed to clear session")?;
        self.navigator.redirect(LOGIN_PATH);
        Ok(())
    }

    /// Completes the external provider connection: exchanges the
    /// authorization code and stores the resulting access token. Returns
    /// the provider account name.
    pub async fn connect_github(&self, code: &str) -> Result<String> {
        let exchange = api::github::exchange_code(&self.http, code)
            .await
            .context("authorization code exchange failed")?;
        self.session
            .connect_external(&exchange.access_token)
            .context("failed to persist provider token")?;
        Ok(exchange.username)
    }
}

/// Builder for [`AppContext`] with injectable seams.
#[derive(Default)]
pub struct AppContextBuilder {
    config: Option<Config>,
    storage: Option<Arc<dyn Storage>>,
    transport: Option<Arc<dyn Transport>>,
    notifier: Option<Arc<dyn Notifier>>,
    navigator: Option<Arc<dyn Navigator>>,
}

impl AppContextBuilder {
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    pub fn storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    pub fn build(self) -> Result<AppContext> {
        let config = self.config.unwrap_or_else(Config::from_env);

        let storage: Arc<dyn Storage> = match self.storage {
            Some(storage) => storage,
            None => Arc::new(
                FileStorage::open_default().context("failed to open client storage")?,
            ),
        };
        let session = Arc::new(SessionStore::open(storage));

        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(ReqwestTransport::new(&config)));
        let notifier = self.notifier.unwrap_or_else(|| Arc::new(NoopNotifier));
        let navigator = self.navigator.unwrap_or_else(|| Arc::new(NoopNavigator));

        let http = Arc::new(HttpClient::new(
            transport,
            session.clone(),
            notifier,
            navigator.clone(),
        ));

        Ok(AppContext {
            config,
            guard: NavigationGuard::new(session.clone()),
            session,
            http,
            cache: QueryCache::new(),
            navigator,
        })
    }
}
