//! Wiring: one `Desk` holds every service over a shared session, client
//! and cache.

use desk_core::{Result, SharedClock, SystemClock};
use std::sync::Arc;

use crate::api::ApiClient;
use crate::board::ApprovalBoard;
use crate::cache::QueryCache;
use crate::config::ClientConfig;
use crate::guard::AuthGuard;
use crate::hooks::{Navigator, Notifier, TracingNavigator, TracingNotifier};
use crate::idle::IdleWatchdog;
use crate::services::{
    AnnouncementService, ApprovalService, AuthService, ContractService, ProfileService,
    SettingsService, UserAdmin,
};
use crate::store::{FileStorage, MemoryStorage, SessionStorage, SessionStore};
use crate::transport::{ReqwestTransport, Transport};

#[derive(Clone)]
pub struct Desk {
    pub config: ClientConfig,
    pub store: SessionStore,
    pub client: ApiClient,
    pub cache: QueryCache,
    pub auth: AuthService,
    pub users: UserAdmin,
    pub contracts: ContractService,
    pub approvals: ApprovalService,
    pub profile: ProfileService,
    pub announcements: AnnouncementService,
    pub settings: SettingsService,
    pub board: Arc<ApprovalBoard>,
    pub watchdog: Arc<IdleWatchdog>,
    pub guard: Arc<AuthGuard>,
}

impl Desk {
    pub fn builder(config: ClientConfig) -> DeskBuilder {
        DeskBuilder::new(config)
    }
}

/// Builds a [`Desk`]; unset seams fall back to reqwest, the configured
/// storage, logging hooks and the system clock.
pub struct DeskBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
    storage: Option<Arc<dyn SessionStorage>>,
    notifier: Option<Arc<dyn Notifier>>,
    navigator: Option<Arc<dyn Navigator>>,
    clock: Option<SharedClock>,
}

impl DeskBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            transport: None,
            storage: None,
            notifier: None,
            navigator: None,
            clock: None,
        }
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn storage(mut self, storage: Arc<dyn SessionStorage>) -> Self {
        self.storage = Some(storage);
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

    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Result<Desk> {
        let config = self.config;
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(&config)?),
        };
        let storage: Arc<dyn SessionStorage> = match (self.storage, &config.session_file) {
            (Some(storage), _) => storage,
            (None, Some(path)) => Arc::new(FileStorage::new(path.clone())),
            (None, None) => Arc::new(MemoryStorage::new()),
        };
        let notifier = self.notifier.unwrap_or_else(|| Arc::new(TracingNotifier));
        let navigator = self.navigator.unwrap_or_else(|| Arc::new(TracingNavigator));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let store = SessionStore::new(storage, clock);
        let cache = QueryCache::new(config.cache_capacity, config.cache_ttl());
        let client = ApiClient::new(
            transport,
            store.clone(),
            notifier.clone(),
            navigator.clone(),
            config.session.clone(),
        );

        let approvals = ApprovalService::new(client.clone(), cache.clone());
        let board = Arc::new(ApprovalBoard::new(approvals.clone(), notifier.clone()));
        let watchdog = Arc::new(IdleWatchdog::new(
            store.clone(),
            notifier,
            navigator.clone(),
            config.session.clone(),
        ));
        let guard = Arc::new(AuthGuard::new(
            store.clone(),
            navigator,
            config.session.login_path.clone(),
        ));

        Ok(Desk {
            auth: AuthService::new(client.clone(), cache.clone()),
            users: UserAdmin::new(client.clone(), cache.clone()),
            contracts: ContractService::new(client.clone(), cache.clone()),
            profile: ProfileService::new(client.clone(), cache.clone()),
            announcements: AnnouncementService::new(client.clone(), cache.clone()),
            settings: SettingsService::new(client.clone(), cache.clone()),
            approvals,
            board,
            watchdog,
            guard,
            store,
            client,
            cache,
            config,
        })
    }
}
