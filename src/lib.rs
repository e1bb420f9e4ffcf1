pub mod api;
pub mod auth;
pub mod cli;
pub mod client;
pub mod config;
pub mod db;

use auth::{AuthService, TokenIssuer, TokenValidator};
use config::Config;
use db::DynStore;

pub struct AppState {
    pub config: Config,
    pub store: DynStore,
    pub auth: AuthService,
    pub tokens: TokenValidator,
}

impl AppState {
    pub fn new(config: Config, store: DynStore) -> Self {
        let auth = AuthService::new(store.clone(), TokenIssuer::new(&config.auth));
        let tokens = TokenValidator::new(&config.auth);
        Self {
            config,
            store,
            auth,
            tokens,
        }
    }
}
