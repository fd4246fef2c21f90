//! The root store.
//!
//! [`AppStore`] is built once at startup and handed to every consumer by
//! reference or `Arc`. It owns the three sub-stores; none of them reach
//! into each other. The root-level sidebar mutations delegate to the
//! [`UiStore`].

use std::sync::Arc;

use crate::api::ApiClient;
use crate::auth::AuthStore;
use crate::categories::CategoryStore;
use crate::config::StoreConfig;
use crate::error::Result;
use crate::storage::{KeyValueStorage, SqliteStorage};
use crate::ui::{LayoutBus, SidebarVisibility, UiFlags, UiStore};

/// Client state container.
pub struct AppStore {
    auth: AuthStore,
    categories: CategoryStore,
    ui: UiStore,
}

impl AppStore {
    /// Assemble a store over an existing storage backend.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidConfig`](crate::StoreError::InvalidConfig)
    /// for an unusable config and any error from reading the persisted tokens.
    pub fn new(config: &StoreConfig, storage: Arc<dyn KeyValueStorage>) -> Result<Self> {
        config.validate()?;
        let api = ApiClient::new(config)?;

        Ok(Self {
            auth: AuthStore::new(api.clone(), storage, config)?,
            categories: CategoryStore::new(api, config),
            ui: UiStore::new(LayoutBus::new(config.bus_capacity)),
        })
    }

    /// Assemble a store persisting tokens to SQLite at `config.storage_path`.
    pub fn open(config: &StoreConfig) -> Result<Self> {
        let storage = SqliteStorage::open(&config.storage_path)?;
        Self::new(config, Arc::new(storage))
    }

    /// The authentication sub-store.
    pub fn auth(&self) -> &AuthStore {
        &self.auth
    }

    /// The category cache sub-store.
    pub fn categories(&self) -> &CategoryStore {
        &self.categories
    }

    /// The UI flags sub-store.
    pub fn ui(&self) -> &UiStore {
        &self.ui
    }

    /// Current UI flags.
    pub fn ui_flags(&self) -> UiFlags {
        self.ui.flags()
    }

    /// Flip sidebar visibility and signal a resize. An unset sidebar becomes
    /// shown.
    pub fn toggle_sidebar(&self) -> SidebarVisibility {
        self.ui.toggle_sidebar()
    }

    /// Flip the unfoldable (narrow) sidebar flag and signal a resize.
    pub fn toggle_unfoldable(&self) -> bool {
        self.ui.toggle_unfoldable()
    }

    /// Set sidebar visibility explicitly and signal a resize.
    pub fn update_sidebar_visible(&self, visible: bool) {
        self.ui.set_sidebar_visible(visible);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
