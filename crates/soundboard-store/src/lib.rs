//! Client state store for the soundboard admin.
//!
//! This crate holds the state a soundboard admin client needs between
//! requests:
//!
//! - **Auth tokens**: login, refresh, logout and bearer-header
//!   construction against a JWT auth service, with the token pair
//!   persisted in a [`KeyValueStorage`].
//! - **Category cache**: the game-sound category listing, fetched once and
//!   memoized for the life of the store.
//! - **UI flags**: sidebar visibility, with a resize signal broadcast on
//!   every change.
//!
//! # Architecture
//!
//! ```text
//! AppStore
//! ├── AuthStore      (TokenPair + KeyValueStorage)
//! ├── CategoryStore  (single-flight memoized listing)
//! └── UiStore        (UiFlags + LayoutBus)
//!         └── ApiClient (reqwest, shared by auth and categories)
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use soundboard_store::{AppStore, Credentials, StoreConfig};
//!
//! # async fn example() -> soundboard_store::Result<()> {
//! let config = StoreConfig::load("config/soundboard.toml")?;
//! let store = AppStore::open(&config)?;
//!
//! let wrong_credentials = store
//!     .auth()
//!     .login(&Credentials {
//!         username: "admin".to_string(),
//!         password: "secret".to_string(),
//!         recaptcha: String::new(),
//!     })
//!     .await?;
//!
//! if !wrong_credentials {
//!     let header = store.auth().auth_header().await?;
//!     let categories = store.categories().retrieve_categories().await?;
//!     println!("{header}: {} categories", categories.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod categories;
pub mod config;
pub mod error;
pub mod storage;
pub mod store;
pub mod token;
pub mod ui;

pub use api::{ApiClient, JsonResponse, format_url_with_get_params};
pub use auth::{AuthStore, Credentials, TokenPair};
pub use categories::{CategoryCache, CategoryStore};
pub use config::StoreConfig;
pub use error::{Result, StoreError};
pub use storage::{KeyValueStorage, MemoryStorage, SqliteStorage, StorageOp};
pub use store::AppStore;
pub use token::{TokenPayload, decode_token};
pub use ui::{LayoutBus, LayoutEvent, SidebarVisibility, UiFlags, UiStore};
