// Finance App - Core Library
// Shared by the CLI client, the API server and the tests

pub mod cnpj;
pub mod config;
pub mod entities;
pub mod error;
pub mod formatters;
pub mod http;
pub mod list;
pub mod logging;
pub mod mock;
pub mod services;
pub mod session;

// Server side (SQLite store + axum routes)
#[cfg(feature = "server")]
pub mod db;
#[cfg(feature = "server")]
pub mod server;

// Re-export commonly used types
pub use cnpj::{Cnpj, InvalidCnpj};
pub use config::{ApiConfig, AppConfig, AuthConfig, ServerConfig, Timeouts};
pub use entities::{
    Movement, MovementFilter, MovementInput, MovementStatus, MovementType, Page, PageMeta,
    PageQuery, Period, Person, PersonInput, PersonType, SessionUser, User,
};
pub use error::{ApiError, ApiResult, Notification, NotificationLevel};
pub use http::{ApiClient, ReqwestTransport, Transport};
pub use list::{
    ListController, ListOptions, LoadOutcome, LoadingFlag, PageSource, Pagination, ViewMode,
};
pub use services::{AuthService, RefreshTimer, Services};
pub use session::{FileStorage, MemoryStorage, Session, SessionStorage, TokenStatus};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
