// Entity Models
//
// Plain records mirrored from the relational store. Every record
// serializes with the field names used on the wire, so the same types
// are shared by the client services and the API server.

pub mod health;
pub mod movement;
pub mod movement_status;
pub mod movement_type;
pub mod page;
pub mod person;
pub mod user;

pub use health::{DatabaseHealth, DatabasesHealth, HealthStatus, SystemHealth, SystemMetrics};
pub use movement::{
    CancelMovement, Movement, MovementFilter, MovementInput, MovementMetrics, Period, StatusTotals,
};
pub use movement_status::{MovementStatus, MovementStatusInput};
pub use movement_type::{MovementType, MovementTypeCount, MovementTypeInput};
pub use page::{normalize_search, Page, PageMeta, PageQuery, DEFAULT_PER_PAGE};
pub use person::{
    AddressInput, ContactInput, CreateByCnpj, DocumentInput, Person, PersonAddress, PersonContact,
    PersonDocument, PersonInput, PersonType,
};
pub use user::{
    LoginCredentials, LoginResponse, RefreshRequest, SessionUser, TokenClaims, User,
};
