//! Client library for the travel API: persisted session state, the HTTP
//! gateway and view helpers used by the command-line client.

pub mod gateway;
pub mod session;
pub mod views;

pub use gateway::{ApiClient, Endpoint, GatewayError};
pub use session::{
    AuthPayload, FileStorage, GuardOutcome, MemoryStorage, SessionError, SessionHolder,
    SessionStorage, SessionUser,
};
pub use views::{SortDirection, SortKey, StatusFilter, TravelQuery, TravelStatistics};
