// clinica-api: resilient async client for the clinic operations backend
//
// Every UI collaborator reaches the backend through `ApiClient`, which
// retries gateway hiccups on idempotent calls, tears the session down on
// 401, tracks backend reachability and normalizes the backend's assorted
// success envelopes into bare entities / lists.

pub mod auth;
pub mod client;
pub mod error;
pub mod monitor;
pub mod normalize;
pub mod request;
pub mod resources;
pub mod retry;
pub mod session;
pub mod store;
pub mod transport;

pub use auth::LoginOutcome;
pub use client::{ApiClient, BRANCH_HEADER, ClientConfig};
pub use error::{Error, ErrorKind};
pub use monitor::ConnectionMonitor;
pub use normalize::normalize;
pub use reqwest::Method;
pub use request::Request;
pub use resources::Resource;
pub use retry::{RetryPolicy, Sleeper};
pub use session::{Durability, Principal, SessionInvalidated, SessionStore};
pub use store::{KeyValueStore, MemoryStore, StorageError};
pub use transport::{TlsMode, TransportConfig};
