pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod interceptor;
pub mod invalidator;
pub mod masking;
pub mod models;
pub mod session;
pub mod store;
pub mod stream;
pub mod trace;
pub mod transport;

pub use auth::AuthApi;
pub use client::ApiClient;
pub use config::ClientConfig;
pub use envelope::{ApiOutcome, BusinessError, Envelope};
pub use error::{ClientError, StoreError, StreamError, TransportError};
pub use session::{CredentialPair, SessionVault};
pub use stream::{Callbacks, StreamEnd, StreamHandler, StreamSummary};
pub use tokio_util::sync::CancellationToken;
pub use transport::{AuthPolicy, CallDescriptor, HttpTransport, Transport};
