//! Platform integrations for Pulseboard.
//!
//! Each connected marketing platform is an [`Integration`]: an adapter over
//! an [`OAuthSession`] that can probe its connection, refresh its token and
//! fetch normalized daily metrics. [`IntegrationFactory`] builds adapters
//! from storage keys, and [`sync_data`] drives a fetch through a
//! [`SyncStore`].

pub mod error;
pub mod factory;
pub mod integration;
pub mod platforms;
pub mod session;
pub mod store;
pub mod sync;

pub use error::IntegrationError;
pub use factory::{
    build_http_client, generate_oauth_state, IntegrationFactory, OAuthClients, PlatformInfo,
};
pub use integration::{days_inclusive, Integration};
pub use platforms::{
    GoogleAnalyticsIntegration, LinkedInIntegration, MetaIntegration, PlatformEndpoints,
};
pub use session::{OAuthSession, RefreshGrant, TokenEndpoint};
pub use store::PgSyncStore;
pub use sync::{sync_data, SyncOutcome, SyncStore};
