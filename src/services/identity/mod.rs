pub mod gateway;
pub mod provider;

pub use gateway::{Endpoints, IdentityGateway};
pub use provider::{IdentityProvider, ProviderError};
