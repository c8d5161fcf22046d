pub mod health_service;
pub mod identity;
pub mod rate_limit_service;
pub mod revocation;
