pub mod revocation_cleanup;

pub use revocation_cleanup::RevocationCleanupWorker;
