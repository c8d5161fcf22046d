//! Session lifecycle for dashboard clients: credential persistence, the auth
//! backend seam, and the controller that ties them to route gating.

pub mod backend;
pub mod clock;
pub mod controller;
pub mod refresher;
pub mod store;

pub use backend::{AuthBackend, HttpAuthClient};
pub use clock::{Clock, SystemClock};
pub use controller::{SessionController, SessionPolicy};
pub use refresher::SessionRefreshWorker;
pub use store::{FileTokenStore, MemoryTokenStore, StoreError, TokenStore};
