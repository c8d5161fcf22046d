pub mod access;
pub mod session;
pub mod subscription;
pub mod user;
