//! ca-inspect - CA expiry and primary certificate checks for task runners.

pub mod cert;
pub mod cli;
pub mod config;
pub mod crl;
pub mod expiry;
pub mod logging;
pub mod primary;
pub mod task;
