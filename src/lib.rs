#![allow(clippy::uninlined_format_args)]

pub mod app;
pub mod auth;
pub mod automation;
pub mod backend;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod guard;
pub mod pending;
pub mod platform;
pub mod seo;
pub mod storage;
pub mod tools;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use app::run;
pub use error::{AuthError, Result};
pub use platform::Platform;
