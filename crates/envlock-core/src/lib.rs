//! Lock orchestration for envlock.
//!
//! This crate ties the schema and runtime layers together into the `Locker`:
//! read a manifest, resolve it in an ephemeral environment, probe which pins
//! are safe on every platform, and merge them back under the author's
//! declarations. It also owns the `LockConfig` layer and Ctrl-C handling.

pub mod config;
pub mod engine;
pub mod interrupt;

pub use config::LockConfig;
pub use engine::Locker;
pub use interrupt::{install_signal_handler, interrupt_requested};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Manifest(#[from] envlock_schema::ManifestError),
    #[error(transparent)]
    Runtime(#[from] envlock_runtime::RuntimeError),
    #[error("config error: {0}")]
    Config(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("interrupted")]
    Interrupted,
}
