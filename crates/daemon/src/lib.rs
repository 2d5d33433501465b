// Runtime modules
pub mod companion;
pub mod console;
pub mod node;
pub mod pins;
pub mod process;

// App state (configuration, paths)
pub mod state;

// In-memory node double for unit tests
#[cfg(test)]
pub(crate) mod testkit;

// Re-exports for consumers
pub use companion::{Companion, CompanionError, Config as CompanionConfig};
pub use process::{init_logging, run, RunError};
pub use state::{AppConfig, AppState, StateError};
