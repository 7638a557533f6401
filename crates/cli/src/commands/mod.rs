//! Command handlers for the measles CLI.
//!
//! This module organizes all CLI commands into separate submodules.

pub mod ask;
pub mod batch;
pub mod examples;
pub mod health;
pub mod index;

// Re-export command types for convenience
pub use ask::AskCommand;
pub use batch::BatchCommand;
pub use examples::ExamplesCommand;
pub use health::HealthCommand;
pub use index::IndexCommand;

use measles_core::AppResult;
use serde::Serialize;

/// Print `value` as pretty JSON on stdout.
pub(crate) fn print_json<T: Serialize>(value: &T) -> AppResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
