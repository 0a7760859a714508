//! The Rhai engine used to evaluate route policies.

pub mod compiler;
mod create_engine;

pub use compiler::{RhaiCompiler, RhaiCompilerError};
pub use create_engine::create_engine;
