//! Compiles policy scripts into ASTs and caches them by content hash.

use std::sync::Arc;

use dashmap::DashMap;
use rhai::{AST, Engine};
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::create_engine;
use crate::config::RhaiConfig;

/// A type alias for the hash of a Rhai script.
type ScriptHash = [u8; 32];

/// Compiles scripts once and hands out shared ASTs afterwards.
#[derive(Debug)]
pub struct RhaiCompiler {
    /// The Rhai engine used for compiling and evaluating scripts.
    pub engine: Arc<Engine>,
    cache: DashMap<ScriptHash, Arc<AST>>,
}

/// Errors that can occur during Rhai compilation.
#[derive(Debug, Clone, Error)]
pub enum RhaiCompilerError {
    /// Error that occurs during script compilation.
    #[error("Rhai compilation error: {0}")]
    CompilationError(#[from] rhai::ParseError),
}

impl RhaiCompiler {
    /// Creates a new instance of the Rhai compiler.
    pub fn new(rhai_config: RhaiConfig) -> Self {
        let engine = create_engine(rhai_config);

        RhaiCompiler { engine: Arc::new(engine), cache: DashMap::new() }
    }

    fn hash_script(script: &str) -> ScriptHash {
        let mut hasher = Sha256::new();
        hasher.update(script.as_bytes());
        hasher.finalize().into()
    }

    /// Returns the compiled AST of `script`, compiling it on first use.
    pub fn get_ast(&self, script: &str) -> Result<Arc<AST>, RhaiCompilerError> {
        let key = Self::hash_script(script);

        if let Some(cached) = self.cache.get(&key) {
            return Ok(cached.value().clone());
        }

        let ast = Arc::new(self.engine.compile(script)?);
        self.cache.insert(key, ast.clone());

        Ok(ast)
    }
}
