//! Expression engine
//!
//! Parses expressions into ASTs, keeps recently compiled ASTs in an LRU
//! cache and evaluates them against a [`Context`]. An engine is `Send +
//! Sync` and meant to be shared.

use crate::ast::AstNode;
use crate::context::Context;
use crate::error::Result;
use crate::eval::Evaluator;
use crate::functions;
use crate::parser::Parser;
use crate::value::Collection;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use tracing::trace;

const DEFAULT_CACHE_SIZE: usize = 1000;

pub struct Engine {
    cache: Mutex<LruCache<String, Arc<AstNode>>>,
}

impl Engine {
    pub fn new() -> Self {
        Self::with_cache_size(DEFAULT_CACHE_SIZE)
    }

    /// Engine keeping at most `size` compiled expressions (at least one).
    pub fn with_cache_size(size: usize) -> Self {
        Self {
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(size).unwrap_or(NonZeroUsize::MIN),
            )),
        }
    }

    /// Parse `expr` and check every function it calls exists with a valid
    /// number of arguments. Results are cached by expression text.
    pub fn compile(&self, expr: &str) -> Result<Arc<AstNode>> {
        if let Some(ast) = self.lock().get(expr) {
            return Ok(Arc::clone(ast));
        }

        let ast = Parser::new(expr.to_string()).parse()?;
        for (name, arg_count) in ast.function_calls() {
            functions::validate_call(name, arg_count)?;
        }
        let ast = Arc::new(ast);
        self.lock().put(expr.to_string(), Arc::clone(&ast));
        trace!(expression = expr, "compiled expression");
        Ok(ast)
    }

    pub fn evaluate(&self, expr: &str, ctx: &Context) -> Result<Collection> {
        let ast = self.compile(expr)?;
        self.evaluate_ast(&ast, ctx)
    }

    pub fn evaluate_ast(&self, ast: &AstNode, ctx: &Context) -> Result<Collection> {
        Evaluator::new(ctx).evaluate(ast)
    }

    /// Number of cached compiled expressions.
    pub fn cached(&self) -> usize {
        self.lock().len()
    }

    pub fn clear_cache(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<String, Arc<AstNode>>> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
