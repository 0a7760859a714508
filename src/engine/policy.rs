//! Route policies: deciding whether an event applies to a route.
//!
//! A policy is a Rhai script evaluated with the event bound to `event`. Its
//! result decides the outcome:
//!
//! - `true` / `false`: accept or reject the event as is.
//! - an object map: accept, with the map replacing the event's fields.
//! - `()`: reject.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use rhai::{Dynamic, EvalAltResult, Scope};
use serde_json::{Map, Value};
use thiserror::Error;

use super::rhai::{RhaiCompiler, RhaiCompilerError};
use crate::{
    config::RhaiConfig,
    models::{event::Event, route::RouteConfig},
};

/// The outcome of evaluating a route's policy against an event.
#[derive(Debug, Clone, PartialEq)]
pub enum PolicyDecision {
    /// The event does not apply to the route.
    Reject,
    /// The event applies; the payload is the (possibly transformed) event.
    Accept(Event),
}

/// Errors that prevent a policy from producing a decision.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// The policy does not compile.
    #[error(transparent)]
    Compile(#[from] RhaiCompilerError),

    /// The policy failed while running.
    #[error("Policy runtime error: {0}")]
    Runtime(#[from] Box<EvalAltResult>),

    /// The policy ran longer than allowed.
    #[error("Policy execution timeout after {timeout:?}")]
    Timeout {
        /// The timeout duration that was exceeded
        timeout: Duration,
    },

    /// The policy returned something other than a bool, map or unit.
    #[error("Policy returned unsupported type '{0}'")]
    UnexpectedResult(String),

    /// The evaluation task panicked or was cancelled.
    #[error("Policy evaluation task failed: {0}")]
    Task(String),
}

/// Decides whether an event applies to a route.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PolicyGate: Send + Sync {
    /// Evaluates `route`'s policy against `event`. Stateless and idempotent.
    async fn evaluate(&self, route: &RouteConfig, event: &Event)
    -> Result<PolicyDecision, PolicyError>;

    /// Rejects a policy that can never evaluate, without running it.
    fn check(&self, policy: &str) -> Result<(), PolicyError>;
}

/// A [`PolicyGate`] backed by Rhai scripts.
pub struct RhaiPolicyGate {
    compiler: Arc<RhaiCompiler>,
    execution_timeout: Duration,
}

impl RhaiPolicyGate {
    /// Creates a gate whose engine applies `config`'s limits.
    pub fn new(config: RhaiConfig) -> Self {
        let execution_timeout = config.execution_timeout;
        Self { compiler: Arc::new(RhaiCompiler::new(config)), execution_timeout }
    }
}

fn interpret(result: Dynamic, event: &Event) -> Result<PolicyDecision, PolicyError> {
    if let Some(applies) = result.clone().try_cast::<bool>() {
        return Ok(if applies { PolicyDecision::Accept(event.clone()) } else { PolicyDecision::Reject });
    }
    if result.is_unit() {
        return Ok(PolicyDecision::Reject);
    }
    if result.is_map() {
        let fields: Map<String, Value> = rhai::serde::from_dynamic(&result)?;
        return Ok(PolicyDecision::Accept(Event::from_fields(fields)));
    }
    Err(PolicyError::UnexpectedResult(result.type_name().to_string()))
}

#[async_trait]
impl PolicyGate for RhaiPolicyGate {
    async fn evaluate(
        &self,
        route: &RouteConfig,
        event: &Event,
    ) -> Result<PolicyDecision, PolicyError> {
        if route.policy.trim().is_empty() {
            return Ok(PolicyDecision::Accept(event.clone()));
        }

        let ast = self.compiler.get_ast(&route.policy)?;
        let engine = Arc::clone(&self.compiler.engine);
        let event_dynamic = rhai::serde::to_dynamic(event.fields())?;

        let evaluation = tokio::task::spawn_blocking(move || {
            let mut scope = Scope::new();
            scope.push_constant("event", event_dynamic);
            engine.eval_ast_with_scope::<Dynamic>(&mut scope, &ast)
        });

        let result = match tokio::time::timeout(self.execution_timeout, evaluation).await {
            Ok(Ok(result)) => result?,
            Ok(Err(join_error)) => return Err(PolicyError::Task(join_error.to_string())),
            Err(_) => return Err(PolicyError::Timeout { timeout: self.execution_timeout }),
        };

        let decision = interpret(result, event)?;
        tracing::trace!(
            route = %route.name,
            accepted = matches!(decision, PolicyDecision::Accept(_)),
            "Policy evaluated."
        );
        Ok(decision)
    }

    fn check(&self, policy: &str) -> Result<(), PolicyError> {
        if !policy.trim().is_empty() {
            self.compiler.get_ast(policy)?;
        }
        Ok(())
    }
}
