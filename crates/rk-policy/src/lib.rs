// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod accept;
mod context;

pub use accept::wants_json;
pub use context::{RoutingContext, XML_HTTP_REQUEST};

use rk_config::{ConditionSpec, RestKitConfig};
use rk_error::FailureCategory;
use rk_glob::{PathPattern, PathPatterns, PrefixSet};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Errors raised while building a [`DecisionConfig`].
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    /// A path pattern failed to compile.
    #[error("invalid path pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// Pattern as configured.
        pattern: String,
        /// Compiler diagnostic.
        reason: String,
    },
}

/// Boolean function of the request and the failure category.
pub type Predicate = Arc<dyn Fn(&RoutingContext, FailureCategory) -> bool + Send + Sync>;

/// One configured JSON rendering condition.
#[derive(Clone)]
pub enum Condition {
    /// The path matches a wildcard pattern.
    Pattern(PathPattern),
    /// The matched route declares this group.
    RouteGroup(String),
    /// Arbitrary predicate, registered in code.
    Custom {
        /// Label used in decisions and logs.
        name: String,
        /// The predicate.
        predicate: Predicate,
    },
}

impl Condition {
    /// Compile a path pattern condition.
    pub fn pattern(pattern: &str) -> Result<Self, PolicyError> {
        PathPattern::new(pattern)
            .map(Self::Pattern)
            .map_err(|e| PolicyError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: format!("{e:#}"),
            })
    }

    /// Route group condition.
    pub fn route_group(group: impl Into<String>) -> Self {
        Self::RouteGroup(group.into())
    }

    /// Custom predicate condition.
    pub fn custom<F>(name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&RoutingContext, FailureCategory) -> bool + Send + Sync + 'static,
    {
        Self::Custom {
            name: name.into(),
            predicate: Arc::new(predicate),
        }
    }

    /// Evaluate against a request.
    pub fn evaluate(&self, ctx: &RoutingContext, category: FailureCategory) -> bool {
        match self {
            Self::Pattern(p) => p.is_match(&ctx.path),
            Self::RouteGroup(g) => ctx.in_group(g),
            Self::Custom { predicate, .. } => predicate(ctx, category),
        }
    }

    /// Short human-readable label.
    pub fn label(&self) -> String {
        match self {
            Self::Pattern(p) => format!("pattern:{}", p.as_str()),
            Self::RouteGroup(g) => format!("group:{g}"),
            Self::Custom { name, .. } => format!("custom:{name}"),
        }
    }

    fn from_spec(spec: &ConditionSpec) -> Result<Self, PolicyError> {
        match spec {
            ConditionSpec::Pattern(p) => Self::pattern(p),
            ConditionSpec::Group { group } => Ok(Self::route_group(group.as_str())),
        }
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Condition").field(&self.label()).finish()
    }
}

/// Process-wide decision inputs. Immutable once built.
#[derive(Debug, Clone)]
pub struct DecisionConfig {
    force_json: bool,
    api_prefixes: PrefixSet,
    patterns: PathPatterns,
    conditions: Vec<Condition>,
    force_ajax: bool,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            force_json: true,
            api_prefixes: PrefixSet::new(&[rk_config::DEFAULT_API_PREFIX.to_string()]),
            patterns: PathPatterns::empty(),
            conditions: Vec::new(),
            force_ajax: true,
        }
    }
}

impl DecisionConfig {
    /// Build from the file configuration. Custom predicates can be appended
    /// afterwards with [`with_condition`](Self::with_condition).
    pub fn from_config(config: &RestKitConfig) -> Result<Self, PolicyError> {
        let rendering = &config.json_rendering;
        let raw_patterns = rendering.patterns();
        let patterns =
            PathPatterns::new(&raw_patterns).map_err(|e| PolicyError::InvalidPattern {
                pattern: raw_patterns.join(", "),
                reason: format!("{e:#}"),
            })?;
        let conditions = rendering
            .conditions()
            .iter()
            .map(Condition::from_spec)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            force_json: config.force_json(),
            api_prefixes: PrefixSet::new(&rendering.api_prefixes()),
            patterns,
            conditions,
            force_ajax: rendering.force_ajax(),
        })
    }

    /// Set `force_json`.
    pub fn with_force_json(mut self, on: bool) -> Self {
        self.force_json = on;
        self
    }

    /// Set `force_ajax`.
    pub fn with_force_ajax(mut self, on: bool) -> Self {
        self.force_ajax = on;
        self
    }

    /// Replace the api prefixes.
    pub fn with_api_prefixes(mut self, prefixes: &[String]) -> Self {
        self.api_prefixes = PrefixSet::new(prefixes);
        self
    }

    /// Replace the api patterns.
    pub fn with_patterns(mut self, patterns: &[String]) -> Result<Self, PolicyError> {
        self.patterns = PathPatterns::new(patterns).map_err(|e| PolicyError::InvalidPattern {
            pattern: patterns.join(", "),
            reason: format!("{e:#}"),
        })?;
        Ok(self)
    }

    /// Append a condition; conditions run in insertion order.
    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Whether JSON is forced for api routes.
    pub fn force_json(&self) -> bool {
        self.force_json
    }

    /// Whether XMLHttpRequest callers get JSON.
    pub fn force_ajax(&self) -> bool {
        self.force_ajax
    }

    /// Configured api prefixes.
    pub fn api_prefixes(&self) -> &PrefixSet {
        &self.api_prefixes
    }

    /// Configured conditions.
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Whether `path` is an api route by prefix or pattern.
    pub fn is_api_path(&self, path: &str) -> bool {
        self.api_prefixes.is_match(path) || self.patterns.is_match(path)
    }
}

/// Which rule produced a decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum DecisionRule {
    /// `force_json` is off; the Accept header decided.
    ClientPreference,
    /// The path matched an api prefix.
    ApiPrefix {
        /// Matching prefix.
        prefix: String,
    },
    /// The path matched an api pattern.
    ApiPattern {
        /// Matching pattern.
        pattern: String,
    },
    /// A condition held.
    Condition {
        /// Condition label.
        label: String,
    },
    /// The Accept header asked for JSON.
    AcceptHeader,
    /// XMLHttpRequest with `force_ajax` on.
    Ajax,
    /// Nothing matched.
    Fallthrough,
}

/// Outcome of the decision, with the rule that decided it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonDecision {
    /// Render a JSON envelope.
    pub render_json: bool,
    /// Rule that fired.
    pub rule: DecisionRule,
}

impl JsonDecision {
    fn json(rule: DecisionRule) -> Self {
        Self {
            render_json: true,
            rule,
        }
    }
}

/// The JSON rendering gate.
#[derive(Debug, Clone, Default)]
pub struct JsonDecisionPolicy {
    config: Arc<DecisionConfig>,
}

impl JsonDecisionPolicy {
    /// Create a policy over `config`.
    pub fn new(config: DecisionConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// The decision inputs.
    pub fn config(&self) -> &DecisionConfig {
        &self.config
    }

    /// Whether the failure on this request must be rendered as JSON.
    pub fn should_render_json(&self, ctx: &RoutingContext, category: FailureCategory) -> bool {
        self.decide(ctx, category).render_json
    }

    /// Like [`should_render_json`](Self::should_render_json), reporting the rule.
    pub fn decide(&self, ctx: &RoutingContext, category: FailureCategory) -> JsonDecision {
        let cfg = &*self.config;

        if !cfg.force_json {
            return JsonDecision {
                render_json: ctx.expects_json(),
                rule: DecisionRule::ClientPreference,
            };
        }

        if let Some(prefix) = cfg.api_prefixes.matching(&ctx.path) {
            return JsonDecision::json(DecisionRule::ApiPrefix {
                prefix: prefix.to_string(),
            });
        }
        if let Some(pattern) = cfg.patterns.first_match(&ctx.path) {
            return JsonDecision::json(DecisionRule::ApiPattern {
                pattern: pattern.to_string(),
            });
        }

        if let Some(cond) = cfg.conditions.iter().find(|c| c.evaluate(ctx, category)) {
            return JsonDecision::json(DecisionRule::Condition {
                label: cond.label(),
            });
        }

        if ctx.expects_json() {
            return JsonDecision::json(DecisionRule::AcceptHeader);
        }

        if cfg.force_ajax && ctx.is_ajax() {
            return JsonDecision::json(DecisionRule::Ajax);
        }

        JsonDecision {
            render_json: false,
            rule: DecisionRule::Fallthrough,
        }
    }
}
