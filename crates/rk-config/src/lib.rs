// SPDX-License-Identifier: MIT OR Apache-2.0
//! Configuration loading, validation, and merging for restkit.
//!
//! This crate provides [`RestKitConfig`], the file-shaped settings read once
//! at startup, together with helpers for loading from TOML files, applying
//! environment overrides, merging overlays, and producing advisory
//! [`ConfigWarning`]s. Every leaf is optional so that overlays merge cleanly;
//! the accessor methods supply the defaults.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during configuration loading or validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The requested configuration file was not found.
    #[error("config file not found: {path}")]
    FileNotFound {
        /// Path that was requested.
        path: String,
    },

    /// The file could not be parsed as valid TOML.
    #[error("failed to parse config: {reason}")]
    ParseError {
        /// Human-readable parse error detail.
        reason: String,
    },

    /// Semantic validation failed (one or more problems).
    #[error("config validation failed: {reasons:?}")]
    ValidationError {
        /// Individual validation failure messages.
        reasons: Vec<String>,
    },
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

/// Advisory-level issues that do not prevent operation but deserve attention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// Debug blocks are enabled outside the local posture.
    DebugOutsideLocal,
    /// JSON is forced but no api prefix or pattern is configured.
    NoApiRoutes,
    /// AJAX requests will not be rendered as JSON.
    AjaxDetectionDisabled,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigWarning::DebugOutsideLocal => {
                f.write_str("debug is enabled outside the local environment; error bodies expose internals")
            }
            ConfigWarning::NoApiRoutes => {
                f.write_str("force_json is on but no api_prefixes or patterns are configured")
            }
            ConfigWarning::AjaxDetectionDisabled => {
                f.write_str("json_rendering.force_ajax is off; XMLHttpRequest callers get HTML errors")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Default api prefix.
pub const DEFAULT_API_PREFIX: &str = "api";

/// Default page size.
pub const DEFAULT_PER_PAGE: u32 = 15;

/// Default page size ceiling.
pub const DEFAULT_MAX_PER_PAGE: u32 = 100;

/// Default API version.
pub const DEFAULT_API_VERSION: &str = "v1";

/// Default version header.
pub const DEFAULT_VERSION_HEADER: &str = "X-API-Version";

/// Reserved top-level key for the debug block.
pub const DEBUG_KEY: &str = "debug";

/// Recognised log levels.
const VALID_LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

// ---------------------------------------------------------------------------
// Config types
// ---------------------------------------------------------------------------

/// Top-level restkit configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct RestKitConfig {
    /// Force JSON rendering for api routes (default `true`). When off, only
    /// clients that ask for JSON get envelopes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_json: Option<bool>,

    /// Attach a debug block to envelopes (default `false`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<bool>,

    /// Local/development posture; enables stack traces in debug blocks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local: Option<bool>,

    /// Log level override (e.g. `"debug"`, `"info"`, `"warn"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Envelope key names.
    #[serde(default)]
    pub keys: KeysConfig,

    /// JSON rendering decision inputs.
    #[serde(default)]
    pub json_rendering: JsonRenderingConfig,

    /// Pagination limits.
    #[serde(default)]
    pub pagination: PaginationConfig,

    /// API versioning.
    #[serde(default)]
    pub versioning: VersioningConfig,
}

impl RestKitConfig {
    /// Effective `force_json`.
    pub fn force_json(&self) -> bool {
        self.force_json.unwrap_or(true)
    }

    /// Effective `debug`.
    pub fn debug(&self) -> bool {
        self.debug.unwrap_or(false)
    }

    /// Effective `local`.
    pub fn local(&self) -> bool {
        self.local.unwrap_or(false)
    }

    /// Effective log level.
    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or("info")
    }
}

/// Resolved top-level key names for one envelope kind.
///
/// `payload` is the data key for success envelopes and the errors key for
/// error envelopes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeKeys {
    /// Boolean success flag.
    pub root: String,
    /// Human-readable message.
    pub message: String,
    /// Numeric status.
    pub code: String,
    /// Data (success) or errors (error).
    pub payload: String,
    /// Meta mapping.
    pub meta: String,
}

impl EnvelopeKeys {
    /// All key names in envelope order.
    pub fn names(&self) -> [&str; 5] {
        [
            &self.root,
            &self.message,
            &self.code,
            &self.payload,
            &self.meta,
        ]
    }
}

/// Envelope key names for both kinds.
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct KeysConfig {
    /// Success envelope keys.
    #[serde(default)]
    pub success: SuccessKeys,
    /// Error envelope keys.
    #[serde(default)]
    pub error: ErrorKeys,
}

/// Success envelope key names.
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct SuccessKeys {
    /// Success flag key (default `success`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
    /// Message key (default `message`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Status key (default `status`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Data key (default `data`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    /// Meta key (default `meta`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<String>,
}

impl SuccessKeys {
    /// Resolve against the defaults.
    pub fn resolve(&self) -> EnvelopeKeys {
        EnvelopeKeys {
            root: or_default(&self.root, "success"),
            message: or_default(&self.message, "message"),
            code: or_default(&self.code, "status"),
            payload: or_default(&self.data, "data"),
            meta: or_default(&self.meta, "meta"),
        }
    }

    fn merge(self, overlay: Self) -> Self {
        Self {
            root: overlay.root.or(self.root),
            message: overlay.message.or(self.message),
            code: overlay.code.or(self.code),
            data: overlay.data.or(self.data),
            meta: overlay.meta.or(self.meta),
        }
    }
}

/// Error envelope key names.
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct ErrorKeys {
    /// Success flag key (default `success`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
    /// Message key (default `message`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Status key (default `status`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Errors key (default `errors`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<String>,
    /// Meta key (default `meta`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<String>,
}

impl ErrorKeys {
    /// Resolve against the defaults.
    pub fn resolve(&self) -> EnvelopeKeys {
        EnvelopeKeys {
            root: or_default(&self.root, "success"),
            message: or_default(&self.message, "message"),
            code: or_default(&self.code, "status"),
            payload: or_default(&self.errors, "errors"),
            meta: or_default(&self.meta, "meta"),
        }
    }

    fn merge(self, overlay: Self) -> Self {
        Self {
            root: overlay.root.or(self.root),
            message: overlay.message.or(self.message),
            code: overlay.code.or(self.code),
            errors: overlay.errors.or(self.errors),
            meta: overlay.meta.or(self.meta),
        }
    }
}

fn or_default(value: &Option<String>, fallback: &str) -> String {
    value.clone().unwrap_or_else(|| fallback.to_string())
}

/// A configured JSON rendering condition.
///
/// In TOML a bare string is a path pattern; a table `{ group = "api" }`
/// matches requests whose route declares that group.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(untagged)]
pub enum ConditionSpec {
    /// Wildcard path pattern.
    Pattern(String),
    /// Declared route group.
    Group {
        /// Group name.
        group: String,
    },
}

/// Inputs for the JSON rendering decision.
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct JsonRenderingConfig {
    /// Path prefixes that are always api routes (default `["api"]`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_prefixes: Option<Vec<String>>,
    /// Path patterns that are always api routes. `*` is the only wildcard.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patterns: Option<Vec<String>>,
    /// Ordered extra conditions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Vec<ConditionSpec>>,
    /// Render JSON for `X-Requested-With: XMLHttpRequest` (default `true`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_ajax: Option<bool>,
}

impl JsonRenderingConfig {
    /// Effective api prefixes.
    pub fn api_prefixes(&self) -> Vec<String> {
        self.api_prefixes
            .clone()
            .unwrap_or_else(|| vec![DEFAULT_API_PREFIX.to_string()])
    }

    /// Effective patterns.
    pub fn patterns(&self) -> Vec<String> {
        self.patterns.clone().unwrap_or_default()
    }

    /// Effective conditions.
    pub fn conditions(&self) -> Vec<ConditionSpec> {
        self.conditions.clone().unwrap_or_default()
    }

    /// Effective `force_ajax`.
    pub fn force_ajax(&self) -> bool {
        self.force_ajax.unwrap_or(true)
    }
}

/// Pagination limits.
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct PaginationConfig {
    /// Page size when the client does not ask for one (default 15).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_per_page: Option<u32>,
    /// Largest page size a client may ask for (default 100).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_per_page: Option<u32>,
}

impl PaginationConfig {
    /// Effective default page size.
    pub fn default_per_page(&self) -> u32 {
        self.default_per_page.unwrap_or(DEFAULT_PER_PAGE)
    }

    /// Effective page size ceiling.
    pub fn max_per_page(&self) -> u32 {
        self.max_per_page.unwrap_or(DEFAULT_MAX_PER_PAGE)
    }
}

/// API versioning.
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct VersioningConfig {
    /// Resolve versions per request (default `true`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// Version used when the request names none (default `v1`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    /// Request/response header carrying the version (default `X-API-Version`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
    /// Versions served besides the default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supported: Option<Vec<String>>,
}

impl VersioningConfig {
    /// Effective `enabled`.
    pub fn enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    /// Effective default version string.
    pub fn default_version(&self) -> &str {
        self.default.as_deref().unwrap_or(DEFAULT_API_VERSION)
    }

    /// Effective header name.
    pub fn header(&self) -> &str {
        self.header.as_deref().unwrap_or(DEFAULT_VERSION_HEADER)
    }

    /// Extra supported versions.
    pub fn supported(&self) -> &[String] {
        self.supported.as_deref().unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load a [`RestKitConfig`] from an optional TOML file path.
///
/// * If `path` is `Some`, reads and parses the file.
/// * If `path` is `None`, returns [`RestKitConfig::default()`].
///
/// Environment variable overrides are applied on top in both cases.
pub fn load_config(path: Option<&Path>) -> Result<RestKitConfig, ConfigError> {
    let mut config = match path {
        Some(p) => {
            let content = std::fs::read_to_string(p).map_err(|_| ConfigError::FileNotFound {
                path: p.display().to_string(),
            })?;
            parse_toml(&content)?
        }
        None => RestKitConfig::default(),
    };
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Parse a TOML string into a [`RestKitConfig`].
pub fn parse_toml(content: &str) -> Result<RestKitConfig, ConfigError> {
    toml::from_str::<RestKitConfig>(content).map_err(|e| ConfigError::ParseError {
        reason: e.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Env overrides
// ---------------------------------------------------------------------------

/// Apply environment variable overrides from the process environment.
///
/// Recognised variables:
/// - `RESTKIT_FORCE_JSON`
/// - `RESTKIT_DEBUG`
/// - `RESTKIT_ENV` (`local` turns on the local posture, anything else off)
/// - `RESTKIT_LOG_LEVEL`
pub fn apply_env_overrides(config: &mut RestKitConfig) {
    apply_overrides_from(config, |key| std::env::var(key).ok());
}

/// Apply overrides using `lookup` in place of the process environment.
///
/// Boolean variables accept `1/true/yes/on` and `0/false/no/off`; other
/// values are ignored.
pub fn apply_overrides_from(config: &mut RestKitConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("RESTKIT_FORCE_JSON").as_deref().and_then(parse_bool) {
        config.force_json = Some(v);
    }
    if let Some(v) = lookup("RESTKIT_DEBUG").as_deref().and_then(parse_bool) {
        config.debug = Some(v);
    }
    if let Some(env) = lookup("RESTKIT_ENV") {
        config.local = Some(env.trim().eq_ignore_ascii_case("local"));
    }
    if let Some(level) = lookup("RESTKIT_LOG_LEVEL") {
        config.log_level = Some(level);
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a parsed configuration, returning advisory warnings.
///
/// Hard errors (blank or clashing key names, bad globs, bad pagination or
/// versioning values) are returned as a [`ConfigError::ValidationError`];
/// soft issues come back as warnings.
pub fn validate_config(config: &RestKitConfig) -> Result<Vec<ConfigWarning>, ConfigError> {
    let mut errors: Vec<String> = Vec::new();
    let mut warnings: Vec<ConfigWarning> = Vec::new();

    if let Some(ref level) = config.log_level {
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            errors.push(format!("invalid log_level '{level}'"));
        }
    }

    check_keys("success", &config.keys.success.resolve(), &mut errors);
    check_keys("error", &config.keys.error.resolve(), &mut errors);

    let rendering = &config.json_rendering;
    if let Err(e) = rk_glob::PathPatterns::new(&rendering.patterns()) {
        errors.push(format!("json_rendering.patterns: {e}"));
    }
    for cond in rendering.conditions() {
        match cond {
            ConditionSpec::Pattern(p) => {
                if let Err(e) = rk_glob::PathPattern::new(&p) {
                    errors.push(format!("json_rendering.conditions: {e}"));
                }
            }
            ConditionSpec::Group { group } => {
                if group.trim().is_empty() {
                    errors.push("json_rendering.conditions: group name must not be empty".into());
                }
            }
        }
    }

    let max = config.pagination.max_per_page();
    let default = config.pagination.default_per_page();
    if max == 0 {
        errors.push("pagination.max_per_page must be at least 1".into());
    }
    if default == 0 || default > max {
        errors.push(format!(
            "pagination.default_per_page {default} out of range (1..={max})"
        ));
    }

    let versioning = &config.versioning;
    if !is_version_like(versioning.default_version()) {
        errors.push(format!(
            "versioning.default '{}' is not a version like v1 or 1.2",
            versioning.default_version()
        ));
    }
    for version in versioning.supported() {
        if !is_version_like(version) {
            errors.push(format!(
                "versioning.supported entry '{version}' is not a version like v1 or 1.2"
            ));
        }
    }
    if !is_header_name(versioning.header()) {
        errors.push(format!(
            "versioning.header '{}' is not a valid header name",
            versioning.header()
        ));
    }

    if config.debug() && !config.local() {
        warnings.push(ConfigWarning::DebugOutsideLocal);
    }
    if config.force_json()
        && rk_glob::PrefixSet::new(&rendering.api_prefixes()).is_empty()
        && rendering.patterns().is_empty()
    {
        warnings.push(ConfigWarning::NoApiRoutes);
    }
    if !rendering.force_ajax() {
        warnings.push(ConfigWarning::AjaxDetectionDisabled);
    }

    if errors.is_empty() {
        Ok(warnings)
    } else {
        Err(ConfigError::ValidationError { reasons: errors })
    }
}

fn check_keys(kind: &str, keys: &EnvelopeKeys, errors: &mut Vec<String>) {
    let names = keys.names();
    for (i, name) in names.iter().enumerate() {
        if name.trim().is_empty() {
            errors.push(format!("keys.{kind}: key names must not be empty"));
        } else if *name == DEBUG_KEY {
            errors.push(format!("keys.{kind}: '{DEBUG_KEY}' is reserved for the debug block"));
        } else if names[..i].contains(name) {
            errors.push(format!("keys.{kind}: duplicate key name '{name}'"));
        }
    }
}

fn is_version_like(raw: &str) -> bool {
    let s = raw.strip_prefix('v').unwrap_or(raw);
    let mut parts = s.splitn(2, '.');
    let major_ok = parts
        .next()
        .is_some_and(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()));
    let minor_ok = parts
        .next()
        .is_none_or(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()));
    major_ok && minor_ok
}

fn is_header_name(raw: &str) -> bool {
    !raw.is_empty()
        && raw
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b))
}

// ---------------------------------------------------------------------------
// Merging
// ---------------------------------------------------------------------------

/// Merge two configurations.  Values in `overlay` take precedence over `base`.
///
/// Leaves merge independently; list-valued settings are replaced, not
/// concatenated, so an overlay can narrow the api prefixes.
pub fn merge_configs(base: RestKitConfig, overlay: RestKitConfig) -> RestKitConfig {
    RestKitConfig {
        force_json: overlay.force_json.or(base.force_json),
        debug: overlay.debug.or(base.debug),
        local: overlay.local.or(base.local),
        log_level: overlay.log_level.or(base.log_level),
        keys: KeysConfig {
            success: base.keys.success.merge(overlay.keys.success),
            error: base.keys.error.merge(overlay.keys.error),
        },
        json_rendering: JsonRenderingConfig {
            api_prefixes: overlay
                .json_rendering
                .api_prefixes
                .or(base.json_rendering.api_prefixes),
            patterns: overlay
                .json_rendering
                .patterns
                .or(base.json_rendering.patterns),
            conditions: overlay
                .json_rendering
                .conditions
                .or(base.json_rendering.conditions),
            force_ajax: overlay
                .json_rendering
                .force_ajax
                .or(base.json_rendering.force_ajax),
        },
        pagination: PaginationConfig {
            default_per_page: overlay
                .pagination
                .default_per_page
                .or(base.pagination.default_per_page),
            max_per_page: overlay
                .pagination
                .max_per_page
                .or(base.pagination.max_per_page),
        },
        versioning: VersioningConfig {
            enabled: overlay.versioning.enabled.or(base.versioning.enabled),
            default: overlay.versioning.default.or(base.versioning.default),
            header: overlay.versioning.header.or(base.versioning.header),
            supported: overlay.versioning.supported.or(base.versioning.supported),
        },
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let cfg = RestKitConfig::default();
        let warnings = validate_config(&cfg).expect("default config should be valid");
        assert!(warnings.is_empty(), "unexpected warnings: {warnings:?}");
    }

    #[test]
    fn default_accessors_match_documented_defaults() {
        let cfg = RestKitConfig::default();
        assert!(cfg.force_json());
        assert!(!cfg.debug());
        assert!(!cfg.local());
        assert_eq!(cfg.log_level(), "info");
        assert_eq!(cfg.json_rendering.api_prefixes(), vec!["api".to_string()]);
        assert!(cfg.json_rendering.force_ajax());
        assert_eq!(cfg.pagination.default_per_page(), 15);
        assert_eq!(cfg.pagination.max_per_page(), 100);
        assert!(cfg.versioning.enabled());
        assert_eq!(cfg.versioning.default_version(), "v1");
        assert_eq!(cfg.versioning.header(), "X-API-Version");
    }

    #[test]
    fn default_keys_resolve() {
        let s = KeysConfig::default().success.resolve();
        assert_eq!(s.names(), ["success", "message", "status", "data", "meta"]);
        let e = KeysConfig::default().error.resolve();
        assert_eq!(e.names(), ["success", "message", "status", "errors", "meta"]);
    }

    #[test]
    fn parse_full_toml() {
        let toml = r#"
            force_json = true
            debug = true
            local = true
            log_level = "debug"

            [keys.success]
            root = "ok"
            data = "result"

            [keys.error]
            errors = "problems"

            [json_rendering]
            api_prefixes = ["api", "internal"]
            patterns = ["hooks/*"]
            conditions = ["admin/*", { group = "api" }]
            force_ajax = false

            [pagination]
            default_per_page = 20
            max_per_page = 50

            [versioning]
            enabled = false
            default = "v2"
            header = "X-Version"
            supported = ["v3", "2.1"]
        "#;
        let cfg = parse_toml(toml).unwrap();
        assert!(cfg.debug());
        assert!(cfg.local());
        assert_eq!(cfg.keys.success.resolve().root, "ok");
        assert_eq!(cfg.keys.success.resolve().payload, "result");
        assert_eq!(cfg.keys.error.resolve().payload, "problems");
        assert_eq!(
            cfg.json_rendering.conditions(),
            vec![
                ConditionSpec::Pattern("admin/*".into()),
                ConditionSpec::Group {
                    group: "api".into()
                }
            ]
        );
        assert!(!cfg.json_rendering.force_ajax());
        assert_eq!(cfg.pagination.default_per_page(), 20);
        assert!(!cfg.versioning.enabled());
        assert_eq!(cfg.versioning.header(), "X-Version");
        assert_eq!(cfg.versioning.supported(), ["v3", "2.1"]);
    }

    #[test]
    fn parse_invalid_toml_gives_parse_error() {
        let err = parse_toml("this is [not valid toml =").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn parse_wrong_types_gives_parse_error() {
        let err = parse_toml("force_json = \"sometimes\"").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn empty_string_toml_parses_to_defaults() {
        let cfg = parse_toml("").unwrap();
        assert_eq!(cfg, RestKitConfig::default());
    }

    #[test]
    fn validation_catches_duplicate_keys() {
        let mut cfg = RestKitConfig::default();
        cfg.keys.error.errors = Some("message".into());
        let err = validate_config(&cfg).unwrap_err();
        match err {
            ConfigError::ValidationError { reasons } => {
                assert!(reasons.iter().any(|r| r.contains("duplicate key name 'message'")));
            }
            other => panic!("expected ValidationError, got {other:?}"),
        }
    }

    #[test]
    fn validation_rejects_debug_key_name() {
        let mut cfg = RestKitConfig::default();
        cfg.keys.success.meta = Some("debug".into());
        assert!(matches!(
            validate_config(&cfg),
            Err(ConfigError::ValidationError { .. })
        ));
    }

    #[test]
    fn validation_rejects_blank_key_name() {
        let mut cfg = RestKitConfig::default();
        cfg.keys.success.root = Some("  ".into());
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn validation_accepts_literal_glob_metacharacters() {
        let mut cfg = RestKitConfig::default();
        cfg.json_rendering.patterns = Some(vec!["files/[draft]".into()]);
        cfg.json_rendering.conditions = Some(vec![ConditionSpec::Pattern("[".into())]);
        assert!(validate_config(&cfg).is_ok());
    }

    #[test]
    fn validation_catches_pagination_range() {
        let mut cfg = RestKitConfig::default();
        cfg.pagination.default_per_page = Some(500);
        assert!(validate_config(&cfg).is_err());
        cfg.pagination.default_per_page = Some(0);
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn validation_catches_bad_version_and_header() {
        let mut cfg = RestKitConfig::default();
        cfg.versioning.default = Some("latest".into());
        cfg.versioning.header = Some("X Version".into());
        cfg.versioning.supported = Some(vec!["v2".into(), "next".into()]);
        match validate_config(&cfg).unwrap_err() {
            ConfigError::ValidationError { reasons } => assert_eq!(reasons.len(), 3),
            other => panic!("expected ValidationError, got {other:?}"),
        }
    }

    #[test]
    fn version_like_accepts_common_forms() {
        assert!(is_version_like("v1"));
        assert!(is_version_like("1"));
        assert!(is_version_like("v2.3"));
        assert!(!is_version_like("v"));
        assert!(!is_version_like("v1."));
        assert!(!is_version_like("one"));
    }

    #[test]
    fn debug_outside_local_warns() {
        let cfg = RestKitConfig {
            debug: Some(true),
            ..Default::default()
        };
        let warnings = validate_config(&cfg).unwrap();
        assert!(warnings.contains(&ConfigWarning::DebugOutsideLocal));

        let local = RestKitConfig {
            debug: Some(true),
            local: Some(true),
            ..Default::default()
        };
        assert!(validate_config(&local).unwrap().is_empty());
    }

    #[test]
    fn empty_prefixes_warn() {
        let mut cfg = RestKitConfig::default();
        cfg.json_rendering.api_prefixes = Some(vec![]);
        let warnings = validate_config(&cfg).unwrap();
        assert!(warnings.contains(&ConfigWarning::NoApiRoutes));
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = [
            ("RESTKIT_FORCE_JSON", "off"),
            ("RESTKIT_DEBUG", "1"),
            ("RESTKIT_ENV", "Local"),
            ("RESTKIT_LOG_LEVEL", "warn"),
        ]
        .into_iter()
        .collect();
        let mut cfg = RestKitConfig::default();
        apply_overrides_from(&mut cfg, |k| env.get(k).map(|v| v.to_string()));
        assert!(!cfg.force_json());
        assert!(cfg.debug());
        assert!(cfg.local());
        assert_eq!(cfg.log_level(), "warn");
    }

    #[test]
    fn unrecognised_bool_is_ignored() {
        let mut cfg = RestKitConfig {
            debug: Some(true),
            ..Default::default()
        };
        apply_overrides_from(&mut cfg, |k| (k == "RESTKIT_DEBUG").then(|| "maybe".to_string()));
        assert_eq!(cfg.debug, Some(true));
    }

    #[test]
    fn production_env_turns_local_off() {
        let mut cfg = RestKitConfig {
            local: Some(true),
            ..Default::default()
        };
        apply_overrides_from(&mut cfg, |k| (k == "RESTKIT_ENV").then(|| "production".to_string()));
        assert!(!cfg.local());
    }

    #[test]
    fn merge_overlay_overrides_base() {
        let base = RestKitConfig {
            debug: Some(true),
            log_level: Some("info".into()),
            ..Default::default()
        };
        let overlay = RestKitConfig {
            log_level: Some("trace".into()),
            ..Default::default()
        };
        let merged = merge_configs(base, overlay);
        assert_eq!(merged.debug, Some(true));
        assert_eq!(merged.log_level(), "trace");
    }

    #[test]
    fn merge_keys_per_leaf() {
        let mut base = RestKitConfig::default();
        base.keys.success.root = Some("ok".into());
        let mut overlay = RestKitConfig::default();
        overlay.keys.success.data = Some("result".into());
        let merged = merge_configs(base, overlay);
        let keys = merged.keys.success.resolve();
        assert_eq!(keys.root, "ok");
        assert_eq!(keys.payload, "result");
    }

    #[test]
    fn merge_replaces_lists() {
        let mut base = RestKitConfig::default();
        base.json_rendering.api_prefixes = Some(vec!["api".into(), "v2".into()]);
        let mut overlay = RestKitConfig::default();
        overlay.json_rendering.api_prefixes = Some(vec!["internal".into()]);
        let merged = merge_configs(base, overlay);
        assert_eq!(merged.json_rendering.api_prefixes(), vec!["internal".to_string()]);
    }

    #[test]
    fn load_config_from_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "debug = true\n[pagination]\nmax_per_page = 40").unwrap();
        let cfg = load_config(Some(f.path())).unwrap();
        assert_eq!(cfg.pagination.max_per_page(), 40);
    }

    #[test]
    fn load_missing_file_gives_file_not_found() {
        let err = load_config(Some(Path::new("/nonexistent/restkit.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[test]
    fn toml_roundtrip() {
        let cfg = parse_toml("debug = true\n[json_rendering]\nconditions = [{ group = \"api\" }]")
            .unwrap();
        let s = toml::to_string(&cfg).unwrap();
        assert_eq!(parse_toml(&s).unwrap(), cfg);
    }

    #[test]
    fn config_error_display() {
        let err = ConfigError::FileNotFound {
            path: "/tmp/x.toml".into(),
        };
        assert_eq!(err.to_string(), "config file not found: /tmp/x.toml");
    }
}
