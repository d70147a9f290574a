// SPDX-License-Identifier: MIT OR Apache-2.0
//! Success and error envelopes.
//!
//! [`ResponseEnvelope`] turns a handler result or a classified failure into
//! an [`Envelope`]: a flat JSON object whose five logical fields (flag,
//! message, status, data/errors, meta) sit under configurable key names. When
//! debug mode is on an extra `debug` block is attached; see [`debug`].

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod debug;

use rk_config::{EnvelopeKeys, RestKitConfig};
use rk_error::Failure;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

pub use rk_config::DEBUG_KEY;

/// Default success message.
pub const DEFAULT_SUCCESS_MESSAGE: &str = "Success";

/// Default error message.
pub const DEFAULT_ERROR_MESSAGE: &str = "Error";

/// Which of the two envelope shapes a value has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvelopeKind {
    /// `root = true`, payload under the data key.
    Success,
    /// `root = false`, payload under the errors key.
    Error,
}

/// Rendering settings, resolved once from [`RestKitConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeSettings {
    /// Key names for success envelopes.
    pub success_keys: EnvelopeKeys,
    /// Key names for error envelopes.
    pub error_keys: EnvelopeKeys,
    /// Attach a debug block.
    pub debug: bool,
    /// Local posture: add stack traces to error debug blocks.
    pub local: bool,
}

impl EnvelopeSettings {
    /// Resolve settings from a loaded configuration.
    pub fn from_config(config: &RestKitConfig) -> Self {
        Self {
            success_keys: config.keys.success.resolve(),
            error_keys: config.keys.error.resolve(),
            debug: config.debug(),
            local: config.local(),
        }
    }

    /// Key names for `kind`.
    pub fn keys(&self, kind: EnvelopeKind) -> &EnvelopeKeys {
        match kind {
            EnvelopeKind::Success => &self.success_keys,
            EnvelopeKind::Error => &self.error_keys,
        }
    }
}

impl Default for EnvelopeSettings {
    fn default() -> Self {
        Self::from_config(&RestKitConfig::default())
    }
}

/// A rendered envelope.
///
/// Immutable once built. Serialises as its JSON body; the HTTP status is
/// carried alongside so the host can use it unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    kind: EnvelopeKind,
    status: u16,
    keys: EnvelopeKeys,
    body: Map<String, Value>,
}

impl Envelope {
    /// Success or error.
    pub fn kind(&self) -> EnvelopeKind {
        self.kind
    }

    /// Whether this is a success envelope.
    pub fn is_success(&self) -> bool {
        self.kind == EnvelopeKind::Success
    }

    /// HTTP status the envelope was rendered for.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// The message field.
    pub fn message(&self) -> Option<&str> {
        self.body.get(&self.keys.message).and_then(Value::as_str)
    }

    /// The data (success) or errors (error) field.
    pub fn payload(&self) -> Option<&Value> {
        self.body.get(&self.keys.payload).filter(|v| !v.is_null())
    }

    /// The meta field.
    pub fn meta(&self) -> Option<&Map<String, Value>> {
        self.body.get(&self.keys.meta).and_then(Value::as_object)
    }

    /// The debug block, when debug mode was on.
    pub fn debug(&self) -> Option<&Map<String, Value>> {
        self.body.get(DEBUG_KEY).and_then(Value::as_object)
    }

    /// The full JSON body.
    pub fn body(&self) -> &Map<String, Value> {
        &self.body
    }

    /// Consume into the JSON body.
    pub fn into_body(self) -> Map<String, Value> {
        self.body
    }

    /// The body as a [`Value`].
    pub fn to_value(&self) -> Value {
        Value::Object(self.body.clone())
    }
}

impl Serialize for Envelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.body.serialize(serializer)
    }
}

/// Envelope builder.
#[derive(Debug, Clone, Default)]
pub struct ResponseEnvelope {
    settings: EnvelopeSettings,
}

impl ResponseEnvelope {
    /// Create a builder with the given settings.
    pub fn new(settings: EnvelopeSettings) -> Self {
        Self { settings }
    }

    /// The settings in use.
    pub fn settings(&self) -> &EnvelopeSettings {
        &self.settings
    }

    /// Render a success envelope.
    ///
    /// The data key is always present (`null` when `data` is `None`) and meta
    /// is an object, empty when not supplied.
    pub fn render_success(
        &self,
        data: Option<Value>,
        message: &str,
        status: u16,
        meta: Map<String, Value>,
    ) -> Envelope {
        let mut envelope = self.build(EnvelopeKind::Success, message, status, data, meta);
        if self.settings.debug {
            envelope
                .body
                .insert(DEBUG_KEY.into(), Value::Object(debug::base_block()));
        }
        envelope
    }

    /// Render an error envelope.
    ///
    /// `failure` is the originating failure, if any; with debug mode on it
    /// contributes an `exception` entry to the debug block.
    pub fn render_error(
        &self,
        message: &str,
        status: u16,
        errors: Option<Value>,
        meta: Map<String, Value>,
        failure: Option<&Failure>,
    ) -> Envelope {
        let mut envelope = self.build(EnvelopeKind::Error, message, status, errors, meta);
        if self.settings.debug {
            let block = debug::error_block(failure, self.settings.local);
            envelope.body.insert(DEBUG_KEY.into(), Value::Object(block));
        }
        envelope
    }

    fn build(
        &self,
        kind: EnvelopeKind,
        message: &str,
        status: u16,
        payload: Option<Value>,
        meta: Map<String, Value>,
    ) -> Envelope {
        let keys = self.settings.keys(kind).clone();
        let mut body = Map::new();
        body.insert(
            keys.root.clone(),
            Value::Bool(kind == EnvelopeKind::Success),
        );
        body.insert(keys.message.clone(), Value::from(message));
        body.insert(keys.code.clone(), Value::from(status));
        body.insert(keys.payload.clone(), payload.unwrap_or(Value::Null));
        body.insert(keys.meta.clone(), Value::Object(meta));
        Envelope {
            kind,
            status,
            keys,
            body,
        }
    }
}
