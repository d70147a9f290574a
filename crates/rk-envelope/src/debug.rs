// SPDX-License-Identifier: MIT OR Apache-2.0
//! Debug block contents.
//!
//! Every debug block carries `timestamp` and `memory`. Error blocks add an
//! `exception` entry when an originating failure is known, and a `trace`
//! when running in the local posture.

use chrono::{SecondsFormat, Utc};
use rk_error::{Failure, classify};
use serde_json::{Map, Value, json};
use std::backtrace::Backtrace;

/// `timestamp` and `memory`, the fields shared by every debug block.
pub fn base_block() -> Map<String, Value> {
    let mut block = Map::new();
    block.insert(
        "timestamp".into(),
        Value::from(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)),
    );
    block.insert(
        "memory".into(),
        resident_memory_bytes().map_or(Value::Null, Value::from),
    );
    block
}

/// Debug block for an error envelope.
pub fn error_block(failure: Option<&Failure>, local: bool) -> Map<String, Value> {
    let mut block = base_block();
    if let Some(failure) = failure {
        block.insert("exception".into(), describe_failure(failure));
    }
    if local {
        block.insert("trace".into(), capture_trace());
    }
    block
}

/// The `exception` entry for `failure`.
pub fn describe_failure(failure: &Failure) -> Value {
    let classification = classify(failure);
    let message = if failure.message.is_empty() {
        classification.message
    } else {
        failure.message.clone()
    };
    json!({
        "type": classification.category.as_str(),
        "message": message,
        "code": failure.originating_code(),
        "file": failure.file(),
        "line": failure.line(),
    })
}

fn capture_trace() -> Value {
    let trace = Backtrace::force_capture().to_string();
    Value::Array(
        trace
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(Value::from)
            .collect(),
    )
}

/// Resident set size of this process in bytes, where the platform exposes it.
pub fn resident_memory_bytes() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    parse_vm_rss(&status)
}

fn parse_vm_rss(status: &str) -> Option<u64> {
    let line = status.lines().find(|l| l.starts_with("VmRSS:"))?;
    let mut fields = line["VmRSS:".len()..].split_whitespace();
    let value: u64 = fields.next()?.parse().ok()?;
    let scale = match fields.next() {
        Some("kB") | Some("KB") => 1024,
        Some("mB") | Some("MB") => 1024 * 1024,
        _ => 1,
    };
    Some(value * scale)
}
