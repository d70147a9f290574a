// SPDX-License-Identifier: MIT OR Apache-2.0
//! One-shot validation errors carried across a redirect.
//!
//! A browser form that fails validation is redirected back; the field errors
//! are parked here under a random id and the id travels in a short-lived
//! cookie. The next page render takes them out again.

use axum::http::{HeaderMap, HeaderValue, header};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Cookie naming the parked errors.
pub const FLASH_COOKIE: &str = "flash";

/// How long parked errors survive without being read.
pub const FLASH_TTL: Duration = Duration::from_secs(300);

/// Field name → messages.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// In-memory flash storage shared by all requests.
#[derive(Debug, Clone, Default)]
pub struct FlashStore {
    entries: Arc<Mutex<HashMap<Uuid, (Instant, FieldErrors)>>>,
}

impl FlashStore {
    /// Park `errors` and return the id to hand to the browser.
    pub async fn put(&self, errors: FieldErrors) -> Uuid {
        let now = Instant::now();
        let id = Uuid::new_v4();
        let mut entries = self.entries.lock().await;
        entries.retain(|_, (at, _)| now.duration_since(*at) <= FLASH_TTL);
        entries.insert(id, (now, errors));
        id
    }

    /// Remove and return the errors parked under `id`, unless expired.
    pub async fn take(&self, id: Uuid) -> Option<FieldErrors> {
        let (at, errors) = self.entries.lock().await.remove(&id)?;
        (at.elapsed() <= FLASH_TTL).then_some(errors)
    }
}

/// Value of the cookie `name`, if the request sent a non-empty one.
pub fn cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(n, v)| *n == name && !v.is_empty())
        .map(|(_, v)| v)
}

/// Flash id sent back by the browser.
pub fn flash_id(headers: &HeaderMap) -> Option<Uuid> {
    cookie(headers, FLASH_COOKIE).and_then(|v| Uuid::parse_str(v).ok())
}

/// `Set-Cookie` handing `id` to the browser.
pub fn set_cookie(id: Uuid) -> HeaderValue {
    let value = format!(
        "{FLASH_COOKIE}={id}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
        FLASH_TTL.as_secs()
    );
    HeaderValue::from_str(&value).unwrap_or_else(|_| clear_cookie())
}

/// `Set-Cookie` dropping the flash cookie.
pub fn clear_cookie() -> HeaderValue {
    HeaderValue::from_static("flash=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax")
}
