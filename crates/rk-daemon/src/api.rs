// SPDX-License-Identifier: MIT OR Apache-2.0
//! Demo handlers and their in-memory store.
//!
//! The api routes answer with envelopes on success and raise [`Failure`]s on
//! error; the web routes behave like a server-rendered app. Which failures
//! end up as JSON is decided by the dispatch middleware, not here.

use crate::AppState;
use crate::error::ApiError;
use crate::extract::{FormBody, JsonBody};
use crate::flash::{self, FieldErrors};
use crate::pagination::PageRequest;
use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, header},
    response::{Html, IntoResponse, Redirect, Response},
};
use chrono::{DateTime, Utc};
use rk_config::RestKitConfig;
use rk_error::{Failure, SQLSTATE_DUPLICATE, SQLSTATE_FOREIGN_KEY, SQLSTATE_NOT_NULL};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Token that passes the admin check.
pub const ADMIN_TOKEN: &str = "admin-token";

/// Cookie carrying the browser session token.
pub const SESSION_COOKIE: &str = "session";

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A registered user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// A placed order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: u64,
    pub user_id: u64,
    pub reference: String,
    pub quantity: u32,
}

/// `POST /users` body. Every field is optional so missing input surfaces as
/// a validation failure rather than a body rejection.
#[derive(Debug, Default, Deserialize)]
pub struct NewUser {
    pub name: Option<String>,
    pub email: Option<String>,
}

/// `POST /orders` body.
#[derive(Debug, Default, Deserialize)]
pub struct NewOrder {
    pub user_id: Option<u64>,
    pub reference: Option<String>,
    pub quantity: Option<u32>,
}

/// `POST /profile/update` form.
#[derive(Debug, Default, Deserialize)]
pub struct ProfileForm {
    pub name: Option<String>,
    pub email: Option<String>,
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// In-memory tables. Inserts enforce constraints the way a database would,
/// reporting violations as database failures with SQLSTATE codes.
#[derive(Debug, Default)]
pub struct DemoStore {
    users: RwLock<Vec<User>>,
    orders: RwLock<Vec<Order>>,
}

impl DemoStore {
    /// All users in insertion order.
    pub async fn users(&self) -> Vec<User> {
        self.users.read().await.clone()
    }

    /// Look up a user.
    pub async fn user(&self, id: u64) -> Option<User> {
        self.users.read().await.iter().find(|u| u.id == id).cloned()
    }

    /// Whether `email` is taken.
    pub async fn email_taken(&self, email: &str) -> bool {
        self.users
            .read()
            .await
            .iter()
            .any(|u| u.email.eq_ignore_ascii_case(email))
    }

    /// Insert a user; `email` is unique.
    pub async fn insert_user(&self, name: String, email: String) -> Result<User, Failure> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.email.eq_ignore_ascii_case(&email)) {
            return Err(Failure::database(
                Some(SQLSTATE_DUPLICATE),
                "duplicate key value violates unique constraint \"users_email_unique\"",
            ));
        }
        let user = User {
            id: users.last().map_or(1, |u| u.id + 1),
            name,
            email,
            created_at: Utc::now(),
        };
        users.push(user.clone());
        Ok(user)
    }

    /// All orders in insertion order.
    pub async fn orders(&self) -> Vec<Order> {
        self.orders.read().await.clone()
    }

    /// Insert an order; `reference` is required and unique, `user_id` must
    /// reference a user.
    pub async fn insert_order(&self, new: NewOrder) -> Result<Order, Failure> {
        let Some(reference) = new.reference.filter(|r| !r.trim().is_empty()) else {
            return Err(Failure::database(
                Some(SQLSTATE_NOT_NULL),
                "null value in column \"reference\" violates not-null constraint",
            ));
        };
        let user_id = new.user_id.unwrap_or_default();
        if self.user(user_id).await.is_none() {
            return Err(Failure::database(
                Some(SQLSTATE_FOREIGN_KEY),
                "insert on table \"orders\" violates foreign key constraint \"orders_user_id_foreign\"",
            )
            .with_context("user_id", user_id));
        }

        let mut orders = self.orders.write().await;
        if orders.iter().any(|o| o.reference == reference) {
            return Err(Failure::database(
                Some(SQLSTATE_DUPLICATE),
                "duplicate key value violates unique constraint \"orders_reference_unique\"",
            )
            .with_context("reference", &reference));
        }
        let order = Order {
            id: orders.last().map_or(1, |o| o.id + 1),
            user_id,
            reference,
            quantity: new.quantity.unwrap_or(1),
        };
        orders.push(order.clone());
        Ok(order)
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Collects field errors; an empty collection passes.
#[derive(Debug, Default)]
struct Rules(BTreeMap<String, Vec<String>>);

impl Rules {
    fn fail(&mut self, field: &str, message: String) {
        self.0.entry(field.to_string()).or_default().push(message);
    }

    /// Trimmed value when present and non-blank.
    fn required(&mut self, field: &str, value: Option<&str>) -> Option<String> {
        match value.map(str::trim).filter(|v| !v.is_empty()) {
            Some(v) => Some(v.to_string()),
            None => {
                self.fail(field, format!("The {field} field is required."));
                None
            }
        }
    }

    fn max_len(&mut self, field: &str, value: &str, max: usize) {
        if value.chars().count() > max {
            self.fail(
                field,
                format!("The {field} field must not be greater than {max} characters."),
            );
        }
    }

    fn email(&mut self, field: &str, value: &str) {
        let valid = value
            .split_once('@')
            .is_some_and(|(local, domain)| {
                !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
            });
        if !valid {
            self.fail(
                field,
                format!("The {field} field must be a valid email address."),
            );
        }
    }

    fn finish(self) -> Result<(), Failure> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(Failure::validation_errors(self.0))
        }
    }
}

fn validate_person(
    rules: &mut Rules,
    name: Option<&str>,
    email: Option<&str>,
) -> Option<(String, String)> {
    let name = rules.required("name", name);
    if let Some(name) = &name {
        rules.max_len("name", name, 255);
    }
    let email = rules.required("email", email);
    if let Some(email) = &email {
        rules.email("email", email);
    }
    name.zip(email)
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

/// Bearer token, falling back to the session cookie.
fn credential(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }
    flash::cookie(headers, SESSION_COOKIE).map(str::to_string)
}

/// Unauthenticated without a credential, forbidden without the admin token.
pub fn require_admin(headers: &HeaderMap) -> Result<(), Failure> {
    match credential(headers) {
        None => Err(Failure::unauthenticated()),
        Some(token) if token == ADMIN_TOKEN => Ok(()),
        Some(_) => Err(Failure::forbidden()),
    }
}

fn settings_view(config: &RestKitConfig) -> serde_json::Value {
    json!({
        "force_json": config.force_json(),
        "debug": config.debug(),
        "local": config.local(),
        "api_prefixes": config.json_rendering.api_prefixes(),
        "force_ajax": config.json_rendering.force_ajax(),
    })
}

// ---------------------------------------------------------------------------
// Api handlers
// ---------------------------------------------------------------------------

pub(crate) async fn list_users(
    State(state): State<Arc<AppState>>,
    page: PageRequest,
) -> Response {
    let users = state.store.users().await;
    state.respond.paginated(page.paginate(&users))
}

pub(crate) async fn create_user(
    State(state): State<Arc<AppState>>,
    JsonBody(body): JsonBody<NewUser>,
) -> Result<Response, ApiError> {
    let mut rules = Rules::default();
    let person = validate_person(&mut rules, body.name.as_deref(), body.email.as_deref());
    if let Some((_, email)) = &person {
        if state.store.email_taken(email).await {
            rules.fail("email", "The email has already been taken.".to_string());
        }
    }
    rules.finish()?;

    let Some((name, email)) = person else {
        return Err(Failure::validation().into());
    };
    let user = state.store.insert_user(name, email).await?;
    Ok(state.respond.created(user))
}

pub(crate) async fn show_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id: u64 = id.parse().map_err(|_| Failure::not_found())?;
    let user = state
        .store
        .user(id)
        .await
        .ok_or_else(|| Failure::api(404, "User not found").with_context("user_id", id))?;
    Ok(state.respond.success(user))
}

pub(crate) async fn list_orders(State(state): State<Arc<AppState>>) -> Response {
    state.respond.success(state.store.orders().await)
}

pub(crate) async fn create_order(
    State(state): State<Arc<AppState>>,
    JsonBody(body): JsonBody<NewOrder>,
) -> Result<Response, ApiError> {
    let order = state.store.insert_order(body).await?;
    Ok(state.respond.created(order))
}

pub(crate) async fn admin_settings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    require_admin(&headers)?;
    Ok(state.respond.success(settings_view(&state.config)))
}

// ---------------------------------------------------------------------------
// Web handlers
// ---------------------------------------------------------------------------

pub(crate) async fn profile_page(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    let Some(id) = flash::flash_id(&headers) else {
        return Html(profile_form(None)).into_response();
    };
    let errors = state.flash.take(id).await;
    let mut resp = Html(profile_form(errors.as_ref())).into_response();
    resp.headers_mut()
        .append(header::SET_COOKIE, flash::clear_cookie());
    resp
}

fn profile_form(errors: Option<&FieldErrors>) -> String {
    let list: String = errors
        .into_iter()
        .flat_map(|errors| errors.iter())
        .flat_map(|(field, messages)| messages.iter().map(move |m| (field, m)))
        .map(|(field, m)| {
            format!(
                "<li data-field=\"{}\">{}</li>",
                escape_html(field),
                escape_html(m)
            )
        })
        .collect();
    let list = if list.is_empty() {
        String::new()
    } else {
        format!("<ul class=\"errors\">{list}</ul>")
    };
    format!(
        "<!doctype html><html><body>{list}<form method=\"post\" action=\"/profile/update\">\
         <input name=\"name\"><input name=\"email\"><button>Save</button>\
         </form></body></html>"
    )
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub(crate) async fn update_profile(
    FormBody(form): FormBody<ProfileForm>,
) -> Result<Redirect, ApiError> {
    let mut rules = Rules::default();
    validate_person(&mut rules, form.name.as_deref(), form.email.as_deref());
    rules
        .finish()
        .map_err(|failure| ApiError::from(failure).redirect_back("/profile"))?;
    Ok(Redirect::to("/profile"))
}

pub(crate) async fn web_admin_settings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    require_admin(&headers)?;
    let view = settings_view(&state.config);
    let body =
        format!("<!doctype html><html><body><h1>Settings</h1><pre>{view}</pre></body></html>");
    Ok(Html(body).into_response())
}

pub(crate) async fn login_page() -> Html<&'static str> {
    Html(
        "<!doctype html><html><body><h1>Sign in</h1>\
         <p>Send <code>Authorization: Bearer &lt;token&gt;</code> or a \
         <code>session</code> cookie.</p></body></html>",
    )
}

pub(crate) async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "time": Utc::now().to_rfc3339(),
    }))
}

pub(crate) async fn config_schema() -> Result<Json<serde_json::Value>, ApiError> {
    let schema = schemars::schema_for!(RestKitConfig);
    let value = serde_json::to_value(&schema).map_err(Failure::from_error)?;
    Ok(Json(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn rules_collect_messages_per_field() {
        let mut rules = Rules::default();
        assert!(validate_person(&mut rules, None, Some("nope")).is_none());
        let Err(failure) = rules.finish() else {
            panic!("expected validation failure");
        };
        let c = rk_error::classify(&failure);
        assert_eq!(c.status, 422);
        let errors = c.errors.unwrap();
        assert_eq!(errors["name"][0], "The name field is required.");
        assert_eq!(errors["email"][0], "The email field must be a valid email address.");
    }

    #[test]
    fn blank_values_count_as_missing() {
        let mut rules = Rules::default();
        assert!(validate_person(&mut rules, Some("  "), Some("a@b.io")).is_none());
        assert!(rules.finish().is_err());
    }

    #[test]
    fn credential_from_bearer_or_cookie() {
        let mut headers = HeaderMap::new();
        assert_eq!(require_admin(&headers).unwrap_err().kind, rk_error::FailureKind::Authentication);

        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; session=guest"));
        assert_eq!(require_admin(&headers).unwrap_err().kind, rk_error::FailureKind::Authorization);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer admin-token"));
        assert!(require_admin(&headers).is_ok());
    }

    #[test]
    fn profile_form_lists_flashed_errors() {
        assert!(!profile_form(None).contains("class=\"errors\""));
        let errors = BTreeMap::from([(
            "email".to_string(),
            vec!["The email field must be a valid <email> address.".to_string()],
        )]);
        let page = profile_form(Some(&errors));
        assert!(page.contains("<li data-field=\"email\">"));
        assert!(page.contains("valid &lt;email&gt; address."));
    }

    #[tokio::test]
    async fn store_reports_constraint_codes() {
        let store = DemoStore::default();
        let user = store.insert_user("Ada".into(), "ada@example.com".into()).await.unwrap();

        let dup = store.insert_user("Ada".into(), "ADA@example.com".into()).await.unwrap_err();
        assert_eq!(rk_error::classify(&dup).status, 409);

        let missing = store.insert_order(NewOrder::default()).await.unwrap_err();
        assert_eq!(rk_error::classify(&missing).message, "Missing required field");

        let orphan = NewOrder {
            user_id: Some(99),
            reference: Some("A-1".into()),
            quantity: None,
        };
        let fk = store.insert_order(orphan).await.unwrap_err();
        assert_eq!(rk_error::classify(&fk).message, "Resource conflict");

        let order = NewOrder {
            user_id: Some(user.id),
            reference: Some("A-1".into()),
            quantity: Some(2),
        };
        assert_eq!(store.insert_order(order).await.unwrap().quantity, 2);
        let again = NewOrder {
            user_id: Some(user.id),
            reference: Some("A-1".into()),
            quantity: None,
        };
        let dup = store.insert_order(again).await.unwrap_err();
        assert_eq!(rk_error::classify(&dup).message, "Duplicate resource");
    }
}
