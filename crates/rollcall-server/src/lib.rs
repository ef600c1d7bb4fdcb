//! HTTP server assembly for Rollcall: configuration, application state and
//! the top-level router.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use axum::{Router, http::HeaderName};
use rollcall_api::{ApiSettings, AppState};
use rollcall_core::{analytics::local_offset, store::AttendanceStore};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `ROLLCALL_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
  pub host:               String,
  pub port:               u16,
  pub store_path:         PathBuf,
  /// Minutes east of UTC for the lab's local time.
  pub utc_offset_minutes: i32,
  /// Header the identity-aware proxy uses for the caller's email.
  pub identity_header:    String,
  /// Emails granted admin rights at startup.
  pub admin_emails:       Vec<String>,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:               "127.0.0.1".to_string(),
      port:               8080,
      store_path:         PathBuf::from("~/.local/share/rollcall/rollcall.db"),
      utc_offset_minutes: 0,
      identity_header:    "x-forwarded-email".to_string(),
      admin_emails:       Vec::new(),
    }
  }
}

impl ServerConfig {
  /// Validate and convert the parts of the config the API layer needs.
  pub fn api_settings(&self) -> anyhow::Result<ApiSettings> {
    let utc_offset = local_offset(self.utc_offset_minutes)
      .context("invalid utc_offset_minutes")?;
    let identity_header = HeaderName::try_from(self.identity_header.trim())
      .with_context(|| format!("invalid identity_header {:?}", self.identity_header))?;
    Ok(ApiSettings { utc_offset, identity_header })
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

// ─── Startup ─────────────────────────────────────────────────────────────────

/// Grant admin rights to every configured email.
pub async fn seed_admins<S>(store: &S, emails: &[String]) -> anyhow::Result<()>
where
  S: AttendanceStore,
{
  for email in emails.iter().map(|e| e.trim()).filter(|e| !e.is_empty()) {
    store
      .add_admin(email.to_owned())
      .await
      .with_context(|| format!("failed to seed admin {email}"))?;
  }
  tracing::info!(count = emails.len(), "seeded admins");
  Ok(())
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the full application: the JSON API under `/api`, with request
/// tracing.
pub fn app<S>(state: AppState<S>) -> Router
where
  S: AttendanceStore + 'static,
{
  Router::new()
    .nest("/api", rollcall_api::api_router(state))
    .layer(TraceLayer::new_for_http())
}

/// Convenience for callers that already own the store.
pub fn state_for<S>(store: S, settings: ApiSettings) -> AppState<S> {
  AppState { store: Arc::new(store), settings: Arc::new(settings) }
}

#[cfg(test)]
mod tests {
  use super::*;

  use axum::{
    body::Body,
    http::{Request, StatusCode},
  };
  use rollcall_store_sqlite::SqliteStore;
  use tower::ServiceExt as _;

  async fn make_state() -> AppState<SqliteStore> {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let settings = ServerConfig::default().api_settings().unwrap();
    state_for(store, settings)
  }

  async fn get(state: AppState<SqliteStore>, uri: &str, email: Option<&str>) -> axum::response::Response {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(email) = email {
      builder = builder.header("x-forwarded-email", email);
    }
    app(state).oneshot(builder.body(Body::empty()).unwrap()).await.unwrap()
  }

  // ── Configuration ────────────────────────────────────────────────────────

  #[test]
  fn config_defaults_fill_missing_keys() {
    let cfg: ServerConfig = config::Config::builder()
      .set_override("port", 9000)
      .unwrap()
      .build()
      .unwrap()
      .try_deserialize()
      .unwrap();
    assert_eq!(cfg.port, 9000);
    assert_eq!(cfg.host, "127.0.0.1");
    assert_eq!(cfg.identity_header, "x-forwarded-email");
    assert_eq!(cfg.address(), "127.0.0.1:9000");
  }

  #[test]
  fn api_settings_validate_offset_and_header() {
    let ok = ServerConfig { utc_offset_minutes: 330, ..Default::default() };
    let settings = ok.api_settings().unwrap();
    assert_eq!(settings.utc_offset.local_minus_utc(), 330 * 60);

    let bad_offset = ServerConfig { utc_offset_minutes: 24 * 60, ..Default::default() };
    assert!(bad_offset.api_settings().is_err());

    let bad_header = ServerConfig { identity_header: "not a header".into(), ..Default::default() };
    assert!(bad_header.api_settings().is_err());

    let mixed_case = ServerConfig { identity_header: "X-Auth-Email".into(), ..Default::default() };
    assert_eq!(mixed_case.api_settings().unwrap().identity_header, "x-auth-email");
  }

  #[test]
  fn expand_tilde_uses_home() {
    let Ok(home) = std::env::var("HOME") else { return };
    assert_eq!(expand_tilde(Path::new("~/x.db")), PathBuf::from(home).join("x.db"));
    assert_eq!(expand_tilde(Path::new("/tmp/x.db")), PathBuf::from("/tmp/x.db"));
  }

  // ── Router ───────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn api_is_nested_under_prefix() {
    let state = make_state().await;
    assert_eq!(get(state.clone(), "/api/health", None).await.status(), StatusCode::OK);
    assert_eq!(get(state, "/health", None).await.status(), StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn seeded_admins_pass_admin_check() {
    let state = make_state().await;
    seed_admins(state.store.as_ref(), &["Ops@Lab.example".into(), " ".into()])
      .await
      .unwrap();

    let resp = get(state, "/api/admin/check", Some("ops@lab.example")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["isAdmin"], true);
  }
}
