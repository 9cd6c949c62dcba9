//! Sign-in, token refresh and the signed-in administrator's profile.

use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::client::ApiClient;
use super::types::Ack;
use crate::cache::{CacheLayer, Tag};
use crate::fallback;
use crate::query::Query;
use crate::session::{string_or_number, SessionStore, UserIdentity};

pub fn profile_tag() -> Tag {
  Tag::new("Profile")
}

/// Token pair issued by login, registration and refresh.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthTokens {
  #[serde(alias = "accessToken")]
  pub token: String,
  #[serde(default)]
  pub refresh_token: Option<String>,
  #[serde(default)]
  pub user: Option<UserIdentity>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
  #[serde(deserialize_with = "string_or_number")]
  pub id: String,
  pub name: String,
  pub email: String,
  pub role: String,
  #[serde(default)]
  pub institution: Option<String>,
  #[serde(default)]
  pub phone: Option<String>,
}

impl From<UserIdentity> for Profile {
  fn from(user: UserIdentity) -> Self {
    Self {
      id: user.id,
      name: user.name,
      email: user.email,
      role: user.role,
      institution: user.institution,
      phone: None,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
  pub name: String,
  pub email: String,
  pub password: String,
  pub institution: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub email: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChange {
  pub current_password: String,
  pub new_password: String,
}

#[derive(Serialize)]
struct Credentials<'a> {
  email: &'a str,
  password: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
  refresh_token: &'a str,
}

#[derive(Serialize)]
struct EmailOnly<'a> {
  email: &'a str,
}

#[derive(Clone)]
pub struct AuthApi {
  api: ApiClient,
  cache: CacheLayer,
}

impl AuthApi {
  pub fn new(api: ApiClient, cache: CacheLayer) -> Self {
    Self { api, cache }
  }

  pub fn session(&self) -> &SessionStore {
    self.api.session()
  }

  pub async fn login(&self, email: &str, password: &str) -> Result<UserIdentity> {
    let request = async {
      let tokens: AuthTokens = self
        .api
        .post("/auth/login", &Credentials { email, password })
        .await?;
      self.install(tokens)
    };
    let user = self.cache.mutate("login", &[profile_tag()], request).await?;
    info!(user = %user.email, "signed in");
    Ok(user)
  }

  pub async fn register(&self, registration: &Registration) -> Result<UserIdentity> {
    let request = async {
      let tokens: AuthTokens = self.api.post("/auth/register", registration).await?;
      self.install(tokens)
    };
    let user = self
      .cache
      .mutate("register", &[profile_tag()], request)
      .await?;
    info!(user = %user.email, "registered and signed in");
    Ok(user)
  }

  /// Swap the refresh token for a new token pair.
  ///
  /// A response without a refresh token keeps the current one.
  pub async fn refresh_session(&self) -> Result<()> {
    let refresh_token = self
      .session()
      .refresh_token()
      .ok_or_else(|| eyre!("No refresh token in session"))?;

    let tokens: AuthTokens = self
      .api
      .post(
        "/auth/refresh-token",
        &RefreshRequest {
          refresh_token: &refresh_token,
        },
      )
      .await?;

    let next_refresh = tokens.refresh_token.as_deref().unwrap_or(&refresh_token);
    self
      .session()
      .set_credentials(&tokens.token, next_refresh, tokens.user)?;
    info!("session refreshed");
    Ok(())
  }

  /// Sign out locally regardless of whether the backend acknowledges it,
  /// and drop everything cached for the previous identity.
  pub async fn logout(&self) {
    if let Some(refresh_token) = self.session().refresh_token() {
      let result: Result<Ack> = self
        .api
        .post(
          "/auth/logout",
          &RefreshRequest {
            refresh_token: &refresh_token,
          },
        )
        .await;
      if let Err(e) = result {
        warn!(error = %e, "backend logout failed, clearing local session anyway");
      }
    }

    self.sign_out_locally();
  }

  /// Forget the session and everything cached for it.
  pub(crate) fn sign_out_locally(&self) {
    self.session().logout();
    self.cache.reset();
  }

  /// The signed-in administrator. Falls back to the identity carried by the
  /// access token.
  pub fn profile(&self) -> Query<Profile> {
    let session = self.session().clone();
    self.api.query(
      &self.cache,
      "getProfile",
      "/auth/profile",
      (),
      vec![profile_tag()],
      move || {
        session
          .user()
          .map(Profile::from)
          .unwrap_or_else(fallback::profile::profile)
      },
    )
  }

  pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<Profile> {
    self
      .cache
      .mutate(
        "updateProfile",
        &[profile_tag()],
        self.api.put("/auth/profile", update),
      )
      .await
  }

  pub async fn change_password(&self, change: &PasswordChange) -> Result<Ack> {
    self
      .cache
      .mutate(
        "changePassword",
        &[],
        self.api.post("/auth/change-password", change),
      )
      .await
  }

  pub async fn forgot_password(&self, email: &str) -> Result<Ack> {
    self
      .cache
      .mutate(
        "forgotPassword",
        &[],
        self.api.post("/auth/forgot-password", &EmailOnly { email }),
      )
      .await
  }

  fn install(&self, tokens: AuthTokens) -> Result<UserIdentity> {
    let refresh_token = tokens
      .refresh_token
      .ok_or_else(|| eyre!("Sign-in response carried no refresh token"))?;
    self
      .session()
      .set_credentials(&tokens.token, &refresh_token, tokens.user)?;
    self
      .session()
      .user()
      .ok_or_else(|| eyre!("Session has no user after sign-in"))
  }
}
