use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::jwt;
use crate::api::AuthApi;

/// Result of one refresh check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
  /// No token pair to refresh
  NoSession,
  /// Access token still valid
  Valid,
  /// Expired access token swapped for a new pair
  Refreshed,
  /// Refresh was rejected; the session has been cleared
  LoggedOut,
}

/// Keeps the access token fresh: checks immediately, then on every interval.
#[derive(Clone)]
pub struct SessionRefresher {
  auth: AuthApi,
  interval: Duration,
}

impl SessionRefresher {
  pub fn new(auth: AuthApi, interval: Duration) -> Self {
    Self { auth, interval }
  }

  /// One pass: refresh when a token pair is present and the access token
  /// has expired. Any refresh failure signs the user out.
  pub async fn check(&self) -> RefreshOutcome {
    let session = self.auth.session();
    let (Some(token), Some(_)) = (session.access_token(), session.refresh_token()) else {
      return RefreshOutcome::NoSession;
    };

    if !jwt::is_token_expired(&token) {
      debug!("access token still valid");
      return RefreshOutcome::Valid;
    }

    info!("access token expired, refreshing");
    match self.auth.refresh_session().await {
      Ok(()) => RefreshOutcome::Refreshed,
      Err(e) => {
        warn!(error = %e, "token refresh failed, signing out");
        self.auth.sign_out_locally();
        RefreshOutcome::LoggedOut
      }
    }
  }

  /// Run the loop on a background task until the handle is dropped.
  pub fn spawn(self) -> RefreshHandle {
    let (tx, rx) = mpsc::unbounded_channel();

    let task = tokio::spawn(async move {
      let mut ticker = tokio::time::interval(self.interval);
      ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

      loop {
        // First tick completes immediately
        ticker.tick().await;
        let outcome = self.check().await;
        if tx.send(outcome).is_err() {
          break;
        }
      }
    });

    RefreshHandle { task, rx }
  }
}

/// Owns the refresh task. Dropping it stops the timer.
pub struct RefreshHandle {
  task: JoinHandle<()>,
  rx: mpsc::UnboundedReceiver<RefreshOutcome>,
}

impl RefreshHandle {
  /// Wait for the outcome of the next check.
  pub async fn next(&mut self) -> Option<RefreshOutcome> {
    self.rx.recv().await
  }

  pub fn stop(self) {}
}

impl Drop for RefreshHandle {
  fn drop(&mut self) {
    self.task.abort();
  }
}
