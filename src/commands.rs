//! Command-line surface: one subcommand per resource domain plus session
//! management. Reads print JSON on stdout; writes take JSON payload files.

use clap::{Args, Subcommand};
use cbt_admin::api::analytics::Period;
use cbt_admin::api::auth::{PasswordChange, ProfileUpdate, Registration};
use cbt_admin::api::content::{
  BulkContentUpdate, ContentListParams, ContentStatus, ContentUpdate, NewContent,
};
use cbt_admin::api::payments::{NewPayment, PaymentListParams, PaymentStatus, Refund};
use cbt_admin::api::settings::Settings;
use cbt_admin::api::staff::{BulkStaffUpdate, NewStaffMember, StaffListParams, StaffUpdate};
use cbt_admin::api::students::{BulkStudentUpdate, NewStudent, StudentListParams, StudentUpdate};
use cbt_admin::api::types::AccountStatus;
use cbt_admin::api::users::{Invitation, UserListParams};
use cbt_admin::cache::CacheResult;
use cbt_admin::config::Config;
use cbt_admin::session::{jwt, RefreshOutcome};
use cbt_admin::App;
use color_eyre::{eyre::eyre, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Subcommand)]
pub enum Command {
  /// Sign in and persist the session
  Login {
    #[arg(long)]
    email: String,
    /// Defaults to $CBT_ADMIN_PASSWORD
    #[arg(long)]
    password: Option<String>,
  },
  /// Create an institution account from a JSON file and sign in
  Register { file: PathBuf },
  /// Sign out and forget the persisted session
  Logout,
  /// Show the signed-in identity and token expiry
  Whoami,
  /// Refresh the access token now if it has expired
  Refresh,
  /// Keep the session fresh until interrupted
  Watch,
  #[command(subcommand, visible_alias = "me")]
  Profile(ProfileCommand),
  #[command(subcommand, visible_alias = "student")]
  Students(StudentsCommand),
  #[command(subcommand)]
  Staff(StaffCommand),
  #[command(subcommand, visible_alias = "payment")]
  Payments(PaymentsCommand),
  #[command(subcommand)]
  Content(ContentCommand),
  #[command(subcommand, visible_alias = "feature")]
  Features(FeaturesCommand),
  #[command(subcommand)]
  Settings(SettingsCommand),
  #[command(subcommand, visible_alias = "stats")]
  Analytics(AnalyticsCommand),
  #[command(subcommand, visible_alias = "user")]
  Users(UsersCommand),
}

/// Paging and search shared by list commands.
#[derive(Debug, Args)]
pub struct ListArgs {
  #[arg(long)]
  page: Option<u32>,
  #[arg(long)]
  limit: Option<u32>,
  #[arg(long)]
  search: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum ProfileCommand {
  Show,
  /// Apply a JSON profile update
  Update { file: PathBuf },
  /// Change password from a JSON file with currentPassword and newPassword
  ChangePassword { file: PathBuf },
  /// Send a password reset email
  ForgotPassword { email: String },
}

#[derive(Debug, Subcommand)]
pub enum StudentsCommand {
  List {
    #[command(flatten)]
    list: ListArgs,
    #[arg(long, value_parser = enum_arg::<AccountStatus>)]
    status: Option<AccountStatus>,
    #[arg(long)]
    class_level: Option<String>,
  },
  Get { id: u64 },
  Performance { id: u64 },
  Create { file: PathBuf },
  Update { id: u64, file: PathBuf },
  Delete { id: u64 },
  BulkUpdate { file: PathBuf },
}

#[derive(Debug, Subcommand)]
pub enum StaffCommand {
  List {
    #[command(flatten)]
    list: ListArgs,
    #[arg(long, value_parser = enum_arg::<AccountStatus>)]
    status: Option<AccountStatus>,
    #[arg(long)]
    department: Option<String>,
  },
  Get { id: u64 },
  Create { file: PathBuf },
  Update { id: u64, file: PathBuf },
  Delete { id: u64 },
  BulkUpdate { file: PathBuf },
}

#[derive(Debug, Subcommand)]
pub enum PaymentsCommand {
  List {
    #[command(flatten)]
    list: ListArgs,
    #[arg(long, value_parser = enum_arg::<PaymentStatus>)]
    status: Option<PaymentStatus>,
    #[arg(long)]
    student_id: Option<u64>,
  },
  Get { id: u64 },
  Summary,
  Record { file: PathBuf },
  Refund {
    id: u64,
    #[arg(long)]
    reason: Option<String>,
    #[arg(long)]
    amount: Option<f64>,
  },
}

#[derive(Debug, Subcommand)]
pub enum ContentCommand {
  List {
    #[command(flatten)]
    list: ListArgs,
    #[arg(long, value_parser = enum_arg::<ContentStatus>)]
    status: Option<ContentStatus>,
    #[arg(long)]
    subject: Option<String>,
    #[arg(long = "type")]
    kind: Option<String>,
  },
  Get { id: u64 },
  Create { file: PathBuf },
  Update { id: u64, file: PathBuf },
  Publish { id: u64 },
  Delete { id: u64 },
  BulkUpdate { file: PathBuf },
}

#[derive(Debug, Subcommand)]
pub enum FeaturesCommand {
  List,
  Get { key: String },
  Enable { key: String },
  Disable { key: String },
}

#[derive(Debug, Subcommand)]
pub enum SettingsCommand {
  Show,
  /// Replace the settings with a JSON file
  Update { file: PathBuf },
}

#[derive(Debug, Subcommand)]
pub enum AnalyticsCommand {
  Overview {
    #[arg(long, default_value = "month", value_parser = enum_arg::<Period>)]
    period: Period,
  },
  Trends {
    #[arg(long, default_value = "month", value_parser = enum_arg::<Period>)]
    period: Period,
  },
  Subjects,
}

#[derive(Debug, Subcommand)]
pub enum UsersCommand {
  List {
    #[command(flatten)]
    list: ListArgs,
    #[arg(long)]
    role: Option<String>,
    #[arg(long, value_parser = enum_arg::<AccountStatus>)]
    status: Option<AccountStatus>,
  },
  Get { id: u64 },
  Invite {
    #[arg(long)]
    email: String,
    #[arg(long)]
    name: String,
    #[arg(long)]
    role: String,
  },
  SetRole { id: u64, role: String },
  SetStatus {
    id: u64,
    #[arg(value_parser = enum_arg::<AccountStatus>)]
    status: AccountStatus,
  },
  Delete { id: u64 },
}

/// Parse a lowercase serde enum name. Names only the catch-all variant
/// would accept are rejected.
fn enum_arg<T: Serialize + DeserializeOwned>(value: &str) -> std::result::Result<T, String> {
  let name = value.trim().to_lowercase();
  let unknown = || format!("unknown value '{}'", value);
  let parsed: T = serde_json::from_value(json!(name)).map_err(|_| unknown())?;
  match serde_json::to_value(&parsed) {
    Ok(canonical) if canonical == json!(name) && name != "unknown" => Ok(parsed),
    _ => Err(unknown()),
  }
}

pub async fn run(app: &App, command: Command) -> Result<()> {
  match command {
    Command::Login { email, password } => {
      let password = match password {
        Some(p) => p,
        None => Config::get_password()?,
      };
      let user = app.auth().login(&email, &password).await?;
      print_json(&user)
    }
    Command::Register { file } => {
      let registration: Registration = read_json(&file)?;
      let user = app.auth().register(&registration).await?;
      print_json(&user)
    }
    Command::Logout => {
      app.auth().logout().await;
      print_json(&json!({ "authenticated": false }))
    }
    Command::Whoami => whoami(app),
    Command::Refresh => {
      let outcome = app.refresher().check().await;
      print_json(&json!({ "outcome": format!("{:?}", outcome) }))
    }
    Command::Watch => watch(app).await,
    command => {
      // Same as the dashboard on load: refresh an expired token first
      app.refresher().check().await;
      run_resource(app, command).await
    }
  }
}

async fn run_resource(app: &App, command: Command) -> Result<()> {
  match command {
    Command::Profile(cmd) => profile(app, cmd).await,
    Command::Students(cmd) => students(app, cmd).await,
    Command::Staff(cmd) => staff(app, cmd).await,
    Command::Payments(cmd) => payments(app, cmd).await,
    Command::Content(cmd) => content(app, cmd).await,
    Command::Features(cmd) => features(app, cmd).await,
    Command::Settings(cmd) => settings(app, cmd).await,
    Command::Analytics(cmd) => analytics(app, cmd).await,
    Command::Users(cmd) => users(app, cmd).await,
    other => Err(eyre!("Not a resource command: {:?}", other)),
  }
}

fn whoami(app: &App) -> Result<()> {
  let session = app.session().snapshot();
  let expires_at = session.access_token.as_deref().and_then(jwt::expires_at);
  let expired = session
    .access_token
    .as_deref()
    .map(jwt::is_token_expired);

  print_json(&json!({
    "authenticated": session.is_authenticated,
    "user": session.user,
    "expiresAt": expires_at,
    "expired": expired,
  }))
}

async fn watch(app: &App) -> Result<()> {
  let interval = app.config().session.refresh_interval();
  info!(interval_secs = interval.as_secs(), "watching session");
  let mut handle = app.refresher().spawn();

  loop {
    tokio::select! {
      outcome = handle.next() => match outcome {
        Some(RefreshOutcome::LoggedOut) => {
          eprintln!("Session expired and could not be refreshed; signed out.");
        }
        Some(outcome) => info!(?outcome, "session check"),
        None => break,
      },
      _ = tokio::signal::ctrl_c() => break,
    }
  }

  handle.stop();
  Ok(())
}

async fn profile(app: &App, cmd: ProfileCommand) -> Result<()> {
  let auth = app.auth();
  match cmd {
    ProfileCommand::Show => print_result(auth.profile().fetch().await),
    ProfileCommand::Update { file } => {
      let update: ProfileUpdate = read_json(&file)?;
      print_json(&auth.update_profile(&update).await?)
    }
    ProfileCommand::ChangePassword { file } => {
      let change: PasswordChange = read_json(&file)?;
      print_json(&auth.change_password(&change).await?)
    }
    ProfileCommand::ForgotPassword { email } => print_json(&auth.forgot_password(&email).await?),
  }
}

async fn students(app: &App, cmd: StudentsCommand) -> Result<()> {
  let students = app.students();
  match cmd {
    StudentsCommand::List {
      list,
      status,
      class_level,
    } => {
      let params = StudentListParams {
        page: list.page,
        limit: list.limit,
        search: list.search,
        status,
        class_level,
      };
      print_result(students.list(params).fetch().await)
    }
    StudentsCommand::Get { id } => print_result(students.get(id).fetch().await),
    StudentsCommand::Performance { id } => print_result(students.performance(id).fetch().await),
    StudentsCommand::Create { file } => {
      let student: NewStudent = read_json(&file)?;
      print_json(&students.create(&student).await?)
    }
    StudentsCommand::Update { id, file } => {
      let changes: StudentUpdate = read_json(&file)?;
      print_json(&students.update(id, &changes).await?)
    }
    StudentsCommand::Delete { id } => print_json(&students.delete(id).await?),
    StudentsCommand::BulkUpdate { file } => {
      let update: BulkStudentUpdate = read_json(&file)?;
      print_json(&students.bulk_update(&update).await?)
    }
  }
}

async fn staff(app: &App, cmd: StaffCommand) -> Result<()> {
  let staff = app.staff();
  match cmd {
    StaffCommand::List {
      list,
      status,
      department,
    } => {
      let params = StaffListParams {
        page: list.page,
        limit: list.limit,
        search: list.search,
        department,
        status,
      };
      print_result(staff.list(params).fetch().await)
    }
    StaffCommand::Get { id } => print_result(staff.get(id).fetch().await),
    StaffCommand::Create { file } => {
      let member: NewStaffMember = read_json(&file)?;
      print_json(&staff.create(&member).await?)
    }
    StaffCommand::Update { id, file } => {
      let changes: StaffUpdate = read_json(&file)?;
      print_json(&staff.update(id, &changes).await?)
    }
    StaffCommand::Delete { id } => print_json(&staff.delete(id).await?),
    StaffCommand::BulkUpdate { file } => {
      let update: BulkStaffUpdate = read_json(&file)?;
      print_json(&staff.bulk_update(&update).await?)
    }
  }
}

async fn payments(app: &App, cmd: PaymentsCommand) -> Result<()> {
  let payments = app.payments();
  match cmd {
    PaymentsCommand::List {
      list,
      status,
      student_id,
    } => {
      let params = PaymentListParams {
        page: list.page,
        limit: list.limit,
        search: list.search,
        status,
        student_id,
        ..PaymentListParams::default()
      };
      print_result(payments.list(params).fetch().await)
    }
    PaymentsCommand::Get { id } => print_result(payments.get(id).fetch().await),
    PaymentsCommand::Summary => print_result(payments.summary().fetch().await),
    PaymentsCommand::Record { file } => {
      let payment: NewPayment = read_json(&file)?;
      print_json(&payments.record(&payment).await?)
    }
    PaymentsCommand::Refund { id, reason, amount } => {
      print_json(&payments.refund(id, &Refund { reason, amount }).await?)
    }
  }
}

async fn content(app: &App, cmd: ContentCommand) -> Result<()> {
  let content = app.content();
  match cmd {
    ContentCommand::List {
      list,
      status,
      subject,
      kind,
    } => {
      let params = ContentListParams {
        page: list.page,
        limit: list.limit,
        search: list.search,
        subject,
        status,
        kind,
      };
      print_result(content.list(params).fetch().await)
    }
    ContentCommand::Get { id } => print_result(content.get(id).fetch().await),
    ContentCommand::Create { file } => {
      let item: NewContent = read_json(&file)?;
      print_json(&content.create(&item).await?)
    }
    ContentCommand::Update { id, file } => {
      let changes: ContentUpdate = read_json(&file)?;
      print_json(&content.update(id, &changes).await?)
    }
    ContentCommand::Publish { id } => print_json(&content.publish(id).await?),
    ContentCommand::Delete { id } => print_json(&content.delete(id).await?),
    ContentCommand::BulkUpdate { file } => {
      let update: BulkContentUpdate = read_json(&file)?;
      print_json(&content.bulk_update(&update).await?)
    }
  }
}

async fn features(app: &App, cmd: FeaturesCommand) -> Result<()> {
  let features = app.features();
  match cmd {
    FeaturesCommand::List => print_result(features.list().fetch().await),
    FeaturesCommand::Get { key } => print_result(features.get(&key).fetch().await),
    FeaturesCommand::Enable { key } => print_json(&features.set_enabled(&key, true).await?),
    FeaturesCommand::Disable { key } => print_json(&features.set_enabled(&key, false).await?),
  }
}

async fn settings(app: &App, cmd: SettingsCommand) -> Result<()> {
  let settings = app.settings();
  match cmd {
    SettingsCommand::Show => print_result(settings.get().fetch().await),
    SettingsCommand::Update { file } => {
      let next: Settings = read_json(&file)?;
      print_json(&settings.update(&next).await?)
    }
  }
}

async fn analytics(app: &App, cmd: AnalyticsCommand) -> Result<()> {
  let analytics = app.analytics();
  match cmd {
    AnalyticsCommand::Overview { period } => print_result(analytics.overview(period).fetch().await),
    AnalyticsCommand::Trends { period } => print_result(analytics.trends(period).fetch().await),
    AnalyticsCommand::Subjects => print_result(analytics.subject_performance().fetch().await),
  }
}

async fn users(app: &App, cmd: UsersCommand) -> Result<()> {
  let users = app.users();
  match cmd {
    UsersCommand::List {
      list,
      role,
      status,
    } => {
      let params = UserListParams {
        page: list.page,
        limit: list.limit,
        search: list.search,
        role,
        status,
      };
      print_result(users.list(params).fetch().await)
    }
    UsersCommand::Get { id } => print_result(users.get(id).fetch().await),
    UsersCommand::Invite { email, name, role } => {
      print_json(&users.invite(&Invitation { email, name, role }).await?)
    }
    UsersCommand::SetRole { id, role } => print_json(&users.update_role(id, &role).await?),
    UsersCommand::SetStatus { id, status } => print_json(&users.set_status(id, status).await?),
    UsersCommand::Delete { id } => print_json(&users.delete(id).await?),
  }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
  let contents = std::fs::read_to_string(path)
    .map_err(|e| eyre!("Failed to read {}: {}", path.display(), e))?;
  serde_json::from_str(&contents).map_err(|e| eyre!("Invalid JSON in {}: {}", path.display(), e))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
  let out = serde_json::to_string_pretty(value)
    .map_err(|e| eyre!("Failed to encode output: {}", e))?;
  println!("{}", out);
  Ok(())
}

/// Print a read, warning on stderr when the data is fallback data.
fn print_result<T: Serialize>(result: CacheResult<T>) -> Result<()> {
  if result.is_degraded() {
    eprintln!(
      "warning: backend unavailable ({}); showing fallback data",
      result
        .degraded_reason
        .as_deref()
        .unwrap_or("cached fallback")
    );
  }
  print_json(&result.data)
}
