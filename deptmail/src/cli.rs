//! Command line surface and command execution.
//!
//! `send` runs the whole pipeline: validate → select → render → dispatch.
//! `view-count` asks a running tracker for the current open count.

use std::path::PathBuf;
use std::time::Duration;

use clap::{error::ErrorKind, Args, Parser, Subcommand};
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::campaign::{BodySource, Campaign, CampaignReport, Dispatcher, SenderIdentity};
use crate::config::{ConfigError, SmtpSettings};
use crate::mail::{Mailer, SendError, SmtpMailer};
use crate::recipients::{select_recipients, GroupFilter, RecipientTable};
use crate::tracker::{pixel_url, ClientError, TrackerClient};
use crate::validate::{validate_loaded, ValidationResult};

/// Email sending and tracking tool.
#[derive(Debug, Parser)]
#[command(name = "deptmail", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Send a campaign to the recipients of one department (or all)
    Send(SendArgs),
    /// Show how many recipients opened the mail
    ViewCount(ViewCountArgs),
}

/// Arguments of the `send` command.
///
/// Required values are optional at the clap level so that every missing
/// one can be reported at once.
#[derive(Debug, Clone, Default, Args)]
pub struct SendArgs {
    /// Path to the CSV file containing recipient information
    #[arg(short = 'r', long)]
    pub recipients: Option<PathBuf>,

    /// Subject line for the email
    #[arg(short = 's', long)]
    pub subject: Option<String>,

    /// Path to the HTML file containing the email body
    #[arg(short = 'b', long, conflicts_with = "body_html")]
    pub body: Option<PathBuf>,

    /// Inline HTML body, instead of --body
    #[arg(long)]
    pub body_html: Option<String>,

    /// Department code to filter recipients (use "all" for all departments)
    #[arg(short = 'd', long)]
    pub department: Option<String>,

    /// Sender email address
    #[arg(short = 'e', long, env = "SENDER_EMAIL")]
    pub email: Option<String>,

    /// Password (or app password) of the sender mailbox
    #[arg(short = 'p', long, env = "SENDER_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Base URL of the open tracker; enables pixel tracking
    #[arg(long, env = "TRACKER_URL")]
    pub tracker_url: Option<String>,

    /// SMTP relay host (overrides SMTP_HOST)
    #[arg(long)]
    pub smtp_host: Option<String>,

    /// SMTP relay port (overrides SMTP_PORT)
    #[arg(long)]
    pub smtp_port: Option<u16>,

    /// Pause between two sends in milliseconds (overrides SEND_DELAY_MS)
    #[arg(long)]
    pub delay_ms: Option<u64>,

    /// Timeout of a single send in milliseconds (overrides SEND_TIMEOUT_MS)
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

/// Arguments of the `view-count` command.
#[derive(Debug, Clone, Default, Args)]
pub struct ViewCountArgs {
    /// Base URL of the open tracker
    #[arg(long, env = "TRACKER_URL")]
    pub tracker_url: Option<String>,

    /// Request timeout in milliseconds
    #[arg(long, default_value_t = 10_000)]
    pub timeout_ms: u64,
}

/// Exit status for a command line clap refused to parse.
///
/// Help and version output exit 0; every other parse failure is an argument
/// error and exits 1, the same as a missing required argument.
pub fn parse_error_exit_status(err: &clap::Error) -> u8 {
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
        _ => 1,
    }
}

/// Everything the `send` command needs, resolved and checked for presence.
#[derive(Debug, Clone)]
pub struct SendPlan {
    pub recipients: PathBuf,
    pub campaign: Campaign,
    pub smtp: SmtpSettings,
}

/// Failures that end a command with a non-zero exit code.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("validation failed with {} error(s)", .0.errors.len())]
    Validation(ValidationResult),

    #[error("No recipients found for department: {0}")]
    NoRecipients(GroupFilter),

    #[error("could not set up mail transport: {0}")]
    Transport(#[from] SendError),

    #[error(transparent)]
    Tracker(#[from] ClientError),
}

impl SendArgs {
    /// Check required arguments and build the campaign.
    ///
    /// `smtp` carries the environment-derived defaults; explicit flags win.
    pub fn into_plan(self, mut smtp: SmtpSettings) -> Result<SendPlan, ConfigError> {
        let mut missing = Vec::new();

        if self.recipients.is_none() {
            missing.push("--recipients");
        }
        if self.subject.is_none() {
            missing.push("--subject");
        }
        if self.body.is_none() && self.body_html.is_none() {
            missing.push("--body");
        }
        if self.department.is_none() {
            missing.push("--department");
        }
        if blank(&self.email) {
            missing.push("--email");
        }
        if blank(&self.password) {
            missing.push("--password");
        }

        let (
            Some(recipients),
            Some(subject),
            Some(department),
            Some(email),
            Some(password),
            true,
        ) = (
            self.recipients,
            self.subject,
            self.department,
            self.email,
            self.password,
            missing.is_empty(),
        )
        else {
            return Err(ConfigError::MissingArguments(
                missing.into_iter().map(str::to_string).collect(),
            ));
        };

        let body = match (self.body, self.body_html) {
            (Some(path), _) => BodySource::TemplateFile(path),
            (None, Some(html)) => BodySource::Literal(html),
            (None, None) => {
                return Err(ConfigError::MissingArguments(vec!["--body".to_string()]))
            }
        };

        let tracking_pixel_url = match self.tracker_url.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => Some(parse_tracker_url(raw).and_then(|base| {
                pixel_url(&base).map_err(|e| invalid_tracker_url(e.to_string()))
            })?),
            _ => None,
        };

        if let Some(host) = self.smtp_host {
            smtp.host = host;
        }
        if let Some(port) = self.smtp_port {
            smtp.port = port;
        }
        if let Some(ms) = self.delay_ms {
            smtp.pacing_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = self.timeout_ms {
            smtp.send_timeout = Duration::from_millis(ms);
        }

        Ok(SendPlan {
            recipients,
            campaign: Campaign {
                subject,
                body,
                filter: GroupFilter::parse(&department),
                sender: SenderIdentity::new(email.trim(), password),
                tracking_pixel_url,
            },
            smtp,
        })
    }
}

fn blank(value: &Option<String>) -> bool {
    value.as_deref().map(|v| v.trim().is_empty()).unwrap_or(true)
}

fn parse_tracker_url(raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|e| invalid_tracker_url(e.to_string()))
}

fn invalid_tracker_url(reason: String) -> ConfigError {
    ConfigError::InvalidValue {
        name: "--tracker-url".to_string(),
        reason,
    }
}

/// Run the `send` command over SMTP.
pub async fn execute_send(plan: SendPlan) -> Result<CampaignReport, CliError> {
    let mailer = SmtpMailer::new(&plan.smtp, &plan.campaign.sender)?;
    execute_send_with(plan, mailer).await
}

/// Run the `send` command with any mailer.
///
/// Validation failures and an empty cohort abort before anything is sent.
/// Individual send failures do not: they are part of the returned report.
pub async fn execute_send_with<M: Mailer>(
    plan: SendPlan,
    mailer: M,
) -> Result<CampaignReport, CliError> {
    let campaign = &plan.campaign;

    let table = RecipientTable::from_path(&plan.recipients);
    let template = campaign.body.load();

    let validation = validate_loaded(
        &table,
        &campaign.body,
        &template,
        &campaign.subject,
        &campaign.filter,
    );

    let (Ok(table), Ok(template), true) = (table, template, validation.is_valid()) else {
        return Err(CliError::Validation(validation));
    };

    let recipients = select_recipients(&table, &campaign.filter);
    if recipients.is_empty() {
        return Err(CliError::NoRecipients(campaign.filter.clone()));
    }

    info!(
        recipients_file = %plan.recipients.display(),
        filter = %campaign.filter,
        selected = recipients.len(),
        "send_command_ready"
    );

    let dispatcher = Dispatcher::with_settings(mailer, &plan.smtp);
    Ok(dispatcher.run(campaign, &template, &recipients).await)
}

/// Run the `view-count` command.
pub async fn execute_view_count(args: ViewCountArgs) -> Result<u64, CliError> {
    let raw = args
        .tracker_url
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingArguments(vec!["--tracker-url".to_string()]))?;

    let base = parse_tracker_url(raw.trim())?;
    let client = TrackerClient::new(&base, Duration::from_millis(args.timeout_ms))?;

    Ok(client.open_count().await?)
}
