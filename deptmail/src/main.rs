//! Deptmail CLI - send a department campaign or query the open count.
//!
//! Exit status is 0 once a campaign has been dispatched, even if some
//! recipients failed, and 1 when arguments are missing, validation fails, no
//! recipient matches, or the tracker cannot be queried.

use std::process::ExitCode;

use clap::Parser;
use tracing::error;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use deptmail::cli::{
    execute_send, execute_view_count, parse_error_exit_status, Cli, CliError, Command,
};
use deptmail::SmtpSettings;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    // Logs go to stderr so the report on stdout stays readable
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let status = parse_error_exit_status(&e);
            if status == 0 {
                e.exit();
            }
            let _ = e.print();
            return ExitCode::from(status);
        }
    };

    let result = match cli.command {
        Command::Send(args) => send(args).await,
        Command::ViewCount(args) => {
            println!("Retrieving view count statistics...");
            execute_view_count(args).await.map(|count| {
                println!("Number of recipients who opened the mail: {}", count);
            })
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_error(&e);
            ExitCode::from(1)
        }
    }
}

async fn send(args: deptmail::cli::SendArgs) -> Result<(), CliError> {
    let plan = args.into_plan(SmtpSettings::from_env())?;
    let report = execute_send(plan).await?;

    println!("\n{}", report);
    Ok(())
}

fn report_error(err: &CliError) {
    match err {
        CliError::Validation(result) => {
            println!("\nValidation Errors:");
            for message in result.messages() {
                println!("- {}", message);
            }
            println!("\nUse -h or --help for usage information.");
        }
        CliError::Config(e) => {
            println!("\nError: {}", e);
            println!("\nUse -h or --help for usage information.");
        }
        other => {
            error!(error = %other, "command_failed");
            println!("\n{}", other);
        }
    }
}
