use std::net::SocketAddr;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::{BackendArgs, FormArgs, MailArgs};
use crate::mail::Mailer;
use crate::pipeline::{ExtractArgs, FillArgs, NormalizeCommandArgs, ScrapeArgs, UploadArgs};
use crate::server::AppState;

mod config;
mod mail;
mod pipeline;
mod server;

#[derive(Parser)]
#[command(author, version, about, long_about)]
struct Args {
  /// Reports errors to sentry when set.
  #[arg(long, global = true, env = "OLYMPIAD_SENTRY_DSN", hide_env_values = true)]
  sentry_dsn: Option<String>,
  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Downloads this year's announcement and writes the schedule as JSON.
  Scrape(ScrapeArgs),
  /// Dumps the schedule tables of a local pdf as text.
  Extract(ExtractArgs),
  /// Turns a table dump into the schedule JSON.
  Normalize(NormalizeCommandArgs),
  /// Uploads the schedule JSON to the backend.
  Upload(UploadArgs),
  /// Fills the participation declaration from an application JSON file.
  Fill(FillArgs),
  /// Serves `POST /fill_pdf`.
  Serve {
    #[arg(long, short, env = "OLYMPIAD_LISTEN", default_value = "127.0.0.1:5000")]
    listen: SocketAddr,
    /// Mail every filled form to the applicant.
    #[arg(long, env = "OLYMPIAD_SEND_MAIL")]
    send: bool,
    #[command(flatten)]
    form: FormArgs,
    #[command(flatten)]
    backend: BackendArgs,
    #[command(flatten)]
    mail: MailArgs,
  },
}

#[tokio::main]
async fn main() -> ExitCode {
  let args = Args::parse();

  let _sentry = args.sentry_dsn.as_deref().map(|dsn| {
    sentry::init((
      dsn,
      sentry::ClientOptions {
        release: sentry::release_name!(),
        ..Default::default()
      },
    ))
  });

  tracing_subscriber::registry()
    .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with(tracing_subscriber::fmt::layer())
    .with(sentry_tracing::layer())
    .init();

  match run(args.command).await {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      error!("{:#}", err);
      sentry::integrations::anyhow::capture_anyhow(&err);
      ExitCode::FAILURE
    }
  }
}

async fn run(command: Command) -> anyhow::Result<()> {
  match command {
    Command::Scrape(args) => pipeline::scrape(args).await,
    Command::Extract(args) => pipeline::extract(args),
    Command::Normalize(args) => pipeline::normalize_file(args),
    Command::Upload(args) => pipeline::upload(args).await,
    Command::Fill(args) => pipeline::fill(args).await,
    Command::Serve {
      listen,
      send,
      form,
      backend,
      mail,
    } => {
      let form = form.validate()?;
      let mailer = match send {
        true => Some(Mailer::new(backend.validate()?, mail)),
        false => None,
      };
      info!(
        "Filling {} into {}",
        form.template.display(),
        form.output.display()
      );

      server::serve(listen, AppState { form, mailer }).await
    }
  }
}

#[cfg(test)]
mod tests {
  use clap::CommandFactory;

  use super::*;

  #[test]
  fn cli_is_consistent() {
    Args::command().debug_assert();
  }

  #[test]
  fn upload_options() {
    let args = Args::try_parse_from([
      "olympiad-relay",
      "upload",
      "schedule.json",
      "--limit",
      "10",
      "--username",
      "admin",
      "--password",
      "secret",
    ])
    .unwrap();

    match args.command {
      Command::Upload(upload) => {
        assert_eq!(upload.limit, Some(10));
        assert_eq!(upload.location, "Bulgaria");
        assert_eq!(upload.backend.retry_attempts, 5);
        assert_eq!(upload.input.to_str(), Some("schedule.json"));
      }
      _ => panic!("expected upload"),
    }
  }
}
