//! This module defines the code that executes the ghclass commands.
//!
//! [`cli`] drives a whole invocation: load configured defaults, build and
//! run the parser, connect, dispatch. Recognized failures are logged and
//! turned into exit status 1 here; anything unrecognized propagates out of
//! `main` with full detail, on purpose.

pub mod issues;
pub mod repos;
pub mod teams;

use std::ffi::OsString;
use std::process::exit;

use clap::FromArgMatches;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use log::error;

use crate::commands::{self, Args, CommandKind};
use crate::config::Defaults;
use crate::errors::{GhclassError, Result};
use crate::git;
use crate::github::{self, GitHubApi};
use crate::plugin::PluginRegistry;

/// Configure process-wide logging. Called exactly once per invocation,
/// never as an import-time side effect.
fn init_logging(filter: log::LevelFilter) {
    env_logger::builder()
        .filter_level(filter)
        .format_target(false)
        .target(env_logger::Target::Stdout)
        .init();
}

/// Run the ghclass CLI.
pub async fn cli<I, T>(argv: I, registry: PluginRegistry) -> anyhow::Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let defaults = match Defaults::load() {
        Ok(defaults) => defaults,
        Err(e) => {
            init_logging(log::LevelFilter::Info);
            error!("{e}");
            exit(1)
        }
    };
    registry.run_config_hooks(&defaults);

    let matches = commands::build_command(&defaults, &registry).get_matches_from(argv);
    let verbosity = Verbosity::<InfoLevel>::from_arg_matches(&matches)
        .map_err(|e| anyhow::anyhow!("could not read verbosity flags: {e}"))?;
    init_logging(verbosity.log_level_filter());

    match run(&matches, &registry).await {
        Ok(()) => Ok(()),
        Err(e) => match expected_error_message(&e) {
            Some(message) => {
                error!("{message}");
                exit(1)
            }
            // everything else is a defect and stays loud
            None => Err(e.into()),
        },
    }
}

async fn run(matches: &clap::ArgMatches, registry: &PluginRegistry) -> Result<()> {
    let (args, api) = commands::parse_args(matches, registry).await?;
    dispatch_command(&args, api.as_ref()).await
}

/// Invoke the one command operation selected by the parsed arguments.
pub async fn dispatch_command(args: &Args, api: Option<&GitHubApi>) -> Result<()> {
    match args.subcommand {
        CommandKind::Setup => {
            repos::setup_student_repos(
                require(&args.master_repo_urls, args, "master repo urls")?,
                require(&args.students, args, "students")?,
                require(&args.user, args, "a user")?,
                require_api(api, args)?,
            )
            .await
        }
        CommandKind::Update => {
            repos::update_student_repos(
                require(&args.master_repo_urls, args, "master repo urls")?,
                require(&args.students, args, "students")?,
                require(&args.user, args, "a user")?,
                require_api(api, args)?,
                args.issue.as_ref(),
            )
            .await
        }
        CommandKind::Migrate => {
            repos::migrate_repos(
                require(&args.master_repo_urls, args, "master repo urls")?,
                require(&args.user, args, "a user")?,
                require_api(api, args)?,
            )
            .await
        }
        CommandKind::Clone => {
            repos::clone_repos(
                require(&args.master_repo_names, args, "master repo names")?,
                require(&args.students, args, "students")?,
                require_api(api, args)?,
            )
            .await
        }
        CommandKind::AddToTeams => {
            teams::add_students_to_teams(
                require(&args.students, args, "students")?,
                require_api(api, args)?,
            )
            .await
        }
        CommandKind::OpenIssue => {
            issues::open_issue(
                require(&args.issue, args, "an issue")?,
                require(&args.master_repo_names, args, "master repo names")?,
                require(&args.students, args, "students")?,
                require_api(api, args)?,
            )
            .await
        }
        CommandKind::CloseIssue => {
            issues::close_issue(
                require(&args.title_regex, args, "a title regex")?,
                require(&args.master_repo_names, args, "master repo names")?,
                require(&args.students, args, "students")?,
                require_api(api, args)?,
            )
            .await
        }
        CommandKind::VerifySettings => {
            github::verify_settings(
                require(&args.user, args, "a user")?,
                &args.org_name,
                &args.github_base_url,
                &git::oauth_token(),
            )
            .await
        }
    }
}

fn require_api<'a>(api: Option<&'a GitHubApi>, args: &Args) -> Result<&'a GitHubApi> {
    api.ok_or_else(|| {
        GhclassError::Parse(format!(
            "{} was dispatched without an API connection",
            args.subcommand.name()
        ))
    })
}

fn require<'a, T>(field: &'a Option<T>, args: &Args, what: &str) -> Result<&'a T> {
    field.as_ref().ok_or_else(|| {
        GhclassError::Parse(format!(
            "{} was dispatched without {what}",
            args.subcommand.name()
        ))
    })
}

/// The user-facing diagnostic for a recognized failure, or `None` when the
/// failure is a defect that should propagate with full detail.
fn expected_error_message(err: &GhclassError) -> Option<String> {
    match err {
        GhclassError::PushFailed { url } => Some(format!(
            "there was an error pushing to {url}. Verify that your token has adequate access."
        )),
        GhclassError::CloneFailed { url } => Some(format!(
            "there was an error cloning from {url}. Does the repo really exist?"
        )),
        GhclassError::Git(_) => {
            Some("something went wrong with git. Re-run with -v for details.".to_string())
        }
        GhclassError::Api(message) => Some(format!("exiting because of an API error: {message}")),
        GhclassError::NotFound(message) | GhclassError::File(message) => Some(message.clone()),
        GhclassError::Parse(_) => None,
    }
}
