//! This module defines the commands, subcommands, and arguments for ghclass.
//!
//! The grammar is assembled with clap's builder API rather than derive:
//! whether the recurring options are required depends on the configured
//! defaults, and extensions may append flags to the `clone` subcommand.
//! Both are runtime inputs to schema construction.

use std::path::Path;

use clap::Args as ClapArgs;
use clap::{Arg, ArgGroup, ArgMatches, Command};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use regex::Regex;
use url::Url;

use crate::config::Defaults;
use crate::errors::{GhclassError, Result};
use crate::git;
use crate::github::{self, GitHubApi};
use crate::plugin::PluginRegistry;
use crate::utils::{self, Issue};

pub const SETUP: &str = "setup";
pub const UPDATE: &str = "update";
pub const MIGRATE: &str = "migrate";
pub const CLONE: &str = "clone";
pub const ADD_TO_TEAMS: &str = "add-to-teams";
pub const OPEN_ISSUE: &str = "open-issue";
pub const CLOSE_ISSUE: &str = "close-issue";
pub const VERIFY_SETTINGS: &str = "verify-settings";

/// The fixed set of administrative commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Setup,
    Update,
    Migrate,
    Clone,
    AddToTeams,
    OpenIssue,
    CloseIssue,
    VerifySettings,
}

impl CommandKind {
    pub fn name(self) -> &'static str {
        match self {
            CommandKind::Setup => SETUP,
            CommandKind::Update => UPDATE,
            CommandKind::Migrate => MIGRATE,
            CommandKind::Clone => CLONE,
            CommandKind::AddToTeams => ADD_TO_TEAMS,
            CommandKind::OpenIssue => OPEN_ISSUE,
            CommandKind::CloseIssue => CLOSE_ISSUE,
            CommandKind::VerifySettings => VERIFY_SETTINGS,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            SETUP => Some(CommandKind::Setup),
            UPDATE => Some(CommandKind::Update),
            MIGRATE => Some(CommandKind::Migrate),
            CLONE => Some(CommandKind::Clone),
            ADD_TO_TEAMS => Some(CommandKind::AddToTeams),
            OPEN_ISSUE => Some(CommandKind::OpenIssue),
            CLOSE_ISSUE => Some(CommandKind::CloseIssue),
            VERIFY_SETTINGS => Some(CommandKind::VerifySettings),
            _ => None,
        }
    }
}

/// The parsed and resolved arguments for one invocation. Constructed once,
/// never mutated. `master_repo_urls` and `master_repo_names` are resolved
/// together: both are present, or the command does not take repositories.
#[derive(Debug)]
pub struct Args {
    pub subcommand: CommandKind,
    pub org_name: String,
    pub github_base_url: String,
    pub user: Option<String>,
    pub master_repo_urls: Option<Vec<String>>,
    pub master_repo_names: Option<Vec<String>>,
    pub students: Option<Vec<String>>,
    pub issue: Option<Issue>,
    pub title_regex: Option<String>,
}

fn required_unless_default(arg: Arg, default: Option<&str>) -> Arg {
    match default {
        Some(value) => arg.required(false).default_value(value.to_string()),
        None => arg.required(true),
    }
}

/// Options shared by every subcommand that talks to the API: the target
/// organization and the API base url.
fn base_args(defaults: &Defaults) -> Vec<Arg> {
    vec![
        required_unless_default(
            Arg::new("org_name")
                .short('o')
                .long("org-name")
                .value_name("ORG")
                .help("Name of the organization to which repos should be added"),
            defaults.value("org_name"),
        ),
        required_unless_default(
            Arg::new("github_base_url")
                .short('g')
                .long("github-base-url")
                .value_name("URL")
                .help("Base url to a GitHub v3 API. For enterprise, this is usually `https://<HOST>/api/v3`"),
            defaults.value("github_base_url"),
        ),
    ]
}

/// The two mutually exclusive student sources. The pair is mandatory
/// unless a students file is configured as a default.
fn with_student_args(cmd: Command, defaults: &Defaults) -> Command {
    let students_file = Arg::new("students_file")
        .long("students-file")
        .alias("sf")
        .value_name("FILE")
        .help("Path to a list of student usernames, one per line");
    let students_file = match defaults.value("students_file") {
        Some(value) => students_file.default_value(value.to_string()),
        None => students_file,
    };
    cmd.arg(students_file)
        .arg(
            Arg::new("students")
                .short('s')
                .long("students")
                .num_args(1..)
                .value_name("USERNAME")
                .help("One or more student usernames"),
        )
        .group(
            ArgGroup::new("student_source")
                .args(["students_file", "students"])
                .required(defaults.is_required("students_file")),
        )
}

fn user_arg(defaults: &Defaults) -> Arg {
    required_unless_default(
        Arg::new("user")
            .short('u')
            .long("user")
            .value_name("USERNAME")
            .help("Your GitHub username. Needed for pushing without CLI interaction"),
        defaults.value("user"),
    )
}

fn master_repo_names_arg(required: bool) -> Arg {
    Arg::new("master_repo_names")
        .long("master-repo-names")
        .alias("mn")
        .num_args(1..)
        .value_name("NAME")
        .required(required)
        .help(
            "One or more names of master repositories. Names must either refer to local \
             directories, or to master repositories in the target organization",
        )
}

fn issue_arg(required: bool, help: &'static str) -> Arg {
    Arg::new("issue")
        .short('i')
        .long("issue")
        .value_name("FILE")
        .required(required)
        .help(help)
}

/// Assemble the full command grammar from the configured defaults, letting
/// registered extensions append flags to the `clone` subcommand.
pub fn build_command(defaults: &Defaults, registry: &PluginRegistry) -> Command {
    let cmd = Command::new("ghclass")
        .version(clap::crate_version!())
        .about("A GitHub command line utility for administrating student repositories")
        .subcommand_required(true)
        .arg_required_else_help(true);
    let cmd = Verbosity::<InfoLevel>::augment_args(cmd);

    let setup = Command::new(SETUP)
        .about("Setup student repos")
        .long_about(
            "Setup student repositories based on master repositories: creates the student \
             teams, creates one student repository per master repository, and pushes the \
             master repo files to the student repos. Safe to run repeatedly; previously \
             performed steps are skipped.",
        )
        .args(base_args(defaults))
        .arg(user_arg(defaults))
        .arg(master_repo_names_arg(true));
    let setup = with_student_args(setup, defaults);

    let update = Command::new(UPDATE)
        .about("Update existing student repos")
        .args(base_args(defaults))
        .arg(user_arg(defaults))
        .arg(master_repo_names_arg(true))
        .arg(issue_arg(
            false,
            "Path to an issue to open in repos to which update pushes fail. The first line is the title",
        ));
    let update = with_student_args(update, defaults);

    let migrate = Command::new(MIGRATE)
        .about("Migrate master repositories into the target organization")
        .long_about(
            "Migrate master repositories into the target organization. The repos must \
             either be local on disk (specified with `--master-repo-names`), or somewhere \
             in the target GitHub instance (specified with `--master-repo-urls`). Running \
             the command again updates already migrated repos.",
        )
        .args(base_args(defaults))
        .arg(user_arg(defaults))
        .arg(
            Arg::new("master_repo_urls")
                .long("master-repo-urls")
                .alias("mu")
                .num_args(1..)
                .value_name("URL")
                .help("One or more URLs to the master repositories"),
        )
        .arg(master_repo_names_arg(false))
        .group(
            ArgGroup::new("master_repos")
                .args(["master_repo_urls", "master_repo_names"])
                .required(true),
        );

    let clone = Command::new(CLONE)
        .about("Clone student repos in bulk")
        .args(base_args(defaults))
        .arg(master_repo_names_arg(true));
    let clone = with_student_args(clone, defaults);
    // only the clone grammar is extensible
    let clone = registry.extend_clone_command(clone);

    let add_to_teams = Command::new(ADD_TO_TEAMS)
        .about("Create student teams and add students to them")
        .long_about(
            "Create student teams and add students to them. This is run implicitly by \
             `setup`; it exists so students whose accounts were activated late can be \
             added to their teams without re-running the whole setup.",
        )
        .args(base_args(defaults));
    let add_to_teams = with_student_args(add_to_teams, defaults);

    let open_issue = Command::new(OPEN_ISSUE)
        .about("Open issues in student repos")
        .args(base_args(defaults))
        .arg(master_repo_names_arg(true))
        .arg(issue_arg(
            true,
            "Path to an issue. The first line is the title",
        ));
    let open_issue = with_student_args(open_issue, defaults);

    let close_issue = Command::new(CLOSE_ISSUE)
        .about("Close issues in student repos")
        .args(base_args(defaults))
        .arg(master_repo_names_arg(true))
        .arg(
            Arg::new("title_regex")
                .short('r')
                .long("title-regex")
                .value_name("REGEX")
                .required(true)
                .value_parser(|s: &str| {
                    Regex::new(s).map(|_| s.to_string()).map_err(|e| e.to_string())
                })
                .help("Any open issue whose title matches the regex will be closed"),
        );
    let close_issue = with_student_args(close_issue, defaults);

    let verify = Command::new(VERIFY_SETTINGS)
        .about("Verify your settings, such as the base url and the OAUTH token")
        .long_about(
            "Verify all settings. Performs the following checks, in order: user exists \
             (implicitly verifies the base url), token scopes, organization exists, user \
             is an owner of the organization. The verification aborts at the first \
             failing check.",
        )
        .args(base_args(defaults))
        .arg(user_arg(defaults));

    cmd.subcommand(setup)
        .subcommand(update)
        .subcommand(migrate)
        .subcommand(clone)
        .subcommand(add_to_teams)
        .subcommand(open_issue)
        .subcommand(close_issue)
        .subcommand(verify)
}

/// Look up a string option, tolerating subcommands whose grammar does not
/// define it at all.
fn opt_string(matches: &ArgMatches, id: &str) -> Option<String> {
    matches.try_get_one::<String>(id).ok().flatten().cloned()
}

fn opt_strings(matches: &ArgMatches, id: &str) -> Option<Vec<String>> {
    match matches.try_get_many::<String>(id) {
        Ok(Some(values)) => {
            let values: Vec<String> = values.cloned().collect();
            if values.is_empty() {
                None
            } else {
                Some(values)
            }
        }
        _ => None,
    }
}

fn require_string(matches: &ArgMatches, id: &str) -> Result<String> {
    opt_string(matches, id)
        .ok_or_else(|| GhclassError::Parse(format!("the schema should have required '{id}'")))
}

/// Resolve the student list. An inline list wins; otherwise the students
/// file is resolved, validated and read. Neither source being present is
/// not an error here; subcommands that need students enforce the pair in
/// their grammar.
pub fn extract_students(matches: &ArgMatches) -> Result<Option<Vec<String>>> {
    if let Some(students) = opt_strings(matches, "students") {
        return Ok(Some(students));
    }
    let Some(path) = opt_string(matches, "students_file") else {
        return Ok(None);
    };
    let resolved = Path::new(&path)
        .canonicalize()
        .map_err(|_| GhclassError::File(format!("'{path}' is not a file")))?;
    if !resolved.is_file() {
        return Err(GhclassError::File(format!(
            "'{}' is not a file",
            resolved.display()
        )));
    }
    let metadata = std::fs::metadata(&resolved)
        .map_err(|e| GhclassError::File(format!("could not stat '{}': {e}", resolved.display())))?;
    if metadata.len() == 0 {
        return Err(GhclassError::File(format!(
            "'{}' is empty",
            resolved.display()
        )));
    }
    let text = std::fs::read_to_string(&resolved)
        .map_err(|e| GhclassError::File(format!("could not read '{}': {e}", resolved.display())))?;
    let students = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect();
    Ok(Some(students))
}

/// Convert master repository names to URLs. A name that points at a local
/// git repository (relative to `cwd`) becomes a file URI; every other name
/// is assumed to live in the target organization. Remote URLs come first
/// in the result. Remote existence is not checked here; a bad name
/// surfaces when the URL is used.
pub fn repo_names_to_urls(
    repo_names: &[String],
    api: &GitHubApi,
    cwd: &Path,
) -> Result<Vec<String>> {
    let (local, non_local): (Vec<String>, Vec<String>) = repo_names
        .iter()
        .cloned()
        .partition(|name| utils::is_git_repo(&cwd.join(name)));

    let mut urls = api.get_repo_urls(&non_local);
    for name in &local {
        let path = cwd.join(name);
        let uri = Url::from_file_path(&path).map_err(|_| {
            GhclassError::File(format!("cannot build a file URI for '{}'", path.display()))
        })?;
        urls.push(uri.to_string());
    }
    Ok(urls)
}

/// Parse and resolve the full argument bundle, connecting to the API in
/// the process. For `verify-settings` the returned handle is `None`: only
/// the organization, base url and user are resolved, and no connection is
/// made.
pub async fn parse_args(
    matches: &ArgMatches,
    registry: &PluginRegistry,
) -> Result<(Args, Option<GitHubApi>)> {
    let (name, sub) = matches
        .subcommand()
        .ok_or_else(|| GhclassError::Parse("no subcommand was parsed".to_string()))?;
    let subcommand = CommandKind::from_name(name)
        .ok_or_else(|| GhclassError::Parse(format!("illegal value for subcommand: {name}")))?;

    let org_name = require_string(sub, "org_name")?;
    let github_base_url = require_string(sub, "github_base_url")?;
    let user = opt_string(sub, "user");

    if subcommand == CommandKind::VerifySettings {
        // quick parse, the verification routine does its own connecting
        let args = Args {
            subcommand,
            org_name,
            github_base_url,
            user,
            master_repo_urls: None,
            master_repo_names: None,
            students: None,
            issue: None,
            title_regex: None,
        };
        return Ok((args, None));
    }

    if subcommand == CommandKind::Clone {
        // only clone lets extensions hook into parsing
        registry.run_clone_parsed_hooks(sub);
    }

    let token = git::oauth_token();
    let api = github::connect(&github_base_url, &token, &org_name).await?;

    let (master_repo_urls, master_repo_names) = if subcommand == CommandKind::AddToTeams {
        // add-to-teams takes no repository arguments
        (None, None)
    } else if let Some(urls) = opt_strings(sub, "master_repo_urls") {
        let names = urls.iter().map(|url| utils::repo_name(url)).collect();
        (Some(urls), Some(names))
    } else {
        let names = opt_strings(sub, "master_repo_names").ok_or_else(|| {
            GhclassError::Parse(format!("{name} was parsed without master repo names"))
        })?;
        let cwd = std::env::current_dir().map_err(|e| {
            GhclassError::File(format!("could not determine the working directory: {e}"))
        })?;
        let urls = repo_names_to_urls(&names, &api, &cwd)?;
        (Some(urls), Some(names))
    };
    debug_assert_eq!(master_repo_urls.is_some(), master_repo_names.is_some());

    let students = extract_students(sub)?;
    let issue = match opt_string(sub, "issue") {
        Some(path) => Some(utils::read_issue(&path)?),
        None => None,
    };
    let title_regex = opt_string(sub, "title_regex");

    let args = Args {
        subcommand,
        org_name,
        github_base_url,
        user,
        master_repo_urls,
        master_repo_names,
        students,
        issue,
        title_regex,
    };
    Ok((args, Some(api)))
}

#[cfg(test)]
mod tests {
    use clap::error::ErrorKind;

    use super::*;

    fn full_defaults() -> Defaults {
        Defaults {
            org_name: Some("cs101-2026".to_string()),
            github_base_url: Some("https://api.github.com".to_string()),
            user: Some("teacher".to_string()),
            students_file: None,
        }
    }

    fn parse(defaults: &Defaults, argv: &[&str]) -> ArgMatches {
        build_command(defaults, &PluginRegistry::new())
            .try_get_matches_from(argv)
            .unwrap()
    }

    fn parse_err(defaults: &Defaults, argv: &[&str]) -> clap::Error {
        build_command(defaults, &PluginRegistry::new())
            .try_get_matches_from(argv)
            .unwrap_err()
    }

    #[test]
    fn command_names_round_trip() {
        for kind in [
            CommandKind::Setup,
            CommandKind::Update,
            CommandKind::Migrate,
            CommandKind::Clone,
            CommandKind::AddToTeams,
            CommandKind::OpenIssue,
            CommandKind::CloseIssue,
            CommandKind::VerifySettings,
        ] {
            assert_eq!(CommandKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(CommandKind::from_name("froznicate"), None);
    }

    #[test]
    fn configured_defaults_make_flags_optional_and_prefilled() {
        let matches = parse(
            &full_defaults(),
            &[
                "ghclass",
                "setup",
                "-s",
                "alice",
                "--master-repo-names",
                "task-1",
            ],
        );
        let sub = matches.subcommand().unwrap().1;
        assert_eq!(sub.get_one::<String>("org_name").unwrap(), "cs101-2026");
        assert_eq!(
            sub.get_one::<String>("github_base_url").unwrap(),
            "https://api.github.com"
        );
        assert_eq!(sub.get_one::<String>("user").unwrap(), "teacher");
    }

    #[test]
    fn missing_defaults_make_flags_required() {
        let err = parse_err(
            &Defaults::default(),
            &["ghclass", "setup", "-s", "alice", "--mn", "task-1"],
        );
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn command_line_values_override_defaults() {
        let matches = parse(
            &full_defaults(),
            &[
                "ghclass", "setup", "-o", "other-org", "-s", "alice", "--mn", "task-1",
            ],
        );
        let sub = matches.subcommand().unwrap().1;
        assert_eq!(sub.get_one::<String>("org_name").unwrap(), "other-org");
    }

    #[test]
    fn migrate_urls_and_names_are_mutually_exclusive() {
        let err = parse_err(
            &full_defaults(),
            &[
                "ghclass",
                "migrate",
                "--mu",
                "https://github.com/org/task-1.git",
                "--mn",
                "task-1",
            ],
        );
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
    }

    #[test]
    fn migrate_requires_urls_or_names() {
        let err = parse_err(&full_defaults(), &["ghclass", "migrate"]);
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn students_and_students_file_are_mutually_exclusive() {
        let err = parse_err(
            &full_defaults(),
            &[
                "ghclass",
                "clone",
                "-s",
                "alice",
                "--students-file",
                "students.txt",
                "--mn",
                "task-1",
            ],
        );
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
    }

    #[test]
    fn close_issue_rejects_an_invalid_regex_at_parse_time() {
        let err = parse_err(
            &full_defaults(),
            &[
                "ghclass",
                "close-issue",
                "-s",
                "alice",
                "--mn",
                "task-1",
                "-r",
                "ba(d",
            ],
        );
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
    }

    #[test]
    fn inline_students_are_returned_verbatim() {
        let matches = parse(
            &full_defaults(),
            &["ghclass", "clone", "-s", "alice", "bob", "--mn", "task-1"],
        );
        let sub = matches.subcommand().unwrap().1;
        let students = extract_students(sub).unwrap().unwrap();
        assert_eq!(students, vec!["alice".to_string(), "bob".to_string()]);
    }

    #[test]
    fn students_file_is_trimmed_and_blank_lines_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("students.txt");
        std::fs::write(&path, "alice\n\nbob \n").unwrap();

        let matches = parse(
            &full_defaults(),
            &[
                "ghclass",
                "clone",
                "--students-file",
                path.to_str().unwrap(),
                "--mn",
                "task-1",
            ],
        );
        let sub = matches.subcommand().unwrap().1;
        let students = extract_students(sub).unwrap().unwrap();
        assert_eq!(students, vec!["alice".to_string(), "bob".to_string()]);
    }

    #[test]
    fn missing_students_file_is_a_file_error() {
        let matches = parse(
            &full_defaults(),
            &[
                "ghclass",
                "clone",
                "--students-file",
                "/no/such/students.txt",
                "--mn",
                "task-1",
            ],
        );
        let sub = matches.subcommand().unwrap().1;
        assert!(matches!(extract_students(sub), Err(GhclassError::File(_))));
    }

    #[test]
    fn empty_students_file_is_a_file_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("students.txt");
        std::fs::write(&path, "").unwrap();

        let matches = parse(
            &full_defaults(),
            &[
                "ghclass",
                "clone",
                "--students-file",
                path.to_str().unwrap(),
                "--mn",
                "task-1",
            ],
        );
        let sub = matches.subcommand().unwrap().1;
        let err = extract_students(sub).unwrap_err();
        match err {
            GhclassError::File(msg) => assert!(msg.contains("is empty")),
            other => panic!("expected File error, got {other:?}"),
        }
    }

    #[test]
    fn subcommands_without_student_flags_extract_none() {
        let matches = parse(&full_defaults(), &["ghclass", "migrate", "--mn", "task-1"]);
        let sub = matches.subcommand().unwrap().1;
        assert!(extract_students(sub).unwrap().is_none());
    }

    #[tokio::test]
    async fn local_names_become_file_uris_after_remote_urls() {
        let api = GitHubApi::new("https://api.github.com", "token", "cs101-2026").unwrap();
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("local-repo").join(".git")).unwrap();

        let names = vec!["remote-repo".to_string(), "local-repo".to_string()];
        let urls = repo_names_to_urls(&names, &api, dir.path()).unwrap();

        assert_eq!(urls.len(), 2);
        assert_eq!(urls[0], "https://github.com/cs101-2026/remote-repo.git");
        assert!(urls[1].starts_with("file://"), "got {}", urls[1]);
        assert!(urls[1].ends_with("/local-repo"), "got {}", urls[1]);
    }

    #[tokio::test]
    async fn verify_settings_short_circuits_without_connecting() {
        let matches = parse(&full_defaults(), &["ghclass", "verify-settings"]);

        let (args, api) = parse_args(&matches, &PluginRegistry::new())
            .await
            .unwrap();

        assert!(api.is_none());
        assert_eq!(args.subcommand, CommandKind::VerifySettings);
        assert_eq!(args.org_name, "cs101-2026");
        assert_eq!(args.user.as_deref(), Some("teacher"));
        assert!(args.students.is_none());
        assert!(args.master_repo_urls.is_none());
        assert!(args.master_repo_names.is_none());
    }

    #[test]
    fn extensions_can_add_clone_flags() {
        struct ExtraFlag;

        impl crate::plugin::Plugin for ExtraFlag {
            fn name(&self) -> &'static str {
                "extra-flag"
            }

            fn extend_clone_command(&self, cmd: Command) -> Command {
                cmd.arg(Arg::new("grade_script").long("grade-script"))
            }
        }

        let mut registry = PluginRegistry::new();
        registry.register(Box::new(ExtraFlag));

        let matches = build_command(&full_defaults(), &registry)
            .try_get_matches_from([
                "ghclass",
                "clone",
                "-s",
                "alice",
                "--mn",
                "task-1",
                "--grade-script",
                "run.sh",
            ])
            .unwrap();
        let sub = matches.subcommand().unwrap().1;
        assert_eq!(sub.get_one::<String>("grade_script").unwrap(), "run.sh");
    }
}
