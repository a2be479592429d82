//! Operations on master and student repositories.

use futures::future::join_all;
use log::{info, warn};

use crate::errors::{GhclassError, Result};
use crate::git;
use crate::github::GitHubApi;
use crate::utils::{self, Issue};

/// The team that collects migrated master repositories.
pub const MASTER_TEAM: &str = "master_repos";

fn scratch_dir() -> Result<tempfile::TempDir> {
    tempfile::tempdir()
        .map_err(|e| GhclassError::File(format!("could not create a scratch directory: {e}")))
}

/// Create student teams, create one student repository per master
/// repository, and push the master contents to them. Previously performed
/// steps are skipped, so re-running is safe.
pub async fn setup_student_repos(
    master_repo_urls: &[String],
    students: &[String],
    user: &str,
    api: &GitHubApi,
) -> Result<()> {
    let work = scratch_dir()?;
    let teams = api.ensure_teams_and_members(students).await?;

    for master_url in master_repo_urls {
        let master_name = utils::repo_name(master_url);
        git::clone(master_url, api.token(), work.path()).await?;
        let master_dir = work.path().join(&master_name);

        for (student, team) in students.iter().zip(&teams) {
            let repo_name = utils::generate_repo_name(student, &master_name);
            let url = api.ensure_repo(&repo_name, Some(&team.slug)).await?;
            git::push(&master_dir, &url, user, api.token()).await?;
            info!("set up {repo_name}");
        }
    }
    Ok(())
}

/// Push changes from the master repos out to the existing student repos.
/// Failed pushes do not abort the batch: the affected repos are collected
/// and, when an issue was provided, it is opened in each of them.
pub async fn update_student_repos(
    master_repo_urls: &[String],
    students: &[String],
    user: &str,
    api: &GitHubApi,
    issue: Option<&Issue>,
) -> Result<()> {
    let work = scratch_dir()?;
    let mut failed_repos: Vec<String> = Vec::new();

    for master_url in master_repo_urls {
        let master_name = utils::repo_name(master_url);
        git::clone(master_url, api.token(), work.path()).await?;
        let master_dir = work.path().join(&master_name);

        for student in students {
            let repo_name = utils::generate_repo_name(student, &master_name);
            let url = api.repo_url(&repo_name);
            match git::push(&master_dir, &url, user, api.token()).await {
                Ok(()) => info!("updated {repo_name}"),
                Err(GhclassError::PushFailed { url }) => {
                    warn!("failed to push to {url}");
                    failed_repos.push(repo_name);
                }
                Err(e) => return Err(e),
            }
        }
    }

    if failed_repos.is_empty() {
        info!("all student repos are up to date");
    } else if let Some(issue) = issue {
        warn!(
            "{} pushes failed, opening an issue in the affected repos",
            failed_repos.len()
        );
        api.open_issue(issue, &failed_repos).await?;
    } else {
        warn!(
            "{} pushes failed: {}",
            failed_repos.len(),
            failed_repos.join(", ")
        );
    }
    Ok(())
}

/// Copy master repositories into the target organization, collected under
/// the master repos team. Re-running updates already migrated repos.
pub async fn migrate_repos(master_repo_urls: &[String], user: &str, api: &GitHubApi) -> Result<()> {
    let work = scratch_dir()?;
    let team = api.ensure_team(MASTER_TEAM).await?;

    for master_url in master_repo_urls {
        let master_name = utils::repo_name(master_url);
        git::clone(master_url, api.token(), work.path()).await?;
        let master_dir = work.path().join(&master_name);

        let url = api.ensure_repo(&master_name, Some(&team.slug)).await?;
        git::push(&master_dir, &url, user, api.token()).await?;
        info!("migrated {master_name} into {}", api.org());
    }
    Ok(())
}

/// Clone all student repos into the working directory, concurrently.
/// Every failure is logged; the first one decides the command's outcome
/// after the whole batch has been attempted.
pub async fn clone_repos(
    master_repo_names: &[String],
    students: &[String],
    api: &GitHubApi,
) -> Result<()> {
    let cwd = std::env::current_dir()
        .map_err(|e| GhclassError::File(format!("could not determine the working directory: {e}")))?;
    let repo_names = utils::generate_repo_names(students, master_repo_names);
    let urls = api.get_repo_urls(&repo_names);

    let results = join_all(
        urls.iter()
            .map(|url| git::clone(url, api.token(), &cwd)),
    )
    .await;

    let mut first_failure = None;
    let mut cloned = 0;
    for result in results {
        match result {
            Ok(()) => cloned += 1,
            Err(e) => {
                warn!("{e}");
                first_failure.get_or_insert(e);
            }
        }
    }
    info!("cloned {cloned}/{} repos", urls.len());
    match first_failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
