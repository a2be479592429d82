//! Opening and closing issues across student repositories.

use log::info;

use crate::errors::Result;
use crate::github::GitHubApi;
use crate::utils::{self, Issue};

/// Open `issue` in every student repo derived from the master repo names.
pub async fn open_issue(
    issue: &Issue,
    master_repo_names: &[String],
    students: &[String],
    api: &GitHubApi,
) -> Result<()> {
    let repo_names = utils::generate_repo_names(students, master_repo_names);
    info!(
        "opening issue '{}' in {} repos",
        issue.title,
        repo_names.len()
    );
    api.open_issue(issue, &repo_names).await
}

/// Close every open issue whose title matches `title_regex` in the
/// student repos derived from the master repo names.
pub async fn close_issue(
    title_regex: &str,
    master_repo_names: &[String],
    students: &[String],
    api: &GitHubApi,
) -> Result<()> {
    let repo_names = utils::generate_repo_names(students, master_repo_names);
    api.close_issue(title_regex, &repo_names).await
}
