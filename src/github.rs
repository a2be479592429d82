//! A collection of GitHub functions building on top of the Octocrab library.
//!
//! [`GitHubApi`] is an authenticated handle bound to one API base URL and one
//! organization. Endpoints octocrab has no typed support for (teams, org
//! repos, memberships) go through raw routes with partial response structs.

use http::{HeaderName, StatusCode};
use log::{debug, info, warn};
use octocrab::models::UserId;
use octocrab::params;
use octocrab::{Octocrab, OctocrabBuilder};
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::{api_status, GhclassError, Result};
use crate::utils::Issue;

const NO_PARAMETERS: Option<&()> = None;

/// OAuth scopes the token must carry for the administrative commands.
const REQUIRED_SCOPES: [&str; 2] = ["repo", "admin:org"];

#[derive(Debug, Serialize, Deserialize)]
pub struct Account {
    pub id: UserId,
    pub login: String,
    pub r#type: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TeamInfo {
    pub id: u64,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OrgMembership {
    pub state: String,
    pub role: String,
}

fn build_octocrab(base_url: &str, token: &str) -> Result<Octocrab> {
    let octocrab = OctocrabBuilder::default()
        .base_uri(base_url)
        .map_err(|e| GhclassError::Api(format!("invalid base url '{base_url}': {e}")))?
        .personal_token(token.to_owned())
        .build()?;
    Ok(octocrab)
}

/// Derive the web (clone) base URL from an API base URL. `api.github.com`
/// maps to `github.com`; enterprise hosts drop the `/api/v3` suffix.
fn html_base_url(base_url: &str) -> Result<String> {
    let url = Url::parse(base_url)
        .map_err(|e| GhclassError::Api(format!("invalid base url '{base_url}': {e}")))?;
    if url.host_str() == Some("api.github.com") {
        return Ok("https://github.com".to_string());
    }
    let path = url.path().trim_end_matches('/');
    let path = path.strip_suffix("/api/v3").unwrap_or(path);
    let mut base = format!("{}://{}", url.scheme(), url.host_str().unwrap_or_default());
    if let Some(port) = url.port() {
        base.push_str(&format!(":{port}"));
    }
    base.push_str(path);
    Ok(base)
}

/// An authenticated handle to a GitHub-compatible API, scoped to one
/// organization.
#[derive(Debug)]
pub struct GitHubApi {
    octocrab: Octocrab,
    org: String,
    token: String,
    html_base: String,
}

/// Connect to the API at `base_url` and verify the organization is
/// reachable. A not-found response is re-raised with a diagnostic naming
/// both likely causes, since a bad organization and a bad base URL are
/// indistinguishable at this point.
pub async fn connect(base_url: &str, token: &str, org_name: &str) -> Result<GitHubApi> {
    let api = GitHubApi::new(base_url, token, org_name)?;
    let route = format!("/orgs/{org_name}");
    let result: std::result::Result<serde_json::Value, octocrab::Error> =
        api.octocrab.get(route, NO_PARAMETERS).await;
    match result {
        Ok(_) => Ok(api),
        Err(e) if api_status(&e) == Some(StatusCode::NOT_FOUND) => {
            Err(GhclassError::NotFound(format!(
                "either organization {org_name} could not be found, \
                 or the base url '{base_url}' is incorrect"
            )))
        }
        Err(e) => Err(e.into()),
    }
}

impl GitHubApi {
    /// Build a handle without touching the network. Use [`connect`] when the
    /// organization should be validated up front.
    pub fn new(base_url: &str, token: &str, org_name: &str) -> Result<Self> {
        let octocrab = build_octocrab(base_url, token)?;
        let html_base = html_base_url(base_url)?;
        Ok(Self {
            octocrab,
            org: org_name.to_string(),
            token: token.to_string(),
            html_base,
        })
    }

    pub fn org(&self) -> &str {
        &self.org
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// The expected clone URL for a repository in the organization. Note
    /// that this only constructs the URL shape; it does not check that the
    /// repository actually exists. Existence surfaces later, when the URL
    /// is used.
    pub fn repo_url(&self, repo_name: &str) -> String {
        format!("{}/{}/{}.git", self.html_base, self.org, repo_name)
    }

    /// See [`GitHubApi::repo_url`].
    pub fn get_repo_urls(&self, repo_names: &[String]) -> Vec<String> {
        repo_names.iter().map(|name| self.repo_url(name)).collect()
    }

    /// Fetch a team by slug, creating it when missing.
    pub async fn ensure_team(&self, name: &str) -> Result<TeamInfo> {
        let route = format!("/orgs/{}/teams/{}", self.org, name.to_lowercase());
        let result: std::result::Result<TeamInfo, octocrab::Error> =
            self.octocrab.get(route, NO_PARAMETERS).await;
        match result {
            Ok(team) => Ok(team),
            Err(e) if api_status(&e) == Some(StatusCode::NOT_FOUND) => {
                debug!("creating team {name}");
                let body = serde_json::json!({
                    "name": name,
                    "permission": "push",
                    "privacy": "secret",
                });
                let team: TeamInfo = self
                    .octocrab
                    .post(format!("/orgs/{}/teams", self.org), Some(&body))
                    .await?;
                Ok(team)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Add a user to a team. Adding an existing member is a no-op on the
    /// API side, so this is safe to repeat.
    pub async fn add_team_member(&self, team_slug: &str, username: &str) -> Result<()> {
        let route = format!(
            "/orgs/{}/teams/{team_slug}/memberships/{username}",
            self.org
        );
        let body = serde_json::json!({ "role": "member" });
        let resp = self.octocrab._put(route, Some(&body)).await?;
        if !resp.status().is_success() {
            return Err(GhclassError::Api(format!(
                "adding {username} to team {team_slug} failed (HTTP {})",
                resp.status()
            )));
        }
        Ok(())
    }

    /// Create one team per student, named after the student, with the
    /// student as its only member. Returns the teams in student order.
    pub async fn ensure_teams_and_members(&self, students: &[String]) -> Result<Vec<TeamInfo>> {
        let mut teams = Vec::with_capacity(students.len());
        for student in students {
            let team = self.ensure_team(student).await?;
            self.add_team_member(&team.slug, student).await?;
            info!("student {student} is on team {}", team.slug);
            teams.push(team);
        }
        Ok(teams)
    }

    /// Grant a team push access to a repository in the organization.
    pub async fn add_team_repo(&self, team_slug: &str, repo_name: &str) -> Result<()> {
        let route = format!(
            "/orgs/{org}/teams/{team_slug}/repos/{org}/{repo_name}",
            org = self.org
        );
        let body = serde_json::json!({ "permission": "push" });
        let resp = self.octocrab._put(route, Some(&body)).await?;
        if !resp.status().is_success() {
            return Err(GhclassError::Api(format!(
                "granting team {team_slug} access to {repo_name} failed (HTTP {})",
                resp.status()
            )));
        }
        Ok(())
    }

    /// Create a private repository in the organization unless it already
    /// exists, optionally granting a team push access. Returns the repo's
    /// clone URL either way.
    pub async fn ensure_repo(&self, repo_name: &str, team_slug: Option<&str>) -> Result<String> {
        let body = serde_json::json!({
            "name": repo_name,
            "private": true,
            "auto_init": false,
        });
        let route = format!("/orgs/{}/repos", self.org);
        let result: std::result::Result<serde_json::Value, octocrab::Error> =
            self.octocrab.post(route, Some(&body)).await;
        match result {
            Ok(_) => info!("created repo {repo_name}"),
            Err(e) if api_status(&e) == Some(StatusCode::UNPROCESSABLE_ENTITY) => {
                debug!("repo {repo_name} already exists");
            }
            Err(e) => return Err(e.into()),
        }
        if let Some(slug) = team_slug {
            self.add_team_repo(slug, repo_name).await?;
        }
        Ok(self.repo_url(repo_name))
    }

    /// Open the issue in each named repository. Repositories that do not
    /// exist (e.g. a student who never activated their account) are logged
    /// and skipped rather than aborting the whole batch.
    pub async fn open_issue(&self, issue: &Issue, repo_names: &[String]) -> Result<()> {
        for repo in repo_names {
            let result = self
                .octocrab
                .issues(self.org.clone(), repo.clone())
                .create(issue.title.as_str())
                .body(issue.body.as_str())
                .send()
                .await;
            match result {
                Ok(created) => {
                    info!("opened issue {repo}#{}: '{}'", created.number, issue.title)
                }
                Err(e) if api_status(&e) == Some(StatusCode::NOT_FOUND) => {
                    warn!("could not open issue in {repo}: repo not found");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Close every open issue whose title matches `title_regex`, in each
    /// named repository.
    pub async fn close_issue(&self, title_regex: &str, repo_names: &[String]) -> Result<()> {
        // The CLI validates the pattern at parse time, so a failure here is
        // an internal inconsistency.
        let re = Regex::new(title_regex)
            .map_err(|e| GhclassError::Parse(format!("invalid title regex '{title_regex}': {e}")))?;
        let mut closed = 0;
        for repo in repo_names {
            let page = match self
                .octocrab
                .issues(self.org.clone(), repo.clone())
                .list()
                .state(params::State::Open)
                .per_page(100)
                .send()
                .await
            {
                Ok(page) => page,
                Err(e) if api_status(&e) == Some(StatusCode::NOT_FOUND) => {
                    warn!("could not list issues in {repo}: repo not found");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            for found in page.items {
                if re.is_match(&found.title) {
                    self.octocrab
                        .issues(self.org.clone(), repo.clone())
                        .update(found.number)
                        .state(octocrab::models::IssueState::Closed)
                        .send()
                        .await?;
                    info!("closed issue {repo}#{}: '{}'", found.number, found.title);
                    closed += 1;
                }
            }
        }
        if closed == 0 {
            warn!("no open issues matched '{title_regex}'");
        }
        Ok(())
    }
}

/// Verify the user's settings end to end. Performs the following checks in
/// order: user exists (implicitly verifies the base url), token scopes,
/// organization exists, user is an organization owner. The first failing
/// check aborts the verification.
pub async fn verify_settings(user: &str, org_name: &str, base_url: &str, token: &str) -> Result<()> {
    info!("verifying settings");
    let octocrab = build_octocrab(base_url, token)?;

    let account: Account = octocrab
        .get(format!("/users/{user}"), NO_PARAMETERS)
        .await
        .map_err(|e| match api_status(&e) {
            Some(StatusCode::NOT_FOUND) => GhclassError::NotFound(format!(
                "either user {user} could not be found, or the base url '{base_url}' is incorrect"
            )),
            _ => e.into(),
        })?;
    info!("found user {} (base url ok)", account.login);

    let resp = octocrab._get("/user").await?;
    let scopes_header = resp
        .headers()
        .get(HeaderName::from_static("x-oauth-scopes"))
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let scopes: Vec<&str> = scopes_header
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    let missing: Vec<&str> = REQUIRED_SCOPES
        .into_iter()
        .filter(|required| !scopes.contains(required))
        .collect();
    if !missing.is_empty() {
        return Err(GhclassError::Api(format!(
            "token is missing required scopes: {}",
            missing.join(", ")
        )));
    }
    info!("token scopes ok ({scopes_header})");

    let org: std::result::Result<serde_json::Value, octocrab::Error> = octocrab
        .get(format!("/orgs/{org_name}"), NO_PARAMETERS)
        .await;
    match org {
        Ok(_) => info!("found organization {org_name}"),
        Err(e) if api_status(&e) == Some(StatusCode::NOT_FOUND) => {
            return Err(GhclassError::NotFound(format!(
                "organization {org_name} could not be found"
            )))
        }
        Err(e) => return Err(e.into()),
    }

    let membership: OrgMembership = octocrab
        .get(
            format!("/orgs/{org_name}/memberships/{user}"),
            NO_PARAMETERS,
        )
        .await
        .map_err(|e| match api_status(&e) {
            Some(StatusCode::NOT_FOUND) => {
                GhclassError::NotFound(format!("user {user} is not a member of {org_name}"))
            }
            _ => e.into(),
        })?;
    if membership.role != "admin" {
        return Err(GhclassError::Api(format!(
            "user {user} is not an owner of {org_name} (role: {})",
            membership.role
        )));
    }
    info!("user {user} is an owner of {org_name}");

    info!("all settings check out");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn init() {
        env_logger::builder()
            .target(env_logger::Target::Stdout)
            .try_init()
            .unwrap_or_default();
    }

    #[test]
    fn html_base_for_public_github() {
        assert_eq!(
            html_base_url("https://api.github.com").unwrap(),
            "https://github.com"
        );
    }

    #[test]
    fn html_base_for_enterprise_strips_api_suffix() {
        assert_eq!(
            html_base_url("https://ghe.example.edu/api/v3").unwrap(),
            "https://ghe.example.edu"
        );
        assert_eq!(
            html_base_url("https://ghe.example.edu:8443/api/v3/").unwrap(),
            "https://ghe.example.edu:8443"
        );
    }

    #[tokio::test]
    async fn repo_urls_follow_the_org_and_base() {
        let api = GitHubApi::new("https://api.github.com", "token", "cs101-2026").unwrap();
        assert_eq!(
            api.repo_url("alice-task-1"),
            "https://github.com/cs101-2026/alice-task-1.git"
        );

        let urls = api.get_repo_urls(&["a".to_string(), "b".to_string()]);
        assert_eq!(
            urls,
            vec![
                "https://github.com/cs101-2026/a.git".to_string(),
                "https://github.com/cs101-2026/b.git".to_string(),
            ]
        );
    }

    #[test]
    fn bad_base_url_is_rejected() {
        assert!(GitHubApi::new("not a url", "token", "org").is_err());
    }

    #[tokio::test]
    #[ignore = "Requires a valid GitHub token in the GITHUB_TOKEN environment variable"]
    async fn test_connect_to_github() {
        init();

        let github_token = env::var("GITHUB_TOKEN").unwrap();
        let api = connect("https://api.github.com", &github_token, "gitsudo-io")
            .await
            .unwrap();
        assert_eq!(api.org(), "gitsudo-io");
    }

    #[tokio::test]
    #[ignore = "Requires a valid GitHub token in the GITHUB_TOKEN environment variable"]
    async fn test_connect_to_missing_org_enriches_the_error() {
        init();

        let github_token = env::var("GITHUB_TOKEN").unwrap();
        let err = connect(
            "https://api.github.com",
            &github_token,
            "no-such-org-ghclass-test",
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("base url"));
    }
}
