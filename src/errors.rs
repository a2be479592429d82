//! Error types for ghclass.

use std::fmt::Write;

use http::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GhclassError>;

/// The failure classes ghclass distinguishes between. Everything except
/// `Parse` is an expected runtime failure and is turned into a clean exit
/// at the dispatch boundary; `Parse` signals an internal inconsistency
/// between the CLI schema and the dispatcher.
#[derive(Debug, Error)]
pub enum GhclassError {
    #[error("{0}. This is a bug, please open an issue.")]
    Parse(String),

    #[error("{0}")]
    File(String),

    #[error("{0}")]
    NotFound(String),

    #[error("failed to push to {url}")]
    PushFailed { url: String },

    #[error("failed to clone from {url}")]
    CloneFailed { url: String },

    #[error("git error: {0}")]
    Git(String),

    #[error("{0}")]
    Api(String),
}

impl GhclassError {
    /// Whether this failure belongs to the recognized classes that are
    /// logged and converted to exit status 1.
    pub fn is_expected(&self) -> bool {
        !matches!(self, GhclassError::Parse(_))
    }
}

impl From<octocrab::Error> for GhclassError {
    fn from(err: octocrab::Error) -> Self {
        GhclassError::Api(format_octocrab_error(&err))
    }
}

/// Extract the HTTP status of an API error, if the failure actually came
/// from GitHub rather than from transport or deserialization.
pub fn api_status(err: &octocrab::Error) -> Option<StatusCode> {
    match err {
        octocrab::Error::GitHub { source, .. } => Some(source.status_code),
        _ => None,
    }
}

/// Format octocrab::Error to extract detailed error information from GitHub
/// API responses.
fn format_octocrab_error(err: &octocrab::Error) -> String {
    match err {
        octocrab::Error::GitHub { source, .. } => {
            let mut msg = format!("GitHub API error: {}", source.message);

            let _ = write!(&mut msg, " (HTTP {})", source.status_code.as_u16());

            if let Some(errors) = &source.errors {
                let error_details: Vec<String> = errors
                    .iter()
                    .filter_map(|e| {
                        let field = e.get("field").and_then(|v| v.as_str());
                        let code = e.get("code").and_then(|v| v.as_str());
                        match (field, code) {
                            (Some(f), Some(c)) => Some(format!("{f} is {c}")),
                            (Some(f), None) => Some(f.to_string()),
                            (None, Some(c)) => Some(c.to_string()),
                            (None, None) => None,
                        }
                    })
                    .collect();

                if !error_details.is_empty() {
                    let _ = write!(&mut msg, " [{}]", error_details.join(", "));
                }
            }

            msg
        }
        _ => format!("GitHub API error: {err}"),
    }
}
