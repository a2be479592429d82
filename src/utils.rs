//! Small helpers shared by the command layers.

use std::path::Path;

use crate::errors::{GhclassError, Result};

/// An issue to open in student repositories. Immutable once read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub title: String,
    pub body: String,
}

/// Extract the repository name from a URL or path: the last path segment,
/// minus any `.git` suffix.
pub fn repo_name(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    let last = trimmed.rsplit('/').next().unwrap_or(trimmed);
    last.strip_suffix(".git").unwrap_or(last).to_string()
}

/// The name of a student's copy of a master repository.
pub fn generate_repo_name(student: &str, master_repo_name: &str) -> String {
    format!("{student}-{master_repo_name}")
}

/// All student repo names for the cross product of masters and students.
pub fn generate_repo_names(students: &[String], master_repo_names: &[String]) -> Vec<String> {
    master_repo_names
        .iter()
        .flat_map(|master| {
            students
                .iter()
                .map(move |student| generate_repo_name(student, master))
        })
        .collect()
}

/// Whether `path` is the root of a git repository.
pub fn is_git_repo(path: &Path) -> bool {
    path.is_dir() && path.join(".git").is_dir()
}

/// Read an issue from a file. The first line is the title, the remaining
/// lines are the body.
pub fn read_issue(path: &str) -> Result<Issue> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| GhclassError::File(format!("could not read issue file '{path}': {e}")))?;
    let mut lines = text.lines();
    let title = lines.next().unwrap_or_default().trim().to_string();
    if title.is_empty() {
        return Err(GhclassError::File(format!(
            "issue file '{path}' has no title line"
        )));
    }
    let body = lines.collect::<Vec<_>>().join("\n");
    Ok(Issue { title, body })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_name_strips_git_suffix_and_path() {
        assert_eq!(repo_name("https://github.com/org/task-1.git"), "task-1");
        assert_eq!(repo_name("https://github.com/org/task-1"), "task-1");
        assert_eq!(repo_name("file:///tmp/work/task-1/"), "task-1");
        assert_eq!(repo_name("task-1"), "task-1");
    }

    #[test]
    fn student_repo_names_combine_student_and_master() {
        assert_eq!(generate_repo_name("alice", "task-1"), "alice-task-1");
    }

    #[test]
    fn repo_names_fan_out_per_master_then_per_student() {
        let students = vec!["alice".to_string(), "bob".to_string()];
        let masters = vec!["task-1".to_string(), "task-2".to_string()];
        assert_eq!(
            generate_repo_names(&students, &masters),
            vec![
                "alice-task-1".to_string(),
                "bob-task-1".to_string(),
                "alice-task-2".to_string(),
                "bob-task-2".to_string(),
            ]
        );
    }

    #[test]
    fn is_git_repo_requires_a_dot_git_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!is_git_repo(dir.path()));

        std::fs::create_dir(dir.path().join(".git")).unwrap();
        assert!(is_git_repo(dir.path()));

        assert!(!is_git_repo(&dir.path().join("no-such-dir")));
    }

    #[test]
    fn read_issue_splits_title_and_body() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("issue.md");
        std::fs::write(&path, "Late submission\n\nPlease fix your tests.\n").unwrap();

        let issue = read_issue(path.to_str().unwrap()).unwrap();
        assert_eq!(issue.title, "Late submission");
        assert_eq!(issue.body, "\nPlease fix your tests.");
    }

    #[test]
    fn read_issue_rejects_missing_and_empty_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.md");
        assert!(matches!(
            read_issue(missing.to_str().unwrap()),
            Err(GhclassError::File(_))
        ));

        let empty = dir.path().join("empty.md");
        std::fs::write(&empty, "").unwrap();
        assert!(matches!(
            read_issue(empty.to_str().unwrap()),
            Err(GhclassError::File(_))
        ));
    }
}
