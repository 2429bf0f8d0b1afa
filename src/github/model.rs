//! GitHub REST resources and webhook payloads.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct User {
    pub login: String,
    pub id: u64,
    pub node_id: String,
    pub avatar_url: String,
    pub url: String,
    pub html_url: String,
    #[serde(rename = "type")]
    pub user_type: String,
    pub site_admin: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Label {
    pub id: u64,
    pub node_id: String,
    pub url: String,
    pub name: String,
    pub description: Option<String>,
    pub color: String,
    pub default: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Milestone {
    pub id: u64,
    pub url: String,
    pub html_url: String,
    pub labels_url: String,
    pub node_id: String,
    pub number: u64,
    pub state: String,
    pub title: String,
    pub description: Option<String>,
    pub creator: Option<User>,
    pub open_issues: u64,
    pub closed_issues: u64,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub closed_at: Option<String>,
    pub due_on: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PullRequestLinks {
    pub url: String,
    pub html_url: String,
    pub diff_url: String,
    pub patch_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Issue {
    pub id: u64,
    pub node_id: String,
    pub url: String,
    pub repository_url: String,
    pub labels_url: String,
    pub comments_url: String,
    pub events_url: String,
    pub html_url: String,
    pub number: u64,
    pub state: String,
    pub title: String,
    pub body: Option<String>,
    pub user: Option<User>,
    pub labels: Vec<Label>,
    pub assignee: Option<User>,
    pub assignees: Vec<User>,
    pub milestone: Option<Milestone>,
    pub locked: bool,
    pub active_lock_reason: Option<String>,
    pub comments: u64,
    pub pull_request: Option<PullRequestLinks>,
    pub closed_at: Option<String>,
    pub updated_at: Option<String>,
    pub closed_by: Option<User>,
}

impl Issue {
    pub fn body_text(&self) -> &str {
        self.body.as_deref().unwrap_or("")
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l.name.eq_ignore_ascii_case(label))
    }

    pub fn is_assignee(&self, user: &str) -> bool {
        let user = user.strip_prefix('@').unwrap_or(user);
        self.assignees
            .iter()
            .any(|a| a.login.eq_ignore_ascii_case(user))
    }

    pub fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Comment {
    pub url: String,
    pub html_url: String,
    pub issue_url: String,
    pub id: u64,
    pub node_id: String,
    pub user: Option<User>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub author_association: String,
    pub body: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct License {
    pub key: String,
    pub name: String,
    pub spdx_id: Option<String>,
    pub url: Option<String>,
    pub node_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Repository {
    pub id: u64,
    pub node_id: String,
    pub name: String,
    pub full_name: String,
    pub private: bool,
    pub owner: Option<User>,
    pub html_url: String,
    pub description: Option<String>,
    pub fork: bool,
    pub url: String,
    pub issues_url: String,
    pub pulls_url: String,
    pub milestones_url: String,
    pub labels_url: String,
    pub teams_url: String,
    pub contents_url: String,
    /// Timestamp string in REST payloads, unix seconds in push webhooks.
    pub created_at: serde_json::Value,
    pub updated_at: Option<String>,
    pub pushed_at: serde_json::Value,
    pub git_url: String,
    pub ssh_url: String,
    pub clone_url: String,
    pub homepage: Option<String>,
    pub size: u64,
    pub stargazers_count: u64,
    pub watchers_count: u64,
    pub language: Option<String>,
    pub has_issues: bool,
    pub has_projects: bool,
    pub has_wiki: bool,
    pub forks_count: u64,
    pub archived: bool,
    pub disabled: bool,
    pub open_issues_count: u64,
    pub license: Option<License>,
    pub default_branch: String,
}

impl Repository {
    pub fn owner_login(&self) -> &str {
        self.owner.as_ref().map(|o| o.login.as_str()).unwrap_or("")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Organization {
    pub id: u64,
    pub login: String,
    pub node_id: String,
    pub url: String,
    pub repos_url: String,
    pub events_url: String,
    pub hooks_url: String,
    pub issues_url: String,
    pub members_url: String,
    pub public_members_url: String,
    pub avatar_url: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Enterprise {
    pub id: u64,
    pub slug: String,
    pub name: String,
    pub node_id: String,
    pub avatar_url: String,
    pub description: Option<String>,
    pub website_url: Option<String>,
    pub html_url: String,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Team {
    pub id: u64,
    pub node_id: String,
    pub url: String,
    pub html_url: String,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub privacy: String,
    pub permission: String,
    pub members_url: String,
    pub repositories_url: String,
}

/// Classic (REST) project board.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Project {
    pub id: u64,
    pub node_id: String,
    pub url: String,
    pub html_url: String,
    pub columns_url: String,
    pub owner_url: String,
    pub name: String,
    pub body: Option<String>,
    pub number: u64,
    pub state: String,
    pub creator: Option<User>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Column {
    pub id: u64,
    pub node_id: String,
    pub url: String,
    pub project_url: String,
    pub cards_url: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Card {
    pub id: u64,
    pub node_id: String,
    pub url: String,
    pub column_url: String,
    /// Issue or pull request URL; empty for note cards.
    pub content_url: String,
    pub note: Option<String>,
    pub archived: bool,
    pub creator: Option<User>,
}

/// Validation failure body, e.g. on a 422.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ErrorBody {
    pub message: String,
    pub errors: Vec<ErrorDetail>,
    pub documentation_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ErrorDetail {
    pub resource: String,
    pub code: String,
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangedFrom {
    pub from: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommentChanges {
    pub body: Option<ChangedFrom>,
}

/// `issue_comment` webhook.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IssueCommentEvent {
    pub action: String,
    pub sender: Option<User>,
    pub repository: Option<Repository>,
    pub organization: Option<Organization>,
    /// Only present for `edited`.
    pub changes: Option<CommentChanges>,
    pub issue: Option<Issue>,
    pub comment: Option<Comment>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IssueChanges {
    pub title: Option<ChangedFrom>,
    pub body: Option<ChangedFrom>,
}

/// `issues` webhook.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IssuesEvent {
    pub action: String,
    pub issue: Option<Issue>,
    pub changes: Option<IssueChanges>,
    pub assignee: Option<User>,
    pub label: Option<Label>,
    pub repository: Option<Repository>,
    pub organization: Option<Organization>,
    pub sender: Option<User>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MilestoneChanges {
    pub description: Option<ChangedFrom>,
    pub due_on: Option<ChangedFrom>,
    pub title: Option<ChangedFrom>,
}

/// `milestone` webhook.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MilestoneEvent {
    pub action: String,
    pub milestone: Option<Milestone>,
    pub changes: Option<MilestoneChanges>,
    pub repository: Option<Repository>,
    pub organization: Option<Organization>,
    pub sender: Option<User>,
}

/// Git identity as it appears in push payloads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommitUser {
    pub name: String,
    pub email: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Commit {
    /// Commit SHA.
    pub id: String,
    pub tree_id: String,
    pub distinct: bool,
    pub message: String,
    pub timestamp: String,
    pub url: String,
    pub author: Option<CommitUser>,
    pub committer: Option<CommitUser>,
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub modified: Vec<String>,
}

/// `push` webhook.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PushEvent {
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub before: String,
    pub after: String,
    pub commits: Vec<Commit>,
    pub pusher: Option<CommitUser>,
    pub repository: Option<Repository>,
    pub organization: Option<Organization>,
    pub enterprise: Option<Enterprise>,
    pub sender: Option<User>,
    pub created: bool,
    pub deleted: bool,
    pub forced: bool,
    pub compare: String,
    pub head_commit: Option<Commit>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_issue_label_and_assignee_checks_ignore_case() {
        let issue: Issue = serde_json::from_value(json!({
            "number": 12,
            "body": null,
            "labels": [{"name": "Bug"}],
            "assignees": [{"login": "OctoCat"}]
        }))
        .unwrap();

        assert_eq!(issue.body_text(), "");
        assert!(issue.has_label("bug"));
        assert!(!issue.has_label("feature"));
        assert!(issue.is_assignee("octocat"));
        assert!(issue.is_assignee("@octocat"));
        assert!(!issue.is_pull_request());
    }

    #[test]
    fn test_push_event_decodes() {
        let event: PushEvent = serde_json::from_value(json!({
            "ref": "refs/heads/main",
            "before": "a",
            "after": "b",
            "commits": [{"id": "b", "message": "fix", "author": {"name": "Dev", "email": "dev@example.com"}}],
            "pusher": {"name": "dev"},
            "repository": {"name": "repo", "created_at": 1700000000, "owner": {"login": "org"}},
            "head_commit": {"id": "b"}
        }))
        .unwrap();

        assert_eq!(event.git_ref, "refs/heads/main");
        assert_eq!(event.commits.len(), 1);
        assert_eq!(event.repository.as_ref().unwrap().owner_login(), "org");
        assert_eq!(event.head_commit.unwrap().id, "b");
    }

    #[test]
    fn test_issues_event_with_edit_changes() {
        let event: IssuesEvent = serde_json::from_value(json!({
            "action": "edited",
            "issue": {"number": 3, "title": "new"},
            "changes": {"title": {"from": "old"}}
        }))
        .unwrap();

        let changes = event.changes.unwrap();
        assert_eq!(changes.title.unwrap().from, "old");
        assert!(changes.body.is_none());
    }
}
