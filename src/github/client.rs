use crate::core::http::require_token;
use crate::core::{execute, ApiResponse};
use crate::github::git_data::GitData;
use crate::github::model::{
    Card, Column, Comment, ErrorBody, Issue, Label, Milestone, Organization, Project, Repository, Team,
};
use crate::github::webhook;
use crate::utils::error::{HubError, Result};
use reqwest::header::{HeaderMap, ACCEPT, CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use url::Url;

const SERVICE: &str = "GitHub";
const INERTIA_PREVIEW: &str = "application/vnd.github.inertia-preview+json";
const RAW_CONTENT: &str = "application/vnd.github.raw";
const TRIAGE_COLUMN: &str = "Under Review";
const ALREADY_ON_PROJECT: &str = "Project already has the associated issue";

/// Client for the GitHub REST v3 API, GitHub Enterprise by default.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    api_url: String,
    graphql_url: String,
    token: String,
    secret: String,
    client: Client,
}

impl GitHubClient {
    /// Targets `https://<host>/api/v3`.
    pub fn new(host: &str, token: impl Into<String>, secret: impl Into<String>) -> Self {
        Self::with_api_url(
            format!("https://{}/api/v3", host),
            format!("https://api.{}/graphql", host),
            token,
            secret,
        )
    }

    /// github.com
    pub fn public(token: impl Into<String>, secret: impl Into<String>) -> Self {
        Self::with_api_url(
            "https://api.github.com",
            "https://api.github.com/graphql",
            token,
            secret,
        )
    }

    pub fn with_api_url(
        api_url: impl Into<String>,
        graphql_url: impl Into<String>,
        token: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        let api_url: String = api_url.into();
        Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            graphql_url: graphql_url.into(),
            token: token.into(),
            secret: secret.into(),
            client: Client::new(),
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Absolute URLs pass through, anything else is joined onto the API root.
    fn endpoint(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.api_url, path)
        } else {
            format!("{}/{}", self.api_url, path)
        }
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        accept: Option<&str>,
    ) -> Result<ApiResponse> {
        require_token(SERVICE, &self.token)?;

        let mut builder = self
            .client
            .request(method, url)
            .basic_auth("user", Some(&self.token))
            .header(CONTENT_TYPE, "application/json")
            .header(USER_AGENT, concat!("hubsync/", env!("CARGO_PKG_VERSION")));

        let accept = accept.or_else(|| {
            let preview = ["projects", "cards", "columns"]
                .iter()
                .any(|segment| url.contains(segment));
            preview.then_some(INERTIA_PREVIEW)
        });
        if let Some(accept) = accept {
            builder = builder.header(ACCEPT, accept);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        execute(&self.client, SERVICE, builder.build()?).await
    }

    /// Sends one REST request. Non-2xx statuses become errors.
    pub async fn request(&self, method: Method, path: &str, body: Option<&Value>) -> Result<ApiResponse> {
        self.send(method, &self.endpoint(path), body, None).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request(Method::GET, path, None).await?.json()
    }

    /// Fetches a list endpoint, following `Link: rel="next"` until exhausted.
    pub async fn get_all<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut next = Some(self.endpoint(path));

        while let Some(url) = next {
            let response = self.send(Method::GET, &url, None, None).await?;
            let batch: Vec<T> = response.json()?;
            items.extend(batch);
            next = response.next_link().map(str::to_string);
        }

        tracing::debug!("GitHub: {} items from {}", items.len(), path);
        Ok(items)
    }

    /// Runs a GraphQL query. A non-empty `errors` array is an error.
    pub async fn graphql(&self, query: &str) -> Result<Value> {
        let body = json!({ "query": query });
        let response = self
            .send(Method::POST, &self.graphql_url, Some(&body), None)
            .await?;
        let value: Value = response.json()?;

        if let Some(errors) = value.get("errors").and_then(Value::as_array) {
            if !errors.is_empty() {
                return Err(HubError::GraphQlError {
                    message: Value::Array(errors.clone()).to_string(),
                });
            }
        }
        Ok(value)
    }

    /// Checks a webhook delivery against the configured secret.
    pub fn verify_event(&self, headers: &HeaderMap, body: &[u8]) -> bool {
        webhook::verify_headers(&self.secret, headers, body)
    }

    // Issues

    /// `url` is an issue API URL, absolute or relative to the API root.
    pub async fn issue(&self, url: &str) -> Result<Issue> {
        self.get(url).await
    }

    pub async fn issue_by_number(&self, owner: &str, repo: &str, number: u64) -> Result<Issue> {
        self.issue(&format!("/repos/{}/{}/issues/{}", owner, repo, number))
            .await
    }

    pub async fn issues(&self, owner: &str, repo: &str, query: &str) -> Result<Vec<Issue>> {
        self.get_all(&with_query(&format!("/repos/{}/{}/issues", owner, repo), query))
            .await
    }

    pub async fn repository_issues(&self, repo: &Repository, query: &str) -> Result<Vec<Issue>> {
        self.get_all(&with_query(&format!("{}/issues", repo.url), query))
            .await
    }

    pub async fn refresh_issue(&self, issue: &mut Issue) -> Result<()> {
        *issue = self.issue(&issue.url).await?;
        Ok(())
    }

    async fn patch_issue(&self, issue: &mut Issue, body: &Value) -> Result<()> {
        let response = self.request(Method::PATCH, &issue.url, Some(body)).await?;
        *issue = response.json()?;
        Ok(())
    }

    pub async fn set_issue_body(&self, issue: &mut Issue, body: &str) -> Result<()> {
        self.patch_issue(issue, &json!({ "body": body })).await
    }

    pub async fn close_issue(&self, issue: &mut Issue) -> Result<()> {
        self.patch_issue(issue, &json!({"state": "closed"})).await
    }

    pub async fn reopen_issue(&self, issue: &mut Issue) -> Result<()> {
        self.patch_issue(issue, &json!({"state": "open"})).await
    }

    pub async fn add_label(&self, issue: &Issue, label: &str) -> Result<()> {
        self.request(
            Method::POST,
            &format!("{}/labels", issue.url),
            Some(&json!({ "labels": [label] })),
        )
        .await?;
        Ok(())
    }

    pub async fn remove_label(&self, issue: &Issue, label: &str) -> Result<()> {
        let mut url = Url::parse(&self.endpoint(&format!("{}/labels", issue.url)))?;
        url.path_segments_mut()
            .map_err(|_| HubError::UnexpectedValue {
                field: "issue.url".to_string(),
                message: format!("{} can't take a path", issue.url),
            })?
            .push(label);

        self.send(Method::DELETE, url.as_str(), None, None).await?;
        Ok(())
    }

    pub async fn add_comment(&self, issue: &Issue, body: &str) -> Result<Comment> {
        self.request(
            Method::POST,
            &format!("{}/comments", issue.url),
            Some(&json!({ "body": body })),
        )
        .await?
        .json()
    }

    pub async fn add_assignee(&self, issue: &Issue, user: &str) -> Result<()> {
        let user = user.strip_prefix('@').unwrap_or(user);
        self.request(
            Method::POST,
            &format!("{}/assignees", issue.url),
            Some(&json!({ "assignees": [user] })),
        )
        .await?;
        Ok(())
    }

    pub async fn remove_assignee(&self, issue: &Issue, user: &str) -> Result<()> {
        let user = user.strip_prefix('@').unwrap_or(user);
        self.request(
            Method::DELETE,
            &format!("{}/assignees", issue.url),
            Some(&json!({ "assignees": [user] })),
        )
        .await?;
        Ok(())
    }

    /// Moves the issue to the milestone titled `title`; `""` clears it.
    pub async fn set_issue_milestone(&self, issue: &mut Issue, title: &str) -> Result<()> {
        if title.is_empty() {
            return self.patch_issue(issue, &json!({ "milestone": null })).await;
        }

        let milestones: Vec<Milestone> = self
            .get_all(&format!("{}/milestones", issue.repository_url))
            .await?;
        let number = find_milestone(&milestones, title)?;
        self.patch_issue(issue, &json!({ "milestone": number })).await
    }

    pub async fn set_issue_milestone_by_number(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        title: &str,
    ) -> Result<Issue> {
        let milestones = self.milestones(owner, repo, "").await?;
        let milestone = find_milestone(&milestones, title)?;

        self.request(
            Method::PATCH,
            &format!("/repos/{}/{}/issues/{}", owner, repo, number),
            Some(&json!({ "milestone": milestone })),
        )
        .await?
        .json()
    }

    pub async fn issue_repository(&self, issue: &Issue) -> Result<Repository> {
        self.get(&issue.repository_url).await
    }

    /// Transfers the issue to another repository of the same owner.
    pub async fn move_issue_to_repository(&self, issue: &Issue, repo_name: &str) -> Result<()> {
        let current = self.issue_repository(issue).await?;
        let target = self.repository(current.owner_login(), repo_name).await?;

        let query = format!(
            "mutation {{ transferIssue(input: {{ issueId: \"{}\", repositoryId: \"{}\" }}) {{ issue {{ number }} }} }}",
            issue.node_id, target.node_id
        );
        self.graphql(&query).await?;
        tracing::info!("Moved issue #{} to {}", issue.number, target.full_name);
        Ok(())
    }

    // Issue body data

    pub fn issue_data(&self, issue: &Issue) -> GitData {
        GitData::parse(issue.body_text())
    }

    /// Rewrites the issue body from `data`.
    pub async fn save_issue_data(&self, issue: &mut Issue, data: &mut GitData) -> Result<()> {
        let body = data.render();
        self.set_issue_body(issue, &body).await
    }

    pub async fn add_issue_data(&self, issue: &mut Issue, label: &str, value: &str) -> Result<()> {
        let mut data = self.issue_data(issue);
        if data.has(label, value) {
            return Ok(());
        }
        data.add(label, value);
        self.save_issue_data(issue, &mut data).await
    }

    pub async fn delete_issue_data(&self, issue: &mut Issue, label: &str, value: &str) -> Result<()> {
        let mut data = self.issue_data(issue);
        if data.delete(label, value) {
            return self.save_issue_data(issue, &mut data).await;
        }
        Ok(())
    }

    pub async fn set_issue_data(&self, issue: &mut Issue, label: &str, value: &str) -> Result<()> {
        let mut data = self.issue_data(issue);
        if data.values(label) == [value] {
            return Ok(());
        }
        data.set(label, value);
        self.save_issue_data(issue, &mut data).await
    }

    // Repositories

    pub async fn repository(&self, owner: &str, name: &str) -> Result<Repository> {
        self.get(&format!("/repos/{}/{}", owner, name)).await
    }

    pub async fn labels(&self, repo: &Repository) -> Result<Vec<Label>> {
        self.get_all(&format!("{}/labels", repo.url)).await
    }

    pub async fn milestones(&self, owner: &str, repo: &str, query: &str) -> Result<Vec<Milestone>> {
        self.get_all(&with_query(&format!("/repos/{}/{}/milestones", owner, repo), query))
            .await
    }

    pub async fn repository_milestones(&self, repo: &Repository, query: &str) -> Result<Vec<Milestone>> {
        self.get_all(&with_query(&format!("{}/milestones", repo.url), query))
            .await
    }

    pub async fn milestone(&self, url: &str) -> Result<Milestone> {
        self.get(url).await
    }

    pub async fn refresh_milestone(&self, milestone: &mut Milestone) -> Result<()> {
        *milestone = self.milestone(&milestone.url).await?;
        Ok(())
    }

    pub async fn repository_teams(&self, owner: &str, repo: &str) -> Result<Vec<Team>> {
        self.get_all(&format!("/repos/{}/{}/teams", owner, repo))
            .await
    }

    /// Raw file contents from the default branch.
    pub async fn file(&self, repo: &Repository, path: &str) -> Result<Vec<u8>> {
        let url = self.endpoint(&format!("{}/contents/{}", repo.url, path.trim_start_matches('/')));
        match self.send(Method::GET, &url, None, Some(RAW_CONTENT)).await {
            Ok(response) => Ok(response.body),
            Err(e) if e.status() == Some(404) => Err(HubError::NotFound {
                what: "file",
                name: path.to_string(),
            }),
            Err(e) => Err(e),
        }
    }

    // Organizations

    pub async fn is_member(&self, org: &Organization, user: &str) -> Result<bool> {
        let user = user.strip_prefix('@').unwrap_or(user);
        self.exists(&format!("{}/public_members/{}", org.url, user))
            .await
    }

    pub async fn is_user_in_organization(&self, org: &str, user: &str) -> Result<bool> {
        let user = user.strip_prefix('@').unwrap_or(user);
        self.exists(&format!("/orgs/{}/public_members/{}", org, user))
            .await
    }

    /// `team` is the team slug.
    pub async fn is_team_member(&self, org: &Organization, user: &str, team: &str) -> Result<bool> {
        let user = user.strip_prefix('@').unwrap_or(user);

        let team: Team = match self.get(&format!("{}/teams/{}", org.url, team)).await {
            Ok(team) => team,
            Err(e) if e.status() == Some(404) => {
                return Err(HubError::NotFound {
                    what: "team",
                    name: team.to_string(),
                })
            }
            Err(e) => return Err(e),
        };

        self.exists(&format!(
            "/organizations/{}/team/{}/memberships/{}",
            org.id, team.id, user
        ))
        .await
    }

    /// `true` on 2xx, `false` on 404.
    async fn exists(&self, path: &str) -> Result<bool> {
        match self.request(Method::GET, path, None).await {
            Ok(_) => Ok(true),
            Err(e) if e.status() == Some(404) => Ok(false),
            Err(e) => Err(e),
        }
    }

    // Classic projects

    pub async fn projects(&self, repo: &Repository) -> Result<Vec<Project>> {
        self.get_all(&format!("{}/projects", repo.url)).await
    }

    pub async fn project(&self, repo: &Repository, name: &str) -> Result<Option<Project>> {
        let projects = self.projects(repo).await?;
        Ok(projects.into_iter().find(|p| p.name == name))
    }

    pub async fn columns(&self, project: &Project) -> Result<Vec<Column>> {
        self.get_all(&project.columns_url).await
    }

    pub async fn column(&self, project: &Project, name: &str) -> Result<Option<Column>> {
        let columns = self.columns(project).await?;
        Ok(columns.into_iter().find(|c| c.name == name))
    }

    pub async fn column_cards(&self, column: &Column) -> Result<Vec<Card>> {
        self.get_all(&column.cards_url).await
    }

    pub async fn project_cards(&self, project: &Project) -> Result<Vec<Card>> {
        let mut cards = Vec::new();
        for column in self.columns(project).await? {
            cards.extend(self.column_cards(&column).await?);
        }
        Ok(cards)
    }

    async fn require_project(&self, issue: &Issue, name: &str) -> Result<(Repository, Project)> {
        let repo = self.issue_repository(issue).await?;
        let project = self
            .project(&repo, name)
            .await?
            .ok_or_else(|| HubError::NotFound {
                what: "project",
                name: name.to_string(),
            })?;
        Ok((repo, project))
    }

    /// Cards for `issue` on the repository project called `name`.
    pub async fn issue_project_cards(&self, issue: &Issue, name: &str) -> Result<Vec<Card>> {
        let (_, project) = self.require_project(issue, name).await?;
        let cards = self.project_cards(&project).await?;
        Ok(cards
            .into_iter()
            .filter(|card| card.content_url == issue.url)
            .collect())
    }

    /// Adds the issue to the triage column of the project called `name`.
    /// An issue already on the board counts as added.
    pub async fn add_issue_to_project(&self, issue: &Issue, name: &str) -> Result<()> {
        let (_, project) = self.require_project(issue, name).await?;
        let column = self
            .column(&project, TRIAGE_COLUMN)
            .await?
            .ok_or_else(|| HubError::NotFound {
                what: "project column",
                name: TRIAGE_COLUMN.to_string(),
            })?;

        let body = json!({"note": null, "content_id": issue.id, "content_type": "Issue"});
        match self.request(Method::POST, &column.cards_url, Some(&body)).await {
            Ok(_) => Ok(()),
            Err(HubError::ApiError { body, .. }) if already_on_project(&body) => {
                tracing::debug!("Issue #{} already on project {:?}", issue.number, name);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    pub async fn remove_issue_from_project(&self, issue: &Issue, name: &str) -> Result<()> {
        for card in self.issue_project_cards(issue, name).await? {
            self.delete_card(&card).await?;
        }
        Ok(())
    }

    pub async fn delete_card(&self, card: &Card) -> Result<()> {
        self.request(Method::DELETE, &card.url, None).await?;
        Ok(())
    }
}

fn with_query(path: &str, query: &str) -> String {
    if query.is_empty() {
        path.to_string()
    } else {
        format!("{}?{}", path, query)
    }
}

fn find_milestone(milestones: &[Milestone], title: &str) -> Result<u64> {
    milestones
        .iter()
        .find(|m| m.title == title)
        .map(|m| m.number)
        .ok_or_else(|| HubError::NotFound {
            what: "milestone",
            name: title.to_string(),
        })
}

fn already_on_project(body: &str) -> bool {
    serde_json::from_str::<ErrorBody>(body)
        .map(|err| err.errors.iter().any(|e| e.message == ALREADY_ON_PROJECT))
        .unwrap_or(false)
}
