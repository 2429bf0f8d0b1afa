use crate::core::http::require_token;
use crate::core::{execute, ApiResponse};
use crate::utils::error::{HubError, Result};
use crate::zenhub::model::{Board, Issue, Pipeline, RepositoryEpics, Workspace};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

const SERVICE: &str = "ZenHub";
const TOKEN_HEADER: &str = "X-Authentication-Token";

/// Client for the ZenHub REST API (`/p1` and `/p2` endpoints).
#[derive(Debug, Clone)]
pub struct ZenHubClient {
    url: String,
    token: String,
    client: Client,
}

impl ZenHubClient {
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        let url: String = url.into();
        Self {
            url: url.trim_end_matches('/').to_string(),
            token: token.into(),
            client: Client::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn request(&self, method: Method, path: &str, body: Option<&Value>) -> Result<ApiResponse> {
        require_token(SERVICE, &self.token)?;

        let mut builder = self
            .client
            .request(method, format!("{}{}", self.url, path))
            .header(TOKEN_HEADER, &self.token)
            .header(CONTENT_TYPE, "application/json");
        if let Some(body) = body {
            builder = builder.json(body);
        }

        execute(&self.client, SERVICE, builder.build()?).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request(Method::GET, path, None).await?.json()
    }

    pub async fn issue(&self, repo_id: u64, number: u64) -> Result<Issue> {
        self.get(&format!("/p1/repositories/{}/issues/{}", repo_id, number))
            .await
    }

    pub async fn make_epic(&self, repo_id: u64, number: u64) -> Result<()> {
        self.request(
            Method::POST,
            &format!("/p1/repositories/{}/issues/{}/convert_to_epic", repo_id, number),
            Some(&json!([])),
        )
        .await?;
        Ok(())
    }

    pub async fn epics(&self, repo_id: u64) -> Result<RepositoryEpics> {
        self.get(&format!("/p1/repositories/{}/epics", repo_id)).await
    }

    /// Adds `task_repo_id#task_number` to the epic `epic_repo_id#epic_number`.
    pub async fn add_task(
        &self,
        epic_repo_id: u64,
        epic_number: u64,
        task_repo_id: u64,
        task_number: u64,
    ) -> Result<()> {
        let body = json!({
            "add_issues": [{"repo_id": task_repo_id, "issue_number": task_number}]
        });
        self.request(
            Method::POST,
            &format!("/p1/repositories/{}/epics/{}/update_issues", epic_repo_id, epic_number),
            Some(&body),
        )
        .await?;
        Ok(())
    }

    pub async fn workspaces(&self, repo_id: u64) -> Result<Vec<Workspace>> {
        self.get(&format!("/p2/repositories/{}/workspaces", repo_id))
            .await
    }

    pub async fn workspace(&self, repo_id: u64, name: &str) -> Result<Option<Workspace>> {
        let workspaces = self.workspaces(repo_id).await?;
        Ok(workspaces.into_iter().find(|w| w.name == name))
    }

    pub async fn workspace_board(&self, workspace: &Workspace, repo_id: u64) -> Result<Board> {
        let mut board: Board = self
            .get(&format!(
                "/p2/workspaces/{}/repositories/{}/board",
                workspace.id, repo_id
            ))
            .await?;
        board.workspace = Some(workspace.clone());
        board.repo_id = repo_id;
        Ok(board)
    }

    pub async fn board(&self, repo_id: u64, workspace: &str) -> Result<Board> {
        let found = self
            .workspace(repo_id, workspace)
            .await?
            .ok_or_else(|| HubError::NotFound {
                what: "workspace",
                name: workspace.to_string(),
            })?;
        self.workspace_board(&found, repo_id).await
    }

    pub async fn pipeline(&self, repo_id: u64, workspace: &str, pipeline: &str) -> Result<Option<Pipeline>> {
        let board = self.board(repo_id, workspace).await?;
        Ok(board.pipelines.into_iter().find(|p| p.name == pipeline))
    }

    /// Moves the issue to the top of `pipeline_id`.
    pub async fn set_issue_pipeline(
        &self,
        workspace_id: &str,
        repo_id: u64,
        number: u64,
        pipeline_id: &str,
    ) -> Result<()> {
        let body = json!({"pipeline_id": pipeline_id, "position": "top"});
        self.request(
            Method::POST,
            &format!(
                "/p2/workspaces/{}/repositories/{}/issues/{}/moves",
                workspace_id, repo_id, number
            ),
            Some(&body),
        )
        .await?;
        Ok(())
    }

    /// Name-based variant of [`set_issue_pipeline`](Self::set_issue_pipeline).
    pub async fn move_issue(&self, repo_id: u64, workspace: &str, number: u64, pipeline: &str) -> Result<()> {
        let board = self.board(repo_id, workspace).await?;
        let target = board.pipeline(pipeline).ok_or_else(|| HubError::NotFound {
            what: "pipeline",
            name: pipeline.to_string(),
        })?;
        let workspace_id = board.workspace.as_ref().map(|w| w.id.as_str()).unwrap_or_default();

        tracing::info!("Moving issue {} to {:?} in {:?}", number, pipeline, workspace);
        self.set_issue_pipeline(workspace_id, repo_id, number, &target.id)
            .await
    }
}
