use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Estimate {
    pub value: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlusOne {
    pub created_at: String,
}

/// Pipeline placement of an issue within one workspace.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IssuePipeline {
    pub name: String,
    pub pipeline_id: String,
    pub workspace_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Issue {
    pub estimate: Option<Estimate>,
    pub plus_ones: Vec<PlusOne>,
    pub pipelines: Vec<IssuePipeline>,
    pub is_epic: bool,
}

impl Issue {
    pub fn pipeline_in(&self, workspace_id: &str) -> Option<&IssuePipeline> {
        self.pipelines.iter().find(|p| p.workspace_id == workspace_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Workspace {
    pub name: String,
    pub description: Option<String>,
    pub id: String,
    pub repositories: Vec<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineIssue {
    pub issue_number: u64,
    pub estimate: Option<Estimate>,
    pub position: i64,
    pub is_epic: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pipeline {
    pub id: String,
    pub name: String,
    pub issues: Vec<PipelineIssue>,
}

/// A workspace board for one repository. `workspace` and `repo_id` are
/// filled in by the client, the API only returns the pipelines.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Board {
    #[serde(skip)]
    pub workspace: Option<Workspace>,
    #[serde(skip)]
    pub repo_id: u64,
    pub pipelines: Vec<Pipeline>,
}

impl Board {
    pub fn pipeline(&self, name: &str) -> Option<&Pipeline> {
        self.pipelines.iter().find(|p| p.name == name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EpicIssue {
    pub issue_number: u64,
    pub repo_id: u64,
    pub issue_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryEpics {
    pub epic_issues: Vec<EpicIssue>,
}
