use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, PartialEq)]
pub struct CLIConfig {
    pub server: String,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub reasoning: bool,
    pub vision: bool,
    pub steps: u32,
    pub key: Option<String>,
    pub task_file: Option<String>,
    pub app: Option<String>,
    pub deeplink: Option<String>,
    pub clear: bool,
    pub quiet: bool,
    pub server_key: Option<String>,
    pub version: bool,
    pub goal: Option<String>,
}

/// Body of `POST /run`. The credential never goes here; it travels in the
/// `X-API-Key` header.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunRequest {
    pub goal: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deeplink: Option<String>,
    pub provider: String,
    pub model: String,
    pub reasoning: bool,
    pub vision: bool,
    pub max_steps: u32,
}

#[derive(Debug, Deserialize)]
pub struct SubmitResponse {
    pub task_id: String,
    pub status: String,
    pub position: i64,
}

#[derive(Debug, Deserialize)]
pub struct TaskInfo {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub logs: Option<String>,
    #[serde(default)]
    pub steps: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct TaskFile {
    #[serde(default)]
    pub task: TaskSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TaskSection {
    pub name: String,
    pub description: String,
    pub goal: GoalSection,
    pub model: ModelSection,
    pub options: OptionsSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GoalSection {
    pub prompt: String,
    pub app: String,
    pub deeplink: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ModelSection {
    pub provider: String,
    pub model: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct OptionsSection {
    pub reasoning: bool,
    pub vision: bool,
    pub max_steps: u32,
}
