use serde::Serialize;

use crate::task::{Credential, TaskSpec};

/// The single JSON object written to the worker's stdin. Holds the
/// credential in clear and must never be logged.
#[derive(Serialize)]
pub struct JobDescriptor<'a> {
    pub goal: &'a str,
    pub app: &'a str,
    pub deeplink: &'a str,
    pub provider: &'a str,
    pub model: &'a str,
    pub reasoning: bool,
    pub vision: bool,
    pub max_steps: u32,
    pub credential: &'a str,
}

impl<'a> JobDescriptor<'a> {
    pub fn new(spec: &'a TaskSpec, credential: &'a Credential) -> Self {
        Self {
            goal: &spec.goal,
            app: spec.app.as_deref().unwrap_or_default(),
            deeplink: spec.deeplink.as_deref().unwrap_or_default(),
            provider: &spec.provider,
            model: &spec.model,
            reasoning: spec.reasoning,
            vision: spec.vision,
            max_steps: spec.max_steps,
            credential: credential.expose(),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
