use std::sync::OnceLock;

use regex::Regex;

use crate::error::QueueError;

use super::types::{Credential, TaskRequest, TaskSpec};

pub const DEFAULT_PROVIDER: &str = "Google";
/// Runs on the device host and needs no credential.
pub const LOCAL_PROVIDER: &str = "Ollama";
pub const DEFAULT_MAX_STEPS: u32 = 30;
pub const MAX_STEPS_LIMIT: u32 = 100;

/// Supported providers and the model used when the caller names none.
const PROVIDERS: &[(&str, &str)] = &[
    ("Google", "gemini-2.0-flash"),
    ("GoogleGenAI", "gemini-2.0-flash"),
    ("Anthropic", "claude-sonnet-4-20250514"),
    ("OpenAI", "gpt-4o"),
    ("DeepSeek", "deepseek-chat"),
    ("Ollama", "llama3.2"),
];

pub fn default_model(provider: &str) -> Option<&'static str> {
    PROVIDERS
        .iter()
        .find(|(name, _)| *name == provider)
        .map(|(_, model)| *model)
}

pub fn requires_credential(provider: &str) -> bool {
    provider != LOCAL_PROVIDER
}

pub fn clamp_steps(requested: Option<i64>) -> u32 {
    match requested {
        Some(steps) if steps > i64::from(MAX_STEPS_LIMIT) => MAX_STEPS_LIMIT,
        Some(steps) if steps > 0 => steps as u32,
        _ => DEFAULT_MAX_STEPS,
    }
}

fn package_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-zA-Z][a-zA-Z0-9_]*(\.[a-zA-Z][a-zA-Z0-9_]*)+$")
            .expect("package name pattern")
    })
}

pub fn is_package_name(app: &str) -> bool {
    package_pattern().is_match(app)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
}

/// Validates a raw request and fills in defaults.
pub fn normalize(request: TaskRequest, credential: &Credential) -> Result<TaskSpec, QueueError> {
    let goal = request.goal.trim().to_string();
    if goal.is_empty() {
        return Err(QueueError::validation("goal is required"));
    }

    let provider = non_empty(request.provider).unwrap_or_else(|| DEFAULT_PROVIDER.to_string());
    let fallback_model = default_model(&provider).ok_or_else(|| {
        let names: Vec<&str> = PROVIDERS.iter().map(|(name, _)| *name).collect();
        QueueError::validation(format!(
            "invalid provider: {} (valid: {})",
            provider,
            names.join(", ")
        ))
    })?;
    let model = non_empty(request.model).unwrap_or_else(|| fallback_model.to_string());
    let max_steps = clamp_steps(request.max_steps);

    if credential.is_empty() && requires_credential(&provider) {
        return Err(QueueError::validation(
            "API key required (use X-API-Key header)",
        ));
    }

    let app = non_empty(request.app);
    if let Some(app) = &app {
        if !is_package_name(app) {
            return Err(QueueError::validation(format!(
                "invalid app package name: {}",
                app
            )));
        }
    }

    Ok(TaskSpec {
        goal,
        app,
        deeplink: non_empty(request.deeplink),
        provider,
        model,
        reasoning: request.reasoning,
        vision: request.vision,
        max_steps,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(goal: &str) -> TaskRequest {
        TaskRequest {
            goal: goal.to_string(),
            ..TaskRequest::default()
        }
    }

    fn key() -> Credential {
        Credential::new("test-key")
    }

    #[test]
    fn fills_provider_model_and_steps_defaults() {
        let spec = normalize(request("  open settings  "), &key()).unwrap();
        assert_eq!(spec.goal, "open settings");
        assert_eq!(spec.provider, "Google");
        assert_eq!(spec.model, "gemini-2.0-flash");
        assert_eq!(spec.max_steps, DEFAULT_MAX_STEPS);
    }

    #[test]
    fn model_default_follows_provider() {
        let cases = [
            ("Google", "gemini-2.0-flash"),
            ("GoogleGenAI", "gemini-2.0-flash"),
            ("Anthropic", "claude-sonnet-4-20250514"),
            ("OpenAI", "gpt-4o"),
            ("DeepSeek", "deepseek-chat"),
            ("Ollama", "llama3.2"),
        ];
        for (provider, model) in cases {
            let mut req = request("test");
            req.provider = Some(provider.to_string());
            let spec = normalize(req, &key()).unwrap();
            assert_eq!(spec.model, model, "provider {provider}");
        }
    }

    #[test]
    fn explicit_model_is_kept() {
        let mut req = request("test");
        req.provider = Some("Anthropic".to_string());
        req.model = Some("claude-3".to_string());
        assert_eq!(normalize(req, &key()).unwrap().model, "claude-3");
    }

    #[test]
    fn step_budget_is_clamped() {
        assert_eq!(clamp_steps(None), 30);
        assert_eq!(clamp_steps(Some(0)), 30);
        assert_eq!(clamp_steps(Some(-5)), 30);
        assert_eq!(clamp_steps(Some(1)), 1);
        assert_eq!(clamp_steps(Some(50)), 50);
        assert_eq!(clamp_steps(Some(100)), 100);
        assert_eq!(clamp_steps(Some(500)), 100);
    }

    #[test]
    fn rejects_blank_goal() {
        let err = normalize(request("   "), &key()).unwrap_err();
        assert_eq!(err, QueueError::validation("goal is required"));
    }

    #[test]
    fn rejects_unknown_provider() {
        let mut req = request("test");
        req.provider = Some("Acme".to_string());
        let err = normalize(req, &key()).unwrap_err();
        assert!(err.to_string().starts_with("invalid provider: Acme"));
    }

    #[test]
    fn local_provider_needs_no_credential() {
        let mut req = request("test");
        req.provider = Some("Ollama".to_string());
        assert!(normalize(req, &Credential::default()).is_ok());

        let mut req = request("test");
        req.provider = Some("Google".to_string());
        let err = normalize(req, &Credential::default()).unwrap_err();
        assert!(err.to_string().contains("API key required"));
    }

    #[test]
    fn app_must_look_like_a_package() {
        for good in ["com.whatsapp", "com.instagram.android", "org.app_1.x"] {
            assert!(is_package_name(good), "{good}");
        }
        for bad in ["whatsapp", "1com.app", "com..app", "com.app.", "com app.x"] {
            assert!(!is_package_name(bad), "{bad}");
        }

        let mut req = request("test");
        req.app = Some("not a package".to_string());
        let err = normalize(req, &key()).unwrap_err();
        assert_eq!(
            err,
            QueueError::validation("invalid app package name: not a package")
        );
    }

    #[test]
    fn blank_optional_fields_become_absent() {
        let mut req = request("test");
        req.app = Some("  ".to_string());
        req.deeplink = Some("".to_string());
        let spec = normalize(req, &key()).unwrap();
        assert!(spec.app.is_none());
        assert!(spec.deeplink.is_none());
    }
}
