use std::env;
use std::fs;

use crate::models::{CLIConfig, RunRequest, TaskFile};

const DEFAULT_URL: &str = "http://localhost:8000";
const DEFAULT_PROVIDER: &str = "Google";
const DEFAULT_MODEL: &str = "gemini-2.0-flash";
const DEFAULT_STEPS: u32 = 30;
const LOCAL_PROVIDER: &str = "Ollama";

pub fn parse_config() -> CLIConfig {
    let args: Vec<String> = env::args().skip(1).collect();
    parse_args(defaults(), &args)
}

fn defaults() -> CLIConfig {
    CLIConfig {
        server: env_or("DROIDRUN_SERVER_URL", DEFAULT_URL.to_string()),
        provider: None,
        model: None,
        reasoning: true,
        vision: false,
        steps: DEFAULT_STEPS,
        key: None,
        task_file: None,
        app: None,
        deeplink: None,
        clear: false,
        quiet: false,
        server_key: env_opt("DROIDRUN_SERVER_KEY"),
        version: false,
        goal: None,
    }
}

pub fn parse_args(mut cfg: CLIConfig, args: &[String]) -> CLIConfig {
    let mut idx = 0;
    while idx < args.len() {
        match args[idx].as_str() {
            "--server" => {
                if let Some(value) = args.get(idx + 1) {
                    cfg.server = value.clone();
                    idx += 1;
                }
            }
            "--provider" => {
                if let Some(value) = args.get(idx + 1) {
                    cfg.provider = Some(value.clone());
                    idx += 1;
                }
            }
            "--model" => {
                if let Some(value) = args.get(idx + 1) {
                    cfg.model = Some(value.clone());
                    idx += 1;
                }
            }
            "--reasoning" => {
                if let Some(value) = args.get(idx + 1) {
                    if value.starts_with('-') {
                        cfg.reasoning = true;
                    } else if let Ok(parsed) = value.parse::<bool>() {
                        cfg.reasoning = parsed;
                        idx += 1;
                    } else {
                        cfg.reasoning = true;
                    }
                } else {
                    cfg.reasoning = true;
                }
            }
            "--vision" => cfg.vision = true,
            "--steps" => {
                if let Some(value) = args.get(idx + 1) {
                    if let Ok(parsed) = value.parse::<u32>() {
                        cfg.steps = parsed;
                    }
                    idx += 1;
                }
            }
            "--key" => {
                if let Some(value) = args.get(idx + 1) {
                    cfg.key = Some(value.clone());
                    idx += 1;
                }
            }
            "--task" => {
                if let Some(value) = args.get(idx + 1) {
                    cfg.task_file = Some(value.clone());
                    idx += 1;
                }
            }
            "--app" => {
                if let Some(value) = args.get(idx + 1) {
                    cfg.app = Some(value.clone());
                    idx += 1;
                }
            }
            "--deeplink" => {
                if let Some(value) = args.get(idx + 1) {
                    cfg.deeplink = Some(value.clone());
                    idx += 1;
                }
            }
            "--server-key" => {
                if let Some(value) = args.get(idx + 1) {
                    cfg.server_key = Some(value.clone());
                    idx += 1;
                }
            }
            "--clear" => cfg.clear = true,
            "--quiet" => cfg.quiet = true,
            "--version" => cfg.version = true,
            other if !other.starts_with("--") && cfg.goal.is_none() => {
                cfg.goal = Some(other.to_string());
            }
            _ => {}
        }
        idx += 1;
    }
    cfg
}

pub fn load_task_file(path: &str) -> Result<TaskFile, String> {
    let raw = fs::read_to_string(path).map_err(|err| format!("{}: {}", path, err))?;
    parse_task_file(&raw)
}

pub fn parse_task_file(raw: &str) -> Result<TaskFile, String> {
    toml::from_str(raw).map_err(|err| err.to_string())
}

/// Environment variable holding the credential for `provider`.
pub fn credential_env(provider: &str) -> Option<&'static str> {
    match provider {
        "Google" | "GoogleGenAI" => Some("GOOGLE_API_KEY"),
        "Anthropic" => Some("ANTHROPIC_API_KEY"),
        "OpenAI" => Some("OPENAI_API_KEY"),
        "DeepSeek" => Some("DEEPSEEK_API_KEY"),
        _ => None,
    }
}

/// Merges the task file (if any) with flags, flags winning, and resolves the
/// credential. Returns the request body and the credential to send as a
/// header.
pub fn build_request<F>(
    cfg: &CLIConfig,
    file: Option<&TaskFile>,
    lookup: F,
) -> Result<(RunRequest, Option<String>), String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut req = match file {
        Some(file) => {
            let task = &file.task;
            RunRequest {
                goal: task.goal.prompt.clone(),
                app: non_empty(&task.goal.app),
                deeplink: non_empty(&task.goal.deeplink),
                provider: non_empty(&task.model.provider)
                    .unwrap_or_else(|| DEFAULT_PROVIDER.to_string()),
                model: task.model.model.trim().to_string(),
                reasoning: task.options.reasoning,
                vision: task.options.vision,
                max_steps: match task.options.max_steps {
                    0 => DEFAULT_STEPS,
                    steps => steps,
                },
            }
        }
        None => RunRequest {
            goal: cfg.goal.clone().ok_or_else(|| "goal is required".to_string())?,
            app: None,
            deeplink: None,
            provider: DEFAULT_PROVIDER.to_string(),
            model: DEFAULT_MODEL.to_string(),
            reasoning: cfg.reasoning,
            vision: cfg.vision,
            max_steps: cfg.steps,
        },
    };

    if let Some(provider) = &cfg.provider {
        req.provider = provider.clone();
    }
    if let Some(model) = &cfg.model {
        req.model = model.clone();
    }
    if let Some(app) = &cfg.app {
        req.app = Some(app.clone());
    }
    if let Some(deeplink) = &cfg.deeplink {
        req.deeplink = Some(deeplink.clone());
    }

    let key = cfg
        .key
        .clone()
        .filter(|key| !key.trim().is_empty())
        .or_else(|| credential_env(&req.provider).and_then(|name| lookup(name)))
        .filter(|key| !key.trim().is_empty());
    if key.is_none() && req.provider != LOCAL_PROVIDER {
        return Err("API key required (--key flag or env var)".to_string());
    }

    Ok((req, key))
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn env_or(key: &str, fallback: String) -> String {
    env::var(key).unwrap_or(fallback)
}

fn env_opt(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> CLIConfig {
        CLIConfig {
            server: DEFAULT_URL.to_string(),
            provider: None,
            model: None,
            reasoning: true,
            vision: false,
            steps: DEFAULT_STEPS,
            key: None,
            task_file: None,
            app: None,
            deeplink: None,
            clear: false,
            quiet: false,
            server_key: None,
            version: false,
            goal: None,
        }
    }

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|arg| arg.to_string()).collect()
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn parses_flags_and_goal() {
        let cfg = parse_args(
            base(),
            &args(&[
                "--server",
                "http://10.0.0.65:8000",
                "--provider",
                "OpenAI",
                "--steps",
                "12",
                "--reasoning",
                "false",
                "--vision",
                "--quiet",
                "open settings",
            ]),
        );
        assert_eq!(cfg.server, "http://10.0.0.65:8000");
        assert_eq!(cfg.provider.as_deref(), Some("OpenAI"));
        assert_eq!(cfg.steps, 12);
        assert!(!cfg.reasoning);
        assert!(cfg.vision);
        assert!(cfg.quiet);
        assert_eq!(cfg.goal.as_deref(), Some("open settings"));
    }

    #[test]
    fn bare_reasoning_flag_enables_it() {
        let mut start = base();
        start.reasoning = false;
        let cfg = parse_args(start, &args(&["--reasoning", "--clear"]));
        assert!(cfg.reasoning);
        assert!(cfg.clear);
    }

    #[test]
    fn goal_only_request_uses_defaults() {
        let mut cfg = base();
        cfg.goal = Some("open settings".to_string());
        cfg.key = Some("k".to_string());
        let (req, key) = build_request(&cfg, None, no_env).unwrap();
        assert_eq!(req.provider, DEFAULT_PROVIDER);
        assert_eq!(req.model, DEFAULT_MODEL);
        assert_eq!(req.max_steps, DEFAULT_STEPS);
        assert_eq!(key.as_deref(), Some("k"));
        assert!(req.app.is_none());
    }

    #[test]
    fn credential_comes_from_provider_env() {
        let mut cfg = base();
        cfg.goal = Some("x".to_string());
        cfg.provider = Some("Anthropic".to_string());
        let lookup = |name: &str| (name == "ANTHROPIC_API_KEY").then(|| "from-env".to_string());
        let (_, key) = build_request(&cfg, None, lookup).unwrap();
        assert_eq!(key.as_deref(), Some("from-env"));
    }

    #[test]
    fn missing_credential_is_an_error_except_for_local_provider() {
        let mut cfg = base();
        cfg.goal = Some("x".to_string());
        let err = build_request(&cfg, None, no_env).unwrap_err();
        assert!(err.contains("API key required"));

        cfg.provider = Some("Ollama".to_string());
        let (req, key) = build_request(&cfg, None, no_env).unwrap();
        assert_eq!(req.provider, "Ollama");
        assert!(key.is_none());
    }

    #[test]
    fn missing_goal_is_an_error() {
        let err = build_request(&base(), None, no_env).unwrap_err();
        assert_eq!(err, "goal is required");
    }

    #[test]
    fn task_file_values_with_flag_overrides() {
        let file = parse_task_file(
            r#"
[task]
name = "whatsapp reply"
description = "reply to the latest chat"

[task.goal]
prompt = "reply 'on my way'"
app = "com.whatsapp"

[task.model]
provider = "Anthropic"
model = "claude-sonnet-4-20250514"

[task.options]
vision = true
"#,
        )
        .unwrap();
        assert_eq!(file.task.name, "whatsapp reply");

        let mut cfg = base();
        cfg.model = Some("override-model".to_string());
        cfg.deeplink = Some("whatsapp://send".to_string());
        cfg.key = Some("k".to_string());
        let (req, _) = build_request(&cfg, Some(&file), no_env).unwrap();
        assert_eq!(req.goal, "reply 'on my way'");
        assert_eq!(req.app.as_deref(), Some("com.whatsapp"));
        assert_eq!(req.deeplink.as_deref(), Some("whatsapp://send"));
        assert_eq!(req.provider, "Anthropic");
        assert_eq!(req.model, "override-model");
        assert!(req.vision);
        assert!(!req.reasoning);
        assert_eq!(req.max_steps, DEFAULT_STEPS);
    }

    #[test]
    fn malformed_task_file_is_rejected() {
        assert!(parse_task_file("[task\nname = ").is_err());
    }

    #[test]
    fn request_body_never_carries_credential() {
        let mut cfg = base();
        cfg.goal = Some("x".to_string());
        cfg.key = Some("sk-secret".to_string());
        let (req, _) = build_request(&cfg, None, no_env).unwrap();
        let body = serde_json::to_string(&req).unwrap();
        assert!(!body.contains("sk-secret"));
        assert!(!body.contains("\"app\""));
    }
}
