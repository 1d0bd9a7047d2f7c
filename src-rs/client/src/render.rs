use std::io::{self, Write};

use serde_json::json;

use crate::models::{RunRequest, SubmitResponse, TaskFile, TaskInfo};

pub fn usage() {
    println!("Usage: droid-queue-client [flags] \"goal\"");
    println!("       droid-queue-client --task <file.toml> [flags]");
    println!();
    println!("Flags:");
    println!("  --server <url>         Server URL (DROIDRUN_SERVER_URL)");
    println!("  --provider <name>      LLM provider");
    println!("  --model <name>         Model name");
    println!("  --reasoning [bool]     Use reasoning mode (default true)");
    println!("  --vision               Use vision mode");
    println!("  --steps <n>            Max steps (default 30)");
    println!("  --key <key>            API key (or the provider's env var)");
    println!("  --task <file>          Task file (TOML)");
    println!("  --app <package>        App package to launch first");
    println!("  --deeplink <uri>       Deep link to open first");
    println!("  --server-key <key>     Server key (DROIDRUN_SERVER_KEY)");
    println!("  --clear                Clear the server queue");
    println!("  --quiet                Print a single JSON line");
    println!("  --version              Show version");
}

pub fn task_header(file: &TaskFile) {
    println!("Task:    {}", file.task.name);
    println!("Desc:    {}", file.task.description);
}

pub fn submission(server: &str, req: &RunRequest) {
    println!("Server:  {}", server);
    println!("Model:   {}/{}", req.provider, req.model);
    if let Some(app) = &req.app {
        println!("App:     {}", app);
    }
    if let Some(link) = &req.deeplink {
        println!("Link:    {}", link);
    }
    println!("Goal:    {}\n", truncate(&req.goal, 60));
}

pub fn queued(resp: &SubmitResponse) {
    println!("Task:    {} (position: {})", resp.task_id, resp.position);
    println!("Waiting...");
}

pub fn progress(status: &str) {
    match status {
        "queued" => print!("."),
        "running" => print!("\r[running]   "),
        _ => return,
    }
    let _ = io::stdout().flush();
}

pub fn finished(task: &TaskInfo, quiet: bool) {
    if quiet {
        let line = match task.status.as_str() {
            "completed" => json!({
                "success": task.success.unwrap_or(false),
                "result": task.result.clone().unwrap_or_default(),
            }),
            "failed" => json!({
                "success": false,
                "error": task.error.clone().unwrap_or_default(),
            }),
            other => json!({"success": false, "status": other}),
        };
        println!("{}", line);
        return;
    }

    print!("\r            \r");
    match task.status.as_str() {
        "completed" => {
            println!("=== COMPLETED ===");
            println!("Success: {}\n", task.success.unwrap_or(false));
            if let Some(logs) = task.logs.as_deref().filter(|logs| !logs.is_empty()) {
                println!("=== LOGS ===");
                println!("{}", logs);
            }
            if let Some(steps) = &task.steps {
                println!("=== STEPS ===");
                let pretty = serde_json::to_string_pretty(steps).unwrap_or_default();
                println!("{}\n", pretty);
            }
            println!("Result:\n{}", task.result.clone().unwrap_or_default());
        }
        "failed" => {
            println!("=== FAILED ===");
            println!("Error: {}", task.error.clone().unwrap_or_default());
        }
        _ => println!("=== CANCELLED ==="),
    }
}

pub fn info(msg: &str) {
    println!("{}", msg);
}

pub fn error(msg: &str) {
    eprintln!("Error: {}", msg);
}

fn truncate(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        return value.to_string();
    }
    let head: String = value.chars().take(max).collect();
    format!("{}...", head)
}
