mod cli;
mod client;
mod models;
mod render;

use std::env;
use std::process;
use std::thread;
use std::time::Duration;

use client::HTTPClient;

const POLL_INTERVAL: Duration = Duration::from_secs(2);
const EXIT_CANCELLED: i32 = 130;

fn main() {
    let config = cli::parse_config();

    if config.version {
        println!("droid-queue-client version {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    let client = HTTPClient::new(&config.server, config.server_key.clone());

    if config.clear {
        match client.clear() {
            Ok(cleared) => {
                if !config.quiet {
                    render::info(&format!("Cleared {} tasks", cleared));
                }
                return;
            }
            Err(err) => fail(&err),
        }
    }

    let file = match &config.task_file {
        Some(path) => match cli::load_task_file(path) {
            Ok(file) => Some(file),
            Err(err) => fail(&format!("loading task file: {}", err)),
        },
        None => None,
    };
    if file.is_none() && config.goal.is_none() {
        render::usage();
        process::exit(1);
    }

    let (request, key) = match cli::build_request(&config, file.as_ref(), |name| env::var(name).ok()) {
        Ok(resolved) => resolved,
        Err(err) => fail(&err),
    };

    if !config.quiet {
        if let Some(file) = &file {
            render::task_header(file);
        }
        render::submission(&client.base_url, &request);
    }

    let submitted = match client.submit(&request, key.as_deref()) {
        Ok(resp) => resp,
        Err(err) => fail(&err),
    };
    if !config.quiet {
        render::queued(&submitted);
    }
    cancel_on_interrupt(client.clone(), submitted.task_id.clone(), config.quiet);

    loop {
        let task = match client.get_task(&submitted.task_id) {
            Ok(task) => task,
            Err(_) => {
                thread::sleep(POLL_INTERVAL);
                continue;
            }
        };

        match task.status.as_str() {
            "completed" | "failed" | "cancelled" => {
                render::finished(&task, config.quiet);
                process::exit(exit_code(&task.status, task.success));
            }
            status => {
                if !config.quiet {
                    render::progress(status);
                }
            }
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Watches for Ctrl-C/SIGTERM on a helper thread; on either, cancels the
/// submitted task and exits with 130.
fn cancel_on_interrupt(client: HTTPClient, task_id: String, quiet: bool) {
    let spawned = thread::Builder::new()
        .name("interrupt".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(err) => {
                    render::error(&format!("cannot watch for interrupts: {}", err));
                    return;
                }
            };
            runtime.block_on(interrupted());
            process::exit(interrupt(&client, &task_id, quiet));
        });
    if let Err(err) = spawned {
        render::error(&format!("cannot watch for interrupts: {}", err));
    }
}

async fn interrupted() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

fn interrupt(client: &HTTPClient, task_id: &str, quiet: bool) -> i32 {
    if !quiet {
        render::info("\nCancelling task...");
    }
    if let Err(err) = client.cancel(task_id) {
        if !quiet {
            render::error(&format!("cancel failed: {}", err));
        }
    }
    EXIT_CANCELLED
}

fn exit_code(status: &str, success: Option<bool>) -> i32 {
    match status {
        "completed" if success == Some(true) => 0,
        "cancelled" => EXIT_CANCELLED,
        _ => 1,
    }
}

fn fail(msg: &str) -> ! {
    render::error(msg);
    process::exit(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interrupt_cancels_task_and_exits_cancelled() {
        let (base, server) =
            client::testing::serve_once("200 OK", r#"{"status":"cancelled"}"#);
        let client = HTTPClient::new(&base, None);
        assert_eq!(interrupt(&client, "abc12345", true), EXIT_CANCELLED);
        assert!(server.join().unwrap().starts_with("DELETE /task/abc12345 "));
    }

    #[test]
    fn interrupt_still_exits_when_server_is_gone() {
        let client = HTTPClient::new("http://127.0.0.1:1", None);
        assert_eq!(interrupt(&client, "abc12345", true), EXIT_CANCELLED);
    }

    #[test]
    fn exit_codes_follow_outcome() {
        assert_eq!(exit_code("completed", Some(true)), 0);
        assert_eq!(exit_code("completed", Some(false)), 1);
        assert_eq!(exit_code("failed", None), 1);
        assert_eq!(exit_code("cancelled", None), EXIT_CANCELLED);
    }
}
