use reqwest::blocking::{Client, RequestBuilder, Response};

use crate::models::{ErrorResponse, RunRequest, SubmitResponse, TaskInfo};

const API_KEY_HEADER: &str = "X-API-Key";
const SERVER_KEY_HEADER: &str = "X-Server-Key";

#[derive(Clone)]
pub struct HTTPClient {
    pub base_url: String,
    pub server_key: Option<String>,
    client: Client,
}

impl HTTPClient {
    pub fn new(base_url: &str, server_key: Option<String>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            server_key,
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("reqwest client"),
        }
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.server_key {
            Some(key) => builder.header(SERVER_KEY_HEADER, key),
            None => builder,
        }
    }

    pub fn submit(&self, req: &RunRequest, key: Option<&str>) -> Result<SubmitResponse, String> {
        let mut builder = self
            .authorize(self.client.post(format!("{}/run", self.base_url)))
            .json(req);
        if let Some(key) = key {
            builder = builder.header(API_KEY_HEADER, key);
        }
        let resp = builder.send().map_err(|err| err.to_string())?;
        let submitted: SubmitResponse = decode(resp)?;
        if submitted.task_id.is_empty() {
            return Err("no task ID received".to_string());
        }
        Ok(submitted)
    }

    pub fn get_task(&self, id: &str) -> Result<TaskInfo, String> {
        let url = format!("{}/task/{}", self.base_url, id);
        let resp = self
            .authorize(self.client.get(url))
            .send()
            .map_err(|err| err.to_string())?;
        decode(resp)
    }

    /// Best-effort `DELETE /task/{id}`.
    pub fn cancel(&self, id: &str) -> Result<(), String> {
        let url = format!("{}/task/{}", self.base_url, id);
        let resp = self
            .authorize(self.client.delete(url))
            .send()
            .map_err(|err| err.to_string())?;
        decode::<serde_json::Value>(resp).map(|_| ())
    }

    pub fn clear(&self) -> Result<u64, String> {
        let url = format!("{}/queue", self.base_url);
        let resp = self
            .authorize(self.client.delete(url))
            .send()
            .map_err(|err| err.to_string())?;
        let value: serde_json::Value = decode(resp)?;
        Ok(value.get("cleared").and_then(|v| v.as_u64()).unwrap_or(0))
    }
}

fn decode<T: serde::de::DeserializeOwned>(resp: Response) -> Result<T, String> {
    if resp.status().is_success() {
        resp.json::<T>().map_err(|err| format!("decoding response: {}", err))
    } else {
        let status = resp.status();
        let body = resp.text().unwrap_or_default();
        match serde_json::from_str::<ErrorResponse>(&body) {
            Ok(parsed) if !parsed.error.is_empty() => Err(parsed.error),
            _ => Err(format!("http {}: {}", status.as_u16(), body)),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::serve_once;
    use super::*;

    fn request() -> RunRequest {
        RunRequest {
            goal: "open settings".to_string(),
            app: None,
            deeplink: None,
            provider: "Google".to_string(),
            model: "gemini-2.0-flash".to_string(),
            reasoning: true,
            vision: false,
            max_steps: 30,
        }
    }

    #[test]
    fn submit_sends_credential_only_as_header() {
        let (base, server) = serve_once(
            "200 OK",
            r#"{"task_id":"abc12345","status":"queued","position":1}"#,
        );
        let client = HTTPClient::new(&base, Some("srv".to_string()));
        let resp = client.submit(&request(), Some("sk-secret")).unwrap();
        assert_eq!(resp.task_id, "abc12345");
        assert_eq!(resp.position, 1);

        let raw = server.join().unwrap();
        let lower = raw.to_lowercase();
        assert!(raw.starts_with("POST /run HTTP/1.1"));
        assert!(lower.contains("x-api-key: sk-secret"));
        assert!(lower.contains("x-server-key: srv"));
        let body = &raw[raw.find("\r\n\r\n").unwrap() + 4..];
        assert!(!body.contains("sk-secret"));
    }

    #[test]
    fn server_error_text_is_surfaced() {
        let (base, server) = serve_once("400 Bad Request", r#"{"error":"goal is required"}"#);
        let client = HTTPClient::new(&base, None);
        let err = client.submit(&request(), None).unwrap_err();
        assert_eq!(err, "goal is required");
        server.join().unwrap();
    }

    #[test]
    fn cancel_deletes_task() {
        let (base, server) = serve_once("200 OK", r#"{"status":"cancelled"}"#);
        let client = HTTPClient::new(&base, Some("srv".to_string()));
        client.cancel("abc12345").unwrap();

        let raw = server.join().unwrap();
        assert!(raw.starts_with("DELETE /task/abc12345 HTTP/1.1"));
        assert!(raw.to_lowercase().contains("x-server-key: srv"));
    }
}
