//! External tool family (§4.4) — `get_weather`, `web_search`, `web_fetch`.
//!
//! All three are thin `reqwest` clients. `web_fetch` is the one with real
//! stakes: it goes through the SSRF guard before a request is ever issued,
//! since its target URL comes straight from LLM output.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{Tool, ToolResult};

const MAX_FETCH_BYTES: usize = 200_000;

/// Fetch a URL and return extracted text, guarded against SSRF.
pub struct WebFetchTool;

#[async_trait]
impl Tool for WebFetchTool {
    fn name(&self) -> &str {
        "web_fetch"
    }

    fn description(&self) -> &str {
        "Fetch a web page and return its visible text content. Blocked for \
         loopback, private, and link-local addresses — use this only for \
         public internet URLs."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": { "type": "string", "description": "The URL to fetch." }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, input: Value) -> ToolResult {
        let raw_url = match input.get("url").and_then(|v| v.as_str()) {
            Some(u) if !u.trim().is_empty() => u.trim(),
            _ => return ToolResult::error("'url' is required"),
        };

        let checked = match basalt_tools::safety::check_fetch_url(raw_url) {
            Ok(u) => u,
            Err(e) => return ToolResult::error(format!("blocked: {e}")),
        };

        let client = match reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(
                basalt_core::types::budgets::HTTP_TIMEOUT_MS,
            ))
            .redirect(reqwest::redirect::Policy::none()) // a redirect target must pass the guard too
            .build()
        {
            Ok(c) => c,
            Err(e) => return ToolResult::error(format!("client build failed: {e}")),
        };

        let response = match client.get(checked).send().await {
            Ok(r) => r,
            Err(e) => return ToolResult::error(format!("fetch failed: {e}")),
        };

        if response.status().is_redirection() {
            return ToolResult::error(
                "server returned a redirect — re-issue web_fetch with the target URL directly",
            );
        }
        if !response.status().is_success() {
            return ToolResult::error(format!("server returned status {}", response.status()));
        }

        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => return ToolResult::error(format!("failed to read response body: {e}")),
        };

        let text = strip_html_tags(&body);
        let truncated = if text.len() > MAX_FETCH_BYTES {
            format!("{}\n\n[truncated at {MAX_FETCH_BYTES} bytes]", &text[..MAX_FETCH_BYTES])
        } else {
            text
        };

        ToolResult::success(truncated)
    }
}

/// Strip tags and collapse whitespace — a text extraction pass, not a full
/// HTML parse. Good enough for giving the LLM readable page content.
fn strip_html_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len() / 2);
    let mut in_tag = false;
    let mut in_script = false;
    let lower = html.to_lowercase();
    let mut chars = html.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if !in_tag && lower[i..].starts_with("<script") {
            in_script = true;
        }
        if !in_tag && lower[i..].starts_with("<style") {
            in_script = true;
        }
        if in_script && lower[i..].starts_with("</script>") {
            in_script = false;
        }
        if in_script && lower[i..].starts_with("</style>") {
            in_script = false;
        }

        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag && !in_script => out.push(c),
            _ => {}
        }
    }

    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Current conditions for a location via a weather API.
pub struct GetWeatherTool;

#[async_trait]
impl Tool for GetWeatherTool {
    fn name(&self) -> &str {
        "get_weather"
    }

    fn description(&self) -> &str {
        "Get the current weather conditions for a named location. Requires \
         WEATHER_API_KEY to be configured; returns an error otherwise."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "location": { "type": "string", "description": "City name or \"lat,lon\"." }
            },
            "required": ["location"]
        })
    }

    async fn execute(&self, input: Value) -> ToolResult {
        let location = match input.get("location").and_then(|v| v.as_str()) {
            Some(l) if !l.trim().is_empty() => l.trim(),
            _ => return ToolResult::error("'location' is required"),
        };
        let api_key = match std::env::var("WEATHER_API_KEY") {
            Ok(k) if !k.is_empty() => k,
            _ => return ToolResult::error("WEATHER_API_KEY is not configured"),
        };

        let client = reqwest::Client::new();
        let response = client
            .get("https://api.weatherapi.com/v1/current.json")
            .query(&[("key", api_key.as_str()), ("q", location)])
            .timeout(std::time::Duration::from_millis(
                basalt_core::types::budgets::HTTP_TIMEOUT_MS,
            ))
            .send()
            .await;

        match response {
            Ok(r) if r.status().is_success() => match r.json::<Value>().await {
                Ok(body) => ToolResult::success(summarize_weather(&body)),
                Err(e) => ToolResult::error(format!("failed to parse weather response: {e}")),
            },
            Ok(r) => ToolResult::error(format!("weather API returned status {}", r.status())),
            Err(e) => ToolResult::error(format!("weather request failed: {e}")),
        }
    }
}

fn summarize_weather(body: &Value) -> String {
    let loc = body["location"]["name"].as_str().unwrap_or("unknown location");
    let temp_c = body["current"]["temp_c"].as_f64().unwrap_or(f64::NAN);
    let condition = body["current"]["condition"]["text"].as_str().unwrap_or("unknown");
    format!("{loc}: {temp_c}\u{b0}C, {condition}")
}

/// General-purpose web search.
pub struct WebSearchTool;

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web and return a list of result titles, URLs, and snippets. \
         Requires SEARCH_API_KEY to be configured; returns an error otherwise."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "The search query." }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, input: Value) -> ToolResult {
        let query = match input.get("query").and_then(|v| v.as_str()) {
            Some(q) if !q.trim().is_empty() => q.trim(),
            _ => return ToolResult::error("'query' is required"),
        };
        let api_key = match std::env::var("SEARCH_API_KEY") {
            Ok(k) if !k.is_empty() => k,
            _ => return ToolResult::error("SEARCH_API_KEY is not configured"),
        };

        let client = reqwest::Client::new();
        let response = client
            .get("https://api.bing.microsoft.com/v7.0/search")
            .header("Ocp-Apim-Subscription-Key", api_key)
            .query(&[("q", query)])
            .timeout(std::time::Duration::from_millis(
                basalt_core::types::budgets::HTTP_TIMEOUT_MS,
            ))
            .send()
            .await;

        match response {
            Ok(r) if r.status().is_success() => match r.json::<Value>().await {
                Ok(body) => ToolResult::success(summarize_search(&body)),
                Err(e) => ToolResult::error(format!("failed to parse search response: {e}")),
            },
            Ok(r) => ToolResult::error(format!("search API returned status {}", r.status())),
            Err(e) => ToolResult::error(format!("search request failed: {e}")),
        }
    }
}

fn summarize_search(body: &Value) -> String {
    let Some(results) = body["webPages"]["value"].as_array() else {
        return "No results found.".to_string();
    };
    let mut out = String::new();
    for r in results.iter().take(5) {
        let name = r["name"].as_str().unwrap_or("");
        let url = r["url"].as_str().unwrap_or("");
        let snippet = r["snippet"].as_str().unwrap_or("");
        out.push_str(&format!("- {name}\n  {url}\n  {snippet}\n"));
    }
    if out.is_empty() {
        "No results found.".to_string()
    } else {
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_html_tags_drops_script_and_tags() {
        let html = "<html><head><script>evil()</script></head><body><p>Hello <b>world</b></p></body></html>";
        let text = strip_html_tags(html);
        assert_eq!(text, "Hello world");
    }
}
