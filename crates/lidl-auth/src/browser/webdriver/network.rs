//! Request records rebuilt from Chrome's `performance` log or from
//! Firefox's WebDriver BiDi network events.

use serde::Deserialize;
use serde_json::Value;

use crate::browser::CapturedRequest;

#[derive(Debug, Deserialize)]
struct LogEntry {
    message: String,
}

#[derive(Debug, Deserialize)]
struct DevToolsEnvelope {
    message: DevToolsEvent,
}

#[derive(Debug, Deserialize)]
struct DevToolsEvent {
    method: String,
    #[serde(default)]
    params: Value,
}

/// Accumulated network traffic of one browser session.
#[derive(Debug, Default)]
pub(crate) struct NetworkLog {
    requests: Vec<CapturedRequest>,
}

impl NetworkLog {
    pub(crate) fn requests(&self) -> &[CapturedRequest] {
        &self.requests
    }

    pub(crate) fn clear(&mut self) {
        self.requests.clear();
    }

    /// Fold raw `performance` log entries into the request list.
    pub(crate) fn ingest(&mut self, entries: &[Value]) {
        for entry in entries {
            let Ok(entry) = LogEntry::deserialize(entry) else {
                continue;
            };
            let Ok(envelope) = serde_json::from_str::<DevToolsEnvelope>(&entry.message) else {
                continue;
            };
            let event = envelope.message;
            match event.method.as_str() {
                "Network.requestWillBeSent" => self.request_will_be_sent(&event.params),
                "Network.responseReceived" => self.response_received(&event.params),
                _ => {}
            }
        }
    }

    fn request_will_be_sent(&mut self, params: &Value) {
        let Some(id) = params["requestId"].as_str() else {
            return;
        };

        // Redirects reuse the request id; the redirect response belongs to the previous hop.
        let redirect = &params["redirectResponse"];
        if redirect.is_object() {
            self.answer(id, status(redirect), location_header(&redirect["headers"]));
        }

        self.push(id, &params["request"]);
    }

    fn response_received(&mut self, params: &Value) {
        if let Some(id) = params["requestId"].as_str() {
            let response = &params["response"];
            self.answer(id, status(response), location_header(&response["headers"]));
        }
    }

    /// Fold one BiDi message into the request list. Command replies are ignored.
    pub(crate) fn ingest_bidi(&mut self, message: &Value) {
        let params = &message["params"];
        let Some(id) = params["request"]["request"].as_str() else {
            return;
        };
        match message["method"].as_str() {
            // Every redirect hop is announced again under the same id
            Some("network.beforeRequestSent") => self.push(id, &params["request"]),
            Some("network.responseStarted" | "network.responseCompleted") => {
                let response = &params["response"];
                self.answer(id, status(response), bidi_location(&response["headers"]));
            }
            _ => {}
        }
    }

    fn push(&mut self, id: &str, request: &Value) {
        let Some(url) = request["url"].as_str() else {
            return;
        };
        let method = request["method"].as_str().unwrap_or("GET");
        self.requests
            .push(CapturedRequest::new(method, url).with_id(id));
    }

    fn answer(&mut self, id: &str, status: Option<u16>, location: Option<String>) {
        let Some(request) = self
            .requests
            .iter_mut()
            .rev()
            .find(|request| request.id.as_deref() == Some(id) && !request.has_response())
        else {
            return;
        };
        request.status = status;
        request.location = location;
    }
}

fn status(response: &Value) -> Option<u16> {
    response["status"]
        .as_u64()
        .or_else(|| response["status"].as_f64().map(|s| s as u64))
        .and_then(|s| u16::try_from(s).ok())
}

/// BiDi headers are a list of `{name, value: {type, value}}`.
fn bidi_location(headers: &Value) -> Option<String> {
    headers.as_array()?.iter().find_map(|header| {
        let name = header["name"].as_str()?;
        if !name.eq_ignore_ascii_case("location") {
            return None;
        }
        let value = &header["value"];
        value["value"]
            .as_str()
            .or_else(|| value.as_str())
            .map(str::to_string)
    })
}

fn location_header(headers: &Value) -> Option<String> {
    headers.as_object()?.iter().find_map(|(name, value)| {
        if name.eq_ignore_ascii_case("location") {
            value.as_str().map(str::to_string)
        } else {
            None
        }
    })
}
