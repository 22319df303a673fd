// Copyright 2025 The Drasi Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! JSON-lines protocol spoken with the wrapper process.
//!
//! One JSON object per line, tagged by `type`. Bodies are base64 encoded.
//!
//! ```text
//! runtime → wrapper   {"type":"event","id":..,"headers":{..},"body":"aGVsbG8="}
//!                     {"type":"control","kind":"drainRequest","attributes":{}}
//! wrapper → runtime   {"type":"ready"}
//!                     {"type":"response","statusCode":200,"contentType":"text/plain","headers":{},"body":"aGVsbG8="}
//!                     {"type":"error","message":"..."}
//!                     {"type":"log","level":"info","message":"..."}
//!                     {"type":"control","kind":"drainDone","attributes":{}}
//! ```

use std::collections::HashMap;

use anyhow::{Context as _, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::control::ControlMessage;
use crate::event::{Event, Response};

#[derive(Serialize)]
struct WireEvent<'a> {
    #[serde(flatten)]
    event: &'a Event,
    body: String,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum OutboundMessage<'a> {
    Event(WireEvent<'a>),
    Control(&'a ControlMessage),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireResponse {
    /// Id of the event being answered. Untagged replies go to the event in flight.
    #[serde(default)]
    pub event_id: Option<String>,
    #[serde(default = "default_status_code")]
    pub status_code: u16,
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: String,
}

fn default_status_code() -> u16 {
    200
}

/// A line received from the wrapper.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WrapperMessage {
    Ready,
    Response(WireResponse),
    Error {
        #[serde(default, rename = "eventId")]
        event_id: Option<String>,
        message: String,
    },
    Log { level: String, message: String },
    Control(ControlMessage),
}

/// Encode an event as one newline-terminated line.
pub fn encode_event(event: &Event) -> Result<String> {
    let message = OutboundMessage::Event(WireEvent {
        event,
        body: STANDARD.encode(&event.body),
    });
    to_line(&message)
}

/// Encode a control message as one newline-terminated line.
pub fn encode_control(message: &ControlMessage) -> Result<String> {
    to_line(&OutboundMessage::Control(message))
}

fn to_line(message: &OutboundMessage<'_>) -> Result<String> {
    let mut line = serde_json::to_string(message).context("failed to encode wrapper message")?;
    line.push('\n');
    Ok(line)
}

pub fn decode_line(line: &str) -> Result<WrapperMessage> {
    serde_json::from_str(line).with_context(|| format!("malformed wrapper message: {line}"))
}

impl WireResponse {
    pub fn into_response(self) -> Result<Response> {
        let body = STANDARD
            .decode(self.body.as_bytes())
            .context("response body is not valid base64")?;
        let content_type = if self.content_type.is_empty() {
            Response::default().content_type
        } else {
            self.content_type
        };
        Ok(Response {
            status_code: self.status_code,
            content_type,
            headers: self.headers,
            body,
        })
    }
}
