//! Push-delivery envelope decoding.
//!
//! The bus wraps every event as `{message: {data: <base64 JSON>, ...}, subscription}`. Anything
//! that fails to decode here can never succeed on redelivery, so callers acknowledge it instead
//! of asking for a retry.

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use super::domain::{MissingField, ScoringRequest};

/// Transport envelope as posted by the push subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushEnvelope {
    pub message: PushMessage,
    #[serde(default)]
    pub subscription: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushMessage {
    pub data: String,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
    #[serde(default)]
    pub message_id: String,
    #[serde(default)]
    pub publish_time: String,
}

/// ATS event carried inside the envelope payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundEvent {
    pub event_name: String,
    pub workspace_id: String,
    #[serde(default)]
    pub integration_id: String,
    #[serde(default)]
    pub timestamp: String,
    pub data: EventData,
}

/// Older producers send a single application object, newer ones an array.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventData {
    Batch(Vec<ApplicationEventData>),
    Single(ApplicationEventData),
}

impl EventData {
    pub fn into_items(self) -> Vec<ApplicationEventData> {
        match self {
            EventData::Batch(items) => items,
            EventData::Single(item) => vec![item],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationEventData {
    pub id: String,
    #[serde(rename = "candidateReferenceId", alias = "candidateId")]
    pub candidate_reference_id: String,
    #[serde(rename = "vacancyReferenceId", alias = "vacancyId")]
    pub vacancy_reference_id: String,
}

/// Envelope decoded into the requests it carries.
#[derive(Debug, Clone)]
pub struct DecodedEvent {
    pub event_name: String,
    pub workspace_id: String,
    pub message_id: String,
    pub requests: Vec<ScoringRequest>,
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("message data is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("event payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("event item is incomplete: {0}")]
    Incomplete(#[from] MissingField),
}

/// Decode an envelope into scoring requests stamped with the event's workspace.
pub fn decode_envelope(envelope: &PushEnvelope) -> Result<DecodedEvent, DecodeError> {
    let raw = STANDARD.decode(envelope.message.data.trim())?;
    let event: InboundEvent = serde_json::from_slice(&raw)?;

    let workspace_id = event.workspace_id;
    let requests = event
        .data
        .into_items()
        .into_iter()
        .map(|item| {
            let request = ScoringRequest {
                application_id: item.id,
                candidate_id: item.candidate_reference_id,
                vacancy_id: item.vacancy_reference_id,
                workspace_id: workspace_id.clone(),
            };
            request.validate().map(|()| request)
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(DecodedEvent {
        event_name: event.event_name,
        workspace_id,
        message_id: envelope.message.message_id.clone(),
        requests,
    })
}

/// Build a push envelope around an event; used by tests and local tooling.
pub fn encode_envelope(event: &serde_json::Value, message_id: &str) -> PushEnvelope {
    PushEnvelope {
        message: PushMessage {
            data: STANDARD.encode(event.to_string()),
            attributes: HashMap::new(),
            message_id: message_id.to_string(),
            publish_time: String::new(),
        },
        subscription: String::new(),
    }
}
