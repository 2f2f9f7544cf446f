//! Remote objects touched while offboarding a user.
//!
//! Objects are read, edited and sent back whole, so every type keeps the
//! fields it does not model in a flattened `extra` map.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

/// A typed pointer to another object (`{"id": ..., "type": ..., "summary": ...}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Reference {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerMember {
    pub user: Reference,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LayerMember {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user: Reference::new(user_id),
            extra: Map::new(),
        }
    }
}

/// One rotation tier of a schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleLayer {
    #[serde(default)]
    pub users: Vec<LayerMember>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ScheduleLayer {
    pub fn with_users(ids: &[&str]) -> Self {
        Self {
            users: ids.iter().map(|id| LayerMember::new(*id)).collect(),
            end: None,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub schedule_layers: Vec<ScheduleLayer>,
    /// Flattened list of everyone on any layer. Read-only on the remote side,
    /// so it is dropped before an update is sent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users: Option<Vec<Reference>>,
    /// Escalation policies that target this schedule.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub escalation_policies: Vec<Reference>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A rule target: a user or a schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Target {
    pub fn user(id: impl Into<String>) -> Self {
        Self::typed(id, "user_reference")
    }

    pub fn schedule(id: impl Into<String>) -> Self {
        Self::typed(id, "schedule_reference")
    }

    fn typed(id: impl Into<String>, kind: &str) -> Self {
        Self {
            id: id.into(),
            kind: kind.to_string(),
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationRule {
    #[serde(default)]
    pub targets: Vec<Target>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EscalationRule {
    pub fn with_targets(targets: Vec<Target>) -> Self {
        Self {
            targets,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationPolicy {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// The API rejects an explicit `null` here, so an absent description is
    /// left out of the update body entirely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub escalation_rules: Vec<EscalationRule>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incident {
    pub incident_number: u64,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Incident {
    pub fn is_open(&self) -> bool {
        matches!(self.status.as_str(), "triggered" | "acknowledged")
    }

    pub fn summarize(&self) -> IncidentSummary {
        let description = self
            .description
            .clone()
            .or_else(|| self.title.clone())
            .or_else(|| self.summary.clone())
            .unwrap_or_default();
        IncidentSummary {
            number: self.incident_number,
            description,
        }
    }
}

/// Just enough of an open incident to tell the operator what to resolve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentSummary {
    pub number: u64,
    pub description: String,
}

/// `{id, name}` record of something the run changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffectedResource {
    pub id: String,
    pub name: String,
}

impl AffectedResource {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

impl From<&Schedule> for AffectedResource {
    fn from(schedule: &Schedule) -> Self {
        Self::new(&schedule.id, &schedule.name)
    }
}

impl From<&EscalationPolicy> for AffectedResource {
    fn from(policy: &EscalationPolicy) -> Self {
        Self::new(&policy.id, &policy.name)
    }
}

impl From<&Team> for AffectedResource {
    fn from(team: &Team) -> Self {
        Self::new(&team.id, &team.name)
    }
}

/// Pull a typed value out of a response envelope such as `{"schedule": {...}}`.
pub fn take_field<T: DeserializeOwned>(mut envelope: Value, field: &str) -> Result<T> {
    let inner = envelope
        .get_mut(field)
        .map(Value::take)
        .unwrap_or(Value::Null);
    Ok(serde_json::from_value(inner)?)
}

/// Like [`take_field`] for list envelopes; a missing or null list is empty.
pub fn take_list<T: DeserializeOwned>(envelope: Value, field: &str) -> Result<Vec<T>> {
    match envelope.get(field) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(_) => take_field(envelope, field),
    }
}
