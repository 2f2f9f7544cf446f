use thiserror::Error;

use crate::model::IncidentSummary;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Could not find user with email {email}")]
    UserNotFound { email: String },

    #[error(
        "There are currently {} open incidents that this user is in use for. Please resolve the following incidents and try again:{}",
        .incidents.len(),
        format_incidents(.incidents)
    )]
    IncidentsOpen { incidents: Vec<IncidentSummary> },

    #[error("There was an issue with your {method} request to {path}:\nStatus code: {status}\nError: {body}")]
    Request {
        method: &'static str,
        path: String,
        status: u16,
        body: String,
    },

    #[error("The escalation policy {name} ({id}) no longer has any on-call engineers or schedules but is still attached to services in your account")]
    PolicyStillReferenced { id: String, name: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected response shape: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// HTTP status of a rejected request, if this is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Request { status, .. } => Some(*status),
            _ => None,
        }
    }
}

fn format_incidents(incidents: &[IncidentSummary]) -> String {
    let mut out = String::new();
    for incident in incidents {
        out.push_str(&format!("\n[#{}]: {}", incident.number, incident.description));
    }
    out
}
