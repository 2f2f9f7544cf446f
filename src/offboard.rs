//! Removes one user from everything that references them, then deletes the
//! account.
//!
//! The steps run strictly in order: resolve the user, refuse if they hold
//! open incidents, edit escalation policies, edit schedules, leave teams,
//! delete the user. Nothing is mutated before the incident check passes.
//! Every object touched is recorded in the [`OffboardReport`]; on a fatal
//! error the report built so far travels with the error.

use std::fmt;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::audit::FILE_ONLY_TARGET;
use crate::client::Api;
use crate::edits::{schedule_has_user, strip_from_policy, strip_user_from_layers};
use crate::error::{Error, Result};
use crate::model::{
    take_field, take_list, AffectedResource, EscalationPolicy, Incident, Reference, Schedule,
    Team, User,
};
use crate::prompt::DeletionPrompt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    EscalationPolicy,
    Schedule,
    User,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ResourceKind::EscalationPolicy => "escalation policy",
            ResourceKind::Schedule => "schedule",
            ResourceKind::User => "user",
        };
        f.write_str(label)
    }
}

/// A delete the operator declined at the prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedDeletion {
    pub kind: ResourceKind,
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OffboardReport {
    pub email: String,
    pub user_id: Option<String>,
    pub schedules: Vec<AffectedResource>,
    pub escalation_policies: Vec<AffectedResource>,
    pub teams: Vec<AffectedResource>,
    /// Deletes declined at the prompt.
    pub skipped: Vec<SkippedDeletion>,
    /// Non-fatal failures, one line each.
    pub warnings: Vec<String>,
    pub user_deleted: bool,
}

/// A run stopped by a fatal error, with what it had already changed.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct Aborted {
    pub source: Error,
    pub partial: OffboardReport,
}

fn utc_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Statuses the API answers with when a policy is still attached to services.
fn is_in_use_status(status: u16) -> bool {
    matches!(status, 400 | 409)
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

/// Find the user's ID by email.
///
/// The users endpoint matches `query` as a substring, so the email is
/// compared exactly on this side.
pub async fn resolve_user_id(api: &dyn Api, email: &str) -> Result<String> {
    let page = api.fetch("/users", &[("query", email)]).await?;
    let users: Vec<User> = take_list(page, "users")?;

    users
        .into_iter()
        .find(|user| user.email == email)
        .map(|user| user.id)
        .ok_or_else(|| Error::UserNotFound {
            email: email.to_string(),
        })
}

/// Triggered or acknowledged incidents assigned to the user.
pub async fn open_incidents(api: &dyn Api, user_id: &str) -> Result<Vec<Incident>> {
    let page = api
        .fetch(
            "/incidents",
            &[
                ("statuses[]", "triggered"),
                ("statuses[]", "acknowledged"),
                ("user_ids[]", user_id),
                ("total", "true"),
            ],
        )
        .await?;
    let incidents: Vec<Incident> = take_list(page, "incidents")?;
    Ok(incidents.into_iter().filter(Incident::is_open).collect())
}

pub struct Offboarding<'a> {
    api: &'a dyn Api,
    prompt: &'a dyn DeletionPrompt,
    clock: fn() -> String,
    report: OffboardReport,
}

impl<'a> Offboarding<'a> {
    pub fn new(api: &'a dyn Api, prompt: &'a dyn DeletionPrompt) -> Self {
        Self {
            api,
            prompt,
            clock: utc_now,
            report: OffboardReport::default(),
        }
    }

    /// Replace the source of layer end timestamps.
    pub fn with_clock(mut self, clock: fn() -> String) -> Self {
        self.clock = clock;
        self
    }

    pub async fn run(mut self, email: &str) -> std::result::Result<OffboardReport, Aborted> {
        self.report.email = email.to_string();

        match self.execute(email).await {
            Ok(()) => Ok(self.report),
            Err(source) => {
                error!(target: FILE_ONLY_TARGET, email, error = %source, "Offboarding aborted");
                Err(Aborted {
                    source,
                    partial: self.report,
                })
            }
        }
    }

    async fn execute(&mut self, email: &str) -> Result<()> {
        info!(email, "Start of offboarding");

        let user_id = resolve_user_id(self.api, email).await?;
        info!(user_id = %user_id, "User ID resolved");
        self.report.user_id = Some(user_id.clone());

        self.guard_open_incidents(&user_id).await?;
        self.escalation_policies_pass(&user_id).await?;
        self.schedules_pass(&user_id).await?;
        self.teams_pass(&user_id).await?;
        self.terminate(&user_id, email).await?;

        info!(
            schedules = %to_json(&self.report.schedules),
            escalation_policies = %to_json(&self.report.escalation_policies),
            teams = %to_json(&self.report.teams),
            user_deleted = self.report.user_deleted,
            "End of offboarding"
        );
        Ok(())
    }

    async fn guard_open_incidents(&mut self, user_id: &str) -> Result<()> {
        let open = open_incidents(self.api, user_id).await?;
        if open.is_empty() {
            return Ok(());
        }

        Err(Error::IncidentsOpen {
            incidents: open.iter().map(Incident::summarize).collect(),
        })
    }

    async fn escalation_policies_pass(&mut self, user_id: &str) -> Result<()> {
        let page = self
            .api
            .fetch("/escalation_policies", &[("user_ids[]", user_id)])
            .await?;
        let policies: Vec<EscalationPolicy> = take_list(page, "escalation_policies")?;
        info!(count = policies.len(), "Fetched escalation policies");

        for mut policy in policies {
            self.report
                .escalation_policies
                .push(AffectedResource::from(&policy));

            let removed = strip_from_policy(&mut policy, user_id);
            debug!(policy = %policy.id, removed, "Removed user from escalation rules");

            self.persist_policy(policy).await?;
        }

        info!(
            cache = %to_json(&self.report.escalation_policies),
            "Finished removing from escalation policies"
        );
        Ok(())
    }

    /// Send the edited policy back, or delete it when no rules are left.
    async fn persist_policy(&mut self, policy: EscalationPolicy) -> Result<()> {
        if !policy.escalation_rules.is_empty() {
            let path = format!("/escalation_policies/{}", policy.id);
            self.api
                .replace(&path, json!({ "escalation_policy": policy }))
                .await?;
            debug!(policy = %policy.id, "Escalation policy updated");
            return Ok(());
        }

        self.delete_policy(&policy).await
    }

    async fn delete_policy(&mut self, policy: &EscalationPolicy) -> Result<()> {
        if !self.confirm_delete(ResourceKind::EscalationPolicy, &policy.id, &policy.name)? {
            return Ok(());
        }

        let path = format!("/escalation_policies/{}", policy.id);
        let outcome = self.api.remove(&path).await.map_err(|err| match err {
            Error::Request { status, .. } if is_in_use_status(status) => {
                Error::PolicyStillReferenced {
                    id: policy.id.clone(),
                    name: policy.name.clone(),
                }
            }
            other => other,
        });

        match outcome {
            Ok(()) => {
                info!(policy = %policy.id, name = %policy.name, "Escalation policy deleted");
                Ok(())
            }
            Err(err @ Error::PolicyStillReferenced { .. }) => {
                warn!(policy = %policy.id, "{}", err);
                self.report.warnings.push(err.to_string());
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    async fn schedules_pass(&mut self, user_id: &str) -> Result<()> {
        let page = self.api.fetch("/schedules", &[]).await?;
        let schedules: Vec<Reference> = take_list(page, "schedules")?;
        info!(count = schedules.len(), "Fetched schedules");

        for summary in schedules {
            let detail = self
                .api
                .fetch(&format!("/schedules/{}", summary.id), &[])
                .await?;
            let mut schedule: Schedule = take_field(detail, "schedule")?;

            if !schedule_has_user(&schedule, user_id) {
                continue;
            }

            self.report.schedules.push(AffectedResource::from(&schedule));

            let now = (self.clock)();
            let layers = std::mem::take(&mut schedule.schedule_layers);
            schedule.schedule_layers = strip_user_from_layers(layers, user_id, &now);
            schedule.users = None;

            if !schedule.schedule_layers.is_empty() {
                let path = format!("/schedules/{}", schedule.id);
                self.api
                    .replace(&path, json!({ "schedule": schedule }))
                    .await?;
                debug!(schedule = %schedule.id, "Schedule updated");
            } else if !schedule.escalation_policies.is_empty() {
                self.detach_schedule(&schedule).await?;
            } else {
                self.delete_schedule(&schedule).await?;
            }
        }

        info!(
            cache = %to_json(&self.report.schedules),
            "Finished removing from schedules"
        );
        Ok(())
    }

    /// Remove an emptied schedule from every escalation policy targeting it.
    async fn detach_schedule(&mut self, schedule: &Schedule) -> Result<()> {
        info!(
            schedule = %schedule.id,
            policies = schedule.escalation_policies.len(),
            "Schedule has no layers left, removing it from escalation policies"
        );

        for reference in &schedule.escalation_policies {
            let envelope = self
                .api
                .fetch(&format!("/escalation_policies/{}", reference.id), &[])
                .await?;
            let mut policy: EscalationPolicy = take_field(envelope, "escalation_policy")?;

            let record = AffectedResource::from(&policy);
            if !self.report.escalation_policies.contains(&record) {
                self.report.escalation_policies.push(record);
            }

            let removed = strip_from_policy(&mut policy, &schedule.id);
            debug!(policy = %policy.id, removed, "Removed schedule from escalation rules");

            self.persist_policy(policy).await?;
        }
        Ok(())
    }

    async fn delete_schedule(&mut self, schedule: &Schedule) -> Result<()> {
        if !self.confirm_delete(ResourceKind::Schedule, &schedule.id, &schedule.name)? {
            return Ok(());
        }

        self.api
            .remove(&format!("/schedules/{}", schedule.id))
            .await?;
        info!(schedule = %schedule.id, name = %schedule.name, "Schedule deleted");
        Ok(())
    }

    async fn teams_pass(&mut self, user_id: &str) -> Result<()> {
        let page = self.api.fetch("/teams", &[]).await?;
        let teams: Vec<Team> = take_list(page, "teams")?;
        info!(count = teams.len(), "Fetched teams");

        for team in teams {
            let page = self
                .api
                .fetch_collection("/users", &[("team_ids[]", team.id.as_str())], "users")
                .await?;
            let members: Vec<User> = take_list(page, "users")?;

            if !members.iter().any(|member| member.id == user_id) {
                continue;
            }

            self.report.teams.push(AffectedResource::from(&team));
            self.api
                .remove(&format!("/teams/{}/users/{}", team.id, user_id))
                .await?;
            debug!(team = %team.id, "Removed user from team");
        }

        info!(cache = %to_json(&self.report.teams), "Finished removing from teams");
        Ok(())
    }

    async fn terminate(&mut self, user_id: &str, email: &str) -> Result<()> {
        if !self.confirm_delete(ResourceKind::User, user_id, email)? {
            return Ok(());
        }

        self.api.remove(&format!("/users/{}", user_id)).await?;
        self.report.user_deleted = true;
        info!(user_id, "User deleted");
        Ok(())
    }

    fn confirm_delete(&mut self, kind: ResourceKind, id: &str, name: &str) -> Result<bool> {
        let approved = self
            .prompt
            .approve(&format!("Delete {} {} ({})?", kind, name, id))?;

        if !approved {
            warn!(kind = %kind, id, name, "Deletion declined, leaving it in place");
            self.report.skipped.push(SkippedDeletion {
                kind,
                id: id.to_string(),
                name: name.to_string(),
            });
        }
        Ok(approved)
    }
}
