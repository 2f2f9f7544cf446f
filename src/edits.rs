//! Edits to nested collections: rule targets inside escalation policies and
//! members inside schedule layers.
//!
//! Positions are always captured against the original collection first and
//! the retained collection is then rebuilt by filtering on that captured set,
//! so removing one entry never shifts the position of another.

use std::collections::HashSet;

use crate::model::{EscalationPolicy, EscalationRule, Schedule, ScheduleLayer};

/// Where a target sits inside a policy's rule list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetPosition {
    pub rule: usize,
    pub target: usize,
}

/// Every rule/target position whose target id equals `id`, in rule order.
pub fn target_positions(rules: &[EscalationRule], id: &str) -> Vec<TargetPosition> {
    let mut out = Vec::new();
    for (rule_index, rule) in rules.iter().enumerate() {
        for (target_index, target) in rule.targets.iter().enumerate() {
            if target.id == id {
                out.push(TargetPosition {
                    rule: rule_index,
                    target: target_index,
                });
            }
        }
    }
    out
}

/// Rebuild `rules` without the targets at `positions`. Rules themselves are
/// kept even if they end up empty.
pub fn remove_targets(
    rules: Vec<EscalationRule>,
    positions: &[TargetPosition],
) -> Vec<EscalationRule> {
    let excluded: HashSet<TargetPosition> = positions.iter().copied().collect();

    rules
        .into_iter()
        .enumerate()
        .map(|(rule_index, mut rule)| {
            rule.targets = rule
                .targets
                .into_iter()
                .enumerate()
                .filter(|(target_index, _)| {
                    !excluded.contains(&TargetPosition {
                        rule: rule_index,
                        target: *target_index,
                    })
                })
                .map(|(_, target)| target)
                .collect();
            rule
        })
        .collect()
}

pub fn drop_empty_rules(rules: Vec<EscalationRule>) -> Vec<EscalationRule> {
    rules
        .into_iter()
        .filter(|rule| !rule.targets.is_empty())
        .collect()
}

/// Remove every target pointing at `id` from `policy` and drop the rules
/// left without targets. Returns how many targets were removed.
pub fn strip_from_policy(policy: &mut EscalationPolicy, id: &str) -> usize {
    let positions = target_positions(&policy.escalation_rules, id);
    let rules = std::mem::take(&mut policy.escalation_rules);
    policy.escalation_rules = drop_empty_rules(remove_targets(rules, &positions));
    positions.len()
}

pub fn schedule_has_user(schedule: &Schedule, user_id: &str) -> bool {
    schedule
        .users
        .as_deref()
        .unwrap_or_default()
        .iter()
        .any(|user| user.id == user_id)
}

/// Position of the first entry for `user_id` in a layer.
pub fn member_position(layer: &ScheduleLayer, user_id: &str) -> Option<usize> {
    layer
        .users
        .iter()
        .position(|member| member.user.id == user_id)
}

/// Take `user_id` off every layer and return the layers in the order the
/// update must be sent in.
///
/// A layer whose first and only member is the user is end-dated at `now`
/// instead of emptied, which keeps its on-call history. Otherwise the user's
/// entry is removed. Layers with no members afterwards are dropped, and the
/// remaining layers are reversed.
pub fn strip_user_from_layers(
    layers: Vec<ScheduleLayer>,
    user_id: &str,
    now: &str,
) -> Vec<ScheduleLayer> {
    let mut kept: Vec<ScheduleLayer> = layers
        .into_iter()
        .map(|mut layer| {
            match member_position(&layer, user_id) {
                Some(0) if layer.users.len() == 1 => {
                    layer.end = Some(now.to_string());
                }
                Some(index) => {
                    layer.users.remove(index);
                }
                None => {}
            }
            layer
        })
        .filter(|layer| !layer.users.is_empty())
        .collect();

    kept.reverse();
    kept
}
