//! Selection logic: which ports belong to which aggregator
//! (802.1AX-2014 6.4.14.1).
//!
//! A pass runs inside the actor of the port that triggered it and holds the
//! candidate aggregator's mutex for its duration. It works entirely on the
//! mirrored port records, writes verdicts back to the registry, and
//! delivers changed verdicts to the affected port actors as events. Event
//! channels are unbounded, so the mutex is never held across a blocking
//! send.

use crate::aggregator::{AggState, Aggregator, MemberState, Selection};
use crate::event::{PortEvent, SelectionVerdict};
use crate::registry::PortRecord;
use crate::system::LacpSystem;
use sonic_lacp_types::{PortProperties, SystemId};
use std::collections::BTreeMap;
use tracing::debug;

/// Re-evaluates the aggregator association of `port` after its partner
/// knowledge or configuration changed.
pub(crate) async fn reselect(system: &LacpSystem, port: u16) {
    let registry = system.registry();
    let Some(record) = registry.record(port) else {
        return;
    };

    let eligible = record.enabled && (record.lacp_enabled || record.aggregatable);
    let candidate = if eligible && record.actor_oper_key != 0 {
        registry.aggregator_by_key(record.actor_oper_key)
    } else {
        None
    };
    let new_agg_id = candidate.as_ref().map(|a| a.id).unwrap_or(0);

    // leaving an aggregator re-evaluates the ports staying behind
    if record.agg_id != 0 && record.agg_id != new_agg_id {
        if let Some(old) = registry.aggregator(record.agg_id) {
            evaluate_aggregator(system, &old).await;
        }
    }

    match candidate {
        Some(agg) => evaluate_aggregator(system, &agg).await,
        None => {
            if record.selection != Selection::Unselected || record.agg_id != 0 {
                registry.update_selection(port, Selection::Unselected, 0);
                registry.send_to_port(
                    port,
                    PortEvent::Selection(SelectionVerdict {
                        selection: Selection::Unselected,
                        agg_id: 0,
                        agg_ready: false,
                    }),
                );
            }
        }
    }
}

/// Recomputes the full membership of one aggregator from the port records.
pub(crate) async fn evaluate_aggregator(system: &LacpSystem, agg: &Aggregator) {
    let registry = system.registry();
    let mut state = agg.state.lock().await;
    let old_members = state.members.clone();
    let old_ready = state.ready;

    let mut candidates: Vec<PortRecord> = registry
        .records()
        .into_iter()
        .filter(|r| r.actor_oper_key == agg.actor_admin_key)
        .filter(|r| r.enabled && (r.lacp_enabled || r.aggregatable))
        .collect();
    candidates.sort_by_key(|r| r.number);

    let reference = pick_reference(&state.partner_system, state.partner_oper_key, &candidates);

    // tentative verdicts before the min-links rule
    let mut verdicts: BTreeMap<u16, Selection> = BTreeMap::new();
    for record in &candidates {
        let both_aggregatable = record.aggregatable && record.partner_aggregatable;
        let verdict = if !both_aggregatable {
            // an individual link may only operate alone
            if candidates.len() == 1 {
                Selection::Selected
            } else {
                Selection::Standby
            }
        } else {
            match reference {
                Some(ref r)
                    if record.partner_system == r.partner_system
                        && record.partner_oper_key == r.partner_oper_key
                        && record.properties.compatible_with(&r.properties) =>
                {
                    Selection::Selected
                }
                _ => Selection::Standby,
            }
        };
        verdicts.insert(record.number, verdict);
    }

    // min-links: a LAG below its floor carries no traffic at all
    let selected_count = verdicts.values().filter(|v| **v == Selection::Selected).count();
    if selected_count < agg.min_links as usize {
        for verdict in verdicts.values_mut() {
            if *verdict == Selection::Selected {
                *verdict = Selection::Standby;
            }
        }
        debug!(
            agg = agg.id,
            selected = selected_count,
            min_links = agg.min_links,
            "below min-links, members held in standby"
        );
    }

    // rebuild membership; ready_N survives as long as the port stays
    // associated (a standby port promoted to selected must not wait again)
    state.members = verdicts
        .iter()
        .map(|(&number, &selection)| {
            let old = old_members.get(&number);
            (
                number,
                MemberState {
                    selection,
                    ready_n: old.map(|m| m.ready_n).unwrap_or(false),
                    attached: old.map(|m| m.attached).unwrap_or(false),
                },
            )
        })
        .collect();

    // learn the partner from the selected membership
    let learned = candidates
        .iter()
        .find(|r| verdicts.get(&r.number) == Some(&Selection::Selected));
    match learned {
        Some(r) => {
            state.partner_system = r.partner_system;
            state.partner_oper_key = r.partner_oper_key;
            state.oper_properties = Some(r.properties);
        }
        None => {
            state.partner_system = SystemId::ZERO;
            state.partner_oper_key = 0;
            state.oper_properties = None;
        }
    }

    state.ready = state.compute_ready();

    // deliver changed verdicts
    for record in &candidates {
        let selection = verdicts[&record.number];
        if record.selection != selection || record.agg_id != agg.id {
            registry.update_selection(record.number, selection, agg.id);
            registry.send_to_port(
                record.number,
                PortEvent::Selection(SelectionVerdict {
                    selection,
                    agg_id: agg.id,
                    agg_ready: AggState::ready_excluding(&old_members, record.number),
                }),
            );
        }
    }

    // ports that fell out of the membership entirely
    for (&number, _) in &old_members {
        if !state.members.contains_key(&number) {
            registry.update_selection(number, Selection::Unselected, 0);
            registry.send_to_port(
                number,
                PortEvent::Selection(SelectionVerdict {
                    selection: Selection::Unselected,
                    agg_id: 0,
                    agg_ready: false,
                }),
            );
        }
    }

    if state.ready && !old_ready {
        notify_ready(system, &state.members);
    }
}

/// Marks `port` ready and, once the whole selected membership is ready,
/// releases everyone from WAITING.
pub(crate) async fn evaluate_ready(system: &LacpSystem, agg_id: u32, port: u16) {
    if agg_id == 0 {
        return;
    }
    let Some(agg) = system.registry().aggregator(agg_id) else {
        return;
    };

    let mut state = agg.state.lock().await;
    match state.members.get_mut(&port) {
        Some(member) => member.ready_n = true,
        None => return,
    }

    let was_ready = state.ready;
    state.ready = state.compute_ready();
    if state.ready {
        if !was_ready {
            notify_ready(system, &state.members);
        } else {
            // a late joiner skipping its wait only needs its own gate opened
            system.registry().send_to_port(port, PortEvent::AggregatorReady);
        }
    }
}

fn notify_ready(system: &LacpSystem, members: &BTreeMap<u16, MemberState>) {
    for (&number, member) in members {
        if member.selection == Selection::Selected {
            system
                .registry()
                .send_to_port(number, PortEvent::AggregatorReady);
        }
    }
}

/// The partner tuple joining ports must match. Sticky: the partner learned
/// from the standing selected membership wins; otherwise the lowest
/// numbered aggregatable candidate sets it.
struct Reference {
    partner_system: SystemId,
    partner_oper_key: u16,
    properties: PortProperties,
}

fn pick_reference(
    sticky_system: &SystemId,
    sticky_key: u16,
    candidates: &[PortRecord],
) -> Option<Reference> {
    if !sticky_system.is_zero() {
        if let Some(keeper) = candidates.iter().find(|r| {
            r.selection == Selection::Selected
                && r.partner_system == *sticky_system
                && r.partner_oper_key == sticky_key
        }) {
            return Some(Reference {
                partner_system: *sticky_system,
                partner_oper_key: sticky_key,
                properties: keeper.properties,
            });
        }
    }

    candidates
        .iter()
        .find(|r| r.aggregatable && r.partner_aggregatable)
        .map(|r| Reference {
            partner_system: r.partner_system,
            partner_oper_key: r.partner_oper_key,
            properties: r.properties,
        })
}
