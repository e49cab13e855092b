//! Snapshot helpers.
//!
//! Plain-text renderings of runtime state, stable across runs, for
//! `insta` snapshots and assertions.

use std::fmt::Write;

use crate::component::Component;
use crate::store::DataStore;

/// Every collection as `name = <compact JSON>`, one per line, sorted by name.
pub fn store_to_string(store: &DataStore) -> String {
    store
        .snapshot()
        .iter()
        .map(|(name, value)| format!("{name} = {value}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Outline of a component: metrics, then sources, rules and events in order.
pub fn component_to_string(component: &Component) -> String {
    let m = &component.metrics;
    let mut out = format!(
        "atom {} (sources={}, rules={}, weight={}, stability={:.2})",
        component.name, m.source_count, m.rule_count, m.combined_weight, m.stability
    );

    for source in &component.sources {
        let origin = match (&source.computed, &source.remote) {
            (Some(expression), _) => format!("computed {expression}"),
            (None, Some(url)) => format!("remote {url}"),
            (None, None) => "local".to_string(),
        };
        let _ = write!(out, "\n  proton {}: {origin}", source.id);
    }
    for rule in &component.rules {
        let _ = write!(out, "\n  neutron {}: {} ({} lines)", rule.id, rule.kind(), rule.set.len());
    }
    for event in &component.events {
        let _ = write!(out, "\n  electron {}: {} -> {}", event.id, event.trigger, event.action);
        if let Some(signal) = &event.listen {
            let _ = write!(out, " [listen {signal}]");
        }
        if let Some(signal) = &event.emit {
            let _ = write!(out, " [emit {signal}]");
        }
    }
    out
}
