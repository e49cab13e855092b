//! Component parser: one `<atom>` element into a [`Component`].
//!
//! Children are read in document order. A child with a bad or missing
//! attribute is logged and skipped; only an atom without a `name` fails.

use std::collections::HashSet;

use serde_json::Value;
use tracing::{debug, warn};

use super::model::{CachePolicy, Component, Source};
use crate::dom::{Document, ElementData, NodeId};
use crate::error::{DataError, ParseError};
use crate::event::action::Action;
use crate::event::binding::{EventBinding, DEFAULT_TRIGGER};
use crate::net::Method;
use crate::rules::{parse_rules, Rule, RuleKind};
use crate::runtime::RuntimeConfig;
use crate::store::{PersistTarget, Schema};

pub const SOURCE_TAG: &str = "proton";
pub const RULE_TAG: &str = "neutron";
pub const EVENT_TAG: &str = "electron";

/// Parse every component root in `doc`, in document order.
///
/// Returns the components that parsed and every error met on the way,
/// including child errors of components that did parse.
pub fn parse_components(doc: &Document, config: &RuntimeConfig) -> (Vec<Component>, Vec<ParseError>) {
    let mut components = Vec::new();
    let mut errors = Vec::new();
    for atom in doc.query_by_tag(&config.root_tag) {
        match parse_atom(doc, atom, config, &mut errors) {
            Ok(component) => components.push(component),
            Err(err) => {
                warn!(%err, "skipping component");
                errors.push(err);
            }
        }
    }
    (components, errors)
}

/// Parse the component rooted at `atom`. Child errors go to `diagnostics`.
pub fn parse_atom(
    doc: &Document,
    atom: NodeId,
    config: &RuntimeConfig,
    diagnostics: &mut Vec<ParseError>,
) -> Result<Component, ParseError> {
    let element = doc
        .element(atom)
        .ok_or_else(|| ParseError::UnexpectedEof("component root is not an element".into()))?;
    let name = element
        .non_empty_attribute("name")
        .ok_or_else(|| missing(&config.root_tag, "name"))?
        .to_string();

    let mut sources = Vec::new();
    let mut rules = Vec::new();
    let mut events = Vec::new();

    for node in owned_children(doc, atom, &config.root_tag) {
        let Some(child) = doc.element(node) else { continue };
        let parsed = match child.tag.as_str() {
            SOURCE_TAG => parse_source(child, &doc.text_content(node)).map(|s| sources.push(s)),
            RULE_TAG => {
                parse_rule(child, rules.len(), &doc.text_content(node)).map(|r| rules.push(r))
            }
            EVENT_TAG => parse_event(child, events.len(), config.default_method).map(|e| events.push(e)),
            _ => Ok(()),
        };
        if let Err(err) = parsed {
            warn!(component = %name, %err, "skipping child element");
            diagnostics.push(err);
        }
    }

    warn_duplicate_ids(&name, &sources, &rules, &events);

    let component = Component::new(name, sources, rules, events);
    if component.metrics.needs_advisory() {
        warn!(
            component = %component.name,
            sources = component.metrics.source_count,
            rules = component.metrics.rule_count,
            stability = component.metrics.stability,
            "component has more data sources than rules"
        );
    }
    debug!(component = %component.name, metrics = ?component.metrics, "parsed component");
    Ok(component)
}

/// Descendants of `atom` whose nearest component root is `atom` itself.
fn owned_children(doc: &Document, atom: NodeId, root_tag: &str) -> Vec<NodeId> {
    doc.walk_depth_first(atom)
        .into_iter()
        .skip(1)
        .filter(|&node| {
            doc.ancestors(node)
                .into_iter()
                .find(|&a| doc.element(a).is_some_and(|e| e.tag == root_tag))
                == Some(atom)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Children
// ---------------------------------------------------------------------------

/// Parse a `proton`. `body` is its text content.
pub fn parse_source(element: &ElementData, body: &str) -> Result<Source, ParseError> {
    let id = element
        .non_empty_attribute("id")
        .ok_or_else(|| missing(SOURCE_TAG, "id"))?;
    let mut source = Source::new(id);

    if let Some(uri) = element.non_empty_attribute("source") {
        source.remote = Some(uri.to_string());
    }
    if let Some(key) = element.non_empty_attribute("key") {
        source.key = key.to_string();
    }
    if let Some(cache) = element.attribute("cache") {
        source.cache = cache
            .parse::<CachePolicy>()
            .map_err(|_| invalid(SOURCE_TAG, "cache", cache))?;
    }
    if let Some(persist) = element.attribute("persist") {
        source.persist = persist
            .parse::<PersistTarget>()
            .map_err(|_| invalid(SOURCE_TAG, "persist", persist))?;
    }
    if let Some(schema) = element.non_empty_attribute("schema") {
        source.schema = Some(
            schema
                .parse::<Schema>()
                .map_err(|_| invalid(SOURCE_TAG, "schema", schema))?,
        );
    }
    if let Some(fallback) = element.attribute("fallback") {
        source.fallback = Some(
            serde_json::from_str(fallback).map_err(|_| invalid(SOURCE_TAG, "fallback", fallback))?,
        );
    }
    if let Some(expression) = element.non_empty_attribute("computed") {
        source.computed = Some(expression.to_string());
    }

    let body = body.trim();
    if !body.is_empty() {
        match serde_json::from_str::<Value>(body) {
            Ok(value) => source.inline = Some(value),
            Err(err) => {
                let err = DataError::InvalidJson {
                    name: source.id.clone(),
                    message: err.to_string(),
                };
                warn!(%err, "ignoring inline data");
            }
        }
    }

    Ok(source)
}

/// Parse a `neutron`. `index` is its position among the atom's rules.
pub fn parse_rule(element: &ElementData, index: usize, body: &str) -> Result<Rule, ParseError> {
    let kind_text = element
        .non_empty_attribute("type")
        .ok_or_else(|| missing(RULE_TAG, "type"))?;
    let kind = kind_text
        .parse::<RuleKind>()
        .map_err(|_| invalid(RULE_TAG, "type", kind_text))?;
    let id = element
        .non_empty_attribute("id")
        .map_or_else(|| format!("{kind}-{index}"), str::to_string);
    Ok(Rule::new(id, parse_rules(kind, body)))
}

/// Parse an `electron`. `index` is its position among the atom's events.
pub fn parse_event(
    element: &ElementData,
    index: usize,
    default_method: Method,
) -> Result<EventBinding, ParseError> {
    let id = element
        .non_empty_attribute("id")
        .map_or_else(|| format!("{EVENT_TAG}-{index}"), str::to_string);
    let action = element
        .non_empty_attribute("action")
        .map_or_else(|| Action::Unsupported(String::new()), Action::parse);

    let mut binding = EventBinding::new(id, action).with_method(default_method);
    binding.trigger = element
        .non_empty_attribute("trigger")
        .unwrap_or(DEFAULT_TRIGGER)
        .to_string();
    if let Some(method) = element.non_empty_attribute("method") {
        binding.method = method
            .parse::<Method>()
            .map_err(|_| invalid(EVENT_TAG, "method", method))?;
    }

    let optional = |name: &str| element.non_empty_attribute(name).map(str::to_string);
    binding.endpoint = optional("endpoint");
    binding.redirect = optional("redirect");
    binding.bond = optional("bond");
    binding.emit = optional("emit");
    binding.listen = optional("listen");

    // Without an explicit action, a binding that names a signal emits it.
    if binding.action == Action::Unsupported(String::new()) && binding.emit.is_some() {
        binding.action = Action::Emit;
    }
    Ok(binding)
}

fn warn_duplicate_ids(component: &str, sources: &[Source], rules: &[Rule], events: &[EventBinding]) {
    let mut seen = HashSet::new();
    let ids = sources
        .iter()
        .map(|s| s.id.as_str())
        .chain(rules.iter().map(|r| r.id.as_str()))
        .chain(events.iter().map(|e| e.id.as_str()));
    for id in ids {
        if !seen.insert(id) {
            warn!(%component, %id, "duplicate id within component");
        }
    }
}

fn missing(element: &str, attribute: &str) -> ParseError {
    ParseError::MissingAttribute {
        element: element.to_string(),
        attribute: attribute.to_string(),
    }
}

fn invalid(element: &str, attribute: &str, value: &str) -> ParseError {
    ParseError::InvalidAttribute {
        element: element.to_string(),
        attribute: attribute.to_string(),
        value: value.to_string(),
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::parse_document;
    use crate::rules::{Check, RuleSet};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn parse(markup: &str) -> (Vec<Component>, Vec<ParseError>) {
        let doc = parse_document(markup);
        parse_components(&doc, &RuntimeConfig::default())
    }

    fn single(markup: &str) -> Component {
        let (mut components, errors) = parse(markup);
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
        assert_eq!(components.len(), 1);
        components.remove(0)
    }

    const SIGNUP: &str = r#"
        <atom name="signup">
          <proton id="users" source="/api/users" cache="session" persist="durable"
                  fallback="[]" schema="array"></proton>
          <proton id="email" key="signup.email">""</proton>
          <proton id="active-users" computed="users.filter(active=true)"></proton>
          <neutron id="checks" type="validate">
            email: required, email-format
            password: required, minLength(8)
          </neutron>
          <electron id="send" trigger="click" action="submit" endpoint="/api/signup"
                    method="PUT" redirect="/welcome" bond="header" emit="signed-up">
          </electron>
          <electron trigger="signal" action="validate" bond="header"
                    listen="user-changed"></electron>
        </atom>
    "#;

    // ── Full component ───────────────────────────────────────────────

    #[test]
    fn signup_component() {
        let c = single(SIGNUP);
        assert_eq!(c.name, "signup");

        let ids: Vec<_> = c.sources.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["users", "email", "active-users"]);

        let users = c.source("users").unwrap();
        assert_eq!(users.remote.as_deref(), Some("/api/users"));
        assert_eq!(users.cache, CachePolicy::Session);
        assert_eq!(users.persist, PersistTarget::Durable);
        assert_eq!(users.fallback, Some(json!([])));
        assert_eq!(users.schema, Some(Schema::Array));
        assert!(users.is_remote());

        let email = c.source("email").unwrap();
        assert_eq!(email.key, "signup.email");
        assert_eq!(email.inline, Some(json!("")));

        let active = c.source("active-users").unwrap();
        assert_eq!(active.computed.as_deref(), Some("users.filter(active=true)"));

        assert_eq!(c.rules.len(), 1);
        assert_eq!(c.rules[0].id, "checks");
        let checks = c.rules[0].checks().unwrap();
        assert_eq!(checks[1].checks, vec![Check::Required, Check::MinLength(8)]);

        let send = &c.events[0];
        assert_eq!(send.action, Action::Submit);
        assert_eq!(send.method, Method::Put);
        assert_eq!(send.endpoint.as_deref(), Some("/api/signup"));
        assert_eq!(send.redirect.as_deref(), Some("/welcome"));

        let refresh = &c.events[1];
        assert_eq!(refresh.id, "electron-1");
        assert_eq!(refresh.trigger, "signal");
        assert_eq!(refresh.listen.as_deref(), Some("user-changed"));
    }

    #[test]
    fn signup_metrics_and_bonds() {
        let c = single(SIGNUP);
        assert_eq!(c.metrics.source_count, 3);
        assert_eq!(c.metrics.rule_count, 1);
        assert_eq!(c.metrics.combined_weight, 4);
        assert!(c.metrics.needs_advisory());

        let bonds: Vec<String> = c.bonds().iter().map(ToString::to_string).collect();
        assert_eq!(
            bonds,
            vec![
                "signup -[emits signed-up]-> header",
                "header -[listens user-changed]-> signup",
            ]
        );
    }

    // ── Defaults ─────────────────────────────────────────────────────

    #[test]
    fn default_ids_trigger_and_method() {
        let c = single(
            r#"<atom name="a">
                 <neutron type="compute">total = items.count</neutron>
                 <neutron type="transform">name: trim</neutron>
                 <electron action="save" endpoint="/x"></electron>
               </atom>"#,
        );
        let rule_ids: Vec<_> = c.rules.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(rule_ids, vec!["compute-0", "transform-1"]);
        assert_eq!(c.events[0].id, "electron-0");
        assert_eq!(c.events[0].trigger, "click");
        assert_eq!(c.events[0].method, Method::Post);
        assert_eq!(c.events[0].action, Action::Submit);
    }

    #[test]
    fn configured_default_method() {
        let doc = parse_document(r#"<atom name="a"><electron action="submit"></electron></atom>"#);
        let config = RuntimeConfig::default().with_default_method(Method::Patch);
        let (components, _) = parse_components(&doc, &config);
        assert_eq!(components[0].events[0].method, Method::Patch);
    }

    #[test]
    fn missing_action_with_emit_becomes_emit() {
        let c = single(r#"<atom name="a"><electron emit="ping"></electron><electron></electron></atom>"#);
        assert_eq!(c.events[0].action, Action::Emit);
        assert_eq!(c.events[1].action, Action::Unsupported(String::new()));
    }

    #[test]
    fn unknown_action_is_kept() {
        let c = single(r#"<atom name="a"><electron action="explode"></electron></atom>"#);
        assert_eq!(c.events[0].action, Action::Unsupported("explode".into()));
    }

    // ── Errors ───────────────────────────────────────────────────────

    #[test]
    fn atom_without_name_fails_alone() {
        let (components, errors) = parse(
            r#"<atom><proton id="x"></proton></atom>
               <atom name="ok"></atom>"#,
        );
        assert_eq!(components.len(), 1);
        assert_eq!(components[0].name, "ok");
        assert_eq!(
            errors,
            vec![ParseError::MissingAttribute {
                element: "atom".into(),
                attribute: "name".into(),
            }]
        );
    }

    #[test]
    fn bad_children_are_skipped() {
        let (components, errors) = parse(
            r#"<atom name="a">
                 <proton></proton>
                 <proton id="bad-cache" cache="forever"></proton>
                 <proton id="bad-fallback" fallback="[oops"></proton>
                 <neutron id="no-type"></neutron>
                 <neutron type="script"></neutron>
                 <electron method="TRACE"></electron>
                 <proton id="good"></proton>
               </atom>"#,
        );
        assert_eq!(errors.len(), 6);
        let c = &components[0];
        assert_eq!(c.sources.len(), 1);
        assert_eq!(c.sources[0].id, "good");
        assert!(c.rules.is_empty());
        assert!(c.events.is_empty());
    }

    #[test]
    fn invalid_inline_json_is_dropped() {
        let c = single(r#"<atom name="a"><proton id="x">{not json</proton></atom>"#);
        assert_eq!(c.sources[0].inline, None);
    }

    // ── Structure ────────────────────────────────────────────────────

    #[test]
    fn nested_wrappers_and_unknown_elements() {
        let c = single(
            r#"<atom name="a">
                 <div class="wrap"><proton id="inner">[1]</proton></div>
                 <span>ignored</span>
               </atom>"#,
        );
        assert_eq!(c.sources.len(), 1);
        assert_eq!(c.sources[0].inline, Some(json!([1])));
    }

    #[test]
    fn nested_atoms_own_their_children() {
        let (components, errors) = parse(
            r#"<atom name="outer">
                 <proton id="a"></proton>
                 <atom name="inner"><proton id="b"></proton></atom>
               </atom>"#,
        );
        assert!(errors.is_empty());
        let names: Vec<_> = components.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["outer", "inner"]);
        assert_eq!(components[0].sources.len(), 1);
        assert_eq!(components[0].sources[0].id, "a");
        assert_eq!(components[1].sources[0].id, "b");
    }

    #[test]
    fn rule_body_kept_verbatim() {
        let c = single(
            r#"<atom name="a"><neutron type="compute">
                 open = tasks.filter(status=open)
               </neutron></atom>"#,
        );
        match &c.rules[0].set {
            RuleSet::Compute(fields) => {
                assert_eq!(fields[0].expression, "tasks.filter(status=open)");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
