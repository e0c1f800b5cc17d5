//! Decoding of GENA `<e:propertyset>` notification bodies.

use tracing::{trace, warn};
use xmltree::{Element, XMLNode};

/// A raw `(name, value)` pair from a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyChange {
    pub name: String,
    pub value: String,
}

impl PropertyChange {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Parse a property set into changes, in document order.
///
/// `LastChange` properties holding an `<Event><InstanceID>` document are
/// expanded into one change per state variable. A malformed body yields no
/// changes; a malformed `LastChange` is kept as a single raw change.
pub fn parse_property_set(xml: &str) -> Vec<PropertyChange> {
    let root = match Element::parse(xml.as_bytes()) {
        Ok(root) => root,
        Err(e) => {
            warn!(error = %e, "Dropping malformed event notification");
            return Vec::new();
        }
    };

    let mut changes = Vec::new();
    for property in child_elements(&root).filter(|e| e.name == "property") {
        for variable in child_elements(property) {
            let value = text_of(variable);
            if variable.name == "LastChange" {
                match expand_last_change(&value) {
                    Some(expanded) => changes.extend(expanded),
                    None => {
                        trace!("LastChange payload not expandable, passing through");
                        changes.push(PropertyChange::new("LastChange", value));
                    }
                }
            } else {
                changes.push(PropertyChange::new(variable.name.clone(), value));
            }
        }
    }

    changes
}

/// Expand `<Event><InstanceID val=".."><Var val=".."/>..</InstanceID></Event>`.
///
/// Channel-scoped variables are kept only for the `Master` channel.
fn expand_last_change(xml: &str) -> Option<Vec<PropertyChange>> {
    let event = Element::parse(xml.trim().as_bytes()).ok()?;
    if event.name != "Event" {
        return None;
    }

    let mut changes = Vec::new();
    for instance in child_elements(&event).filter(|e| e.name == "InstanceID") {
        for variable in child_elements(instance) {
            let on_master = variable
                .attributes
                .get("channel")
                .map_or(true, |channel| channel == "Master");
            if !on_master {
                continue;
            }

            let value = variable.attributes.get("val").cloned().unwrap_or_default();
            changes.push(PropertyChange::new(variable.name.clone(), value));
        }
    }

    Some(changes)
}

fn child_elements(element: &Element) -> impl Iterator<Item = &Element> {
    element.children.iter().filter_map(XMLNode::as_element)
}

fn text_of(element: &Element) -> String {
    element.get_text().map(|t| t.into_owned()).unwrap_or_default()
}
