//! Name-keyed value transforms applied to raw property changes.

use std::collections::HashMap;
use std::fmt;

use super::{Event, EventName, EventValue, PropertyChange};

/// Converts a raw value into a typed one.
pub type TransformFn = fn(&str) -> EventValue;

/// Lookup table from state-variable name to transform.
///
/// Names without an entry keep their raw text.
#[derive(Clone)]
pub struct EventTransforms {
    table: HashMap<String, TransformFn>,
}

impl Default for EventTransforms {
    fn default() -> Self {
        let mut transforms = Self::empty();
        transforms
            .register("CurrentMediaDuration", parse_time)
            .register("CurrentTrackDuration", parse_time)
            .register("CurrentTransportActions", parse_list)
            .register("PossiblePlaybackStorageMedia", parse_list);
        transforms
    }
}

impl fmt::Debug for EventTransforms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.table.keys().collect();
        names.sort();
        f.debug_struct("EventTransforms").field("names", &names).finish()
    }
}

impl EventTransforms {
    /// A table with no transforms at all.
    pub fn empty() -> Self {
        Self {
            table: HashMap::new(),
        }
    }

    /// Add or replace the transform for `name`.
    pub fn register(&mut self, name: impl Into<String>, transform: TransformFn) -> &mut Self {
        self.table.insert(name.into(), transform);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table.contains_key(name)
    }

    pub fn apply(&self, change: PropertyChange) -> Event {
        let value = match self.table.get(&change.name) {
            Some(transform) => transform(&change.value),
            None => EventValue::Text(change.value),
        };

        Event::new(EventName::parse(&change.name), value)
    }
}

/// Parse `H:MM:SS` (fractional seconds allowed) into whole seconds.
///
/// An empty value is zero; anything else unparsable stays text
/// (renderers send `NOT_IMPLEMENTED` for streams).
pub fn parse_time(value: &str) -> EventValue {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return EventValue::Seconds(0);
    }

    hms_seconds(trimmed)
        .map(EventValue::Seconds)
        .unwrap_or_else(|| EventValue::Text(value.to_string()))
}

fn hms_seconds(value: &str) -> Option<u64> {
    let mut parts = value.split(':');
    let hours: u64 = parts.next()?.trim().parse().ok()?;
    let minutes: u64 = parts.next()?.trim().parse().ok()?;
    let seconds: f64 = parts.next()?.trim().parse().ok()?;
    if parts.next().is_some() || !seconds.is_finite() || seconds < 0.0 {
        return None;
    }

    hours
        .checked_mul(3600)?
        .checked_add(minutes.checked_mul(60)?)?
        .checked_add(seconds.trunc() as u64)
}

/// Split a comma-separated list, dropping empty entries.
pub fn parse_list(value: &str) -> EventValue {
    EventValue::List(
        value
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect(),
    )
}
