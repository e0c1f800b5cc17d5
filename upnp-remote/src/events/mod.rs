//! Event model for pushed state changes.
//!
//! Notification bodies are decoded into [`PropertyChange`]s, which the
//! [`EventTransforms`] table turns into typed [`Event`]s.

mod metadata;
mod property_set;
mod transform;

pub use metadata::TrackMetadata;
pub use property_set::{parse_property_set, PropertyChange};
pub use transform::{parse_list, parse_time, EventTransforms, TransformFn};

use std::fmt;

/// Names of the state variables this crate knows about.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventName {
    TransportState,
    CurrentTrackMetaData,
    CurrentURIMetaData,
    CurrentTrackURI,
    CurrentMediaDuration,
    CurrentTrackDuration,
    CurrentTransportActions,
    PossiblePlaybackStorageMedia,
    Volume,
    Mute,
    /// A `LastChange` payload that could not be expanded
    LastChange,
    Other(String),
}

impl EventName {
    pub fn parse(name: &str) -> Self {
        match name {
            "TransportState" => Self::TransportState,
            "CurrentTrackMetaData" => Self::CurrentTrackMetaData,
            "CurrentURIMetaData" => Self::CurrentURIMetaData,
            "CurrentTrackURI" => Self::CurrentTrackURI,
            "CurrentMediaDuration" => Self::CurrentMediaDuration,
            "CurrentTrackDuration" => Self::CurrentTrackDuration,
            "CurrentTransportActions" => Self::CurrentTransportActions,
            "PossiblePlaybackStorageMedia" => Self::PossiblePlaybackStorageMedia,
            "Volume" => Self::Volume,
            "Mute" => Self::Mute,
            "LastChange" => Self::LastChange,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::TransportState => "TransportState",
            Self::CurrentTrackMetaData => "CurrentTrackMetaData",
            Self::CurrentURIMetaData => "CurrentURIMetaData",
            Self::CurrentTrackURI => "CurrentTrackURI",
            Self::CurrentMediaDuration => "CurrentMediaDuration",
            Self::CurrentTrackDuration => "CurrentTrackDuration",
            Self::CurrentTransportActions => "CurrentTransportActions",
            Self::PossiblePlaybackStorageMedia => "PossiblePlaybackStorageMedia",
            Self::Volume => "Volume",
            Self::Mute => "Mute",
            Self::LastChange => "LastChange",
            Self::Other(name) => name,
        }
    }

    /// Whether the value is a DIDL-Lite item description.
    pub fn is_metadata(&self) -> bool {
        matches!(self, Self::CurrentTrackMetaData | Self::CurrentURIMetaData)
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value of a state variable after transformation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventValue {
    Text(String),
    /// A duration in whole seconds
    Seconds(u64),
    List(Vec<String>),
}

impl EventValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl fmt::Display for EventValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Seconds(seconds) => write!(f, "{seconds}"),
            Self::List(items) => f.write_str(&items.join(",")),
        }
    }
}

/// One changed state variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub name: EventName,
    pub value: EventValue,
}

impl Event {
    pub fn new(name: EventName, value: EventValue) -> Self {
        Self { name, value }
    }

    pub fn text(name: &str, value: impl Into<String>) -> Self {
        Self::new(EventName::parse(name), EventValue::Text(value.into()))
    }
}
