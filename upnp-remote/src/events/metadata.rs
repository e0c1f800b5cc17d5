//! DIDL-Lite track metadata.

use soap_client::envelope::child_text;
use xmltree::Element;

/// Track fields carried in a DIDL-Lite `<item>`.
///
/// Parsing never fails: anything unexpected leaves every field `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackMetadata {
    pub album: Option<String>,
    pub album_art_uri: Option<String>,
    pub artist: Option<String>,
    pub title: Option<String>,
}

impl TrackMetadata {
    pub fn parse(xml: &str) -> Self {
        Self::try_parse(xml).unwrap_or_default()
    }

    fn try_parse(xml: &str) -> Option<Self> {
        let root = Element::parse(xml.trim().as_bytes()).ok()?;
        if root.name != "DIDL-Lite" {
            return None;
        }
        let item = root.get_child("item")?;

        Some(Self {
            album: child_text(item, "album"),
            album_art_uri: child_text(item, "albumArtURI"),
            artist: child_text(item, "artist"),
            title: child_text(item, "title"),
        })
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}
