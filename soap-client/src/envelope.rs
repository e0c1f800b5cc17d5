//! SOAP envelope encoding and decoding.
//!
//! Builds action-invocation envelopes and pulls the action response or the
//! UPnP fault out of a device reply.

use quick_xml::escape::escape;
use xmltree::{Element, XMLNode};

use crate::error::SoapError;

/// SOAP 1.1 envelope namespace.
pub const ENVELOPE_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
/// SOAP 1.1 encoding style.
pub const ENCODING_STYLE: &str = "http://schemas.xmlsoap.org/soap/encoding/";

/// Fault details carried in a `<s:Fault><detail><UPnPError>` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpnpFault {
    /// Numeric `errorCode`
    pub error_code: u32,
    /// `errorDescription`, empty when the device sent none
    pub error_description: String,
}

/// Build the envelope for `action` on `service_type`.
///
/// One child element is written per argument, in slice order. A `None`
/// value is written as an empty element. Values are XML-escaped.
pub fn build_envelope(service_type: &str, action: &str, args: &[(&str, Option<&str>)]) -> String {
    let mut body = format!(
        r#"<s:Envelope xmlns:s="{ENVELOPE_NS}" s:encodingStyle="{ENCODING_STYLE}"><s:Body><u:{action} xmlns:u="{}">"#,
        escape(service_type)
    );

    for (name, value) in args {
        body.push_str(&format!("<{name}>{}</{name}>", escape(value.unwrap_or(""))));
    }

    body.push_str(&format!("</u:{action}></s:Body></s:Envelope>"));
    body
}

/// Extract `<{action}Response>` from a reply body.
///
/// A fault inside a success response is still reported as
/// `SoapError::Fault` with the given `http_status`.
pub fn parse_action_response(xml: &str, action: &str, http_status: u16) -> Result<Element, SoapError> {
    let envelope = Element::parse(xml.as_bytes()).map_err(|e| SoapError::Parse(e.to_string()))?;

    let body = envelope
        .get_child("Body")
        .ok_or_else(|| SoapError::Parse("Missing SOAP Body".to_string()))?;

    if let Some(fault) = body.get_child("Fault") {
        return match fault_details(fault) {
            Some(fault) => Err(SoapError::Fault {
                http_status,
                error_code: fault.error_code,
                error_description: fault.error_description,
            }),
            None => Err(SoapError::Parse("Fault without UPnPError detail".to_string())),
        };
    }

    let response_name = format!("{action}Response");
    body.get_child(response_name.as_str())
        .cloned()
        .ok_or_else(|| SoapError::Parse(format!("Missing {response_name} element")))
}

/// Parse a fault envelope. Returns `None` for anything that is not a
/// well-formed fault with a numeric `errorCode`.
pub fn parse_fault(xml: &str) -> Option<UpnpFault> {
    let envelope = Element::parse(xml.as_bytes()).ok()?;
    let fault = envelope.get_child("Body")?.get_child("Fault")?;
    fault_details(fault)
}

/// Text of the named child, `""` for an empty element, `None` if absent.
pub fn child_text(element: &Element, name: &str) -> Option<String> {
    element
        .get_child(name)
        .map(|child| child.get_text().map(|t| t.into_owned()).unwrap_or_default())
}

fn fault_details(fault: &Element) -> Option<UpnpFault> {
    let detail = fault.get_child("detail")?;

    // Devices disagree on the casing of UPnPError.
    let error = detail.children.iter().find_map(|node| match node {
        XMLNode::Element(e) if e.name.eq_ignore_ascii_case("UPnPError") => Some(e),
        _ => None,
    })?;

    let error_code = child_text(error, "errorCode")?.trim().parse::<u32>().ok()?;
    let error_description = child_text(error, "errorDescription").unwrap_or_default();

    Some(UpnpFault {
        error_code,
        error_description,
    })
}
