//! Action invocation.

use std::fmt;
use std::sync::Arc;

use soap_client::envelope::child_text;
use soap_client::SoapClient;
use tracing::debug;
use xmltree::Element;

use crate::description::{ActionSpec, DescriptionFetcher};
use crate::error::{ClientError, Result};
use crate::service_id::ServiceId;

/// Ordered arguments for an action call.
///
/// A value set with [`null`](Self::null) is sent as an empty element; an
/// argument never added (or added through [`arg_opt`](Self::arg_opt) with
/// `None`) is not sent at all.
///
/// ```
/// use upnp_remote::ActionArgs;
///
/// let args = ActionArgs::new()
///     .arg("InstanceID", 0)
///     .arg("CurrentURI", "x-rincon-mp3radio://example")
///     .null("CurrentURIMetaData");
/// assert_eq!(args.len(), 3);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionArgs {
    args: Vec<(String, Option<String>)>,
}

impl ActionArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arg(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.args.push((name.into(), Some(value.to_string())));
        self
    }

    /// Send `name` as an empty element.
    pub fn null(mut self, name: impl Into<String>) -> Self {
        self.args.push((name.into(), None));
        self
    }

    /// Add `name` only when `value` is `Some`.
    pub fn arg_opt<T: ToString>(self, name: impl Into<String>, value: Option<T>) -> Self {
        match value {
            Some(value) => self.arg(name, value),
            None => self,
        }
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.args.iter().map(|(n, v)| (n.as_str(), v.as_deref()))
    }
}

/// Output arguments of an action, in declared order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionResponse {
    values: Vec<(String, String)>,
}

impl ActionResponse {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn into_inner(self) -> Vec<(String, String)> {
        self.values
    }
}

impl fmt::Display for ActionResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, value) in &self.values {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{name}={value}")?;
            first = false;
        }
        Ok(())
    }
}

/// Keep only the declared outputs, in declared order.
///
/// Declared outputs missing from the response are left out.
pub(crate) fn extract_outputs(response: &Element, spec: &ActionSpec) -> ActionResponse {
    let values = spec
        .outputs
        .iter()
        .filter_map(|name| child_text(response, name).map(|value| (name.clone(), value)))
        .collect();

    ActionResponse { values }
}

pub(crate) struct ActionInvoker {
    soap: SoapClient,
    descriptions: Arc<DescriptionFetcher>,
}

impl ActionInvoker {
    pub fn new(soap: SoapClient, descriptions: Arc<DescriptionFetcher>) -> Self {
        Self { soap, descriptions }
    }

    pub async fn invoke(&self, service_id: &ServiceId, action: &str, args: &ActionArgs) -> Result<ActionResponse> {
        let description = self.descriptions.service_description(service_id).await?;
        let spec = description
            .action(action)
            .ok_or_else(|| ClientError::UnknownAction {
                service_id: service_id.clone(),
                action: action.to_string(),
            })?;
        let service = self.descriptions.service_ref(service_id).await?;

        let wire_args: Vec<(&str, Option<&str>)> = args.iter().collect();
        let element = self
            .soap
            .call(service.control_url.as_str(), &service.service_type, action, &wire_args)
            .await?;

        let response = extract_outputs(&element, spec);
        debug!(%service_id, action, %response, "Action completed");
        Ok(response)
    }
}
