//! Device and service description documents.
//!
//! The device description lists the services a renderer offers; each
//! service description (SCPD) lists its actions and their arguments. Both are
//! fetched lazily and cached for the lifetime of the client.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use soap_client::{SoapClient, SoapError};
use tokio::sync::RwLock;
use tracing::{debug, info};
use url::Url;

use crate::endpoint::EndpointSource;
use crate::error::{ClientError, Result};
use crate::service_id::ServiceId;

/// A service entry from the device description, with absolute URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRef {
    pub service_type: String,
    pub service_id: ServiceId,
    pub control_url: Url,
    pub event_sub_url: Url,
    pub scpd_url: Url,
}

/// Parsed device description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescription {
    /// URL that relative service URLs were resolved against
    pub base_url: Url,
    pub friendly_name: Option<String>,
    /// Services of the root device and all embedded devices
    pub services: HashMap<ServiceId, ServiceRef>,
}

impl DeviceDescription {
    /// Parse a device description fetched from `description_url`.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::DescriptionFetch` if the XML is malformed, lacks
    /// a `<device>`, or a service URL cannot be resolved.
    pub fn from_xml(xml: &str, description_url: &Url) -> Result<Self> {
        let fetch_error = |reason: String| ClientError::DescriptionFetch {
            url: description_url.to_string(),
            reason,
        };

        let root: RootXml = quick_xml::de::from_str(xml)
            .map_err(|e| fetch_error(format!("Failed to parse device XML: {e}")))?;

        let base_url = match root.url_base.as_deref().map(str::trim) {
            Some(base) if !base.is_empty() => {
                Url::parse(base).map_err(|e| fetch_error(format!("Invalid URLBase {base}: {e}")))?
            }
            _ => description_url.clone(),
        };

        let mut entries = Vec::new();
        root.device.collect_services(&mut entries);

        let mut services = HashMap::with_capacity(entries.len());
        for entry in entries {
            let resolve = |path: &str| {
                base_url
                    .join(path.trim())
                    .map_err(|e| fetch_error(format!("Invalid service URL {path}: {e}")))
            };

            let service_id = ServiceId::from(entry.service_id.trim());
            let service = ServiceRef {
                service_type: entry.service_type.trim().to_string(),
                service_id: service_id.clone(),
                control_url: resolve(&entry.control_url)?,
                event_sub_url: resolve(&entry.event_sub_url)?,
                scpd_url: resolve(&entry.scpd_url)?,
            };

            // First declaration wins when embedded devices repeat an id.
            services.entry(service_id).or_insert(service);
        }

        Ok(Self {
            base_url,
            friendly_name: root.device.friendly_name,
            services,
        })
    }

    pub fn service(&self, service_id: &ServiceId) -> Option<&ServiceRef> {
        self.services.get(service_id)
    }
}

/// Argument names of one action, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionSpec {
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
}

/// Parsed service description (SCPD).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceDescription {
    pub actions: HashMap<String, ActionSpec>,
}

impl ServiceDescription {
    /// Parse an SCPD document.
    ///
    /// Arguments whose `direction` is neither `in` nor `out` are ignored.
    pub fn from_xml(xml: &str, scpd_url: &Url) -> Result<Self> {
        let scpd: ScpdXml = quick_xml::de::from_str(xml).map_err(|e| ClientError::DescriptionFetch {
            url: scpd_url.to_string(),
            reason: format!("Failed to parse service XML: {e}"),
        })?;

        let actions = scpd
            .action_list
            .map(|list| list.actions)
            .unwrap_or_default()
            .into_iter()
            .map(|action| {
                let mut spec = ActionSpec::default();
                let arguments = action.argument_list.map(|l| l.arguments).unwrap_or_default();
                for argument in arguments {
                    let name = argument.name.trim().to_string();
                    match argument.direction.trim().to_ascii_lowercase().as_str() {
                        "in" => spec.inputs.push(name),
                        "out" => spec.outputs.push(name),
                        _ => {}
                    }
                }
                (action.name.trim().to_string(), spec)
            })
            .collect();

        Ok(Self { actions })
    }

    pub fn action(&self, name: &str) -> Option<&ActionSpec> {
        self.actions.get(name)
    }
}

#[derive(Debug, Deserialize)]
struct RootXml {
    #[serde(rename = "URLBase", default)]
    url_base: Option<String>,
    device: DeviceXml,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeviceXml {
    #[serde(default)]
    friendly_name: Option<String>,
    #[serde(default)]
    service_list: Option<ServiceListXml>,
    #[serde(default)]
    device_list: Option<DeviceListXml>,
}

impl DeviceXml {
    fn collect_services<'a>(&'a self, out: &mut Vec<&'a ServiceXml>) {
        if let Some(list) = &self.service_list {
            out.extend(list.services.iter());
        }
        if let Some(list) = &self.device_list {
            for device in &list.devices {
                device.collect_services(out);
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ServiceListXml {
    #[serde(rename = "service", default)]
    services: Vec<ServiceXml>,
}

#[derive(Debug, Deserialize)]
struct DeviceListXml {
    #[serde(rename = "device", default)]
    devices: Vec<DeviceXml>,
}

#[derive(Debug, Deserialize)]
struct ServiceXml {
    #[serde(rename = "serviceType")]
    service_type: String,
    #[serde(rename = "serviceId")]
    service_id: String,
    #[serde(rename = "controlURL")]
    control_url: String,
    #[serde(rename = "eventSubURL")]
    event_sub_url: String,
    #[serde(rename = "SCPDURL")]
    scpd_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScpdXml {
    #[serde(default)]
    action_list: Option<ActionListXml>,
}

#[derive(Debug, Deserialize)]
struct ActionListXml {
    #[serde(rename = "action", default)]
    actions: Vec<ActionXml>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActionXml {
    name: String,
    #[serde(default)]
    argument_list: Option<ArgumentListXml>,
}

#[derive(Debug, Deserialize)]
struct ArgumentListXml {
    #[serde(rename = "argument", default)]
    arguments: Vec<ArgumentXml>,
}

#[derive(Debug, Deserialize)]
struct ArgumentXml {
    name: String,
    #[serde(default)]
    direction: String,
}

/// Fetches and caches the device description and service descriptions.
///
/// Cache entries are written only after fetch and parse both succeed.
pub(crate) struct DescriptionFetcher {
    soap: SoapClient,
    endpoint: Arc<dyn EndpointSource>,
    description_path: String,
    device: RwLock<Option<Arc<DeviceDescription>>>,
    services: RwLock<HashMap<ServiceId, Arc<ServiceDescription>>>,
}

impl DescriptionFetcher {
    pub fn new(soap: SoapClient, endpoint: Arc<dyn EndpointSource>, description_path: String) -> Self {
        Self {
            soap,
            endpoint,
            description_path,
            device: RwLock::new(None),
            services: RwLock::new(HashMap::new()),
        }
    }

    pub async fn device_description(&self) -> Result<Arc<DeviceDescription>> {
        if let Some(device) = self.device.read().await.as_ref() {
            return Ok(device.clone());
        }

        let endpoint = self.endpoint.endpoint().ok_or(ClientError::MissingEndpoint)?;
        let url = endpoint.url(&self.description_path);
        let description_url = Url::parse(&url).map_err(|e| ClientError::DescriptionFetch {
            url: url.clone(),
            reason: e.to_string(),
        })?;

        let xml = self.fetch(&description_url).await?;
        let device = Arc::new(DeviceDescription::from_xml(&xml, &description_url)?);

        info!(
            url = %description_url,
            services = device.services.len(),
            "Device description loaded"
        );

        let mut cached = self.device.write().await;
        Ok(cached.get_or_insert(device).clone())
    }

    /// Look up a service, failing with `UnknownService` if the device lacks it.
    pub async fn service_ref(&self, service_id: &ServiceId) -> Result<ServiceRef> {
        self.device_description()
            .await?
            .service(service_id)
            .cloned()
            .ok_or_else(|| ClientError::UnknownService(service_id.clone()))
    }

    pub async fn has_service(&self, service_id: &ServiceId) -> Result<bool> {
        Ok(self.device_description().await?.service(service_id).is_some())
    }

    pub async fn service_description(&self, service_id: &ServiceId) -> Result<Arc<ServiceDescription>> {
        let service = self.service_ref(service_id).await?;

        if let Some(description) = self.services.read().await.get(service_id) {
            return Ok(description.clone());
        }

        let xml = self.fetch(&service.scpd_url).await?;
        let description = Arc::new(ServiceDescription::from_xml(&xml, &service.scpd_url)?);

        debug!(
            %service_id,
            actions = description.actions.len(),
            "Service description loaded"
        );

        let mut cached = self.services.write().await;
        Ok(cached.entry(service_id.clone()).or_insert(description).clone())
    }

    /// Forget both caches.
    pub async fn reset(&self) {
        self.device.write().await.take();
        self.services.write().await.clear();
    }

    async fn fetch(&self, url: &Url) -> Result<String> {
        self.soap.get_text(url.as_str()).await.map_err(|e| match e {
            SoapError::Timeout => ClientError::Timeout,
            other => ClientError::DescriptionFetch {
                url: url.to_string(),
                reason: other.to_string(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEVICE_XML: &str = r#"<?xml version="1.0"?>
<root xmlns="urn:schemas-upnp-org:device-1-0">
  <specVersion><major>1</major><minor>0</minor></specVersion>
  <device>
    <deviceType>urn:schemas-upnp-org:device:MediaRenderer:1</deviceType>
    <friendlyName>Kitchen</friendlyName>
    <iconList><icon><url>/icon.png</url></icon></iconList>
    <serviceList>
      <service>
        <serviceType>urn:schemas-upnp-org:service:RenderingControl:1</serviceType>
        <serviceId>urn:upnp-org:serviceId:RenderingControl</serviceId>
        <controlURL>/upnp/control/rendercontrol1</controlURL>
        <eventSubURL>/upnp/event/rendercontrol1</eventSubURL>
        <SCPDURL>/RenderingControl.xml</SCPDURL>
      </service>
    </serviceList>
    <deviceList>
      <device>
        <friendlyName>Kitchen Renderer</friendlyName>
        <serviceList>
          <service>
            <serviceType>urn:schemas-upnp-org:service:AVTransport:1</serviceType>
            <serviceId>urn:upnp-org:serviceId:AVTransport</serviceId>
            <controlURL>upnp/control/avtransport1</controlURL>
            <eventSubURL>http://10.0.0.9:1400/upnp/event/avtransport1</eventSubURL>
            <SCPDURL>/AVTransport.xml</SCPDURL>
          </service>
        </serviceList>
      </device>
    </deviceList>
  </device>
</root>"#;

    const SCPD_XML: &str = r#"<?xml version="1.0"?>
<scpd xmlns="urn:schemas-upnp-org:service-1-0">
  <specVersion><major>1</major><minor>0</minor></specVersion>
  <actionList>
    <action>
      <name>GetMediaInfo</name>
      <argumentList>
        <argument><name>InstanceID</name><direction>in</direction><relatedStateVariable>A_ARG_TYPE_InstanceID</relatedStateVariable></argument>
        <argument><name>NrTracks</name><direction>out</direction></argument>
        <argument><name>CurrentURI</name><direction>out</direction></argument>
        <argument><name>CurrentURIMetaData</name><direction>OUT</direction></argument>
      </argumentList>
    </action>
    <action>
      <name>Stop</name>
    </action>
  </actionList>
  <serviceStateTable>
    <stateVariable sendEvents="no"><name>A_ARG_TYPE_InstanceID</name><dataType>ui4</dataType></stateVariable>
  </serviceStateTable>
</scpd>"#;

    fn description_url() -> Url {
        Url::parse("http://10.0.0.5:49152/description.xml").unwrap()
    }

    #[test]
    fn test_device_from_xml_includes_embedded_devices() {
        let device = DeviceDescription::from_xml(DEVICE_XML, &description_url()).unwrap();

        assert_eq!(device.friendly_name.as_deref(), Some("Kitchen"));
        assert_eq!(device.services.len(), 2);

        let rendering = device.service(&ServiceId::resolve("RenderingControl")).unwrap();
        assert_eq!(
            rendering.control_url.as_str(),
            "http://10.0.0.5:49152/upnp/control/rendercontrol1"
        );
        assert_eq!(rendering.scpd_url.as_str(), "http://10.0.0.5:49152/RenderingControl.xml");

        let transport = device.service(&ServiceId::resolve("AVTransport")).unwrap();
        assert_eq!(transport.service_type, "urn:schemas-upnp-org:service:AVTransport:1");
        assert_eq!(
            transport.control_url.as_str(),
            "http://10.0.0.5:49152/upnp/control/avtransport1"
        );
        assert_eq!(
            transport.event_sub_url.as_str(),
            "http://10.0.0.9:1400/upnp/event/avtransport1"
        );
    }

    #[test]
    fn test_url_base_overrides_description_url() {
        let xml = r#"<root>
  <URLBase>http://10.0.0.7:8080/base/</URLBase>
  <device>
    <serviceList>
      <service>
        <serviceType>urn:schemas-upnp-org:service:AVTransport:1</serviceType>
        <serviceId>urn:upnp-org:serviceId:AVTransport</serviceId>
        <controlURL>control</controlURL>
        <eventSubURL>/event</eventSubURL>
        <SCPDURL>scpd.xml</SCPDURL>
      </service>
    </serviceList>
  </device>
</root>"#;

        let device = DeviceDescription::from_xml(xml, &description_url()).unwrap();
        let transport = device.service(&ServiceId::resolve("AVTransport")).unwrap();

        assert_eq!(device.base_url.as_str(), "http://10.0.0.7:8080/base/");
        assert_eq!(transport.control_url.as_str(), "http://10.0.0.7:8080/base/control");
        assert_eq!(transport.event_sub_url.as_str(), "http://10.0.0.7:8080/event");
    }

    #[test]
    fn test_device_without_services() {
        let xml = "<root><device><friendlyName>Bare</friendlyName></device></root>";
        let device = DeviceDescription::from_xml(xml, &description_url()).unwrap();
        assert!(device.services.is_empty());
    }

    #[test]
    fn test_device_from_malformed_xml() {
        for xml in ["", "not xml", "<root><nodevice/></root>"] {
            assert!(matches!(
                DeviceDescription::from_xml(xml, &description_url()),
                Err(ClientError::DescriptionFetch { .. })
            ));
        }
    }

    #[test]
    fn test_service_description_from_xml() {
        let scpd_url = Url::parse("http://10.0.0.5:49152/AVTransport.xml").unwrap();
        let description = ServiceDescription::from_xml(SCPD_XML, &scpd_url).unwrap();

        let media_info = description.action("GetMediaInfo").unwrap();
        assert_eq!(media_info.inputs, vec!["InstanceID"]);
        assert_eq!(media_info.outputs, vec!["NrTracks", "CurrentURI", "CurrentURIMetaData"]);

        let stop = description.action("Stop").unwrap();
        assert!(stop.inputs.is_empty());
        assert!(stop.outputs.is_empty());

        assert!(description.action("Play").is_none());
    }
}
