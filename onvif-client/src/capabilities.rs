//! Device service: GetCapabilities

use crate::error::OnvifError;
use crate::soap::{FromSoap, SoapBody};
use crate::xml::{self, Node, XmlWriter};

/// Capability category requested from the device service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CapabilityCategory {
    #[default]
    All,
    Analytics,
    Device,
    Events,
    Imaging,
    Media,
    Ptz,
}

impl CapabilityCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            CapabilityCategory::All => "All",
            CapabilityCategory::Analytics => "Analytics",
            CapabilityCategory::Device => "Device",
            CapabilityCategory::Events => "Events",
            CapabilityCategory::Imaging => "Imaging",
            CapabilityCategory::Media => "Media",
            CapabilityCategory::Ptz => "PTZ",
        }
    }
}

/// `tds:GetCapabilities` request
#[derive(Debug, Clone, Default)]
pub struct GetCapabilities {
    pub category: CapabilityCategory,
}

impl SoapBody for GetCapabilities {
    const ACTION: Option<&'static str> = None;

    fn write_xml(&self, w: &mut XmlWriter) -> Result<(), OnvifError> {
        xml::start(w, "tds:GetCapabilities", &[])?;
        xml::text_element(w, "tds:Category", &[], self.category.as_str())?;
        xml::end(w, "tds:GetCapabilities")
    }
}

/// Service addresses and feature flags reported by a device
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Capabilities {
    pub analytics: AnalyticsCapabilities,
    pub device: DeviceCapabilities,
    pub events: EventsCapabilities,
    pub imaging: ImagingCapabilities,
    pub media: MediaCapabilities,
    pub ptz: PtzCapabilities,
}

impl Capabilities {
    /// Media service address, if the device reports one
    pub fn media_address(&self) -> Option<&str> {
        non_empty(&self.media.xaddr)
    }

    /// PTZ service address; `None` means the device has no PTZ support
    pub fn ptz_address(&self) -> Option<&str> {
        non_empty(&self.ptz.xaddr)
    }
}

fn non_empty(s: &str) -> Option<&str> {
    let s = s.trim();
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalyticsCapabilities {
    pub xaddr: String,
    pub rule_support: bool,
    pub analytics_module_support: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceCapabilities {
    pub xaddr: String,
    pub network: NetworkCapabilities,
    pub system: SystemCapabilities,
    pub io: IoCapabilities,
    pub security: SecurityCapabilities,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetworkCapabilities {
    pub ip_filter: bool,
    pub zero_configuration: bool,
    pub ip_version6: bool,
    pub dyn_dns: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SystemCapabilities {
    pub discovery_resolve: bool,
    pub discovery_bye: bool,
    pub remote_discovery: bool,
    pub system_backup: bool,
    pub system_logging: bool,
    pub firmware_upgrade: bool,
    pub supported_versions: Vec<OnvifVersion>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OnvifVersion {
    pub major: u32,
    pub minor: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IoCapabilities {
    pub input_connectors: u32,
    pub relay_outputs: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SecurityCapabilities {
    pub tls1_1: bool,
    pub tls1_2: bool,
    pub onboard_key_generation: bool,
    pub access_policy_config: bool,
    pub x509_token: bool,
    pub saml_token: bool,
    pub kerberos_token: bool,
    pub rel_token: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventsCapabilities {
    pub xaddr: String,
    pub ws_subscription_policy_support: bool,
    pub ws_pull_point_support: bool,
    pub ws_pausable_subscription_manager_interface_support: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImagingCapabilities {
    pub xaddr: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaCapabilities {
    pub xaddr: String,
    pub rtp_multicast: bool,
    pub rtp_tcp: bool,
    pub rtp_rtsp_tcp: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PtzCapabilities {
    pub xaddr: String,
}

impl FromSoap for Capabilities {
    fn from_soap(body: &[u8]) -> Result<Self, OnvifError> {
        let mut caps = Capabilities::default();
        let mut found = false;

        xml::walk(body, |node| match node {
            Node::Open { path, .. } => {
                match xml::below(path, "GetCapabilitiesResponse").as_deref() {
                    Some(["Capabilities"]) => found = true,
                    Some(["Capabilities", "Device", "System", "SupportedVersions"]) => caps
                        .device
                        .system
                        .supported_versions
                        .push(OnvifVersion::default()),
                    _ => {}
                }
                Ok(())
            }
            Node::Text { path, text } => match xml::below(path, "GetCapabilitiesResponse") {
                Some(rel) => match rel.as_slice() {
                    ["Capabilities", rest @ ..] => caps.apply(rest, text),
                    _ => Ok(()),
                },
                None => Ok(()),
            },
        })?;

        if !found {
            return Err(OnvifError::Decode(
                "no GetCapabilitiesResponse/Capabilities element".to_string(),
            ));
        }
        Ok(caps)
    }
}

impl Capabilities {
    /// Store one text value found at `path` below `Capabilities`
    fn apply(&mut self, path: &[&str], text: &str) -> Result<(), OnvifError> {
        let field = path.join("/");
        let flag = |text: &str| xml::parse_bool(&field, text);

        match path {
            ["Analytics", "XAddr"] => self.analytics.xaddr = text.to_string(),
            ["Analytics", "RuleSupport"] => self.analytics.rule_support = flag(text)?,
            ["Analytics", "AnalyticsModuleSupport"] => {
                self.analytics.analytics_module_support = flag(text)?
            }

            ["Device", "XAddr"] => self.device.xaddr = text.to_string(),
            ["Device", "Network", "IPFilter"] => self.device.network.ip_filter = flag(text)?,
            ["Device", "Network", "ZeroConfiguration"] => {
                self.device.network.zero_configuration = flag(text)?
            }
            ["Device", "Network", "IPVersion6"] => self.device.network.ip_version6 = flag(text)?,
            ["Device", "Network", "DynDNS"] => self.device.network.dyn_dns = flag(text)?,

            ["Device", "System", "DiscoveryResolve"] => {
                self.device.system.discovery_resolve = flag(text)?
            }
            ["Device", "System", "DiscoveryBye"] => self.device.system.discovery_bye = flag(text)?,
            ["Device", "System", "RemoteDiscovery"] => {
                self.device.system.remote_discovery = flag(text)?
            }
            ["Device", "System", "SystemBackup"] => self.device.system.system_backup = flag(text)?,
            ["Device", "System", "SystemLogging"] => {
                self.device.system.system_logging = flag(text)?
            }
            ["Device", "System", "FirmwareUpgrade"] => {
                self.device.system.firmware_upgrade = flag(text)?
            }
            ["Device", "System", "SupportedVersions", part] => {
                let value = xml::parse_num(&field, text)?;
                if let Some(version) = self.device.system.supported_versions.last_mut() {
                    match *part {
                        "Major" => version.major = value,
                        "Minor" => version.minor = value,
                        _ => {}
                    }
                }
            }

            ["Device", "IO", "InputConnectors"] => {
                self.device.io.input_connectors = xml::parse_num(&field, text)?
            }
            ["Device", "IO", "RelayOutputs"] => {
                self.device.io.relay_outputs = xml::parse_num(&field, text)?
            }

            ["Device", "Security", name] => {
                let value = flag(text)?;
                let security = &mut self.device.security;
                match *name {
                    "TLS1.1" => security.tls1_1 = value,
                    "TLS1.2" => security.tls1_2 = value,
                    "OnboardKeyGeneration" => security.onboard_key_generation = value,
                    "AccessPolicyConfig" => security.access_policy_config = value,
                    "X.509Token" => security.x509_token = value,
                    "SAMLToken" => security.saml_token = value,
                    "KerberosToken" => security.kerberos_token = value,
                    "RELToken" => security.rel_token = value,
                    _ => {}
                }
            }

            ["Events", "XAddr"] => self.events.xaddr = text.to_string(),
            ["Events", "WSSubscriptionPolicySupport"] => {
                self.events.ws_subscription_policy_support = flag(text)?
            }
            ["Events", "WSPullPointSupport"] => self.events.ws_pull_point_support = flag(text)?,
            ["Events", "WSPausableSubscriptionManagerInterfaceSupport"] => {
                self.events.ws_pausable_subscription_manager_interface_support = flag(text)?
            }

            ["Imaging", "XAddr"] => self.imaging.xaddr = text.to_string(),

            ["Media", "XAddr"] => self.media.xaddr = text.to_string(),
            ["Media", "StreamingCapabilities", "RTPMulticast"] => {
                self.media.rtp_multicast = flag(text)?
            }
            ["Media", "StreamingCapabilities", "RTP_TCP"] => self.media.rtp_tcp = flag(text)?,
            ["Media", "StreamingCapabilities", "RTP_RTSP_TCP"] => {
                self.media.rtp_rtsp_tcp = flag(text)?
            }

            ["PTZ", "XAddr"] => self.ptz.xaddr = text.to_string(),
            _ => {}
        }
        Ok(())
    }
}
