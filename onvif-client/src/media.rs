//! Media service: GetProfiles and GetStreamUri

use std::fmt;

use crate::error::OnvifError;
use crate::soap::{FromSoap, SoapBody};
use crate::xml::{self, Node, XmlWriter};

pub const GET_PROFILES_ACTION: &str = "http://www.onvif.org/ver10/media/wsdl/GetProfiles";
pub const GET_STREAM_URI_ACTION: &str = "http://www.onvif.org/ver10/media/wsdl/GetStreamUri";

/// `trt:GetProfiles` request
#[derive(Debug, Clone, Copy, Default)]
pub struct GetProfiles;

impl SoapBody for GetProfiles {
    const ACTION: Option<&'static str> = Some(GET_PROFILES_ACTION);

    fn write_xml(&self, w: &mut XmlWriter) -> Result<(), OnvifError> {
        xml::empty(w, "trt:GetProfiles", &[])
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaProfile {
    /// Opaque handle presented to later media and PTZ calls
    pub token: String,
    pub fixed: bool,
    pub name: String,
    pub video_source: Option<VideoSourceConfiguration>,
    pub audio_source: Option<AudioSourceConfiguration>,
    pub video_encoder: Option<VideoEncoderConfiguration>,
    pub audio_encoder: Option<AudioEncoderConfiguration>,
    pub ptz: Option<PtzConfiguration>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoSourceConfiguration {
    pub token: String,
    pub name: String,
    pub use_count: u32,
    pub source_token: String,
    pub bounds: Option<Bounds>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Bounds {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioSourceConfiguration {
    pub token: String,
    pub name: String,
    pub use_count: u32,
    pub source_token: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoEncoderConfiguration {
    pub token: String,
    pub name: String,
    pub use_count: u32,
    /// JPEG, MPEG4 or H264
    pub encoding: String,
    pub resolution: Option<Resolution>,
    pub quality: f32,
    pub rate_control: Option<RateControl>,
    pub h264: Option<H264Configuration>,
    pub session_timeout: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateControl {
    pub frame_rate_limit: u32,
    pub encoding_interval: u32,
    pub bitrate_limit: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct H264Configuration {
    pub gov_length: u32,
    pub h264_profile: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioEncoderConfiguration {
    pub token: String,
    pub name: String,
    pub use_count: u32,
    pub encoding: String,
    pub bitrate: u32,
    pub sample_rate: u32,
    pub session_timeout: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PtzConfiguration {
    pub token: String,
    pub name: String,
    pub use_count: u32,
    pub node_token: String,
    pub default_continuous_pan_tilt_velocity_space: String,
    pub default_continuous_zoom_velocity_space: String,
    pub default_ptz_timeout: String,
}

impl fmt::Display for MediaProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(encoder) = &self.video_encoder {
            write!(f, " - {}", encoder.encoding.to_lowercase())?;
            if let Some(res) = &encoder.resolution {
                write!(f, " {}x{}", res.width, res.height)?;
            }
            if let Some(rate) = &encoder.rate_control {
                write!(f, " {}fps", rate.frame_rate_limit)?;
            }
        }
        Ok(())
    }
}

impl FromSoap for Vec<MediaProfile> {
    fn from_soap(body: &[u8]) -> Result<Self, OnvifError> {
        let mut profiles: Vec<MediaProfile> = Vec::new();
        let mut found = false;

        xml::walk(body, |node| match node {
            Node::Open { path, attrs } => {
                let Some(rel) = xml::below(path, "GetProfilesResponse") else {
                    return Ok(());
                };
                found = true;
                match rel.as_slice() {
                    ["Profiles"] => {
                        let fixed = match xml::attr(attrs, "fixed") {
                            Some(v) => xml::parse_bool("Profiles@fixed", v)?,
                            None => false,
                        };
                        let token = match xml::attr(attrs, "token").map(str::trim) {
                            Some(token) if !token.is_empty() => token.to_string(),
                            _ => {
                                return Err(OnvifError::Decode(format!(
                                    "GetProfilesResponse/Profiles[{}] has no token",
                                    profiles.len()
                                )))
                            }
                        };
                        profiles.push(MediaProfile {
                            token,
                            fixed,
                            ..Default::default()
                        });
                        Ok(())
                    }
                    ["Profiles", rest @ ..] => match profiles.last_mut() {
                        Some(profile) => profile.open(rest, attrs),
                        None => Ok(()),
                    },
                    _ => Ok(()),
                }
            }
            Node::Text { path, text } => {
                let Some(rel) = xml::below(path, "GetProfilesResponse") else {
                    return Ok(());
                };
                match (rel.as_slice(), profiles.last_mut()) {
                    (["Profiles", rest @ ..], Some(profile)) => profile.text(rest, text),
                    _ => Ok(()),
                }
            }
        })?;

        if !found {
            return Err(OnvifError::Decode(
                "no GetProfilesResponse element".to_string(),
            ));
        }
        Ok(profiles)
    }
}

fn token_of(attrs: &[(String, String)]) -> String {
    xml::attr(attrs, "token").unwrap_or_default().to_string()
}

impl MediaProfile {
    /// Element opened at `path` below `Profiles`
    fn open(&mut self, path: &[&str], attrs: &[(String, String)]) -> Result<(), OnvifError> {
        match path {
            ["VideoSourceConfiguration"] => {
                self.video_source = Some(VideoSourceConfiguration {
                    token: token_of(attrs),
                    ..Default::default()
                })
            }
            ["VideoSourceConfiguration", "Bounds"] => {
                if let Some(source) = self.video_source.as_mut() {
                    let field = |name: &str| xml::attr(attrs, name).unwrap_or("0");
                    source.bounds = Some(Bounds {
                        x: xml::parse_num("Bounds@x", field("x"))?,
                        y: xml::parse_num("Bounds@y", field("y"))?,
                        width: xml::parse_num("Bounds@width", field("width"))?,
                        height: xml::parse_num("Bounds@height", field("height"))?,
                    });
                }
            }
            ["AudioSourceConfiguration"] => {
                self.audio_source = Some(AudioSourceConfiguration {
                    token: token_of(attrs),
                    ..Default::default()
                })
            }
            ["VideoEncoderConfiguration"] => {
                self.video_encoder = Some(VideoEncoderConfiguration {
                    token: token_of(attrs),
                    ..Default::default()
                })
            }
            ["VideoEncoderConfiguration", "Resolution"] => {
                if let Some(encoder) = self.video_encoder.as_mut() {
                    encoder.resolution = Some(Resolution::default());
                }
            }
            ["VideoEncoderConfiguration", "RateControl"] => {
                if let Some(encoder) = self.video_encoder.as_mut() {
                    encoder.rate_control = Some(RateControl::default());
                }
            }
            ["VideoEncoderConfiguration", "H264"] => {
                if let Some(encoder) = self.video_encoder.as_mut() {
                    encoder.h264 = Some(H264Configuration::default());
                }
            }
            ["AudioEncoderConfiguration"] => {
                self.audio_encoder = Some(AudioEncoderConfiguration {
                    token: token_of(attrs),
                    ..Default::default()
                })
            }
            ["PTZConfiguration"] => {
                self.ptz = Some(PtzConfiguration {
                    token: token_of(attrs),
                    ..Default::default()
                })
            }
            _ => {}
        }
        Ok(())
    }

    /// Text found at `path` below `Profiles`
    fn text(&mut self, path: &[&str], text: &str) -> Result<(), OnvifError> {
        let field = path.join("/");
        let num = |text: &str| xml::parse_num::<u32>(&field, text);

        match path {
            ["Name"] => self.name = text.to_string(),

            ["VideoSourceConfiguration", rest @ ..] => {
                if let Some(source) = self.video_source.as_mut() {
                    match rest {
                        ["Name"] => source.name = text.to_string(),
                        ["UseCount"] => source.use_count = num(text)?,
                        ["SourceToken"] => source.source_token = text.to_string(),
                        _ => {}
                    }
                }
            }

            ["AudioSourceConfiguration", rest @ ..] => {
                if let Some(source) = self.audio_source.as_mut() {
                    match rest {
                        ["Name"] => source.name = text.to_string(),
                        ["UseCount"] => source.use_count = num(text)?,
                        ["SourceToken"] => source.source_token = text.to_string(),
                        _ => {}
                    }
                }
            }

            ["VideoEncoderConfiguration", rest @ ..] => {
                if let Some(encoder) = self.video_encoder.as_mut() {
                    match rest {
                        ["Name"] => encoder.name = text.to_string(),
                        ["UseCount"] => encoder.use_count = num(text)?,
                        ["Encoding"] => encoder.encoding = text.to_string(),
                        ["Quality"] => encoder.quality = xml::parse_num(&field, text)?,
                        ["SessionTimeout"] => encoder.session_timeout = text.to_string(),
                        ["Resolution", part] => {
                            if let Some(res) = encoder.resolution.as_mut() {
                                match *part {
                                    "Width" => res.width = num(text)?,
                                    "Height" => res.height = num(text)?,
                                    _ => {}
                                }
                            }
                        }
                        ["RateControl", part] => {
                            if let Some(rate) = encoder.rate_control.as_mut() {
                                match *part {
                                    "FrameRateLimit" => rate.frame_rate_limit = num(text)?,
                                    "EncodingInterval" => rate.encoding_interval = num(text)?,
                                    "BitrateLimit" => rate.bitrate_limit = num(text)?,
                                    _ => {}
                                }
                            }
                        }
                        ["H264", part] => {
                            if let Some(h264) = encoder.h264.as_mut() {
                                match *part {
                                    "GovLength" => h264.gov_length = num(text)?,
                                    "H264Profile" => h264.h264_profile = text.to_string(),
                                    _ => {}
                                }
                            }
                        }
                        _ => {}
                    }
                }
            }

            ["AudioEncoderConfiguration", rest @ ..] => {
                if let Some(encoder) = self.audio_encoder.as_mut() {
                    match rest {
                        ["Name"] => encoder.name = text.to_string(),
                        ["UseCount"] => encoder.use_count = num(text)?,
                        ["Encoding"] => encoder.encoding = text.to_string(),
                        ["Bitrate"] => encoder.bitrate = num(text)?,
                        ["SampleRate"] => encoder.sample_rate = num(text)?,
                        ["SessionTimeout"] => encoder.session_timeout = text.to_string(),
                        _ => {}
                    }
                }
            }

            ["PTZConfiguration", rest @ ..] => {
                if let Some(ptz) = self.ptz.as_mut() {
                    match rest {
                        ["Name"] => ptz.name = text.to_string(),
                        ["UseCount"] => ptz.use_count = num(text)?,
                        ["NodeToken"] => ptz.node_token = text.to_string(),
                        ["DefaultContinuousPanTiltVelocitySpace"] => {
                            ptz.default_continuous_pan_tilt_velocity_space = text.to_string()
                        }
                        ["DefaultContinuousZoomVelocitySpace"] => {
                            ptz.default_continuous_zoom_velocity_space = text.to_string()
                        }
                        ["DefaultPTZTimeout"] => ptz.default_ptz_timeout = text.to_string(),
                        _ => {}
                    }
                }
            }

            _ => {}
        }
        Ok(())
    }
}

/// `tt:StreamType`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StreamType {
    #[default]
    RtpUnicast,
    RtpMulticast,
}

impl StreamType {
    pub fn as_str(self) -> &'static str {
        match self {
            StreamType::RtpUnicast => "RTP-Unicast",
            StreamType::RtpMulticast => "RTP-Multicast",
        }
    }
}

/// `tt:TransportProtocol`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransportProtocol {
    #[default]
    Udp,
    Tcp,
    Rtsp,
    Http,
}

impl TransportProtocol {
    pub fn as_str(self) -> &'static str {
        match self {
            TransportProtocol::Udp => "UDP",
            TransportProtocol::Tcp => "TCP",
            TransportProtocol::Rtsp => "RTSP",
            TransportProtocol::Http => "HTTP",
        }
    }
}

/// `trt:GetStreamUri` request
#[derive(Debug, Clone)]
pub struct GetStreamUri {
    pub profile_token: String,
    pub stream: StreamType,
    pub protocol: TransportProtocol,
}

impl GetStreamUri {
    /// RTP-Unicast over UDP for `profile_token`
    pub fn unicast_udp(profile_token: &str) -> Self {
        Self {
            profile_token: profile_token.to_string(),
            stream: StreamType::RtpUnicast,
            protocol: TransportProtocol::Udp,
        }
    }
}

impl SoapBody for GetStreamUri {
    const ACTION: Option<&'static str> = Some(GET_STREAM_URI_ACTION);

    fn write_xml(&self, w: &mut XmlWriter) -> Result<(), OnvifError> {
        xml::start(w, "trt:GetStreamUri", &[])?;
        xml::start(w, "trt:StreamSetup", &[])?;
        xml::text_element(w, "tt:Stream", &[], self.stream.as_str())?;
        xml::start(w, "tt:Transport", &[])?;
        xml::text_element(w, "tt:Protocol", &[], self.protocol.as_str())?;
        xml::end(w, "tt:Transport")?;
        xml::end(w, "trt:StreamSetup")?;
        xml::text_element(w, "trt:ProfileToken", &[], &self.profile_token)?;
        xml::end(w, "trt:GetStreamUri")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamUriInfo {
    pub uri: String,
    pub invalid_after_connect: bool,
    pub invalid_after_reboot: bool,
    /// xs:duration, e.g. `PT60S`
    pub timeout: String,
}

impl FromSoap for StreamUriInfo {
    fn from_soap(body: &[u8]) -> Result<Self, OnvifError> {
        let mut info = StreamUriInfo::default();
        let mut found = false;

        xml::walk(body, |node| match node {
            Node::Open { path, .. } => {
                if xml::below(path, "GetStreamUriResponse").as_deref() == Some(&["MediaUri"][..]) {
                    found = true;
                }
                Ok(())
            }
            Node::Text { path, text } => {
                let Some(rel) = xml::below(path, "GetStreamUriResponse") else {
                    return Ok(());
                };
                match rel.as_slice() {
                    ["MediaUri", "Uri"] => info.uri = text.to_string(),
                    ["MediaUri", "InvalidAfterConnect"] => {
                        info.invalid_after_connect = xml::parse_bool("InvalidAfterConnect", text)?
                    }
                    ["MediaUri", "InvalidAfterReboot"] => {
                        info.invalid_after_reboot = xml::parse_bool("InvalidAfterReboot", text)?
                    }
                    ["MediaUri", "Timeout"] => info.timeout = text.to_string(),
                    _ => {}
                }
                Ok(())
            }
        })?;

        if !found {
            return Err(OnvifError::Decode(
                "no GetStreamUriResponse/MediaUri element".to_string(),
            ));
        }
        if info.uri.trim().is_empty() {
            return Err(OnvifError::Decode(
                "GetStreamUriResponse/MediaUri has no Uri".to_string(),
            ));
        }
        Ok(info)
    }
}
