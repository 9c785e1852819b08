//! PTZ service: ContinuousMove and command mapping

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::error::OnvifError;
use crate::soap::SoapBody;
use crate::xml::{self, XmlWriter};

pub const CONTINUOUS_MOVE_ACTION: &str = "http://www.onvif.org/ver20/ptz/wsdl/ContinuousMove";
pub const PAN_TILT_VELOCITY_SPACE: &str =
    "http://www.onvif.org/ver10/tptz/PanTiltSpaces/VelocityGenericSpace";
pub const ZOOM_VELOCITY_SPACE: &str = "http://www.onvif.org/ver10/tptz/ZoomSpaces/VelocityGenericSpace";
/// One minute, as an xs:duration
pub const CONTINUOUS_MOVE_TIMEOUT: &str = "PT00H01M00S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PtzCommand {
    Left,
    Right,
    Up,
    Down,
    ZoomIn,
    ZoomOut,
    Stop,
}

/// Pan/tilt velocity in the generic velocity space
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Velocity {
    pub x: f32,
    pub y: f32,
}

impl PtzCommand {
    /// Unit pan/tilt vector. Zoom and stop leave pan/tilt at rest.
    pub fn pan_tilt(self) -> Velocity {
        match self {
            PtzCommand::Left => Velocity { x: 1.0, y: 0.0 },
            PtzCommand::Right => Velocity { x: -1.0, y: 0.0 },
            PtzCommand::Up => Velocity { x: 0.0, y: 1.0 },
            PtzCommand::Down => Velocity { x: 0.0, y: -1.0 },
            PtzCommand::ZoomIn | PtzCommand::ZoomOut | PtzCommand::Stop => Velocity::default(),
        }
    }

    /// Zoom velocity in the generic zoom space
    pub fn zoom(self) -> f32 {
        match self {
            PtzCommand::ZoomIn => 1.0,
            PtzCommand::ZoomOut => -1.0,
            _ => 0.0,
        }
    }
}

impl fmt::Display for PtzCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PtzCommand::Left => "left",
            PtzCommand::Right => "right",
            PtzCommand::Up => "up",
            PtzCommand::Down => "down",
            PtzCommand::ZoomIn => "zoom_in",
            PtzCommand::ZoomOut => "zoom_out",
            PtzCommand::Stop => "stop",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown PTZ command '{0}' (expected left, right, up, down, zoom_in, zoom_out or stop)")]
pub struct ParsePtzCommandError(String);

impl FromStr for PtzCommand {
    type Err = ParsePtzCommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(PtzCommand::Left),
            "right" => Ok(PtzCommand::Right),
            "up" => Ok(PtzCommand::Up),
            "down" => Ok(PtzCommand::Down),
            "zoom_in" | "zoom-in" => Ok(PtzCommand::ZoomIn),
            "zoom_out" | "zoom-out" => Ok(PtzCommand::ZoomOut),
            "stop" => Ok(PtzCommand::Stop),
            _ => Err(ParsePtzCommandError(s.to_string())),
        }
    }
}

/// `tptz:ContinuousMove` request
#[derive(Debug, Clone)]
pub struct ContinuousMove {
    pub profile_token: String,
    pub pan_tilt: Velocity,
    pub zoom: f32,
    pub timeout: String,
}

impl ContinuousMove {
    pub fn new(profile_token: &str, command: PtzCommand) -> Self {
        Self {
            profile_token: profile_token.to_string(),
            pan_tilt: command.pan_tilt(),
            zoom: command.zoom(),
            timeout: CONTINUOUS_MOVE_TIMEOUT.to_string(),
        }
    }
}

impl SoapBody for ContinuousMove {
    const ACTION: Option<&'static str> = Some(CONTINUOUS_MOVE_ACTION);

    fn write_xml(&self, w: &mut XmlWriter) -> Result<(), OnvifError> {
        let pan = self.pan_tilt.x.to_string();
        let tilt = self.pan_tilt.y.to_string();
        let zoom = self.zoom.to_string();

        xml::start(w, "tptz:ContinuousMove", &[])?;
        xml::text_element(w, "tptz:ProfileToken", &[], &self.profile_token)?;
        xml::start(w, "tptz:Velocity", &[])?;
        xml::empty(
            w,
            "tt:PanTilt",
            &[
                ("x", pan.as_str()),
                ("y", tilt.as_str()),
                ("space", PAN_TILT_VELOCITY_SPACE),
            ],
        )?;
        xml::empty(w, "tt:Zoom", &[("x", zoom.as_str()), ("space", ZOOM_VELOCITY_SPACE)])?;
        xml::end(w, "tptz:Velocity")?;
        xml::text_element(w, "tptz:Timeout", &[], &self.timeout)?;
        xml::end(w, "tptz:ContinuousMove")
    }
}
