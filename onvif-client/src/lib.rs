//! ONVIF Client Library
//!
//! SOAP client for the device, media and PTZ services of ONVIF cameras.
//! Requests carry a WS-Security UsernameToken (except capability discovery)
//! and answer a single HTTP Digest challenge when the device asks for one.
//!
//! [`OnvifDevice`] is the entry point: it caches capabilities, profiles and
//! the stream URI per device and fetches whichever of them an operation
//! needs, in dependency order.

pub mod capabilities;
pub mod client;
pub mod config;
pub mod digest;
pub mod error;
pub mod media;
pub mod ptz;
pub mod session;
pub mod soap;
pub mod transport;
mod xml;

#[cfg(test)]
mod mock;

pub use capabilities::Capabilities;
pub use client::OnvifDevice;
pub use config::{ClientConfig, DeviceCredentials};
pub use error::{OnvifError, Phase};
pub use media::{MediaProfile, StreamUriInfo};
pub use ptz::{ParsePtzCommandError, PtzCommand};
pub use session::{DeviceSession, SessionState};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
