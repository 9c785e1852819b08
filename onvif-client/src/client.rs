//! Thread-safe device handle

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::info;

use crate::capabilities::Capabilities;
use crate::config::{ClientConfig, DeviceCredentials};
use crate::error::OnvifError;
use crate::media::{MediaProfile, StreamUriInfo};
use crate::ptz::PtzCommand;
use crate::session::{DeviceSession, SessionState};
use crate::transport::HttpTransport;

/// One ONVIF device behind a lock.
///
/// The lock is held for the whole of each operation, prerequisite fetches
/// included, so concurrent callers never trigger duplicate fetches.
pub struct OnvifDevice {
    transport: Arc<dyn HttpTransport>,
    config: ClientConfig,
    session: Mutex<Option<DeviceSession>>,
}

impl OnvifDevice {
    pub fn new(transport: Arc<dyn HttpTransport>, config: ClientConfig) -> Self {
        Self {
            transport,
            config,
            session: Mutex::new(None),
        }
    }

    /// Point the handle at a device. Starts a new session with an empty cache.
    pub fn set_auth(&self, username: &str, password: &str, address: &str) {
        let session = DeviceSession::new(
            DeviceCredentials::new(username, password, address),
            self.config.clone(),
            self.transport.clone(),
        );
        *self.lock() = Some(session);
        info!(address, username, "device session started");
    }

    /// RTSP (or other) URI of the first profile's stream
    pub fn get_media_stream_uri(&self) -> Result<String, OnvifError> {
        self.with_session(|session| Ok(session.get_stream_uri()?.uri.clone()))
    }

    pub fn continuous_move(&self, command: PtzCommand) -> Result<(), OnvifError> {
        self.with_session(|session| session.ptz_continuous_move(command))
    }

    pub fn state(&self) -> Option<SessionState> {
        self.lock().as_ref().map(DeviceSession::state)
    }

    pub fn capabilities(&self) -> Option<Capabilities> {
        self.lock().as_ref()?.capabilities().cloned()
    }

    pub fn profiles(&self) -> Option<Vec<MediaProfile>> {
        self.lock().as_ref()?.profiles().map(<[MediaProfile]>::to_vec)
    }

    pub fn stream_uri(&self) -> Option<StreamUriInfo> {
        self.lock().as_ref()?.stream_uri().cloned()
    }

    fn lock(&self) -> MutexGuard<'_, Option<DeviceSession>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_session<T>(
        &self,
        op: impl FnOnce(&mut DeviceSession) -> Result<T, OnvifError>,
    ) -> Result<T, OnvifError> {
        let mut guard = self.lock();
        let session = guard.as_mut().ok_or_else(|| {
            OnvifError::Precondition("no device configured; call set_auth first".to_string())
        })?;
        op(session)
    }
}
