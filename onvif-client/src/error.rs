//! Error types for ONVIF operations

use reqwest::StatusCode;
use thiserror::Error;

/// Which step of an operation failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Prerequisite,
    RequestBuild,
    Transport,
    Authentication,
    Status,
    Decode,
    Precondition,
    Config,
}

#[derive(Debug, Error)]
pub enum OnvifError {
    /// An auto-fetched prerequisite (capabilities, profiles) failed
    #[error("{operation}: prerequisite {prerequisite} failed: {source}")]
    Prerequisite {
        operation: &'static str,
        prerequisite: &'static str,
        #[source]
        source: Box<OnvifError>,
    },

    #[error("Failed to build request: {0}")]
    RequestBuild(String),

    /// Connection, DNS or timeout failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Missing/unusable digest challenge, or rejection on the retried attempt
    #[error("{operation}: authentication failed: {reason}")]
    Authentication {
        operation: &'static str,
        reason: String,
    },

    #[error("{operation}: unexpected HTTP status {status}{detail}", detail = fault_suffix(.fault))]
    Status {
        operation: &'static str,
        status: StatusCode,
        fault: Option<String>,
    },

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Config error: {0}")]
    Config(String),
}

fn fault_suffix(fault: &Option<String>) -> String {
    match fault {
        Some(reason) => format!(" (SOAP fault: {})", reason),
        None => String::new(),
    }
}

impl OnvifError {
    pub fn phase(&self) -> Phase {
        match self {
            OnvifError::Prerequisite { .. } => Phase::Prerequisite,
            OnvifError::RequestBuild(_) => Phase::RequestBuild,
            OnvifError::Transport(_) => Phase::Transport,
            OnvifError::Authentication { .. } => Phase::Authentication,
            OnvifError::Status { .. } => Phase::Status,
            OnvifError::Decode(_) => Phase::Decode,
            OnvifError::Precondition(_) => Phase::Precondition,
            OnvifError::Config(_) => Phase::Config,
        }
    }

    /// The innermost error, looking through prerequisite wrappers
    pub fn root_cause(&self) -> &OnvifError {
        match self {
            OnvifError::Prerequisite { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

impl From<ws_security::WsSecurityError> for OnvifError {
    fn from(e: ws_security::WsSecurityError) -> Self {
        OnvifError::RequestBuild(format!("WS-Security token: {}", e))
    }
}
