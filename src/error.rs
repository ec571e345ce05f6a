//! Error types and result definitions for the rustmiio crate.
//! Includes the standard MIoT status codes and conversions from HTTP/JSON/IO errors.

use thiserror::Error;

/// Represents all possible errors produced by the schema model and the
/// generic device layer.
#[derive(Error, Debug)]
pub enum MiotError {
    /// HTTP error while talking to the schema endpoint
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization or deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem error while reading or writing the schema cache
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A schema URN did not match the 7-part `urn:...` format
    #[error("invalid URN '{0}'")]
    InvalidUrn(String),

    /// The release index holds no matching entry for the model
    #[error("no release with status '{status}' found for model '{model}'")]
    NoRelease { model: String, status: String },

    /// No cache directory could be resolved on this system
    #[error("unable to resolve a cache directory")]
    NoCacheDir,

    /// Property name not present in the device model
    #[error("unknown property '{0}'")]
    UnknownProperty(String),

    /// Action name not present in the device model
    #[error("unknown action '{0}'")]
    UnknownAction(String),

    /// Attempt to write a property without write access
    #[error("property '{0}' is not writable")]
    NotWritable(String),

    /// A value failed format, range or choice validation before sending
    #[error("invalid value for '{target}': {reason}")]
    InvalidValue { target: String, reason: String },

    /// The device rejected a call with a nonzero MIoT status code
    #[error("device returned status {code}: {message}")]
    Device { code: i64, message: &'static str },

    /// The device response did not have the expected shape
    #[error("unexpected response payload: {0}")]
    UnexpectedResponse(String),

    /// The transport below the RPC seam failed
    #[error("transport error: {0}")]
    Transport(String),
}

/// A specialized Result type for MIoT operations.
pub type Result<T> = std::result::Result<T, MiotError>;

impl MiotError {
    /// Builds a device error carrying the standard status message.
    pub fn device(code: i64) -> Self {
        MiotError::Device {
            code,
            message: status_message(code),
        }
    }

    /// Maps a device-reported status code to a result. Zero and the
    /// async-pending code count as success.
    pub fn check_code(code: i64) -> Result<()> {
        if code == STATUS_OK || code == STATUS_PENDING {
            Ok(())
        } else {
            Err(MiotError::device(code))
        }
    }
}

// Standard MIoT status codes carried in the `code` field of RPC responses.
define_status_codes! {
    STATUS_OK = 0 => "Success",
    STATUS_PENDING = 1 => "Accepted, Result Pending",
    ERR_CANNOT_READ = -4001 => "Property Cannot Be Read",
    ERR_CANNOT_WRITE = -4002 => "Property Cannot Be Written",
    ERR_NOT_EXIST = -4003 => "Property, Service or Action Does Not Exist",
    ERR_INTERNAL = -4004 => "Internal Device Error",
    ERR_VALUE = -4005 => "Property Value Error",
    ERR_ACTION_ARGS = -4006 => "Action Input Parameter Error",
    ERR_DID = -4007 => "Device ID Error",
}
