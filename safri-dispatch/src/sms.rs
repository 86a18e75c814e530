use log::info;
use thiserror::Error;

/// Represents a type that can push an SMS to a phone number.
///
/// Permission is evaluated on every send, mirroring runtime-grant
/// semantics: a denial must surface before the caller performs any write.
pub trait SmsGateway: Send + Sync + 'static {
    fn send(&self, phone_number: &str, message: &str) -> Result<(), SmsError>;
}

#[derive(Debug, Error)]
pub enum SmsError {
    /// The runtime permission to send SMS was not granted
    #[error("SMS permission was denied")]
    PermissionDenied,
    /// The message was accepted but could not be delivered
    #[error("SMS could not be sent: {0}")]
    SendFailed(String),
}

/// A gateway that records outgoing messages in the log instead of
/// handing them to a carrier.
#[derive(Debug, Default)]
pub struct LoggingSms;

impl SmsGateway for LoggingSms {
    fn send(&self, phone_number: &str, message: &str) -> Result<(), SmsError> {
        info!("SMS to {phone_number}: {message}");

        Ok(())
    }
}

/// A gateway that never has permission. Test double.
#[derive(Debug, Default)]
pub struct DenyingSms;

impl SmsGateway for DenyingSms {
    fn send(&self, _phone_number: &str, _message: &str) -> Result<(), SmsError> {
        Err(SmsError::PermissionDenied)
    }
}

/// A gateway that accepts permission but fails delivery. Test double.
#[derive(Debug, Default)]
pub struct FailingSms;

impl SmsGateway for FailingSms {
    fn send(&self, phone_number: &str, _message: &str) -> Result<(), SmsError> {
        Err(SmsError::SendFailed(format!(
            "carrier rejected message to {phone_number}"
        )))
    }
}
