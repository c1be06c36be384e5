use std::fmt;

use crate::capture::types::RejectReason;

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    TomlError(String),
    NotInRange(String),
    DirectoryDoesNotExist(String),
    BadEndpoint(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::TomlError(e) => write!(f, "TOML parsing error: {}", e),
            ConfigError::NotInRange(e) => write!(f, "Value out of range: {}", e),
            ConfigError::DirectoryDoesNotExist(e) => write!(f, "Directory error: {}", e),
            ConfigError::BadEndpoint(e) => write!(f, "Endpoint error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

/// Errors surfaced by the durable chunk store.
///
/// `QuotaExceeded` is deliberately distinct from the write/read failures:
/// admission of new chunks must stop and the user must be told, while
/// transient delivery failures keep retrying.
#[derive(Debug, PartialEq, Eq)]
pub enum StorageError {
    ConnectionFailed,
    WriteFailed,
    ReadFailed,
    NotFound,
    Conflict,
    QuotaExceeded,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::ConnectionFailed => write!(f, "Storage connection failed"),
            StorageError::WriteFailed => write!(f, "Storage write failed"),
            StorageError::ReadFailed => write!(f, "Storage read failed"),
            StorageError::NotFound => write!(f, "Record not found"),
            StorageError::Conflict => write!(f, "Conflicting state transition"),
            StorageError::QuotaExceeded => write!(f, "Local storage quota exceeded"),
        }
    }
}

impl std::error::Error for StorageError {}

#[derive(Debug)]
pub enum PresignError {
    Unauthorized,
    InvalidRequest(String),
    BadResponse(String),
    Network(String),
}

impl fmt::Display for PresignError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PresignError::Unauthorized => write!(f, "Presign request rejected: unauthorized"),
            PresignError::InvalidRequest(e) => write!(f, "Presign request rejected: {}", e),
            PresignError::BadResponse(e) => write!(f, "Malformed presign response: {}", e),
            PresignError::Network(e) => write!(f, "Presign network error: {}", e),
        }
    }
}

impl std::error::Error for PresignError {}

#[derive(Debug)]
pub enum TransportError {
    Status(u16),
    TimedOut,
    Network(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Status(code) => write!(f, "Transmit rejected with status {}", code),
            TransportError::TimedOut => write!(f, "Transmit timed out"),
            TransportError::Network(e) => write!(f, "Transmit network error: {}", e),
        }
    }
}

impl std::error::Error for TransportError {}

/// Delivery-side error taxonomy as seen by callers of the upload scheduler.
#[derive(Debug)]
pub enum UploadError {
    TargetAcquisitionFailed(String),
    TransmitFailed(String),
    RetriesExhausted,
    Storage(StorageError),
}

impl fmt::Display for UploadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadError::TargetAcquisitionFailed(e) => {
                write!(f, "Failed to obtain delivery target: {}", e)
            }
            UploadError::TransmitFailed(e) => write!(f, "Transmit failed: {}", e),
            UploadError::RetriesExhausted => write!(f, "Retry budget exhausted"),
            UploadError::Storage(e) => write!(f, "Storage error: {}", e),
        }
    }
}

impl std::error::Error for UploadError {}

impl From<StorageError> for UploadError {
    fn from(err: StorageError) -> Self {
        UploadError::Storage(err)
    }
}

#[derive(Debug)]
pub enum ControllerError {
    ConfigurationError(ConfigError),
    Rejected(RejectReason),
    StorageError(StorageError),
    UploadError(UploadError),
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerError::ConfigurationError(e) => write!(f, "Configuration error: {}", e),
            ControllerError::Rejected(r) => write!(f, "Segment rejected: {}", r),
            ControllerError::StorageError(e) => write!(f, "Storage error: {}", e),
            ControllerError::UploadError(e) => write!(f, "Upload error: {}", e),
        }
    }
}

impl std::error::Error for ControllerError {}

impl From<StorageError> for ControllerError {
    fn from(err: StorageError) -> Self {
        ControllerError::StorageError(err)
    }
}

impl From<UploadError> for ControllerError {
    fn from(err: UploadError) -> Self {
        ControllerError::UploadError(err)
    }
}
