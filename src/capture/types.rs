//! Admission decision types for freshly captured audio segments.

use std::fmt;

/// Outcome of the admission check on a captured segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// The segment may be persisted and scheduled for upload.
    Admitted,
    /// The segment is discarded; it is never stored or transmitted.
    Rejected(RejectReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// The payload is smaller than the admission threshold. The dominant
    /// real-world producer of these is a codec emitting a container header
    /// with zero audio frames after the capture source was suspended.
    TooSmall { size: usize, min: usize },
    /// The payload does not start with the container signature the declared
    /// content type implies.
    BadSignature { content_type: String },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::TooSmall { size, min } => {
                write!(f, "{} bytes is below the {}-byte admission threshold", size, min)
            }
            RejectReason::BadSignature { content_type } => {
                write!(f, "payload does not match container signature for {}", content_type)
            }
        }
    }
}
