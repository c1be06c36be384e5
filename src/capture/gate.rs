//! Admission gate for captured audio segments.
//!
//! Every segment produced by the capture device passes through
//! [`CaptureGate::admit`] before it is allowed anywhere near durable storage
//! or the network. The gate rejects undersized segments outright and can
//! optionally sanity-check the container signature for the declared content
//! type. A rejection is a deliberate data-loss decision: dropping a
//! provably-empty unit is cheaper than storing, transmitting and failing on
//! it downstream.

use log::{debug, warn};

use crate::configuration::types::CaptureSettings;

use super::types::{Admission, RejectReason};

/// Decides whether a freshly produced audio segment is admissible.
///
/// A size-only check cannot distinguish "small but valid" from "corrupt";
/// the asymmetry of cost (a dropped few-hundred-ms segment vs. an unusable
/// multi-minute batch failing downstream) makes that acceptable. The
/// threshold is configuration, not a constant.
pub struct CaptureGate {
    min_chunk_bytes: usize,
    verify_signatures: bool,
}

impl CaptureGate {
    pub fn new(settings: &CaptureSettings) -> Self {
        Self {
            min_chunk_bytes: settings.min_chunk_bytes,
            verify_signatures: settings.verify_signatures,
        }
    }

    /// Checks a captured segment against the admission rules.
    ///
    /// On rejection the observed size and declared content type are logged;
    /// the caller must discard the segment. On admission the caller is
    /// responsible for persisting it next; the gate itself has no side
    /// effects.
    pub fn admit(&self, payload: &[u8], content_type: &str) -> Admission {
        if payload.len() < self.min_chunk_bytes {
            warn!(
                "rejecting segment: {} bytes < {} byte minimum (content type {})",
                payload.len(),
                self.min_chunk_bytes,
                content_type
            );
            return Admission::Rejected(RejectReason::TooSmall {
                size: payload.len(),
                min: self.min_chunk_bytes,
            });
        }

        if self.verify_signatures && !matches_container_signature(payload, content_type) {
            warn!(
                "rejecting segment: {} bytes without a valid {} signature",
                payload.len(),
                content_type
            );
            return Admission::Rejected(RejectReason::BadSignature {
                content_type: content_type.to_string(),
            });
        }

        debug!("admitted segment: {} bytes ({})", payload.len(), content_type);
        Admission::Admitted
    }
}

/// Returns whether the payload starts with the container signature implied
/// by the declared content type. Unrecognized content types pass; the size
/// threshold remains the only check for them.
fn matches_container_signature(payload: &[u8], content_type: &str) -> bool {
    let base_type = content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
        .to_ascii_lowercase();

    match base_type.as_str() {
        "audio/webm" | "video/webm" => payload.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]),
        "audio/ogg" | "application/ogg" => payload.starts_with(b"OggS"),
        "audio/wav" | "audio/x-wav" | "audio/wave" => payload.starts_with(b"RIFF"),
        "audio/mp4" | "video/mp4" | "audio/m4a" | "audio/x-m4a" => {
            payload.len() >= 8 && &payload[4..8] == b"ftyp"
        }
        "audio/mpeg" | "audio/mp3" => {
            payload.starts_with(b"ID3")
                || (payload.len() >= 2 && payload[0] == 0xFF && payload[1] & 0xE0 == 0xE0)
        }
        _ => true,
    }
}
