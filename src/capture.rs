pub mod gate;
pub mod types;

pub use gate::CaptureGate;
pub use types::{Admission, RejectReason};
