//! Paperclip Signal crate - behavioural frustration detection.
//!
//! Keeps short sliding windows of error and deletion events, raises
//! [`FrustrationSignal`](paperclip_core::FrustrationSignal)s when a threshold
//! rule fires, and tracks flow state for notification suppression.

pub mod detector;

pub use detector::{FrustrationListener, SignalDetector};
