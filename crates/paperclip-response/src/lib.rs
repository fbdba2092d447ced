//! Assistant message generation for Paperclip.
//!
//! Picks a line from a fixed template set for each situation (action
//! outcome, introduction, easter egg, thinking, greeting) and pairs it with
//! an animation and on-screen duration.

pub mod generator;
pub mod templates;

pub use generator::ResponseGenerator;
pub use templates::Situation;
