//! Template-driven assistant messages.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::SeedableRng;
use tracing::debug;
use uuid::Uuid;

use paperclip_core::{ActionResult, Animation, AssistantMessage, TaskContext};

use crate::templates::{Situation, GREETING};

const OUTCOME_DURATION_MS: u64 = 5_000;
const INTRODUCTION_DURATION_MS: u64 = 8_000;
const EASTER_EGG_DURATION_MS: u64 = 6_000;
const THINKING_DURATION_MS: u64 = 3_000;
const GREETING_DURATION_MS: u64 = 4_000;

pub struct ResponseGenerator {
    rng: Mutex<StdRng>,
    shown_introduction: AtomicBool,
}

impl Default for ResponseGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseGenerator {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    /// Deterministic template selection, for tests and replays.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            rng: Mutex::new(rng),
            shown_introduction: AtomicBool::new(false),
        }
    }

    fn rng(&self) -> MutexGuard<'_, StdRng> {
        self.rng.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn pick(&self, situation: Situation) -> &'static str {
        situation
            .templates()
            .choose(&mut *self.rng())
            .copied()
            .unwrap_or(GREETING[0])
    }

    fn message(&self, situation: Situation, animation: Animation, duration_ms: u64) -> AssistantMessage {
        let message = AssistantMessage {
            id: Uuid::new_v4(),
            text: self.pick(situation).to_string(),
            animation,
            duration_ms,
        };
        debug!(situation = %situation, id = %message.id, "Message generated");
        message
    }

    /// Message reporting an action outcome. The context is accepted for
    /// future tailoring; wording depends only on success.
    pub fn generate_response(&self, result: &ActionResult, _context: &TaskContext) -> AssistantMessage {
        if result.success {
            self.message(Situation::Success, Animation::Proud, OUTCOME_DURATION_MS)
        } else {
            self.message(Situation::Failure, Animation::Apologetic, OUTCOME_DURATION_MS)
        }
    }

    /// First-run introduction. Marks the introduction as shown.
    pub fn generate_introduction(&self) -> AssistantMessage {
        self.shown_introduction.store(true, Ordering::SeqCst);
        self.message(Situation::Introduction, Animation::Wave, INTRODUCTION_DURATION_MS)
    }

    pub fn has_shown_introduction(&self) -> bool {
        self.shown_introduction.load(Ordering::SeqCst)
    }

    pub fn reset_introduction(&self) {
        self.shown_introduction.store(false, Ordering::SeqCst);
    }

    /// Whether `input` mentions both "hate" and "clippy", in any case.
    pub fn is_easter_egg_trigger(&self, input: &str) -> bool {
        let lower = input.to_lowercase();
        lower.contains("hate") && lower.contains("clippy")
    }

    pub fn handle_easter_egg(&self, input: &str) -> Option<AssistantMessage> {
        if !self.is_easter_egg_trigger(input) {
            return None;
        }
        Some(self.message(Situation::EasterEgg, Animation::Apologetic, EASTER_EGG_DURATION_MS))
    }

    pub fn generate_thinking(&self) -> AssistantMessage {
        self.message(Situation::Thinking, Animation::Thinking, THINKING_DURATION_MS)
    }

    pub fn generate_greeting(&self) -> AssistantMessage {
        self.message(Situation::Greeting, Animation::Wave, GREETING_DURATION_MS)
    }

    /// A random line for the named situation, or the first greeting when
    /// the name is not recognised.
    pub fn template(&self, situation: &str) -> &'static str {
        match situation.parse::<Situation>() {
            Ok(situation) => self.pick(situation),
            Err(_) => GREETING[0],
        }
    }
}
