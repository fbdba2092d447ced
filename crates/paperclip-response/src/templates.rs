//! Message templates, grouped by situation.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Situation {
    Success,
    Failure,
    Introduction,
    EasterEgg,
    Thinking,
    Greeting,
}

impl Situation {
    pub fn templates(&self) -> &'static [&'static str] {
        match self {
            Situation::Success => SUCCESS,
            Situation::Failure => FAILURE,
            Situation::Introduction => INTRODUCTION,
            Situation::EasterEgg => EASTER_EGG,
            Situation::Thinking => THINKING,
            Situation::Greeting => GREETING,
        }
    }
}

impl fmt::Display for Situation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Situation::Success => write!(f, "success"),
            Situation::Failure => write!(f, "failure"),
            Situation::Introduction => write!(f, "introduction"),
            Situation::EasterEgg => write!(f, "easter_egg"),
            Situation::Thinking => write!(f, "thinking"),
            Situation::Greeting => write!(f, "greeting"),
        }
    }
}

impl std::str::FromStr for Situation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(Situation::Success),
            "failure" => Ok(Situation::Failure),
            "introduction" => Ok(Situation::Introduction),
            "easter_egg" | "easterEgg" => Ok(Situation::EasterEgg),
            "thinking" => Ok(Situation::Thinking),
            "greeting" => Ok(Situation::Greeting),
            _ => Err(format!("Unknown situation: {}", s)),
        }
    }
}

pub const SUCCESS: &[&str] = &[
    "Done! And I didn't even need to ask if you wanted help writing a letter. 📎",
    "Task complete! See? I've learned a thing or two since '97.",
    "All done! No annoying popups this time, just results.",
    "Finished! I'm actually useful now. Who knew?",
    "Done and done! The new me delivers, not just suggests.",
];

pub const FAILURE: &[&str] = &[
    "Oops! Even the new Clippy makes mistakes. Let me try to fix that...",
    "Well, that didn't work. But at least I didn't crash Word this time!",
    "Something went wrong. Don't worry, I've already rolled it back.",
    "Error encountered! But unlike the old days, I actually have a solution.",
    "That failed, but I've got your back. Rollback complete!",
];

pub const INTRODUCTION: &[&str] = &[
    "Hi! I'm Clippy 2.0. Yes, THAT Clippy. I've had some... therapy. Now I actually help instead of just asking if you need help. Let me prove it! 📎",
];

pub const EASTER_EGG: &[&str] = &[
    "I know, I know... I was annoying. But I've changed! Give me another chance? 🥺📎",
    "Look, the 90s were rough for all of us. I've grown. I do things now, not just suggest them!",
    "You're right to be skeptical. But this time, I promise to actually be helpful. No more 'It looks like you're writing a letter' nonsense.",
    "I deserved that. But hey, at least I'm self-aware now! That's growth, right? 📎",
];

pub const THINKING: &[&str] = &[
    "Let me think about this...",
    "Processing... (but faster than Windows 98!)",
    "Working on it...",
    "Analyzing the situation...",
];

pub const GREETING: &[&str] = &[
    "Hey there! Need a hand? I promise I won't be annoying about it.",
    "Back again! What can I help with?",
    "Ready to help! And yes, I'll actually do things this time.",
];
