//! Built-in phrases and random selection.

use rand::seq::IndexedRandom;

pub const DEFAULT_PHRASES: [&str; 12] = [
    "I pity the fool who doesn't believe in themselves.",
    "Treat your mother right.",
    "Be somebody, or be somebody's fool.",
    "Discipline is doing what needs to be done, even when you don't feel like it.",
    "Respect is earned by how you treat people, not how loud you talk.",
    "Strength means protecting people who need help.",
    "Don't wait for perfect. Start now and improve as you go.",
    "Character is what you do when nobody is watching.",
    "You don't need luck when you've got preparation.",
    "Train your mind, and your body will follow.",
    "Kindness and toughness are not opposites.",
    "Small progress every day beats big plans someday.",
];

pub struct PhrasePicker {
    phrases: Vec<String>,
}

impl PhrasePicker {
    /// Blank entries are dropped; an empty list falls back to the built-ins.
    pub fn new(phrases: Vec<String>) -> Self {
        let mut phrases: Vec<String> = phrases
            .into_iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        if phrases.is_empty() {
            phrases = DEFAULT_PHRASES.iter().map(|p| (*p).to_string()).collect();
        }
        Self { phrases }
    }

    pub fn pick(&self) -> &str {
        self.phrases
            .choose(&mut rand::rng())
            .map(String::as_str)
            .unwrap_or(DEFAULT_PHRASES[0])
    }
}
