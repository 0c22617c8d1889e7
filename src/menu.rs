//! Menu model shared by the tray and the terminal front end.
//!
//! Speak now / Schedule ▸ (three modes) / Quit. Item ids are stable strings
//! so both front ends route through [`MenuAction::from_id`].

use crate::schedule::ScheduleMode;
use crate::talker::TalkerCommand;

pub const APP_TITLE: &str = "Talking T";
pub const SCHEDULE_LABEL: &str = "Schedule";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    SpeakNow,
    Schedule(ScheduleMode),
    Quit,
}

impl MenuAction {
    pub fn id(self) -> String {
        match self {
            Self::SpeakNow => "speak_now".into(),
            Self::Schedule(mode) => format!("schedule:{}", mode.key()),
            Self::Quit => "quit".into(),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::SpeakNow => "Speak now",
            Self::Schedule(mode) => mode.label(),
            Self::Quit => "Quit",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "speak_now" => Some(Self::SpeakNow),
            "quit" => Some(Self::Quit),
            other => other
                .strip_prefix("schedule:")
                .and_then(|key| key.parse().ok())
                .map(Self::Schedule),
        }
    }

    /// Terminal input: menu ids plus short aliases.
    pub fn parse_input(line: &str) -> Option<Self> {
        let line = line.trim().to_ascii_lowercase();
        match line.as_str() {
            "s" | "speak" => Some(Self::SpeakNow),
            "q" | "exit" => Some(Self::Quit),
            other => Self::from_id(other).or_else(|| other.parse().ok().map(Self::Schedule)),
        }
    }

    pub fn command(self) -> TalkerCommand {
        match self {
            Self::SpeakNow => TalkerCommand::SpeakNow,
            Self::Schedule(mode) => TalkerCommand::SetSchedule(mode),
            Self::Quit => TalkerCommand::Quit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuEntry {
    Item(MenuAction),
    Separator,
    /// Radio group; `checked` marks the active mode.
    Submenu {
        label: &'static str,
        items: Vec<(MenuAction, bool)>,
    },
}

pub fn menu_layout(active: ScheduleMode) -> Vec<MenuEntry> {
    vec![
        MenuEntry::Item(MenuAction::SpeakNow),
        MenuEntry::Separator,
        MenuEntry::Submenu {
            label: SCHEDULE_LABEL,
            items: ScheduleMode::ALL
                .into_iter()
                .map(|mode| (MenuAction::Schedule(mode), mode == active))
                .collect(),
        },
        MenuEntry::Separator,
        MenuEntry::Item(MenuAction::Quit),
    ]
}
