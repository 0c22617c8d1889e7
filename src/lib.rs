//! talking-t: a menu-bar talker that speaks a phrase on a wall-clock schedule.
//!
//! Speech goes through Piper when a model is configured and the macOS `say`
//! command otherwise. An avatar is shown only while a phrase is spoken.

pub mod avatar;
pub mod config;
pub mod menu;
pub mod notifier;
pub mod phrases;
pub mod schedule;
pub mod speech;
pub mod talker;

use std::sync::Arc;

use chrono::Local;
use tracing_subscriber::EnvFilter;

use crate::avatar::{AvatarDisplay, AvatarImages};
use crate::config::Config;
use crate::notifier::Notifier;
use crate::phrases::PhrasePicker;
use crate::schedule::{ScheduleMode, Scheduler};
use crate::speech::{SpeechEngine, Speaker};
use crate::talker::{Talker, TalkerSettings};

/// Shared by both binaries.
pub fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Wire a talker from config. `images` is `None` for front ends that draw
/// nothing.
pub fn build_talker(
    config: &Config,
    mode: Option<ScheduleMode>,
    images: Option<&AvatarImages>,
    display: Arc<dyn AvatarDisplay>,
) -> Talker {
    let speaker: Arc<dyn Speaker> = Arc::new(SpeechEngine::new(&config.speech));
    let (talking_frames, has_end_pose) = images
        .map(|i| (i.talking.len(), i.end.is_some()))
        .unwrap_or((1, false));

    Talker::new(
        speaker,
        display,
        PhrasePicker::new(config.phrases.clone()),
        Notifier::new(config.feedback.notifications),
        Scheduler::new(
            mode.unwrap_or(config.schedule.mode),
            Local::now().naive_local(),
        ),
        TalkerSettings::from_config(config, talking_frames, has_end_pose),
    )
}
