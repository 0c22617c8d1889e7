//! Talker service: the schedule tick, the speak routine, and menu commands.
//!
//! IDLE → SPEAKING → IDLE. Speech runs on a blocking task while the mouth
//! animation runs on the async runtime. A speak request that arrives while
//! speaking is dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::avatar::{closing_frame, AvatarDisplay, Frame, MouthAnimator};
use crate::config::Config;
use crate::menu::APP_TITLE;
use crate::notifier::Notifier;
use crate::phrases::PhrasePicker;
use crate::schedule::{ScheduleMode, Scheduler};
use crate::speech::Speaker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TalkerCommand {
    SpeakNow,
    SetSchedule(ScheduleMode),
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TalkerState {
    Idle,
    Speaking,
}

impl std::fmt::Display for TalkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "IDLE"),
            Self::Speaking => write!(f, "SPEAKING"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TalkerSettings {
    pub tick: Duration,
    pub mouth_flip: Duration,
    pub talking_frames: usize,
    pub has_end_pose: bool,
    pub end_pose_probability: f64,
    pub end_pose_hold: Duration,
}

impl TalkerSettings {
    pub fn from_config(config: &Config, talking_frames: usize, has_end_pose: bool) -> Self {
        Self {
            tick: Duration::from_millis(config.schedule.tick_ms.max(1)),
            mouth_flip: Duration::from_millis(config.avatar.mouth_flip_ms.max(1)),
            talking_frames,
            has_end_pose,
            end_pose_probability: config.avatar.end_pose_probability,
            end_pose_hold: Duration::from_millis(config.avatar.end_pose_hold_ms),
        }
    }
}

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

pub struct Talker {
    speaker: Arc<dyn Speaker>,
    display: Arc<dyn AvatarDisplay>,
    phrases: Arc<PhrasePicker>,
    notifier: Arc<Notifier>,
    scheduler: Scheduler,
    settings: TalkerSettings,
    speaking: Arc<AtomicBool>,
    mode_tx: watch::Sender<ScheduleMode>,
}

impl Talker {
    pub fn new(
        speaker: Arc<dyn Speaker>,
        display: Arc<dyn AvatarDisplay>,
        phrases: PhrasePicker,
        notifier: Notifier,
        scheduler: Scheduler,
        settings: TalkerSettings,
    ) -> Self {
        let (mode_tx, _) = watch::channel(scheduler.mode());
        Self {
            speaker,
            display,
            phrases: Arc::new(phrases),
            notifier: Arc::new(notifier),
            scheduler,
            settings,
            speaking: Arc::new(AtomicBool::new(false)),
            mode_tx,
        }
    }

    pub fn state(&self) -> TalkerState {
        if self.speaking.load(Ordering::SeqCst) {
            TalkerState::Speaking
        } else {
            TalkerState::Idle
        }
    }

    pub fn mode(&self) -> ScheduleMode {
        self.scheduler.mode()
    }

    pub fn next_fire(&self) -> NaiveDateTime {
        self.scheduler.next_fire()
    }

    /// Follows the active schedule mode, for front ends that show it.
    pub fn subscribe_mode(&self) -> watch::Receiver<ScheduleMode> {
        self.mode_tx.subscribe()
    }

    pub async fn run(&mut self, mut commands: mpsc::UnboundedReceiver<TalkerCommand>) {
        info!(
            "Talker ready ({}, voice: {}), next phrase at {}",
            self.scheduler.mode(),
            self.speaker.describe(),
            self.scheduler.next_fire().format("%H:%M")
        );

        let mut tick = tokio::time::interval(self.settings.tick);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                command = commands.recv() => {
                    match command {
                        Some(TalkerCommand::SpeakNow) => {
                            self.speak_now();
                        }
                        Some(TalkerCommand::SetSchedule(mode)) => self.set_schedule(mode, local_now()),
                        Some(TalkerCommand::Quit) => {
                            info!("Quit requested");
                            break;
                        }
                        None => {
                            warn!("Command channel closed");
                            break;
                        }
                    }
                }
                _ = tick.tick() => {
                    self.on_tick(local_now());
                }
            }
        }

        if self.state() == TalkerState::Speaking {
            self.display.hide();
        }
    }

    pub fn set_schedule(&mut self, mode: ScheduleMode, now: NaiveDateTime) {
        self.scheduler.set_mode(mode, now);
        self.mode_tx.send_replace(mode);
        info!(
            "Schedule: {mode}, next phrase at {}",
            self.scheduler.next_fire().format("%H:%M")
        );
    }

    /// Fire if due and idle. Returns the speech task when one started.
    pub fn on_tick(&mut self, now: NaiveDateTime) -> Option<JoinHandle<()>> {
        if !self.scheduler.is_due(now) || self.state() == TalkerState::Speaking {
            return None;
        }

        let handle = self.speak_now();
        self.scheduler.advance(now);
        debug!("Next phrase at {}", self.scheduler.next_fire());
        handle
    }

    /// Speak one random phrase with the avatar on screen. `None` when a
    /// phrase is already in flight.
    pub fn speak_now(&self) -> Option<JoinHandle<()>> {
        if self.speaking.swap(true, Ordering::SeqCst) {
            debug!("Already speaking, ignoring request");
            return None;
        }
        info!("State: IDLE → SPEAKING");

        let phrase = self.phrases.pick().to_string();
        info!("Speaking: {phrase}");

        self.display.show();
        let animation = tokio::spawn(animate_mouth(
            self.display.clone(),
            self.settings.talking_frames,
            self.settings.mouth_flip,
        ));

        let speaker = self.speaker.clone();
        let backend = speaker.describe();
        let display = self.display.clone();
        let notifier = self.notifier.clone();
        let speaking = self.speaking.clone();
        let settings = self.settings.clone();

        Some(tokio::spawn(async move {
            let result = tokio::task::spawn_blocking(move || speaker.speak(&phrase)).await;
            match result {
                Ok(Ok(())) => debug!("Speech finished"),
                Ok(Err(e)) => {
                    warn!("Speech failed ({backend}): {e}");
                    notifier.speech_failed(APP_TITLE, &backend, &e);
                }
                Err(e) => warn!("Speech task panicked: {e}"),
            }

            animation.abort();
            let _ = animation.await;

            let frame = closing_frame(
                settings.has_end_pose,
                settings.end_pose_probability,
                rand::random::<f64>(),
            );
            display.set_frame(frame);
            if frame == Frame::End {
                tokio::time::sleep(settings.end_pose_hold).await;
            }
            display.hide();
            speaking.store(false, Ordering::SeqCst);
            info!("State: SPEAKING → IDLE");
        }))
    }
}

async fn animate_mouth(display: Arc<dyn AvatarDisplay>, frames: usize, flip: Duration) {
    let mut animator = MouthAnimator::new(frames);
    let mut interval = tokio::time::interval(flip);
    loop {
        interval.tick().await;
        display.set_frame(animator.next_frame());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speech::SpeechError;
    use chrono::NaiveDate;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Shown {
        Show,
        Frame(Frame),
        Hide,
    }

    #[derive(Default)]
    struct RecordingDisplay {
        visible: AtomicBool,
        events: Mutex<Vec<Shown>>,
    }

    impl AvatarDisplay for RecordingDisplay {
        fn show(&self) {
            self.visible.store(true, Ordering::SeqCst);
            self.events.lock().unwrap().push(Shown::Show);
        }

        fn set_frame(&self, frame: Frame) {
            self.events.lock().unwrap().push(Shown::Frame(frame));
        }

        fn hide(&self) {
            self.visible.store(false, Ordering::SeqCst);
            self.events.lock().unwrap().push(Shown::Hide);
        }
    }

    struct FakeSpeaker {
        calls: AtomicUsize,
        visible_while_speaking: Mutex<Vec<bool>>,
        display: Arc<RecordingDisplay>,
        delay: Duration,
        fail: bool,
    }

    impl FakeSpeaker {
        fn new(display: Arc<RecordingDisplay>, delay: Duration, fail: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                visible_while_speaking: Mutex::new(Vec::new()),
                display,
                delay,
                fail,
            }
        }
    }

    impl Speaker for FakeSpeaker {
        fn describe(&self) -> String {
            "fake".into()
        }

        fn speak(&self, _phrase: &str) -> Result<(), SpeechError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.visible_while_speaking
                .lock()
                .unwrap()
                .push(self.display.visible.load(Ordering::SeqCst));
            std::thread::sleep(self.delay);
            if self.fail {
                return Err(SpeechError::Playback("no output device".into()));
            }
            Ok(())
        }
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 14)
            .unwrap()
            .and_hms_opt(h, m, 30)
            .unwrap()
    }

    fn settings(end_pose_probability: f64) -> TalkerSettings {
        TalkerSettings {
            tick: Duration::from_millis(10),
            mouth_flip: Duration::from_millis(5),
            talking_frames: 3,
            has_end_pose: true,
            end_pose_probability,
            end_pose_hold: Duration::from_millis(1),
        }
    }

    fn talker(delay: Duration, fail: bool, end_pose: f64) -> (Talker, Arc<FakeSpeaker>, Arc<RecordingDisplay>) {
        talker_from(Scheduler::new(ScheduleMode::EveryTenMinutes, at(9, 41)), delay, fail, end_pose)
    }

    /// Scheduled from the real clock, so the run loop's own tick stays quiet.
    fn live_talker(delay: Duration) -> (Talker, Arc<FakeSpeaker>, Arc<RecordingDisplay>) {
        talker_from(Scheduler::new(ScheduleMode::Hourly, local_now()), delay, false, 0.0)
    }

    fn talker_from(
        scheduler: Scheduler,
        delay: Duration,
        fail: bool,
        end_pose: f64,
    ) -> (Talker, Arc<FakeSpeaker>, Arc<RecordingDisplay>) {
        let display = Arc::new(RecordingDisplay::default());
        let speaker = Arc::new(FakeSpeaker::new(display.clone(), delay, fail));
        let talker = Talker::new(
            speaker.clone(),
            display.clone(),
            PhrasePicker::new(vec!["Treat your mother right.".into()]),
            Notifier::new(false),
            scheduler,
            settings(end_pose),
        );
        (talker, speaker, display)
    }

    #[tokio::test]
    async fn speak_now_invokes_tts_exactly_once() {
        let (talker, speaker, _display) = talker(Duration::from_millis(20), false, 0.0);

        let handle = talker.speak_now().expect("speech should start");
        handle.await.unwrap();

        assert_eq!(speaker.calls.load(Ordering::SeqCst), 1);
        assert_eq!(talker.state(), TalkerState::Idle);
    }

    #[tokio::test]
    async fn overlapping_request_is_dropped() {
        let (talker, speaker, _display) = talker(Duration::from_millis(50), false, 0.0);

        let first = talker.speak_now().expect("speech should start");
        assert_eq!(talker.state(), TalkerState::Speaking);
        assert!(talker.speak_now().is_none());
        first.await.unwrap();

        assert_eq!(speaker.calls.load(Ordering::SeqCst), 1);
        assert!(talker.speak_now().is_some());
    }

    #[tokio::test]
    async fn avatar_visible_only_while_speaking() {
        let (talker, speaker, display) = talker(Duration::from_millis(30), false, 0.0);
        assert!(!display.visible.load(Ordering::SeqCst));

        talker.speak_now().unwrap().await.unwrap();

        assert_eq!(*speaker.visible_while_speaking.lock().unwrap(), vec![true]);
        assert!(!display.visible.load(Ordering::SeqCst));

        let events = display.events.lock().unwrap();
        assert_eq!(events.first(), Some(&Shown::Show));
        assert_eq!(events.last(), Some(&Shown::Hide));
        assert!(events.contains(&Shown::Frame(Frame::Talking(0))));
        assert_eq!(events[events.len() - 2], Shown::Frame(Frame::Closed));
    }

    #[tokio::test]
    async fn end_pose_shown_before_hiding() {
        let (talker, _speaker, display) = talker(Duration::from_millis(5), false, 1.0);

        talker.speak_now().unwrap().await.unwrap();

        let events = display.events.lock().unwrap();
        assert_eq!(
            &events[events.len() - 2..],
            &[Shown::Frame(Frame::End), Shown::Hide]
        );
    }

    #[tokio::test]
    async fn failed_speech_still_hides_avatar() {
        let (talker, speaker, display) = talker(Duration::from_millis(5), true, 0.0);

        talker.speak_now().unwrap().await.unwrap();

        assert_eq!(speaker.calls.load(Ordering::SeqCst), 1);
        assert!(!display.visible.load(Ordering::SeqCst));
        assert_eq!(talker.state(), TalkerState::Idle);
    }

    #[tokio::test]
    async fn tick_fires_only_when_due() {
        let (mut talker, speaker, _display) = talker(Duration::from_millis(5), false, 0.0);

        assert!(talker.on_tick(at(9, 45)).is_none());
        let handle = talker.on_tick(at(9, 50)).expect("due at 9:50");
        handle.await.unwrap();

        assert_eq!(speaker.calls.load(Ordering::SeqCst), 1);
        assert!(talker.next_fire() > at(9, 50));
    }

    #[tokio::test]
    async fn due_tick_waits_while_speaking() {
        let (mut talker, speaker, _display) = talker(Duration::from_millis(50), false, 0.0);

        let manual = talker.speak_now().unwrap();
        assert!(talker.on_tick(at(9, 50)).is_none());
        manual.await.unwrap();

        assert_eq!(speaker.calls.load(Ordering::SeqCst), 1);
        assert!(talker.on_tick(at(9, 50)).is_some());
    }

    #[tokio::test]
    async fn schedule_command_switches_mode() {
        let (mut talker, _speaker, _display) = live_talker(Duration::from_millis(5));
        let mut mode_rx = talker.subscribe_mode();
        let (tx, rx) = mpsc::unbounded_channel();

        tx.send(TalkerCommand::SetSchedule(ScheduleMode::EveryMinute)).unwrap();
        tx.send(TalkerCommand::Quit).unwrap();
        talker.run(rx).await;

        assert_eq!(talker.mode(), ScheduleMode::EveryMinute);
        assert!(mode_rx.has_changed().unwrap());
        assert_eq!(*mode_rx.borrow_and_update(), ScheduleMode::EveryMinute);
    }

    #[tokio::test]
    async fn quit_during_speech_leaves_avatar_hidden() {
        let (mut talker, speaker, display) = live_talker(Duration::from_millis(80));
        let (tx, rx) = mpsc::unbounded_channel();

        tx.send(TalkerCommand::SpeakNow).unwrap();
        tx.send(TalkerCommand::Quit).unwrap();
        talker.run(rx).await;
        assert!(!display.visible.load(Ordering::SeqCst));

        for _ in 0..100 {
            if talker.state() == TalkerState::Idle {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(talker.state(), TalkerState::Idle);
        assert_eq!(speaker.calls.load(Ordering::SeqCst), 1);
        assert!(!display.visible.load(Ordering::SeqCst));
        assert_eq!(display.events.lock().unwrap().last(), Some(&Shown::Hide));
    }

    #[tokio::test]
    async fn speak_command_through_run_loop() {
        let (mut talker, speaker, _display) = live_talker(Duration::from_millis(5));
        let (tx, rx) = mpsc::unbounded_channel();

        tx.send(TalkerCommand::SpeakNow).unwrap();
        drop(tx);
        talker.run(rx).await;

        for _ in 0..100 {
            if talker.state() == TalkerState::Idle && speaker.calls.load(Ordering::SeqCst) == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(speaker.calls.load(Ordering::SeqCst), 1);
    }
}
