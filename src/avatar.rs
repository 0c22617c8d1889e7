//! Talking avatar: frame set, mouth animation, and the display seam.
//!
//! The avatar is only on screen while a phrase is spoken. Front ends
//! implement [`AvatarDisplay`]; the talker drives it.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

pub const CLOSED_IMAGE: &str = "MRT_mouth_closed.png";
pub const OPEN_IMAGE: &str = "MRT_mouth_open.png";
pub const END_IMAGE: &str = "MRT_mouth_end_1.png";
pub const EXTRA_TALK_IMAGES: [&str; 2] = ["MRT_mouth_A_face.png", "MRT_mouth_o_face.png"];

#[derive(Debug, Error)]
#[error("Missing image file(s): {}", .0.join(", "))]
pub struct MissingImages(pub Vec<String>);

/// Which picture the avatar shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame {
    Closed,
    /// Index into [`AvatarImages::talking`].
    Talking(usize),
    End,
}

#[derive(Debug, Clone)]
pub struct AvatarImages {
    pub closed: PathBuf,
    /// Open mouth first, then any extra faces found on disk.
    pub talking: Vec<PathBuf>,
    pub end: Option<PathBuf>,
}

impl AvatarImages {
    /// Locate the frame set. The closed and open frames are required.
    pub fn discover(dir: &Path) -> Result<Self, MissingImages> {
        let closed = dir.join(CLOSED_IMAGE);
        let open = dir.join(OPEN_IMAGE);

        let missing: Vec<String> = [(&closed, CLOSED_IMAGE), (&open, OPEN_IMAGE)]
            .into_iter()
            .filter(|(path, _)| !path.exists())
            .map(|(_, name)| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(MissingImages(missing));
        }

        let mut talking = vec![open];
        talking.extend(
            EXTRA_TALK_IMAGES
                .iter()
                .map(|name| dir.join(name))
                .filter(|p| p.exists()),
        );

        let end = Some(dir.join(END_IMAGE)).filter(|p| p.exists());
        debug!(
            "Avatar frames: {} talking, end pose {}",
            talking.len(),
            if end.is_some() { "present" } else { "absent" }
        );

        Ok(Self { closed, talking, end })
    }

    pub fn path(&self, frame: Frame) -> &Path {
        match frame {
            Frame::Closed => &self.closed,
            Frame::Talking(i) => &self.talking[i % self.talking.len()],
            Frame::End => self.end.as_deref().unwrap_or(&self.closed),
        }
    }
}

/// Cycles through the talking frames.
#[derive(Debug, Clone)]
pub struct MouthAnimator {
    frame_count: usize,
    index: usize,
}

impl MouthAnimator {
    pub fn new(frame_count: usize) -> Self {
        Self {
            frame_count: frame_count.max(1),
            index: 0,
        }
    }

    pub fn next_frame(&mut self) -> Frame {
        let frame = Frame::Talking(self.index % self.frame_count);
        self.index += 1;
        frame
    }
}

/// Closing pose after speech: the end frame with the given probability
/// when one exists, otherwise the closed mouth.
pub fn closing_frame(has_end_pose: bool, probability: f64, roll: f64) -> Frame {
    if has_end_pose && roll < probability {
        Frame::End
    } else {
        Frame::Closed
    }
}

/// Where the avatar goes on screen.
pub fn upper_right_position(screen_width: f32, size: f32, margin: f32) -> (f32, f32) {
    ((screen_width - size - margin).max(0.0), margin)
}

/// Idle spot for a window that stays mapped: far off every screen.
pub const PARKED_POSITION: (f32, f32) = (-10_000.0, -10_000.0);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowPlacement {
    pub position: (f32, f32),
    pub size: f32,
    /// Clicks fall through a parked window.
    pub passthrough: bool,
}

/// The avatar window is never unmapped. While idle it is parked off-screen
/// at 1×1; while speaking it sits in the upper-right corner at full size.
pub fn window_placement(
    visible: bool,
    screen_width: Option<f32>,
    size: f32,
    margin: f32,
) -> WindowPlacement {
    if !visible {
        return WindowPlacement {
            position: PARKED_POSITION,
            size: 1.0,
            passthrough: true,
        };
    }

    WindowPlacement {
        position: upper_right_position(screen_width.unwrap_or(0.0), size, margin),
        size,
        passthrough: false,
    }
}

pub trait AvatarDisplay: Send + Sync {
    fn show(&self);
    fn set_frame(&self, frame: Frame);
    fn hide(&self);
}

/// Headless display: only logs.
pub struct LogAvatar;

impl AvatarDisplay for LogAvatar {
    fn show(&self) {
        debug!("Avatar shown");
    }

    fn set_frame(&self, frame: Frame) {
        tracing::trace!("Avatar frame: {frame:?}");
    }

    fn hide(&self) {
        debug!("Avatar hidden");
    }
}
