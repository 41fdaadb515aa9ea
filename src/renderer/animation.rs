// SPDX-License-Identifier: GPL-3.0-only

//! Preview animations as explicit phase transitions
//!
//! Each animation is split into phases. Starting a phase mutates the
//! [`PreviewAppearance`], reports what the surface should animate through
//! [`PreviewEvent`]s, and optionally names the next phase together with the
//! delay after which the host must run it. The host schedules continuations
//! on the control thread, so phase two never starts before phase one's
//! delay has elapsed and the frame loop never waits on an animation.

use crate::config::AnimationTimings;
use crate::state::{CameraSide, FrameOrientation};
use image::RgbaImage;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Direction of the camera-flip transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlipDirection {
    FromLeft,
    FromRight,
}

impl FlipDirection {
    /// Leaving the back camera turns from the left
    pub fn towards(side: CameraSide) -> Self {
        match side {
            CameraSide::Front => FlipDirection::FromLeft,
            CameraSide::Back => FlipDirection::FromRight,
        }
    }
}

/// Static snapshot shown over the live surface during a camera flip
#[derive(Debug, Clone)]
pub struct FreezeOverlay {
    pub id: u64,
    pub image: Option<Arc<RgbaImage>>,
    pub alpha: f32,
}

/// Current look of the preview surface and its overlays
#[derive(Debug, Clone)]
pub struct PreviewAppearance {
    /// Opacity of the live surface
    pub alpha: f32,
    /// Opaque matte used for the capture flash, by flash id
    pub matte: Option<(u64, f32)>,
    pub freeze: Option<FreezeOverlay>,
    pub flip: Option<FlipDirection>,
}

impl Default for PreviewAppearance {
    fn default() -> Self {
        // Hidden until the entrance animation runs
        Self {
            alpha: 0.0,
            matte: None,
            freeze: None,
            flip: None,
        }
    }
}

/// What the surface should do, for observers driving the actual UI
#[derive(Debug, Clone, PartialEq)]
pub enum PreviewEvent {
    /// Animate the live surface opacity
    Alpha {
        to: f32,
        duration: Duration,
        delay: Duration,
    },
    MatteInserted { id: u64 },
    Matte { id: u64, to: f32, duration: Duration },
    MatteRemoved { id: u64 },
    FreezeInserted { id: u64, has_snapshot: bool },
    FlipTransition {
        direction: FlipDirection,
        duration: Duration,
    },
    FreezeFading { id: u64, duration: Duration },
    FreezeRemoved { id: u64 },
}

/// Phase to run after a delay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationStep {
    /// Capture flash reached full opacity
    FlashPeak { id: u64 },
    /// Capture flash faded out
    FlashEnd { id: u64 },
    /// Freeze overlay is in place; the camera side may switch now
    FlipSettled { id: u64, side: CameraSide },
    /// Flip transition finished; fade the freeze overlay out
    FlipFadeOut { id: u64 },
    /// Freeze overlay faded out; remove it
    FlipDone { id: u64 },
    /// Surface is hidden; commit the new frame orientation
    OrientationCommit { target: FrameOrientation },
}

/// Continuation the host must schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Continuation {
    pub delay: Duration,
    pub step: AnimationStep,
}

/// Result of running one animation phase
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnimationOutcome {
    pub events: Vec<PreviewEvent>,
    pub next: Option<Continuation>,
}

impl AnimationOutcome {
    fn then(mut self, delay: Duration, step: AnimationStep) -> Self {
        self.next = Some(Continuation { delay, step });
        self
    }
}

/// Owns the preview appearance and sequences its animations
#[derive(Debug, Default)]
pub struct PreviewAnimator {
    timings: AnimationTimings,
    appearance: PreviewAppearance,
    next_id: u64,
}

impl PreviewAnimator {
    pub fn new(timings: AnimationTimings) -> Self {
        Self {
            timings,
            appearance: PreviewAppearance::default(),
            next_id: 0,
        }
    }

    pub fn appearance(&self) -> &PreviewAppearance {
        &self.appearance
    }

    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Fade the surface in once setup completes
    pub fn begin_entrance(&mut self) -> AnimationOutcome {
        self.appearance.alpha = 1.0;
        AnimationOutcome {
            events: vec![PreviewEvent::Alpha {
                to: 1.0,
                duration: self.timings.entrance(),
                delay: Duration::ZERO,
            }],
            next: None,
        }
    }

    /// Shutter simulation: matte fades in, then out
    pub fn begin_capture_flash(&mut self) -> AnimationOutcome {
        let id = self.allocate_id();
        self.appearance.matte = Some((id, 1.0));
        AnimationOutcome {
            events: vec![
                PreviewEvent::MatteInserted { id },
                PreviewEvent::Matte {
                    id,
                    to: 1.0,
                    duration: self.timings.flash_half(),
                },
            ],
            next: None,
        }
        .then(self.timings.flash_half(), AnimationStep::FlashPeak { id })
    }

    /// Freeze the last frame and start the flip towards `side`
    pub fn begin_camera_flip(
        &mut self,
        snapshot: Option<Arc<RgbaImage>>,
        side: CameraSide,
    ) -> AnimationOutcome {
        let id = self.allocate_id();
        let direction = FlipDirection::towards(side);
        let has_snapshot = snapshot.is_some();

        if let Some(previous) = self.appearance.freeze.as_ref() {
            debug!(previous = previous.id, id, "Camera flip replaces running flip");
        }

        self.appearance.freeze = Some(FreezeOverlay {
            id,
            image: snapshot,
            alpha: 1.0,
        });
        self.appearance.flip = Some(direction);

        AnimationOutcome {
            events: vec![
                PreviewEvent::FreezeInserted { id, has_snapshot },
                PreviewEvent::FlipTransition {
                    direction,
                    duration: self.timings.flip_transition(),
                },
            ],
            next: None,
        }
        .then(
            self.timings.flip_settle(),
            AnimationStep::FlipSettled { id, side },
        )
    }

    /// Hide the surface before an in-group orientation change
    pub fn begin_orientation_change(&mut self, target: FrameOrientation) -> AnimationOutcome {
        self.appearance.alpha = 0.0;
        AnimationOutcome {
            events: vec![PreviewEvent::Alpha {
                to: 0.0,
                duration: Duration::ZERO,
                delay: Duration::ZERO,
            }],
            next: None,
        }
        .then(
            self.timings.orientation_fade_out(),
            AnimationStep::OrientationCommit { target },
        )
    }

    /// Fade the surface back in after the orientation was committed
    pub fn finish_orientation_change(&mut self) -> AnimationOutcome {
        self.appearance.alpha = 1.0;
        AnimationOutcome {
            events: vec![PreviewEvent::Alpha {
                to: 1.0,
                duration: self.timings.orientation_fade_in(),
                delay: self.timings.orientation_fade_in_delay(),
            }],
            next: None,
        }
    }

    /// Run a scheduled phase
    ///
    /// Phases whose overlay was replaced or removed in the meantime do
    /// nothing. `FlipSettled` and `OrientationCommit` carry host work and are
    /// handled here only for their visual part.
    pub fn advance(&mut self, step: AnimationStep) -> AnimationOutcome {
        match step {
            AnimationStep::FlashPeak { id } => {
                if !self.matte_is(id) {
                    return AnimationOutcome::default();
                }
                self.appearance.matte = Some((id, 0.0));
                AnimationOutcome {
                    events: vec![PreviewEvent::Matte {
                        id,
                        to: 0.0,
                        duration: self.timings.flash_half(),
                    }],
                    next: None,
                }
                .then(self.timings.flash_half(), AnimationStep::FlashEnd { id })
            }
            AnimationStep::FlashEnd { id } => {
                if !self.matte_is(id) {
                    return AnimationOutcome::default();
                }
                self.appearance.matte = None;
                AnimationOutcome {
                    events: vec![PreviewEvent::MatteRemoved { id }],
                    next: None,
                }
            }
            AnimationStep::FlipSettled { id, .. } => {
                if !self.freeze_is(id) {
                    return AnimationOutcome::default();
                }
                AnimationOutcome::default()
                    .then(self.timings.flip_transition(), AnimationStep::FlipFadeOut { id })
            }
            AnimationStep::FlipFadeOut { id } => {
                let Some(freeze) = self.appearance.freeze.as_mut().filter(|f| f.id == id) else {
                    return AnimationOutcome::default();
                };
                freeze.alpha = 0.0;
                AnimationOutcome {
                    events: vec![PreviewEvent::FreezeFading {
                        id,
                        duration: self.timings.flip_freeze_fade(),
                    }],
                    next: None,
                }
                .then(self.timings.flip_freeze_fade(), AnimationStep::FlipDone { id })
            }
            AnimationStep::FlipDone { id } => {
                if !self.freeze_is(id) {
                    return AnimationOutcome::default();
                }
                self.appearance.freeze = None;
                self.appearance.flip = None;
                AnimationOutcome {
                    events: vec![PreviewEvent::FreezeRemoved { id }],
                    next: None,
                }
            }
            AnimationStep::OrientationCommit { .. } => self.finish_orientation_change(),
        }
    }

    /// Whether `id` is the flip currently on screen
    pub fn is_current_flip(&self, id: u64) -> bool {
        self.freeze_is(id)
    }

    fn matte_is(&self, id: u64) -> bool {
        matches!(self.appearance.matte, Some((current, _)) if current == id)
    }

    fn freeze_is(&self, id: u64) -> bool {
        self.appearance.freeze.as_ref().is_some_and(|f| f.id == id)
    }
}
