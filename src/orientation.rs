// SPDX-License-Identifier: GPL-3.0-only

//! Accelerometer-driven orientation tracking
//!
//! Raw acceleration samples are classified into a [`DeviceOrientation`] with
//! a dead zone around the thresholds, and the frame orientation applied to
//! every pixel buffer is re-derived from the camera side, the mirror setting,
//! the orientation lock and the rotation reported by the UI.
//!
//! Frame orientation changes inside one mirror group are animated (the
//! preview fades out, the new orientation is committed, the preview fades
//! back in). Cross-group changes come from a camera flip, which has its own
//! animation, and are applied immediately.

use crate::constants::ORIENTATION_THRESHOLD;
use crate::state::{
    CameraSide, DeviceOrientation, FrameOrientation, InterfaceOrientation, StateHandle,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// One accelerometer reading, in g
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Acceleration {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Acceleration {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Malformed readings (NaN, infinite) are not usable
    pub fn is_valid(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// Classify a sample, keeping `previous` inside the dead zone
pub fn classify_acceleration(sample: Acceleration, previous: DeviceOrientation) -> DeviceOrientation {
    if sample.x >= ORIENTATION_THRESHOLD {
        DeviceOrientation::LandscapeLeft
    } else if sample.x <= -ORIENTATION_THRESHOLD {
        DeviceOrientation::LandscapeRight
    } else if sample.y <= -ORIENTATION_THRESHOLD {
        DeviceOrientation::Portrait
    } else if sample.y >= ORIENTATION_THRESHOLD {
        DeviceOrientation::PortraitUpsideDown
    } else {
        previous
    }
}

/// Rotation the frame orientation is derived from
///
/// A locked orientation is always portrait. An unlocked, upside-down UI is
/// ignored (`None`) so the previous frame orientation persists.
pub fn effective_orientation(
    orientation_locked: bool,
    interface: InterfaceOrientation,
) -> Option<InterfaceOrientation> {
    if orientation_locked {
        Some(InterfaceOrientation::Portrait)
    } else if interface == InterfaceOrientation::PortraitUpsideDown {
        None
    } else {
        Some(interface)
    }
}

/// Frame orientation for the given inputs
///
/// The back camera uses the mirrored group only when the user asked for a
/// mirrored output; the front camera is the other way round so its naturally
/// unmirrored image appears mirrored by default.
pub fn target_frame_orientation(
    side: CameraSide,
    mirror_output: bool,
    effective: InterfaceOrientation,
) -> FrameOrientation {
    let base = match effective {
        InterfaceOrientation::LandscapeLeft => FrameOrientation::Up,
        InterfaceOrientation::LandscapeRight => FrameOrientation::Down,
        _ => FrameOrientation::Right,
    };

    let mirrored = match side {
        CameraSide::Back => mirror_output,
        CameraSide::Front => !mirror_output,
    };

    if mirrored { base.mirrored() } else { base }
}

/// Whether a transition reads as an in-place rotation
pub fn is_animatable(from: FrameOrientation, to: FrameOrientation) -> bool {
    from.same_mirror_group(to)
}

/// A frame orientation transition decided by the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameOrientationChange {
    pub from: FrameOrientation,
    pub to: FrameOrientation,
    /// Animated changes are held as pending until [`OrientationTracker::commit`]
    pub animate: bool,
}

/// Everything one sample changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrientationUpdate {
    /// New device orientation, if it changed
    pub device_orientation: Option<DeviceOrientation>,
    /// New value of the blocked-rotation flag, if it changed
    pub screen_rotation_blocked: Option<bool>,
    pub frame_change: Option<FrameOrientationChange>,
    /// Grid overlay should be redrawn (orientation unlocked)
    pub redraw_grid: bool,
}

impl OrientationUpdate {
    /// True when the sample mutated nothing
    pub fn is_empty(&self) -> bool {
        self.device_orientation.is_none()
            && self.screen_rotation_blocked.is_none()
            && self.frame_change.is_none()
    }
}

/// Converts accelerometer samples into orientation state
#[derive(Debug, Default)]
pub struct OrientationTracker {
    state: StateHandle,
    pending: Option<FrameOrientation>,
}

impl OrientationTracker {
    pub fn new(state: StateHandle) -> Self {
        Self {
            state,
            pending: None,
        }
    }

    /// Animated target not yet committed
    pub fn pending(&self) -> Option<FrameOrientation> {
        self.pending
    }

    /// Process one sample
    ///
    /// `None` and non-finite samples are dropped without touching any state.
    pub fn on_acceleration_sample(
        &mut self,
        sample: Option<Acceleration>,
        interface: InterfaceOrientation,
    ) -> OrientationUpdate {
        let Some(sample) = sample.filter(Acceleration::is_valid) else {
            trace!("Dropping unusable accelerometer sample");
            return OrientationUpdate::default();
        };

        let Some((previous, was_blocked, locked)) = self.state.read(|s| {
            (
                s.device_orientation,
                s.user_blocked_screen_rotation,
                s.orientation_locked,
            )
        }) else {
            return OrientationUpdate::default();
        };

        let mut update = OrientationUpdate::default();

        let device = classify_acceleration(sample, previous);
        if device != previous {
            self.state.write(|s| s.device_orientation = device);
            debug!(from = ?previous, to = ?device, "Device orientation changed");
            update.device_orientation = Some(device);
        }

        let blocked = interface.as_device() != Some(device) && !locked;
        if blocked != was_blocked {
            self.state.write(|s| s.user_blocked_screen_rotation = blocked);
            update.screen_rotation_blocked = Some(blocked);
        }

        update.frame_change = self.recompute_frame_orientation(interface);
        update.redraw_grid = !locked;
        update
    }

    /// Re-derive the frame orientation from the current state
    ///
    /// Returns a change only when the target differs from the current value
    /// (or from the pending animated target), so repeated calls with the same
    /// inputs are free of side effects.
    pub fn recompute_frame_orientation(
        &mut self,
        interface: InterfaceOrientation,
    ) -> Option<FrameOrientationChange> {
        let (side, mirror_output, locked, current) = self.state.read(|s| {
            (
                s.camera_side,
                s.mirror_output,
                s.orientation_locked,
                s.frame_orientation,
            )
        })?;

        let effective = effective_orientation(locked, interface)?;
        let target = target_frame_orientation(side, mirror_output, effective);
        let current = self.pending.unwrap_or(current);
        if target == current {
            return None;
        }

        let change = FrameOrientationChange {
            from: current,
            to: target,
            animate: !locked && is_animatable(current, target),
        };

        if change.animate {
            self.pending = Some(target);
        } else {
            self.pending = None;
            self.state.write(|s| s.frame_orientation = target);
        }

        debug!(
            from = %change.from,
            to = %change.to,
            animate = change.animate,
            "Frame orientation change"
        );
        Some(change)
    }

    /// Apply a pending animated change
    ///
    /// Returns false when `target` was superseded in the meantime.
    pub fn commit(&mut self, target: FrameOrientation) -> bool {
        if self.pending != Some(target) {
            return false;
        }
        self.pending = None;
        self.state
            .write(|s| s.frame_orientation = target)
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{SharedCaptureState, StateOwner};

    fn tracker_with(state: SharedCaptureState) -> (StateOwner, OrientationTracker) {
        let owner = StateOwner::new(state);
        let tracker = OrientationTracker::new(owner.handle());
        (owner, tracker)
    }

    #[test]
    fn test_classification_thresholds_are_inclusive() {
        let prev = DeviceOrientation::Portrait;
        assert_eq!(
            classify_acceleration(Acceleration::new(0.75, 0.0, 0.0), prev),
            DeviceOrientation::LandscapeLeft
        );
        assert_eq!(
            classify_acceleration(Acceleration::new(-0.75, 0.0, 0.0), prev),
            DeviceOrientation::LandscapeRight
        );
        assert_eq!(
            classify_acceleration(Acceleration::new(0.0, -0.75, 0.0), DeviceOrientation::LandscapeLeft),
            DeviceOrientation::Portrait
        );
        assert_eq!(
            classify_acceleration(Acceleration::new(0.0, 0.75, 0.0), prev),
            DeviceOrientation::PortraitUpsideDown
        );
    }

    #[test]
    fn test_dead_zone_keeps_previous() {
        let values = [-0.749, -0.5, -0.1, 0.0, 0.3, 0.7499];
        for previous in [
            DeviceOrientation::LandscapeLeft,
            DeviceOrientation::LandscapeRight,
            DeviceOrientation::Portrait,
            DeviceOrientation::PortraitUpsideDown,
        ] {
            for x in values {
                for y in values {
                    let sample = Acceleration::new(x, y, -1.0);
                    assert_eq!(classify_acceleration(sample, previous), previous);
                }
            }
        }
    }

    #[test]
    fn test_x_axis_wins_over_y_axis() {
        let sample = Acceleration::new(0.8, -0.9, 0.0);
        assert_eq!(
            classify_acceleration(sample, DeviceOrientation::Portrait),
            DeviceOrientation::LandscapeLeft
        );
    }

    #[test]
    fn test_back_camera_mapping() {
        use FrameOrientation::*;
        use InterfaceOrientation as I;
        let cases = [
            (I::Portrait, Right, RightMirrored),
            (I::LandscapeLeft, Up, UpMirrored),
            (I::LandscapeRight, Down, DownMirrored),
            (I::FaceUp, Right, RightMirrored),
            (I::FaceDown, Right, RightMirrored),
            (I::Unknown, Right, RightMirrored),
        ];
        for (effective, plain, mirrored) in cases {
            assert_eq!(target_frame_orientation(CameraSide::Back, false, effective), plain);
            assert_eq!(target_frame_orientation(CameraSide::Back, true, effective), mirrored);
        }
    }

    #[test]
    fn test_front_camera_mapping_swaps_groups() {
        for effective in InterfaceOrientation::ALL {
            for mirror in [false, true] {
                let back = target_frame_orientation(CameraSide::Back, mirror, effective);
                let front = target_frame_orientation(CameraSide::Front, mirror, effective);
                assert_eq!(back.is_mirrored(), !front.is_mirrored());
                assert_eq!(back.mirrored(), front.mirrored());
            }
        }
    }

    #[test]
    fn test_locked_orientation_forces_portrait() {
        assert_eq!(
            effective_orientation(true, InterfaceOrientation::LandscapeLeft),
            Some(InterfaceOrientation::Portrait)
        );
        assert_eq!(
            effective_orientation(false, InterfaceOrientation::PortraitUpsideDown),
            None
        );
    }

    #[test]
    fn test_portrait_back_camera_scenario() {
        let (_owner, mut tracker) = tracker_with(SharedCaptureState {
            frame_orientation: FrameOrientation::Up,
            ..Default::default()
        });

        let change = tracker
            .recompute_frame_orientation(InterfaceOrientation::Portrait)
            .unwrap();
        assert_eq!(change.to, FrameOrientation::Right);
        assert!(change.animate);
        assert!(tracker.commit(FrameOrientation::Right));
        assert_eq!(
            tracker.state.read(|s| s.frame_orientation),
            Some(FrameOrientation::Right)
        );

        tracker.state.write(|s| s.mirror_output = true);
        let change = tracker
            .recompute_frame_orientation(InterfaceOrientation::Portrait)
            .unwrap();
        assert_eq!(change.to, FrameOrientation::RightMirrored);
        assert!(!change.animate, "cross-group changes are instant");
        assert_eq!(
            tracker.state.read(|s| s.frame_orientation),
            Some(FrameOrientation::RightMirrored)
        );
    }

    #[test]
    fn test_recompute_is_idempotent() {
        let (_owner, mut tracker) = tracker_with(SharedCaptureState::default());

        let first = tracker.recompute_frame_orientation(InterfaceOrientation::LandscapeLeft);
        assert!(first.is_some());
        // Pending animated target counts as current
        assert_eq!(
            tracker.recompute_frame_orientation(InterfaceOrientation::LandscapeLeft),
            None
        );
        assert!(tracker.commit(FrameOrientation::Up));
        assert_eq!(
            tracker.recompute_frame_orientation(InterfaceOrientation::LandscapeLeft),
            None
        );
    }

    #[test]
    fn test_unlocked_upside_down_keeps_frame_orientation() {
        let (_owner, mut tracker) = tracker_with(SharedCaptureState {
            frame_orientation: FrameOrientation::Up,
            ..Default::default()
        });
        assert_eq!(
            tracker.recompute_frame_orientation(InterfaceOrientation::PortraitUpsideDown),
            None
        );
    }

    #[test]
    fn test_upside_down_sample_still_updates_device_orientation() {
        let (_owner, mut tracker) = tracker_with(SharedCaptureState::default());
        let update = tracker.on_acceleration_sample(
            Some(Acceleration::new(0.0, 0.9, 0.0)),
            InterfaceOrientation::Portrait,
        );
        assert_eq!(
            update.device_orientation,
            Some(DeviceOrientation::PortraitUpsideDown)
        );
        assert_eq!(update.screen_rotation_blocked, Some(true));
        assert_eq!(update.frame_change, None);
    }

    #[test]
    fn test_locked_user_is_never_blocked() {
        let (_owner, mut tracker) = tracker_with(SharedCaptureState {
            orientation_locked: true,
            ..Default::default()
        });
        let update = tracker.on_acceleration_sample(
            Some(Acceleration::new(0.9, 0.0, 0.0)),
            InterfaceOrientation::Portrait,
        );
        assert_eq!(update.device_orientation, Some(DeviceOrientation::LandscapeLeft));
        assert_eq!(update.screen_rotation_blocked, None);
        assert!(!update.redraw_grid);
    }

    #[test]
    fn test_dropped_sample_changes_nothing() {
        let (_owner, mut tracker) = tracker_with(SharedCaptureState::default());
        let before = tracker.state.snapshot().unwrap();

        let update = tracker.on_acceleration_sample(None, InterfaceOrientation::LandscapeLeft);
        assert_eq!(update, OrientationUpdate::default());
        let update = tracker.on_acceleration_sample(
            Some(Acceleration::new(f64::NAN, 1.0, 0.0)),
            InterfaceOrientation::LandscapeLeft,
        );
        assert_eq!(update, OrientationUpdate::default());

        let after = tracker.state.snapshot().unwrap();
        assert_eq!(before.device_orientation, after.device_orientation);
        assert_eq!(before.frame_orientation, after.frame_orientation);
        assert_eq!(
            before.user_blocked_screen_rotation,
            after.user_blocked_screen_rotation
        );
    }

    #[test]
    fn test_superseded_commit_is_ignored() {
        let (_owner, mut tracker) = tracker_with(SharedCaptureState::default());
        tracker.recompute_frame_orientation(InterfaceOrientation::LandscapeLeft);
        tracker.recompute_frame_orientation(InterfaceOrientation::LandscapeRight);
        assert_eq!(tracker.pending(), Some(FrameOrientation::Down));
        assert!(!tracker.commit(FrameOrientation::Up));
        assert!(tracker.commit(FrameOrientation::Down));
    }

    #[test]
    fn test_detached_tracker_is_inert() {
        let mut tracker = OrientationTracker::new(StateHandle::detached());
        let update = tracker.on_acceleration_sample(
            Some(Acceleration::new(1.0, 0.0, 0.0)),
            InterfaceOrientation::LandscapeLeft,
        );
        assert!(update.is_empty());
        assert!(!update.redraw_grid);
    }
}
