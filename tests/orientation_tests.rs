// SPDX-License-Identifier: GPL-3.0-only

//! Frame orientation mapping and tracker behavior through the public API

use camera_pipeline::orientation::{
    Acceleration, OrientationTracker, effective_orientation, target_frame_orientation,
};
use camera_pipeline::state::{
    CameraSide, DeviceOrientation, FrameOrientation, InterfaceOrientation, SharedCaptureState,
    StateOwner,
};

fn expected_base(interface: InterfaceOrientation) -> Option<FrameOrientation> {
    match interface {
        InterfaceOrientation::PortraitUpsideDown => None,
        InterfaceOrientation::LandscapeLeft => Some(FrameOrientation::Up),
        InterfaceOrientation::LandscapeRight => Some(FrameOrientation::Down),
        _ => Some(FrameOrientation::Right),
    }
}

#[test]
fn test_full_mapping_table() {
    for side in [CameraSide::Back, CameraSide::Front] {
        for mirror in [false, true] {
            let mirrored_group = match side {
                CameraSide::Back => mirror,
                CameraSide::Front => !mirror,
            };
            for interface in InterfaceOrientation::ALL {
                let actual = effective_orientation(false, interface)
                    .map(|effective| target_frame_orientation(side, mirror, effective));
                let expected = expected_base(interface)
                    .map(|base| if mirrored_group { base.mirrored() } else { base });
                assert_eq!(
                    actual, expected,
                    "side={:?} mirror={} interface={:?}",
                    side, mirror, interface
                );
            }
        }
    }
}

#[test]
fn test_locked_always_maps_to_portrait() {
    for interface in InterfaceOrientation::ALL {
        assert_eq!(
            effective_orientation(true, interface),
            Some(InterfaceOrientation::Portrait)
        );
    }
    let effective = InterfaceOrientation::Portrait;
    assert_eq!(
        target_frame_orientation(CameraSide::Back, false, effective),
        FrameOrientation::Right
    );
    assert_eq!(
        target_frame_orientation(CameraSide::Front, false, effective),
        FrameOrientation::RightMirrored
    );
}

fn sample_for(orientation: DeviceOrientation) -> Option<Acceleration> {
    Some(match orientation {
        DeviceOrientation::LandscapeLeft => Acceleration::new(0.95, 0.0, -0.1),
        DeviceOrientation::LandscapeRight => Acceleration::new(-0.95, 0.0, -0.1),
        DeviceOrientation::Portrait => Acceleration::new(0.0, -0.95, -0.1),
        DeviceOrientation::PortraitUpsideDown => Acceleration::new(0.0, 0.95, -0.1),
    })
}

#[test]
fn test_rotating_with_the_ui_animates_each_step() {
    let owner = StateOwner::new(SharedCaptureState::default());
    let state = owner.handle();
    let mut tracker = OrientationTracker::new(state.clone());

    let steps = [
        (
            DeviceOrientation::LandscapeLeft,
            InterfaceOrientation::LandscapeLeft,
            FrameOrientation::Up,
        ),
        (
            DeviceOrientation::Portrait,
            InterfaceOrientation::Portrait,
            FrameOrientation::Right,
        ),
        (
            DeviceOrientation::LandscapeRight,
            InterfaceOrientation::LandscapeRight,
            FrameOrientation::Down,
        ),
    ];

    for (device, interface, frame) in steps {
        let update = tracker.on_acceleration_sample(sample_for(device), interface);
        assert_eq!(update.device_orientation, Some(device));
        assert!(update.redraw_grid);

        let change = update.frame_change.expect("frame orientation should change");
        assert_eq!(change.to, frame);
        assert!(change.animate);
        assert_eq!(tracker.pending(), Some(frame));

        // Not visible until the fade-out completes
        assert_ne!(state.read(|s| s.frame_orientation), Some(frame));
        assert!(tracker.commit(frame));
        assert_eq!(state.read(|s| s.frame_orientation), Some(frame));
        assert_eq!(state.read(|s| s.user_blocked_screen_rotation), Some(false));
    }
}

#[test]
fn test_ui_lagging_behind_device_blocks_rotation_until_it_catches_up() {
    let owner = StateOwner::new(SharedCaptureState::default());
    let state = owner.handle();
    let mut tracker = OrientationTracker::new(state.clone());

    let update = tracker.on_acceleration_sample(
        sample_for(DeviceOrientation::LandscapeRight),
        InterfaceOrientation::Portrait,
    );
    assert_eq!(update.screen_rotation_blocked, Some(true));
    assert!(update.frame_change.is_none());

    let update = tracker.on_acceleration_sample(
        sample_for(DeviceOrientation::LandscapeRight),
        InterfaceOrientation::LandscapeRight,
    );
    assert_eq!(update.screen_rotation_blocked, Some(false));
    assert_eq!(
        update.frame_change.map(|c| c.to),
        Some(FrameOrientation::Down)
    );
}

#[test]
fn test_mirror_toggle_is_applied_immediately() {
    let owner = StateOwner::new(SharedCaptureState::default());
    let state = owner.handle();
    let mut tracker = OrientationTracker::new(state.clone());

    state.write(|s| s.mirror_output = true);
    let change = tracker
        .recompute_frame_orientation(InterfaceOrientation::Portrait)
        .expect("mirror toggle changes the group");
    assert!(!change.animate);
    assert_eq!(change.to, FrameOrientation::RightMirrored);
    assert_eq!(
        state.read(|s| s.frame_orientation),
        Some(FrameOrientation::RightMirrored)
    );
    assert_eq!(tracker.pending(), None);
}

#[test]
fn test_dead_zone_keeps_previous_orientation() {
    let owner = StateOwner::new(SharedCaptureState {
        device_orientation: DeviceOrientation::LandscapeLeft,
        ..Default::default()
    });
    let mut tracker = OrientationTracker::new(owner.handle());

    let update = tracker.on_acceleration_sample(
        Some(Acceleration::new(0.5, -0.5, -0.7)),
        InterfaceOrientation::LandscapeLeft,
    );
    assert_eq!(update.device_orientation, None);
    assert_eq!(
        owner.handle().read(|s| s.device_orientation),
        Some(DeviceOrientation::LandscapeLeft)
    );
}
