// Gesture-to-parameter translation. Each region owns a fixed piecewise
// clamp-linear mapping from one or two displacement axes to one or two
// control knobs; sign inversions are per axis where the intended physical
// direction opposes the raw pointer axis.

use log::{debug, warn};

use crate::gesture::{Gesture, InteractionMode};
use crate::landmarks::Region;
use crate::params::{
    ControlParams, AAA_RANGE, EEE_RANGE, EYEBROW_RANGE, EYES_RANGE, PUPIL_X_RANGE, PUPIL_Y_RANGE,
    ROTATE_PITCH_RANGE, ROTATE_ROLL_RANGE, ROTATE_YAW_RANGE,
};

/// Clamp-linear interpolation of `value` from the input window onto the
/// output range. Inputs outside the window pin to the range edges.
pub fn map_range(value: f64, in_min: f64, in_max: f64, out_min: f64, out_max: f64) -> f64 {
    let mapped = (value - in_min) * (out_max - out_min) / (in_max - in_min) + out_min;
    mapped.clamp(out_min, out_max)
}

/// Outcome of mapping one gesture.
#[derive(Debug, Clone, PartialEq)]
pub enum MapOutcome {
    /// Full parameter set with the update merged in.
    Applied(ControlParams),
    /// Hover preview: nothing computed, previous parameters stand.
    Unchanged,
    /// Candidate contained a non-finite value; discarded in its entirety.
    Rejected,
}

/// Translates classified gestures into parameter updates. The two cursor
/// toggles are always-on auxiliary rules that fire before the region rule
/// and lose to it on any shared knob.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParamMapper {
    /// Map raw pointer displacement to head pitch/yaw.
    pub follow_cursor: bool,
    /// Map raw pointer displacement to pupil offsets.
    pub gaze_at_cursor: bool,
}

impl ParamMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a gesture onto the previous parameter set.
    ///
    /// `pointer_offset` is the raw pointer displacement from the image
    /// center, consumed only by the cursor toggles; the region rules use
    /// the gesture's own center-relative vector.
    pub fn map_gesture(
        &self,
        gesture: &Gesture,
        pointer_offset: (f64, f64),
        mode: InteractionMode,
        previous: &ControlParams,
    ) -> MapOutcome {
        match mode {
            InteractionMode::Hovering => return MapOutcome::Unchanged,
            // Secondary is mapped like Primary for now but stays a distinct
            // mode end-to-end.
            InteractionMode::Primary | InteractionMode::Secondary => {}
        }

        let (dx, dy, _dz) = gesture.vector;
        let mut update = ControlParams::default();

        if self.follow_cursor {
            update.rotate_yaw = Some(map_range(
                -pointer_offset.0,
                -0.5,
                0.5,
                ROTATE_YAW_RANGE.0,
                ROTATE_YAW_RANGE.1,
            ));
            update.rotate_pitch = Some(map_range(
                pointer_offset.1,
                -0.5,
                0.5,
                ROTATE_PITCH_RANGE.0,
                ROTATE_PITCH_RANGE.1,
            ));
        }
        if self.gaze_at_cursor {
            update.pupil_x = Some(map_range(
                pointer_offset.0,
                -0.3,
                0.3,
                PUPIL_X_RANGE.0,
                PUPIL_X_RANGE.1,
            ));
            update.pupil_y = Some(map_range(
                pointer_offset.1,
                -0.3,
                0.3,
                PUPIL_Y_RANGE.0,
                PUPIL_Y_RANGE.1,
            ));
        }

        match gesture.region {
            Region::LeftEye | Region::RightEye => {
                // Dragging up opens the eyes.
                update.eyes = Some(map_range(-dy, -0.5, 0.5, EYES_RANGE.0, EYES_RANGE.1));
                update.pupil_x = Some(map_range(dx, -0.3, 0.3, PUPIL_X_RANGE.0, PUPIL_X_RANGE.1));
            }
            Region::LeftEyebrow | Region::RightEyebrow => {
                update.eyebrow = Some(map_range(
                    -dy,
                    -0.5,
                    0.5,
                    EYEBROW_RANGE.0,
                    EYEBROW_RANGE.1,
                ));
            }
            Region::Lips => {
                // Dragging up opens the mouth, horizontal drag widens it.
                update.aaa = Some(map_range(-dy, -0.3, 0.3, AAA_RANGE.0, AAA_RANGE.1));
                update.eee = Some(map_range(dx, -0.3, 0.3, EEE_RANGE.0, EEE_RANGE.1));
            }
            Region::FaceOval => {
                update.rotate_roll = Some(map_range(
                    dx,
                    -0.5,
                    0.5,
                    ROTATE_ROLL_RANGE.0,
                    ROTATE_ROLL_RANGE.1,
                ));
            }
            Region::Background => {
                update.rotate_yaw = Some(map_range(
                    -dx,
                    -0.5,
                    0.5,
                    ROTATE_YAW_RANGE.0,
                    ROTATE_YAW_RANGE.1,
                ));
                update.rotate_pitch = Some(map_range(
                    dy,
                    -0.5,
                    0.5,
                    ROTATE_PITCH_RANGE.0,
                    ROTATE_PITCH_RANGE.1,
                ));
            }
        }

        let candidate = previous.merged(&update);
        if !candidate.is_finite() {
            warn!(
                "discarding non-finite parameter update for {:?} gesture",
                gesture.region
            );
            return MapOutcome::Rejected;
        }
        debug!(
            "{:?} gesture ({:?}) -> {} knob(s)",
            gesture.region,
            mode,
            update.set_fields().len()
        );
        MapOutcome::Applied(candidate)
    }
}
