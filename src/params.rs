// Control parameter record for the remote portrait model. Every knob is
// optional so a value doubles as a partial update: fields present in an
// update overwrite, absent fields persist. Field names follow the server's
// wire vocabulary.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlParams {
    /// Eye openness.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eyes: Option<f64>,
    /// Eyebrow height.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eyebrow: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wink: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pupil_x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pupil_y: Option<f64>,
    /// Mouth open ("aaa" shape).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aaa: Option<f64>,
    /// Mouth width ("eee" shape).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eee: Option<f64>,
    /// Mouth pucker ("woo" shape).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub woo: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smile: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotate_pitch: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotate_yaw: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotate_roll: Option<f64>,
}

/// Declared valid range per knob, generally asymmetric.
pub const EYES_RANGE: (f64, f64) = (-20.0, 5.0);
pub const EYEBROW_RANGE: (f64, f64) = (-10.0, 15.0);
pub const WINK_RANGE: (f64, f64) = (0.0, 25.0);
pub const PUPIL_X_RANGE: (f64, f64) = (-15.0, 15.0);
pub const PUPIL_Y_RANGE: (f64, f64) = (-15.0, 15.0);
pub const AAA_RANGE: (f64, f64) = (-30.0, 120.0);
pub const EEE_RANGE: (f64, f64) = (-20.0, 15.0);
pub const WOO_RANGE: (f64, f64) = (-20.0, 15.0);
pub const SMILE_RANGE: (f64, f64) = (-0.3, 1.3);
pub const ROTATE_PITCH_RANGE: (f64, f64) = (-20.0, 20.0);
pub const ROTATE_YAW_RANGE: (f64, f64) = (-20.0, 20.0);
pub const ROTATE_ROLL_RANGE: (f64, f64) = (-20.0, 20.0);

impl ControlParams {
    /// Overwrite-if-present merge of a partial update over this set.
    pub fn merge(&mut self, update: &ControlParams) {
        for (slot, value) in self.slots_mut().into_iter().zip(update.slots()) {
            if value.is_some() {
                *slot = value;
            }
        }
    }

    /// Merged copy; the receiver is untouched.
    pub fn merged(&self, update: &ControlParams) -> ControlParams {
        let mut out = *self;
        out.merge(update);
        out
    }

    /// True when every set field is finite. An update that fails this is
    /// discarded in its entirety; there is no partial merge of a bad update.
    pub fn is_finite(&self) -> bool {
        self.slots().into_iter().flatten().all(f64::is_finite)
    }

    /// Set fields with their names and declared ranges, for validation and
    /// diagnostics.
    pub fn set_fields(&self) -> Vec<(&'static str, f64, (f64, f64))> {
        NAMED_RANGES
            .iter()
            .zip(self.slots())
            .filter_map(|((name, range), value)| value.map(|v| (*name, v, *range)))
            .collect()
    }

    fn slots(&self) -> [Option<f64>; 12] {
        [
            self.eyes,
            self.eyebrow,
            self.wink,
            self.pupil_x,
            self.pupil_y,
            self.aaa,
            self.eee,
            self.woo,
            self.smile,
            self.rotate_pitch,
            self.rotate_yaw,
            self.rotate_roll,
        ]
    }

    fn slots_mut(&mut self) -> [&mut Option<f64>; 12] {
        [
            &mut self.eyes,
            &mut self.eyebrow,
            &mut self.wink,
            &mut self.pupil_x,
            &mut self.pupil_y,
            &mut self.aaa,
            &mut self.eee,
            &mut self.woo,
            &mut self.smile,
            &mut self.rotate_pitch,
            &mut self.rotate_yaw,
            &mut self.rotate_roll,
        ]
    }
}

const NAMED_RANGES: [(&str, (f64, f64)); 12] = [
    ("eyes", EYES_RANGE),
    ("eyebrow", EYEBROW_RANGE),
    ("wink", WINK_RANGE),
    ("pupil_x", PUPIL_X_RANGE),
    ("pupil_y", PUPIL_Y_RANGE),
    ("aaa", AAA_RANGE),
    ("eee", EEE_RANGE),
    ("woo", WOO_RANGE),
    ("smile", SMILE_RANGE),
    ("rotate_pitch", ROTATE_PITCH_RANGE),
    ("rotate_yaw", ROTATE_YAW_RANGE),
    ("rotate_roll", ROTATE_ROLL_RANGE),
];
