// Facial landmark geometry: the fixed region enumeration, the MediaPipe
// face-mesh index set owned by each region, and the per-detection center
// index that reduces hundreds of landmarks to seven named centers.

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single normalized 3D landmark, x/y in [0,1] relative to the image,
/// z a relative depth (0 when the detector does not report one).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LandmarkPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl LandmarkPoint {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// A landmark from a detector that reports no depth channel.
    pub fn flat(x: f64, y: f64) -> Self {
        Self { x, y, z: 0.0 }
    }
}

/// The closed set of semantic face regions a pointer gesture can target.
/// `Background` is the catch-all and always exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Region {
    Lips,
    LeftEye,
    LeftEyebrow,
    RightEye,
    RightEyebrow,
    FaceOval,
    Background,
}

impl Region {
    pub const ALL: [Region; 7] = [
        Region::Lips,
        Region::LeftEye,
        Region::LeftEyebrow,
        Region::RightEye,
        Region::RightEyebrow,
        Region::FaceOval,
        Region::Background,
    ];
}

/// Fixed center used for `Region::Background`.
pub const BACKGROUND_CENTER: LandmarkPoint = LandmarkPoint {
    x: 0.5,
    y: 0.5,
    z: 0.0,
};

// MediaPipe FaceLandmarker contour indices (478-point face mesh).
const LIPS: &[usize] = &[
    0, 13, 14, 17, 37, 39, 40, 61, 78, 80, 81, 82, 84, 87, 88, 91, 95, 146, 178, 181, 185, 191,
    267, 269, 270, 291, 308, 310, 311, 312, 314, 317, 318, 321, 324, 375, 402, 405, 409, 415,
];

const LEFT_EYE: &[usize] = &[
    249, 263, 362, 373, 374, 380, 381, 382, 384, 385, 386, 387, 388, 390, 398, 466,
];

const LEFT_EYEBROW: &[usize] = &[276, 282, 283, 285, 293, 295, 296, 300, 334, 336];

const RIGHT_EYE: &[usize] = &[
    7, 33, 133, 144, 145, 153, 154, 155, 157, 158, 159, 160, 161, 163, 173, 246,
];

const RIGHT_EYEBROW: &[usize] = &[46, 52, 53, 55, 63, 65, 66, 70, 105, 107];

const FACE_OVAL: &[usize] = &[
    10, 21, 54, 58, 67, 93, 103, 109, 127, 132, 136, 148, 149, 150, 152, 162, 172, 176, 234, 251,
    284, 288, 297, 323, 332, 338, 356, 361, 365, 377, 378, 379, 389, 397, 400, 454,
];

lazy_static! {
    /// Index set owned by each non-background region.
    pub static ref REGION_INDEX_SETS: HashMap<Region, &'static [usize]> = {
        let mut sets: HashMap<Region, &'static [usize]> = HashMap::new();
        sets.insert(Region::Lips, LIPS);
        sets.insert(Region::LeftEye, LEFT_EYE);
        sets.insert(Region::LeftEyebrow, LEFT_EYEBROW);
        sets.insert(Region::RightEye, RIGHT_EYE);
        sets.insert(Region::RightEyebrow, RIGHT_EYEBROW);
        sets.insert(Region::FaceOval, FACE_OVAL);
        sets
    };
}

/// Region centers for one detection result. Recomputed once per detection,
/// not per pointer move. A region whose index set yielded no points has no
/// center this cycle; `Background` is always present.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionCenters {
    centers: HashMap<Region, LandmarkPoint>,
}

impl RegionCenters {
    /// Reduce a detector's landmark sequence to per-region centroids.
    /// Landmarks outside the sequence bounds simply do not contribute.
    pub fn from_landmarks(points: &[LandmarkPoint]) -> Self {
        let mut centers = HashMap::new();
        centers.insert(Region::Background, BACKGROUND_CENTER);

        for (region, indices) in REGION_INDEX_SETS.iter() {
            let mut sum = (0.0, 0.0, 0.0);
            let mut count = 0usize;
            for &i in indices.iter() {
                if let Some(p) = points.get(i) {
                    sum.0 += p.x;
                    sum.1 += p.y;
                    sum.2 += p.z;
                    count += 1;
                }
            }
            if count > 0 {
                let n = count as f64;
                centers.insert(
                    *region,
                    LandmarkPoint::new(sum.0 / n, sum.1 / n, sum.2 / n),
                );
            }
        }

        Self { centers }
    }

    pub fn center(&self, region: Region) -> Option<LandmarkPoint> {
        self.centers.get(&region).copied()
    }

    /// Regions that have a defined center this cycle.
    pub fn defined(&self) -> impl Iterator<Item = (Region, LandmarkPoint)> + '_ {
        self.centers.iter().map(|(r, c)| (*r, *c))
    }

    pub fn len(&self) -> usize {
        self.centers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.centers.is_empty()
    }
}
