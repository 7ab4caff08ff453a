// Gesture classification: map a normalized pointer position to the nearest
// semantic face region and the displacement vector from its center.

use serde::{Deserialize, Serialize};

use crate::landmarks::{LandmarkPoint, Region, RegionCenters, BACKGROUND_CENTER};

/// Beyond this distance (normalized image-space units) an unconstrained
/// pointer no longer snaps to a facial region and falls back to the
/// background, so far-away gestures stay anchored to the face's roll axis
/// instead of an arbitrary near region.
pub const REGION_SNAP_THRESHOLD: f64 = 0.05;

/// Which pointer button / touch count produced the event. Hovering is
/// advisory only and never mutates parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InteractionMode {
    Primary,
    Secondary,
    Hovering,
}

/// A classified pointer event. The vector is pointer minus region center,
/// not a raw landmark delta.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Gesture {
    pub region: Region,
    pub distance_from_center: f64,
    pub vector: (f64, f64, f64),
}

fn offset_from(center: LandmarkPoint, pointer: (f64, f64)) -> (f64, f64, f64) {
    (pointer.0 - center.x, pointer.1 - center.y, -center.z)
}

fn distance(v: (f64, f64, f64)) -> f64 {
    (v.0 * v.0 + v.1 * v.1 + v.2 * v.2).sqrt()
}

/// Classify a pointer position against the current region centers.
///
/// `constrain_to` locks classification to one region (used while a drag is
/// in progress so the grabbed region cannot change under the pointer); the
/// snap threshold only applies to unconstrained classification. With no
/// centers computed yet, or a constrained region that has no center this
/// cycle, the result degrades to a background gesture and never errors.
pub fn classify(
    centers: Option<&RegionCenters>,
    pointer: (f64, f64),
    constrain_to: Option<Region>,
) -> Gesture {
    let Some(centers) = centers else {
        return Gesture {
            region: Region::Background,
            distance_from_center: 0.0,
            vector: (pointer.0, pointer.1, 0.0),
        };
    };

    // The face-oval displacement is tracked regardless of filtering; it is
    // the inflection point for far-away gestures.
    let oval = centers
        .center(Region::FaceOval)
        .map(|c| offset_from(c, pointer));

    let mut best: Option<(Region, f64, (f64, f64, f64))> = None;
    for (region, center) in centers.defined() {
        if let Some(only) = constrain_to {
            if region != only {
                continue;
            }
        }
        let vector = offset_from(center, pointer);
        let dist = distance(vector);
        if best.map_or(true, |(_, d, _)| dist < d) {
            best = Some((region, dist, vector));
        }
    }

    match best {
        Some((region, dist, vector)) => {
            if constrain_to.is_none() && dist > REGION_SNAP_THRESHOLD {
                let vector = oval.unwrap_or_else(|| offset_from(BACKGROUND_CENTER, pointer));
                Gesture {
                    region: Region::Background,
                    distance_from_center: dist,
                    vector,
                }
            } else {
                Gesture {
                    region,
                    distance_from_center: dist,
                    vector,
                }
            }
        }
        // Constrained to a region with no center this cycle.
        None => Gesture {
            region: Region::Background,
            distance_from_center: 0.0,
            vector: (pointer.0, pointer.1, 0.0),
        },
    }
}
