// The shared session state: current image, parameters, region and overlay
// bookkeeping. Owned by the controller and mutated only from the two write
// paths (mapper output, session events); every other consumer reads cloned
// snapshots.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::landmarks::Region;
use crate::params::ControlParams;
use crate::protocol::FramingMetadata;

/// What the renderer should currently display.
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayedImage {
    /// Nothing loaded yet.
    None,
    /// The unmodified uploaded image.
    Original,
    /// The latest rendered frame from the server.
    Frame(Vec<u8>),
}

#[derive(Debug, Clone)]
pub struct InteractionState {
    original_image: Option<Vec<u8>>,
    displayed: DisplayedImage,
    params: ControlParams,
    current_region: Option<Region>,
    overlay_opacity: f64,
    animation_phase: f64,
    session_id: Option<String>,
    framing: Option<FramingMetadata>,
    last_updated: Option<DateTime<Utc>>,
}

impl Default for InteractionState {
    fn default() -> Self {
        Self {
            original_image: None,
            displayed: DisplayedImage::None,
            params: ControlParams::default(),
            current_region: None,
            overlay_opacity: 0.0,
            animation_phase: 0.0,
            session_id: None,
            framing: None,
            last_updated: None,
        }
    }
}

impl InteractionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// A locally selected image replaces everything: the original is shown
    /// again and the server session is forgotten, forcing a fresh upload.
    pub fn set_original_image(&mut self, bytes: Vec<u8>) {
        self.original_image = Some(bytes);
        self.displayed = DisplayedImage::Original;
        self.session_id = None;
        self.framing = None;
        self.touch();
    }

    /// Optimistic local update; the caller has already validated the set.
    pub fn apply_params(&mut self, params: ControlParams) {
        self.params = params;
        self.touch();
    }

    pub fn set_region(&mut self, region: Region) {
        self.current_region = Some(region);
        // Activity pulses the landmark overlay back to fully visible.
        self.overlay_opacity = 1.0;
        self.touch();
    }

    /// Fade the overlay and advance the idle animation; called once per
    /// render tick with the frame delta in seconds.
    pub fn animation_tick(&mut self, dt: f64) {
        self.overlay_opacity = (self.overlay_opacity - dt * 2.0).max(0.0);
        self.animation_phase = (self.animation_phase + dt).fract();
    }

    pub fn apply_frame(&mut self, bytes: Vec<u8>) {
        self.displayed = DisplayedImage::Frame(bytes);
        self.touch();
    }

    pub fn apply_metadata(&mut self, session_id: Option<String>, framing: Option<FramingMetadata>) {
        if session_id.is_some() {
            self.session_id = session_id;
        }
        if framing.is_some() {
            self.framing = framing;
        }
        self.touch();
    }

    /// A remote-reported error invalidates everything derived from the
    /// server session: show the original image again and forget the
    /// identity so the next gesture re-uploads from scratch.
    pub fn apply_remote_error(&mut self) {
        self.displayed = if self.original_image.is_some() {
            DisplayedImage::Original
        } else {
            DisplayedImage::None
        };
        self.session_id = None;
        self.touch();
    }

    pub fn params(&self) -> &ControlParams {
        &self.params
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            displayed: self.displayed.clone(),
            params: self.params,
            current_region: self.current_region,
            overlay_opacity: self.overlay_opacity,
            animation_phase: self.animation_phase,
            session_id: self.session_id.clone(),
            framing: self.framing.clone(),
            last_updated: self.last_updated,
        }
    }

    fn touch(&mut self) {
        self.last_updated = Some(Utc::now());
    }
}

/// Read-only view handed to rendering and other passive consumers.
#[derive(Debug, Clone)]
pub struct StateSnapshot {
    pub displayed: DisplayedImage,
    pub params: ControlParams,
    pub current_region: Option<Region>,
    pub overlay_opacity: f64,
    pub animation_phase: f64,
    pub session_id: Option<String>,
    pub framing: Option<FramingMetadata>,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Serializable digest for diagnostics surfaces.
#[derive(Debug, Clone, Serialize)]
pub struct StateDigest {
    pub has_image: bool,
    pub session_id: Option<String>,
    pub current_region: Option<Region>,
    pub overlay_opacity: f64,
}

impl StateSnapshot {
    pub fn digest(&self) -> StateDigest {
        StateDigest {
            has_image: self.displayed != DisplayedImage::None,
            session_id: self.session_id.clone(),
            current_region: self.current_region,
            overlay_opacity: self.overlay_opacity,
        }
    }
}
