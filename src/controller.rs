// Composition of the interaction loop: pointer events are classified
// against the latest landmark centers, mapped to parameters, applied
// optimistically to the state store and forwarded through the throttled
// session; inbound session events flow back into the same store.

use log::{debug, info, warn};

use crate::error::TransportError;
use crate::gesture::{classify, Gesture, InteractionMode};
use crate::landmarks::{LandmarkPoint, Region, RegionCenters};
use crate::mapper::{MapOutcome, ParamMapper};
use crate::state::{InteractionState, StateSnapshot};
use crate::transport::{SessionEvent, SessionHandle};

pub struct PortraitController {
    mapper: ParamMapper,
    centers: Option<RegionCenters>,
    state: InteractionState,
    session: SessionHandle,
}

impl PortraitController {
    pub fn new(session: SessionHandle) -> Self {
        Self {
            mapper: ParamMapper::new(),
            centers: None,
            state: InteractionState::new(),
            session,
        }
    }

    pub fn set_follow_cursor(&mut self, enabled: bool) {
        self.mapper.follow_cursor = enabled;
    }

    pub fn set_gaze_at_cursor(&mut self, enabled: bool) {
        self.mapper.gaze_at_cursor = enabled;
    }

    /// Feed one landmark detection result. Centers are reduced here, once
    /// per detection, never per pointer move.
    pub fn on_landmarks(&mut self, points: &[LandmarkPoint]) {
        self.centers = Some(RegionCenters::from_landmarks(points));
    }

    /// Select a new local image: remembered as the revert target, uploaded
    /// whole, and the stale center index dropped until the next detection.
    pub fn load_image(&mut self, bytes: Vec<u8>) -> Result<(), TransportError> {
        self.centers = None;
        self.state.set_original_image(bytes.clone());
        self.session.upload_image(bytes)
    }

    /// Handle one pointer event. Returns the classified gesture so the
    /// caller can drive hover feedback; a transport failure is reported to
    /// the caller, which may retry, while the optimistic local update
    /// stands.
    pub fn on_pointer(
        &mut self,
        x: f64,
        y: f64,
        mode: InteractionMode,
        constrain_to: Option<Region>,
    ) -> Result<Gesture, TransportError> {
        let gesture = classify(self.centers.as_ref(), (x, y), constrain_to);
        self.state.set_region(gesture.region);

        let offset = (x - 0.5, y - 0.5);
        match self
            .mapper
            .map_gesture(&gesture, offset, mode, self.state.params())
        {
            MapOutcome::Applied(params) => {
                self.state.apply_params(params);
                self.session.send_params(params)?;
            }
            MapOutcome::Unchanged => {}
            MapOutcome::Rejected => {
                debug!("pointer update rejected; previous parameters remain in force");
            }
        }
        Ok(gesture)
    }

    /// Apply one session event to the state store.
    pub fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Metadata {
                session_id,
                framing,
                new_identity,
            } => {
                self.state.apply_metadata(session_id, framing);
                if new_identity {
                    self.prime_baseline();
                }
            }
            SessionEvent::Frame(bytes) => self.state.apply_frame(bytes),
            SessionEvent::RemoteError(reason) => {
                warn!("reverting to original image: {reason}");
                self.state.apply_remote_error();
            }
            SessionEvent::StateChanged(state) => debug!("session state: {state:?}"),
            SessionEvent::Warning(message) => debug!("session warning: {message}"),
            SessionEvent::GaveUp { attempts } => {
                warn!("session gave up after {attempts} reconnect attempts");
            }
        }
    }

    /// One synthetic zero-displacement background edit, sent when the
    /// server issues a new session identity to prime its baseline framing.
    fn prime_baseline(&mut self) {
        info!("priming baseline framing for new session identity");
        let gesture = Gesture {
            region: Region::Background,
            distance_from_center: 0.0,
            vector: (0.0, 0.0, 0.0),
        };
        if let MapOutcome::Applied(params) = self.mapper.map_gesture(
            &gesture,
            (0.0, 0.0),
            InteractionMode::Primary,
            self.state.params(),
        ) {
            self.state.apply_params(params);
            if let Err(e) = self.session.send_params(params) {
                warn!("baseline priming send failed: {e}");
            }
        }
    }

    /// Advance overlay fade and idle animation; called per render tick.
    pub fn animation_tick(&mut self, dt: f64) {
        self.state.animation_tick(dt);
    }

    pub fn snapshot(&self) -> StateSnapshot {
        self.state.snapshot()
    }

    pub fn shutdown(&self) {
        self.session.shutdown();
    }
}
