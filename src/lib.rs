// facepuppet - real-time pointer-driven control loop for a remote portrait
// animation model. Converts high-frequency pointer motion into a bounded
// rate stream of control parameters over an adaptive WebSocket session.

pub mod config;
pub mod controller;
pub mod error;
pub mod gesture;
pub mod landmarks;
pub mod latency;
pub mod mapper;
pub mod params;
pub mod protocol;
pub mod state;
pub mod transport;

// Re-export the types callers wire together at the composition root.
pub use config::SessionConfig;
pub use controller::PortraitController;
pub use error::TransportError;
pub use gesture::{classify, Gesture, InteractionMode, REGION_SNAP_THRESHOLD};
pub use landmarks::{LandmarkPoint, Region, RegionCenters};
pub use latency::LatencyTracker;
pub use mapper::{map_range, MapOutcome, ParamMapper};
pub use params::ControlParams;
pub use protocol::{EditRequest, FramingMetadata, ServerMessage};
pub use state::{DisplayedImage, InteractionState, StateSnapshot};
pub use transport::{
    Connector, SessionEvent, SessionHandle, SessionState, TransportSession, WebSocketConnector,
    WireFrame, WireRx, WireTx,
};
