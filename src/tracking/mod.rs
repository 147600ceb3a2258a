mod engine;
mod error;
mod lead;
mod types;
mod zoom;

pub use engine::{MotionSettings, TrackingEngine};
pub use error::TrackingError;
pub use lead::LeadPredictor;
pub use types::{ActuatorState, AimSolution, MoveCommand, ObserverSite, TargetSample, Velocity};
pub use zoom::ZoomModel;
