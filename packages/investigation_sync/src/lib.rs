//! Live client-side state for streamed research investigations.
//!
//! A backend agent runs an investigation and pushes events over Server-Sent
//! Events: hypotheses proposed and evaluated, experiments started and
//! finished, tool calls, findings, and a terminal `completed` or `error`.
//! This crate folds that stream into one consistent [`InvestigationState`],
//! reconnecting with bounded backoff while the investigation is live.
//!
//! - [`transport`]: SSE decoding and the [`Connector`] seam
//! - [`event`] and [`reducer`]: classification and the pure projection
//! - [`synchronizer`]: the task tying a connection to the aggregate

pub mod error;
pub mod event;
pub mod hydration;
pub mod lifecycle;
pub mod model;
pub mod reconnect;
pub mod reducer;
pub mod state;
pub mod synchronizer;
pub mod transport;

pub use error::{EnvelopeError, EventError, TransportError};
pub use event::{EventKind, InvestigationEvent, RawEvent, classify};
pub use lifecycle::{TransitionAnomaly, TransitionError};
pub use model::{
    Candidate, CostInfo, EvidenceType, Experiment, ExperimentStatus, Finding, Hypothesis,
    HypothesisStatus, NegativeControl,
};
pub use reconnect::Backoff;
pub use reducer::{project, reduce, replay};
pub use state::{InvestigationSnapshot, InvestigationState};
pub use synchronizer::Synchronizer;
pub use transport::{Connector, EventStream, SseConnector, SseDecoder, StreamEndpoint, WireMessage};
