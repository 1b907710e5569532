//! Concurrent call-dispatch engine for the volley load generator
//!
//! A [`Scheduler`] launches dispatch cycles at a runtime-adjustable rate.
//! Each cycle, run by the [`Dispatcher`], picks a random simulated client
//! from the [`ClientRegistry`], chooses a legal protocol action for it and
//! executes that action against the target, signing every write with a
//! nonce from the [`NoncePool`] and timing every exchange in the
//! [`LatencyRecorder`]. The [`ChallengeResponder`] answers the target's
//! http-01 validation requests for the whole run.

pub mod actions;
pub mod client;
pub mod csr;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod latency;
pub mod nonce;
pub mod protocol;
pub mod rate;
pub mod registry;
pub mod report;
pub mod responder;
pub mod scheduler;
pub mod shutdown;
pub mod signing;
pub mod state;

pub use actions::{choose_action, legal_actions, Action, LegalityContext, REVOCATION_THRESHOLD};
pub use client::{Authorization, ClientRecord, ClientSnapshot, IssuedCertificate};
pub use dispatcher::{Dispatcher, Execution};
pub use engine::run;
pub use error::{LoadError, LoadResult};
pub use latency::{LatencyRecorder, OperationStats};
pub use nonce::NoncePool;
pub use rate::RateHandle;
pub use registry::ClientRegistry;
pub use report::LoadReport;
pub use responder::{ChallengeResponder, ChallengeTokens};
pub use scheduler::{CycleOutcome, CycleRunner, RunSummary, Scheduler, SchedulerConfig};
pub use shutdown::{ShutdownCoordinator, ShutdownError, ShutdownSignal};
pub use signing::KeyMaterial;
pub use state::EngineState;
