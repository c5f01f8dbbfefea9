// src/session/mod.rs

//! Client-side exam session: the proctored, timed, sectioned exam flow.

pub mod answer_store;
pub mod controller;
pub mod countdown;
pub mod driver;
pub mod http_api;
pub mod integrity;
pub mod navigator;
pub mod ports;

pub use controller::{ExamSessionController, FinalizeReason, Finalized, Phase};
pub use ports::{SessionPorts, SubmitOutcome};
