//! dbc-engine: reconciliation engine for clustered database resources.
//!
//! The remote control plane accepts mutations immediately but applies them
//! over time. This crate turns "desired spec vs observed state" into an
//! ordered plan of remote calls, drives each call to completion by polling
//! status under a caller deadline, and reports partial progress on failure.

pub mod api;
pub mod config;
pub mod error;
pub mod executor;
pub mod lifecycle;
pub mod model;
pub mod planner;
pub mod poller;
pub mod sim;
pub mod status;
pub mod template;
pub mod validation;

pub use api::{ClusterApi, TemplateApi};
pub use config::EngineConfig;
pub use error::{ApiError, EngineError, Result, ValidationError};
pub use executor::OperationExecutor;
pub use lifecycle::ClusterLifecycle;
pub use model::{ClusterObserved, ClusterSpec};
pub use planner::{Operation, Plan, plan};
pub use poller::{StateWaiter, wait_for_state};
pub use sim::SimulatedCloud;
pub use status::{ClusterStatus, Transition};
pub use template::{ClusterTemplate, TemplateLookup, TemplateQuery};
