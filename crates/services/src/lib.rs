#![forbid(unsafe_code)]

pub mod api;
pub mod app_services;
pub mod config;
pub mod drafts;
pub mod error;
pub mod planner_service;

pub use planner_core::Clock;

pub use api::{HttpPlannerApi, PlannerApi};
pub use app_services::AppServices;
pub use config::PlannerConfig;
pub use drafts::settle_drafts;
pub use error::{PlannerError, TransportError};
pub use planner_service::{GeneratedPlan, PlannerService};
