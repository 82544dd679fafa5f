//! Query compilation and execution.
//!
//! A read flows through four stages: [`classify`] tags each attribute with its
//! key role, [`expression`] renders conditions as native fragments,
//! [`planner`] picks a targeted read or a scan and assembles the request, and
//! [`executor`] pages through the store before [`postprocess`] sorts and
//! windows the result.

pub mod classify;
pub mod executor;
pub mod explain;
pub mod expression;
pub mod planner;
pub mod postprocess;

pub use classify::{classify, role_of, Classification, KeyRole, SortKeyMatch};
pub use executor::{CancellationToken, QueryExecutor, ReadContext, ReadOutcome};
pub use explain::{ExplainResult, ExplainService};
pub use expression::{resolve_names, translate, translate_any_of, Fragment, Placeholders, Position};
pub use planner::{QueryPlan, QueryPlanner, ReadMode};
pub use postprocess::{apply_window, effective_order, sort_items};
