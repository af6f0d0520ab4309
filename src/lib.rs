//! Checkout substeps - collapsible checkout sections backed by the customer
//! session and committed onto orders.
//!
//! A [`substeps::SubstepController`] drives each section between hidden,
//! editing and review. Values live in a [`session::SessionStore`] until order
//! placement, when an [`order::OrderCommitter`] moves them onto the order.
//! [`summary::SummaryRenderer`] produces the same read-only text from either
//! side.

pub mod config;
pub mod error;
pub mod logging;
pub mod order;
pub mod render;
pub mod rest;
pub mod retry;
pub mod schema;
pub mod session;
pub mod substeps;
pub mod summary;
