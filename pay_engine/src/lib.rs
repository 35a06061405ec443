//! Pay Engine library crate.
//!
//! This crate resolves which rate card prices a driver's trip leg and
//! computes the payable amount with its accessorial add-ons.  External
//! applications may depend on the `pay_engine` crate and call
//! `engine::compute_pay` or `engine::run_batch` directly against a
//! `catalog::RateCatalog` snapshot, or embed the API via
//! `api::build_router`.

pub mod accessorial;
pub mod api;
pub mod base;
pub mod breakdown;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod matcher;
pub mod models;
pub mod money;
pub mod resolver;
pub mod telemetry;
