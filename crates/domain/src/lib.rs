//! # climgroup-domain
//!
//! Pure domain model for area-scoped window control of climate groups.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Describe **Entities** through their registry record and reported state
//! - Describe **Areas** and **Devices** (the registry window control reads)
//! - Define the **target state** a group intends its actuators to hold
//! - Translate state fragments into **service calls**
//! - Tag dispatched commands with a **call context** and carry it on
//!   state-change **events**
//! - Model the per-sensor **window phases** and the decisions they produce
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod area;
pub mod context;
pub mod device;
pub mod entity;
pub mod event;
pub mod hvac;
pub mod service;
pub mod target;
pub mod window;
