//! # twinhub-domain
//!
//! Pure data model of the twinhub digital twin.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps, values
//! - Define **Providers** (devices or logical things, identified by name and model)
//! - Define **Services** (named groups of resources, including the implicit `admin` service)
//! - Define **Resources** (timestamped values plus metadata, or invocable actions)
//! - Define the **model registry** that resolves resource typing when a provider is created
//! - Define **Notifications** (lifecycle, data, metadata, action) and their topics
//! - Define immutable **Snapshots** and the filters that select them
//! - Enforce the timestamped write policy and value-type rules
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or IO crates.
//! Serialization of commands and delivery of notifications live in the `app` crate.

pub mod error;
pub mod id;
pub mod time;
pub mod value;

pub mod model;
pub mod notification;
pub mod provider;
pub mod resource;
pub mod service;
pub mod snapshot;
pub mod topic;
pub mod twin;
