#![doc = "manual-catalog-core: core logic library for manual-catalog."]

//! This crate holds every domain module of manual-catalog: classifying files
//! in a `Manufacturer/Model/File` tree, minting or constructing shareable
//! links, validating them, persisting the JSON catalog, and watching the tree
//! to rebuild and publish the catalog on change.
//!
//! # Usage
//! The CLI crate wires these modules together from a loaded [`config::Config`].
//! Tests use the `mockall` mocks in [`contract`].

pub mod auth;
pub mod catalog;
pub mod classify;
pub mod config;
pub mod contract;
pub mod error;
pub mod graph;
pub mod publish;
pub mod resolve;
pub mod synchronise;
pub mod validate;
pub mod watch;
