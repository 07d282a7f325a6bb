//! Special Resource runtime: cluster fact collection for accelerator software stacks
//!
//! Each reconciliation pass gathers the node OS and kernel, cluster version,
//! per-node upgrade state, build push secret, machine OS image and cluster
//! proxy into a [`runtime::RuntimeSnapshot`] used to render driver manifests.
//! The rendered manifests are then post-processed by [`manifest::ProxyInjector`]
//! so every container inherits the cluster proxy.

pub mod cluster;
pub mod config;
pub mod error;
pub mod manifest;
pub mod runtime;

pub use crate::error::{Error, Result};
