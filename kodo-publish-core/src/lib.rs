#![doc = "kodo-publish-core: core pipeline library for kodo-publish."]

//! This crate contains the publish pipeline and its data model. Talking to the
//! actual storage and CDN services is left to implementors of the traits in
//! [`contract`]; the CLI crate ships the Qiniu client.
//!
//! # Usage
//! Build a [`config::PublishConfig`], wire the capabilities into a
//! [`publish::Services`] and call [`publish::publish`].

pub mod config;
pub mod contract;
pub mod error;
pub mod executor;
pub mod keys;
pub mod plan;
pub mod postprocess;
pub mod publish;
pub mod retry;
pub mod scheduler;
pub mod uploader;
