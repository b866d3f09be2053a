//! Glue between the digest stages and the resilience crates.
//!
//! Each stage of the digest (fetch, classify, extract, research, analyze,
//! critique, send) is a [`StageHandler`] that talks to one pooled client.
//! [`PooledStep`] turns a handler into a saga step: every attempt borrows a
//! client from the [`PipelineContext`]'s pool and runs under its recovery
//! handler, and rollback borrows a client to undo the stage's effect.

mod config;
mod context;
mod error;
mod handler;
mod stage;
mod step;

pub use config::{ConfigError, DigestConfig};
pub use context::PipelineContext;
pub use error::{HandlerError, PipelineError};
pub use handler::StageHandler;
pub use stage::Stage;
pub use step::PooledStep;
