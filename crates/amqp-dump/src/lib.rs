//! # amqp-dump
//!
//! Move messages between AMQP brokers and archive dump files through a
//! bounded, backpressured streaming pipeline.
//!
//! The pipeline links a source, a bounded buffer, an in-flight transform
//! stage and a destination writer with propagate-completion semantics:
//!
//! - at most `buffer_capacity` items are in flight between source and
//!   transform (strict backpressure, no unbounded buffering);
//! - items are delivered in production order and counted exactly once;
//! - a fault in any stage tears the channel chain down so no stage blocks
//!   forever, and the run reports a single terminal failure;
//! - source and destination resources are released exactly once on every
//!   exit path.
//!
//! ## Example
//!
//! ```rust,no_run
//! use amqp_dump::{Config, Orchestrator};
//! use amqp_dump::drivers::{create_destination, create_source};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> amqp_dump::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let source = create_source(&config.source).await?;
//!     let destination = create_destination(&config.destination).await?;
//!
//!     let orchestrator = Orchestrator::new(source, destination, config.options);
//!     let summary = orchestrator.run(CancellationToken::new()).await?;
//!     println!("Copied {} messages", summary.messages_transferred);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod drivers;
pub mod error;
pub mod orchestrator;
pub mod pipeline;

// Re-exports for convenient access
pub use config::{AmqpConfig, ArchiveConfig, Config, DumpOptions, EndpointConfig};
pub use core::{
    Destination, DestinationWriter, MessageItem, PropertyValue, Source, SourceInfo, SourceKind,
};
pub use error::{DumpError, Result};
pub use orchestrator::{DumpSummary, Orchestrator};
