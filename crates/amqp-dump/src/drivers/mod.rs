//! Endpoint driver implementations and factories.

pub mod amqp;
pub mod archive;
pub mod memory;

pub use amqp::{AmqpDestination, AmqpSource};
pub use archive::{ArchiveDestination, ArchiveSource};
pub use memory::{MemoryDestination, MemorySource};

use crate::config::EndpointConfig;
use crate::core::{Destination, Source};
use crate::error::Result;

/// Build the source described by an endpoint configuration.
pub async fn create_source(config: &EndpointConfig) -> Result<Box<dyn Source>> {
    match config {
        EndpointConfig::Amqp(amqp) => Ok(Box::new(AmqpSource::connect(amqp).await?)),
        EndpointConfig::Archive(archive) => Ok(Box::new(ArchiveSource::open(archive)?)),
    }
}

/// Build the destination described by an endpoint configuration.
pub async fn create_destination(config: &EndpointConfig) -> Result<Box<dyn Destination>> {
    match config {
        EndpointConfig::Amqp(amqp) => Ok(Box::new(AmqpDestination::connect(amqp).await?)),
        EndpointConfig::Archive(archive) => Ok(Box::new(ArchiveDestination::create(archive))),
    }
}
