//! Configuration loading and validation.

mod types;

pub use types::*;

use crate::error::{DumpError, Result};
use std::path::Path;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.options.buffer_capacity == 0 {
            return Err(DumpError::Config(
                "buffer_capacity must be positive".to_string(),
            ));
        }

        validate_endpoint(&self.source, EndpointRole::Source)?;
        validate_endpoint(&self.destination, EndpointRole::Destination)?;

        Ok(())
    }
}

#[derive(Clone, Copy)]
enum EndpointRole {
    Source,
    Destination,
}

fn validate_endpoint(endpoint: &EndpointConfig, role: EndpointRole) -> Result<()> {
    match endpoint {
        EndpointConfig::Amqp(amqp) => {
            if amqp.uri.is_empty() {
                return Err(DumpError::Config("AMQP endpoint requires a uri".to_string()));
            }
            match role {
                EndpointRole::Source if amqp.queue.is_empty() => Err(DumpError::Config(
                    "AMQP source requires a queue to consume from".to_string(),
                )),
                EndpointRole::Destination
                    if amqp.exchange.is_empty() && amqp.routing_key.is_empty() =>
                {
                    Err(DumpError::Config(
                        "AMQP destination requires an exchange or a routing key".to_string(),
                    ))
                }
                _ => Ok(()),
            }
        }
        EndpointConfig::Archive(archive) => {
            if archive.path.as_os_str().is_empty() {
                return Err(DumpError::Config(
                    "Archive endpoint requires a path".to_string(),
                ));
            }
            Ok(())
        }
    }
}
