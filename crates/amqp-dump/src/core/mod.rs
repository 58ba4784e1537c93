//! Core data model and endpoint seams.

mod message;
mod traits;

pub use message::{MessageItem, PropertyValue};
pub use traits::{Destination, DestinationWriter, Source, SourceInfo, SourceKind};
