pub mod catalog;
pub mod definition;
pub mod error;
pub mod node;
pub mod registry;
pub mod setter;
pub mod value;

pub use definition::DataPoint;
pub use node::strip_node_suffix;
pub use registry::{PollingGroup, Registry};
pub use value::{NodeValue, ValueKind};
