pub mod broker;
pub mod request;
pub mod resolver;
mod slot;

pub use beckon_core::{
    BrokerConfig, CancellationReason, ConflictPolicy, QueryCancellationError, QueryError, QueryId,
};
pub use broker::{Broker, WeakBroker};
pub use request::PendingRequest;
pub use resolver::Resolver;
