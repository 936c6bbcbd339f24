//! Built-in operations: single remote calls, fan-out aggregation, batch
//! continuation, subscriptions and the roster refresh that combines them.

pub mod aggregator;
pub mod batch;
pub mod remote_call;
pub mod roster;
pub mod subscription;

pub use aggregator::{AggregateId, Aggregator, FanOut, FanOutSubmission, StatusTable, TableEntry};
pub use batch::{BatchContinuation, SliceOperation, SubjectLookup};
pub use remote_call::RemoteCall;
pub use roster::{RosterListing, RosterRefresh};
pub use subscription::{Subscribe, SubscriptionCache};
