//! Node coordination
//!
//! Each node runs:
//! - a liveness tracker probing every peer on a fixed interval
//! - a leadership resolver picking the highest live id
//! - a write router that applies writes as leader and redirects otherwise
//! - best-effort replication from the leader to every peer

pub mod context;
pub mod events;
pub mod http;
pub mod leadership;
pub mod liveness;
pub mod replication;
pub mod router;
pub mod server;
pub mod store;
pub mod transport;

pub use context::{NodeContext, NodeContextBuilder, NodeIdentity};
pub use events::{ClusterEvent, EventSink, FanoutSink, MemorySink, TracingSink};
pub use leadership::{alive_set, resolve, LeaderState, LeadershipResolver, Resolution};
pub use liveness::{LivenessTable, LivenessTracker, ProbeReport};
pub use replication::Replicator;
pub use router::{AcceptedWrite, WriteRouter};
pub use server::{BackgroundTasks, Coordinator};
pub use store::KvStore;
pub use transport::{HttpTransport, PeerTransport};
