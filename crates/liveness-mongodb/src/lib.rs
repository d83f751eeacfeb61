//! MongoDB backend for the liveness workload.
//!
//! Provides [`MongoDatabase`], the driver-backed implementation of the
//! engine's database capability, plus the collaborators that surround a run
//! against a real cluster: topology detection, shard-key setup and a
//! heartbeat failure listener.

pub mod args;
pub mod cluster;
pub mod error;
pub mod heartbeat;
pub mod sharding;
pub mod store;

pub use args::MongoArgs;
pub use cluster::{detect_topology, log_cluster_info, ClusterTopology};
pub use error::MongoStoreError;
pub use heartbeat::heartbeat_failure_handler;
pub use sharding::{ensure_sharding, ClusterType, ShardKeyKind, ShardKeyStrategy};
pub use store::{ConnectOptions, MongoCollection, MongoDatabase};
