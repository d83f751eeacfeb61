//! Best-effort shard-key setup for the workload collection.

use crate::cluster::detect_topology;
use crate::error::MongoStoreError;
use bson::{doc, Document};
use clap::ValueEnum;
use liveness_engine::{FailureEvent, SetupStage, Telemetry};
use mongodb::Client;
use std::fmt;
use tracing::{debug, info, warn};

/// How the workload collection is sharded, if at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShardKeyStrategy {
    /// Leave the collection unsharded.
    None,
    /// `{_id: "hashed"}`.
    HashedId,
    /// `{<field>: 1, _id: "hashed"}`, optionally retrying with `HashedId`.
    LocationCompound {
        field: String,
        fallback_to_hashed_id: bool,
    },
}

impl ShardKeyStrategy {
    /// Compound strategy on `location` with fallback.
    pub fn location() -> Self {
        ShardKeyStrategy::LocationCompound {
            field: "location".to_string(),
            fallback_to_hashed_id: true,
        }
    }

    /// The `key` document for `shardCollection`.
    pub fn key(&self) -> Option<Document> {
        match self {
            ShardKeyStrategy::None => None,
            ShardKeyStrategy::HashedId => Some(doc! { "_id": "hashed" }),
            ShardKeyStrategy::LocationCompound { field, .. } => {
                Some(doc! { field.as_str(): 1, "_id": "hashed" })
            }
        }
    }
}

impl fmt::Display for ShardKeyStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShardKeyStrategy::None => f.write_str("none"),
            ShardKeyStrategy::HashedId => f.write_str("{_id: hashed}"),
            ShardKeyStrategy::LocationCompound { field, .. } => {
                write!(f, "{{{field}: 1, _id: hashed}}")
            }
        }
    }
}

/// Deployment shape chosen by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ClusterType {
    ReplicaSet,
    Sharded,
    Geosharded,
}

impl ClusterType {
    pub fn default_shard_key(self) -> ShardKeyKind {
        match self {
            ClusterType::ReplicaSet => ShardKeyKind::None,
            ClusterType::Sharded => ShardKeyKind::HashedId,
            ClusterType::Geosharded => ShardKeyKind::LocationCompound,
        }
    }
}

/// Shard-key choice as given on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ShardKeyKind {
    None,
    HashedId,
    LocationCompound,
}

impl From<ShardKeyKind> for ShardKeyStrategy {
    fn from(kind: ShardKeyKind) -> Self {
        match kind {
            ShardKeyKind::None => ShardKeyStrategy::None,
            ShardKeyKind::HashedId => ShardKeyStrategy::HashedId,
            ShardKeyKind::LocationCompound => ShardKeyStrategy::location(),
        }
    }
}

/// Shard `db.coll` according to `strategy`.
///
/// Skipped when the strategy is `None`, when not connected through mongos,
/// or when the collection is already sharded. Failures are logged and
/// reported, never returned.
pub async fn ensure_sharding(
    client: &Client,
    db: &str,
    coll: &str,
    strategy: &ShardKeyStrategy,
    telemetry: &dyn Telemetry,
) {
    let Some(key) = strategy.key() else {
        debug!("Sharding disabled for {}.{}", db, coll);
        return;
    };

    let topology = detect_topology(client).await;
    if !topology.is_mongos() {
        debug!("Not connected via mongos ({}); skipping sharding", topology);
        return;
    }

    let namespace = format!("{db}.{coll}");
    match is_sharded(client, &namespace).await {
        Ok(true) => {
            info!("Collection {} is already sharded", namespace);
            return;
        }
        Ok(false) => {}
        Err(e) => debug!("Could not read sharding state of {}: {}", namespace, e),
    }

    if let Err(e) = client.database(db).create_collection(coll).await {
        debug!("create_collection {}: {}", namespace, e);
    }
    if let Err(e) = client
        .database("admin")
        .run_command(doc! { "enableSharding": db })
        .await
    {
        debug!("enableSharding {}: {}", db, e);
    }

    let result = match shard_collection(client, &namespace, key).await {
        Err(e) if matches!(
            strategy,
            ShardKeyStrategy::LocationCompound {
                fallback_to_hashed_id: true,
                ..
            }
        ) =>
        {
            warn!(
                "Sharding {} with {} failed ({}); falling back to {}",
                namespace,
                strategy,
                e,
                ShardKeyStrategy::HashedId
            );
            shard_collection(client, &namespace, doc! { "_id": "hashed" }).await
        }
        other => other,
    };

    match result {
        Ok(()) => info!("Sharded {}", namespace),
        Err(e) => {
            warn!("Sharding {} failed: {}", namespace, e);
            telemetry.capture_failure(&FailureEvent::setup(SetupStage::Sharding, &e));
        }
    }
}

async fn shard_collection(
    client: &Client,
    namespace: &str,
    key: Document,
) -> Result<(), MongoStoreError> {
    info!("Sharding {} with key {}", namespace, key);
    client
        .database("admin")
        .run_command(doc! { "shardCollection": namespace, "key": key })
        .await?;
    Ok(())
}

async fn is_sharded(client: &Client, namespace: &str) -> Result<bool, MongoStoreError> {
    let entry = client
        .database("config")
        .collection::<Document>("collections")
        .find_one(doc! { "_id": namespace })
        .await?;
    Ok(entry.is_some_and(|d| !d.get_bool("dropped").unwrap_or(false)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_type_defaults() {
        assert_eq!(ClusterType::ReplicaSet.default_shard_key(), ShardKeyKind::None);
        assert_eq!(ClusterType::Sharded.default_shard_key(), ShardKeyKind::HashedId);
        assert_eq!(
            ShardKeyStrategy::from(ClusterType::Geosharded.default_shard_key()),
            ShardKeyStrategy::location()
        );
    }

    #[test]
    fn test_shard_keys() {
        assert_eq!(ShardKeyStrategy::None.key(), None);
        assert_eq!(
            ShardKeyStrategy::HashedId.key(),
            Some(doc! { "_id": "hashed" })
        );

        let key = ShardKeyStrategy::location().key().unwrap();
        let fields: Vec<&String> = key.keys().collect();
        assert_eq!(fields, vec!["location", "_id"]);
        assert_eq!(key.get_i32("location").unwrap(), 1);
    }

    #[test]
    fn test_value_enum_names() {
        assert_eq!(
            ClusterType::from_str("geosharded", true).unwrap(),
            ClusterType::Geosharded
        );
        assert_eq!(
            ShardKeyKind::from_str("location-compound", true).unwrap(),
            ShardKeyKind::LocationCompound
        );
        assert!(ShardKeyKind::from_str("range", true).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            ShardKeyStrategy::location().to_string(),
            "{location: 1, _id: hashed}"
        );
    }
}
