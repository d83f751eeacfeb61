//! Cluster topology detection and informational logging.
//!
//! Everything here is best effort: failures are logged at debug level and
//! never interrupt the workload.

use crate::error::MongoStoreError;
use bson::{doc, Bson, Document};
use mongodb::Client;
use std::fmt;
use tracing::{debug, info};

/// Shard names containing one of these are taken as a zoned global cluster.
const REGION_INDICATORS: &[&str] = &["us-east", "us-west", "eu-", "ap-", "sa-", "global"];

/// What kind of deployment the client is connected to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterTopology {
    Standalone,
    ReplicaSet { name: String },
    Sharded { shards: Vec<String> },
    GlobalCluster { shards: Vec<String> },
    Unknown,
}

impl ClusterTopology {
    /// Connected through a mongos router.
    pub fn is_mongos(&self) -> bool {
        matches!(
            self,
            ClusterTopology::Sharded { .. } | ClusterTopology::GlobalCluster { .. }
        )
    }

    pub fn shards(&self) -> &[String] {
        match self {
            ClusterTopology::Sharded { shards } | ClusterTopology::GlobalCluster { shards } => {
                shards
            }
            _ => &[],
        }
    }
}

impl fmt::Display for ClusterTopology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusterTopology::Standalone => f.write_str("standalone"),
            ClusterTopology::ReplicaSet { name } => write!(f, "replica set '{name}'"),
            ClusterTopology::Sharded { shards } => write!(f, "sharded ({} shards)", shards.len()),
            ClusterTopology::GlobalCluster { shards } => {
                write!(f, "global cluster ({} shards)", shards.len())
            }
            ClusterTopology::Unknown => f.write_str("unknown"),
        }
    }
}

/// Detect the topology. Never fails; returns `Unknown` when commands fail.
pub async fn detect_topology(client: &Client) -> ClusterTopology {
    match try_detect_topology(client).await {
        Ok(topology) => topology,
        Err(e) => {
            debug!("Topology detection failed: {}", e);
            ClusterTopology::Unknown
        }
    }
}

async fn try_detect_topology(client: &Client) -> Result<ClusterTopology, MongoStoreError> {
    let admin = client.database("admin");
    let hello = match admin.run_command(doc! { "hello": 1 }).await {
        Ok(reply) => reply,
        Err(e) => {
            debug!("hello failed ({}), retrying with isMaster", e);
            admin.run_command(doc! { "isMaster": 1 }).await?
        }
    };

    if !is_mongos_reply(&hello) {
        return Ok(match hello.get_str("setName") {
            Ok(name) => ClusterTopology::ReplicaSet {
                name: name.to_string(),
            },
            Err(_) => ClusterTopology::Standalone,
        });
    }

    let reply = admin.run_command(doc! { "listShards": 1 }).await?;
    Ok(classify_shards(shard_names(&reply)?))
}

fn is_mongos_reply(hello: &Document) -> bool {
    matches!(hello.get_str("msg"), Ok("isdbgrid"))
}

fn shard_names(list_shards: &Document) -> Result<Vec<String>, MongoStoreError> {
    let shards = list_shards
        .get_array("shards")
        .map_err(|e| MongoStoreError::UnexpectedReply {
            command: "listShards",
            reason: e.to_string(),
        })?;

    Ok(shards
        .iter()
        .filter_map(|shard| match shard {
            Bson::Document(d) => d.get_str("_id").ok().map(str::to_string),
            _ => None,
        })
        .collect())
}

fn classify_shards(shards: Vec<String>) -> ClusterTopology {
    let zoned = shards.iter().any(|name| {
        let name = name.to_ascii_lowercase();
        REGION_INDICATORS.iter().any(|region| name.contains(region))
    });
    if zoned {
        ClusterTopology::GlobalCluster { shards }
    } else {
        ClusterTopology::Sharded { shards }
    }
}

/// Per-collection sharding details from `collStats`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CollectionShardInfo {
    pub sharded: bool,
    /// `(shard, document count)` pairs.
    pub shard_counts: Vec<(String, i64)>,
}

fn parse_coll_stats(stats: &Document) -> CollectionShardInfo {
    let sharded = stats.get_bool("sharded").unwrap_or(false);
    let shard_counts = stats
        .get_document("shards")
        .map(|shards| {
            shards
                .iter()
                .map(|(name, value)| {
                    let count = match value {
                        Bson::Document(d) => count_field(d),
                        _ => 0,
                    };
                    (name.clone(), count)
                })
                .collect()
        })
        .unwrap_or_default();

    CollectionShardInfo {
        sharded,
        shard_counts,
    }
}

fn count_field(stats: &Document) -> i64 {
    match stats.get("count") {
        Some(Bson::Int32(v)) => i64::from(*v),
        Some(Bson::Int64(v)) => *v,
        Some(Bson::Double(v)) => *v as i64,
        _ => 0,
    }
}

/// Log the topology and, when available, how the collection is distributed.
pub async fn log_cluster_info(client: &Client, db: &str, coll: &str) -> ClusterTopology {
    let topology = detect_topology(client).await;
    info!("Cluster topology: {}", topology);
    if !topology.shards().is_empty() {
        info!("Shards: {}", topology.shards().join(", "));
    }

    match client
        .database(db)
        .run_command(doc! { "collStats": coll })
        .await
    {
        Ok(stats) => {
            let info = parse_coll_stats(&stats);
            info!("Collection {}.{} sharded: {}", db, coll, info.sharded);
            for (shard, count) in &info.shard_counts {
                info!("  {}: {} documents", shard, count);
            }
        }
        Err(e) => debug!("collStats for {}.{} unavailable: {}", db, coll, e),
    }

    topology
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mongos_detection() {
        assert!(is_mongos_reply(&doc! { "msg": "isdbgrid", "ok": 1 }));
        assert!(!is_mongos_reply(&doc! { "setName": "rs0", "ok": 1 }));
    }

    #[test]
    fn test_classify_global_cluster() {
        let topology = classify_shards(vec![
            "atlas-abc-shard-0".to_string(),
            "Zone-US-East-1".to_string(),
        ]);
        assert!(matches!(topology, ClusterTopology::GlobalCluster { .. }));
        assert!(topology.is_mongos());
    }

    #[test]
    fn test_classify_plain_sharded() {
        let topology = classify_shards(vec!["shard01".to_string(), "shard02".to_string()]);
        assert_eq!(topology.to_string(), "sharded (2 shards)");
        assert_eq!(topology.shards().len(), 2);
    }

    #[test]
    fn test_shard_names() {
        let reply = doc! {
            "shards": [
                { "_id": "shard01", "host": "rs1/a:27018" },
                { "_id": "shard02", "host": "rs2/b:27018" },
                "garbage",
            ],
            "ok": 1,
        };
        assert_eq!(shard_names(&reply).unwrap(), vec!["shard01", "shard02"]);
        let err = shard_names(&doc! { "ok": 1 }).unwrap_err();
        assert!(matches!(
            err,
            MongoStoreError::UnexpectedReply { command: "listShards", .. }
        ));
        assert!(err.to_string().starts_with("Unexpected reply to listShards"));
    }

    #[test]
    fn test_parse_coll_stats() {
        let stats = doc! {
            "sharded": true,
            "shards": {
                "shard01": { "count": 10_i64 },
                "shard02": { "count": 5 },
            },
        };
        let info = parse_coll_stats(&stats);
        assert!(info.sharded);
        assert_eq!(
            info.shard_counts,
            vec![("shard01".to_string(), 10), ("shard02".to_string(), 5)]
        );

        assert_eq!(parse_coll_stats(&doc! {}), CollectionShardInfo::default());
    }

    #[test]
    fn test_replica_set_is_not_mongos() {
        let topology = ClusterTopology::ReplicaSet {
            name: "rs0".to_string(),
        };
        assert!(!topology.is_mongos());
        assert!(topology.shards().is_empty());
    }
}
