//! Cluster families and service roles

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The family of cluster a topology describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClusterKind {
    CurveBs,
    DingoFs,
    DingoStore,
    DingoDb,
}

impl ClusterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CurveBs => "curvebs",
            Self::DingoFs => "dingofs",
            Self::DingoStore => "dingo-store",
            Self::DingoDb => "dingodb",
        }
    }

    /// Default container image for the family
    pub fn default_image(&self) -> &'static str {
        match self {
            Self::CurveBs => "opencurvedocker/curvebs:latest",
            Self::DingoFs => "dingodatabase/dingofs:latest",
            Self::DingoStore | Self::DingoDb => "dingodatabase/dingo-store:latest",
        }
    }
}

impl FromStr for ClusterKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "curvebs" => Ok(Self::CurveBs),
            "dingofs" | "curvefs" => Ok(Self::DingoFs),
            "dingo-store" => Ok(Self::DingoStore),
            "dingodb" => Ok(Self::DingoDb),
            other => Err(Error::UnsupportedKind(other.to_string())),
        }
    }
}

impl fmt::Display for ClusterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named kind of service in the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    Etcd,
    Mds,
    Chunkserver,
    Snapshotclone,
    Metaserver,
    MdsV2,
    Coordinator,
    Store,
    /// One-shot role that creates the metadata tables for `mdsv2`
    Tmp,
    Document,
    Diskann,
    Index,
    Executor,
    Web,
    Proxy,
}

impl Role {
    pub const ALL: [Self; 15] = [
        Self::Etcd,
        Self::Mds,
        Self::Chunkserver,
        Self::Snapshotclone,
        Self::Metaserver,
        Self::MdsV2,
        Self::Coordinator,
        Self::Store,
        Self::Tmp,
        Self::Document,
        Self::Diskann,
        Self::Index,
        Self::Executor,
        Self::Web,
        Self::Proxy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Etcd => "etcd",
            Self::Mds => "mds",
            Self::Chunkserver => "chunkserver",
            Self::Snapshotclone => "snapshotclone",
            Self::Metaserver => "metaserver",
            Self::MdsV2 => "mdsv2",
            Self::Coordinator => "coordinator",
            Self::Store => "store",
            Self::Tmp => "tmp",
            Self::Document => "document",
            Self::Diskann => "diskann",
            Self::Index => "index",
            Self::Executor => "executor",
            Self::Web => "web",
            Self::Proxy => "proxy",
        }
    }

    /// Name of the topology section declaring this role
    pub fn section(&self) -> String {
        format!("{}_services", self.as_str())
    }

    /// Roles that live in the store-family image layout (raft based servers)
    pub fn is_store_family(&self) -> bool {
        matches!(
            self,
            Self::Coordinator | Self::Store | Self::Document | Self::Diskann | Self::Index
        )
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| Error::InvalidSection {
                section: s.to_string(),
                reason: "unknown role".to_string(),
            })
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
