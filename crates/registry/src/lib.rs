//! # Registry
//!
//! Persistent record of deployed clusters.
//!
//! This crate provides functionality to:
//! - Register clusters with their topology and a stable uuid
//! - Track which cluster is checked out
//! - Bind each service of a cluster to the container backing it
//!
//! ## Example
//!
//! ```
//! use registry::Registry;
//!
//! let registry = Registry::open_in_memory()?;
//! let cluster = registry.insert_cluster("prod", "2b7c", "", "kind: dingo-store")?;
//! registry.checkout_cluster("prod")?;
//!
//! registry.insert_service(cluster.id, "a1b2c3d4e5f6", "")?;
//! registry.set_container_id("a1b2c3d4e5f6", "f00dcafe")?;
//! assert_eq!(registry.get_container_id("a1b2c3d4e5f6")?.as_deref(), Some("f00dcafe"));
//! # Ok::<(), registry::Error>(())
//! ```

mod error;
mod types;

pub use error::{Error, Result};
pub use types::{CLEANED_CONTAINER_ID, Cluster, Service};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS clusters (
        id INTEGER PRIMARY KEY,
        uuid TEXT NOT NULL,
        name TEXT NOT NULL UNIQUE,
        description TEXT NOT NULL,
        topology TEXT NOT NULL,
        created_at TEXT NOT NULL,
        current INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS services (
        service_id TEXT PRIMARY KEY,
        cluster_id INTEGER NOT NULL,
        container_id TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_services_cluster ON services(cluster_id);
";

const CLUSTER_COLUMNS: &str = "id, uuid, name, description, topology, created_at, current";

/// Cluster and service database
///
/// The connection sits behind a mutex so tasks running on worker threads
/// can record container ids.
pub struct Registry {
    conn: Mutex<Connection>,
}

impl Registry {
    /// Open or create a registry database at the given path
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        log::debug!("Opening registry {}", db_path.display());
        Self::init(Connection::open(db_path)?)
    }

    /// Registry that lives only as long as the value
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        match self.conn.lock() {
            Ok(conn) => conn,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    // ========================================================================
    // Clusters
    // ========================================================================

    pub fn insert_cluster(
        &self,
        name: &str,
        uuid: &str,
        description: &str,
        topology: &str,
    ) -> Result<Cluster> {
        if self.get_cluster(name)?.is_some() {
            return Err(Error::ClusterExists(name.to_string()));
        }

        let created_at = Utc::now();
        let id = {
            let conn = self.conn();
            conn.execute(
                "INSERT INTO clusters (uuid, name, description, topology, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![uuid, name, description, topology, created_at.to_rfc3339()],
            )?;
            conn.last_insert_rowid()
        };

        Ok(Cluster {
            id,
            uuid: uuid.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            topology: topology.to_string(),
            created_at,
            current: false,
        })
    }

    pub fn get_cluster(&self, name: &str) -> Result<Option<Cluster>> {
        let sql = format!("SELECT {CLUSTER_COLUMNS} FROM clusters WHERE name = ?1");
        let cluster = self
            .conn()
            .query_row(&sql, params![name], cluster_from_row)
            .optional()?;
        Ok(cluster)
    }

    /// The checked out cluster
    pub fn current_cluster(&self) -> Result<Cluster> {
        let sql = format!("SELECT {CLUSTER_COLUMNS} FROM clusters WHERE current = 1");
        self.conn()
            .query_row(&sql, [], cluster_from_row)
            .optional()?
            .ok_or(Error::NoCurrentCluster)
    }

    /// Make `name` the current cluster
    pub fn checkout_cluster(&self, name: &str) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute("UPDATE clusters SET current = 0", [])?;
        let changed = tx.execute(
            "UPDATE clusters SET current = 1 WHERE name = ?1",
            params![name],
        )?;
        if changed == 0 {
            return Err(Error::ClusterNotFound(name.to_string()));
        }
        tx.commit()?;
        Ok(())
    }

    /// All clusters, oldest first
    pub fn list_clusters(&self) -> Result<Vec<Cluster>> {
        let sql = format!("SELECT {CLUSTER_COLUMNS} FROM clusters ORDER BY id");
        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let clusters = stmt
            .query_map([], cluster_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(clusters)
    }

    pub fn update_topology(&self, cluster_id: i64, topology: &str) -> Result<()> {
        self.conn().execute(
            "UPDATE clusters SET topology = ?1 WHERE id = ?2",
            params![topology, cluster_id],
        )?;
        Ok(())
    }

    /// Remove a cluster and every service recorded for it
    pub fn delete_cluster(&self, name: &str) -> Result<()> {
        let cluster = self
            .get_cluster(name)?
            .ok_or_else(|| Error::ClusterNotFound(name.to_string()))?;

        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM services WHERE cluster_id = ?1",
            params![cluster.id],
        )?;
        tx.execute("DELETE FROM clusters WHERE id = ?1", params![cluster.id])?;
        tx.commit()?;
        Ok(())
    }

    // ========================================================================
    // Services
    // ========================================================================

    /// Record a service, replacing any earlier binding
    pub fn insert_service(&self, cluster_id: i64, service_id: &str, container_id: &str) -> Result<()> {
        self.conn().execute(
            "INSERT OR REPLACE INTO services (service_id, cluster_id, container_id)
             VALUES (?1, ?2, ?3)",
            params![service_id, cluster_id, container_id],
        )?;
        Ok(())
    }

    pub fn set_container_id(&self, service_id: &str, container_id: &str) -> Result<()> {
        self.conn().execute(
            "UPDATE services SET container_id = ?1 WHERE service_id = ?2",
            params![container_id, service_id],
        )?;
        Ok(())
    }

    /// Container bound to a service; `None` if the service was never recorded
    pub fn get_container_id(&self, service_id: &str) -> Result<Option<String>> {
        let id = self
            .conn()
            .query_row(
                "SELECT container_id FROM services WHERE service_id = ?1",
                params![service_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    pub fn list_services(&self, cluster_id: i64) -> Result<Vec<Service>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT service_id, cluster_id, container_id FROM services
             WHERE cluster_id = ?1 ORDER BY service_id",
        )?;
        let services = stmt
            .query_map(params![cluster_id], |row| {
                Ok(Service {
                    service_id: row.get(0)?,
                    cluster_id: row.get(1)?,
                    container_id: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(services)
    }
}

fn cluster_from_row(row: &Row<'_>) -> rusqlite::Result<Cluster> {
    let created_at: String = row.get(5)?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?
        .with_timezone(&Utc);

    Ok(Cluster {
        id: row.get(0)?,
        uuid: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        topology: row.get(4)?,
        created_at,
        current: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_db() {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("nested").join("stackadm.db");

        let registry = Registry::open(&db_path).unwrap();
        assert!(db_path.exists());
        assert!(registry.list_clusters().unwrap().is_empty());
    }

    #[test]
    fn test_cluster_lifecycle() {
        let registry = Registry::open_in_memory().unwrap();
        let a = registry.insert_cluster("a", "uuid-a", "first", "kind: dingofs").unwrap();
        registry.insert_cluster("b", "uuid-b", "", "kind: dingo-store").unwrap();

        let err = registry.insert_cluster("a", "uuid-c", "", "").unwrap_err();
        assert!(matches!(err, Error::ClusterExists(ref n) if n == "a"));

        let got = registry.get_cluster("a").unwrap().unwrap();
        assert_eq!(got.uuid, "uuid-a");
        assert_eq!(got.topology, "kind: dingofs");
        assert_eq!(got.created_at.timestamp(), a.created_at.timestamp());
        assert!(registry.get_cluster("missing").unwrap().is_none());

        let names: Vec<String> = registry
            .list_clusters()
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[test]
    fn test_checkout_switches_current() {
        let registry = Registry::open_in_memory().unwrap();
        assert!(matches!(registry.current_cluster(), Err(Error::NoCurrentCluster)));

        registry.insert_cluster("a", "u1", "", "").unwrap();
        registry.insert_cluster("b", "u2", "", "").unwrap();

        registry.checkout_cluster("a").unwrap();
        assert_eq!(registry.current_cluster().unwrap().name, "a");

        registry.checkout_cluster("b").unwrap();
        assert_eq!(registry.current_cluster().unwrap().name, "b");
        assert!(!registry.get_cluster("a").unwrap().unwrap().current);

        let err = registry.checkout_cluster("c").unwrap_err();
        assert!(matches!(err, Error::ClusterNotFound(_)));
        assert_eq!(registry.current_cluster().unwrap().name, "b");
    }

    #[test]
    fn test_service_bindings() {
        let registry = Registry::open_in_memory().unwrap();
        let cluster = registry.insert_cluster("a", "u1", "", "").unwrap();

        assert_eq!(registry.get_container_id("s1").unwrap(), None);
        registry.insert_service(cluster.id, "s1", "").unwrap();
        assert_eq!(registry.get_container_id("s1").unwrap().as_deref(), Some(""));

        registry.set_container_id("s1", "c0ffee").unwrap();
        registry.insert_service(cluster.id, "s2", "beef").unwrap();

        let services = registry.list_services(cluster.id).unwrap();
        assert_eq!(services.len(), 2);
        assert!(services[0].has_container());

        registry.set_container_id("s1", CLEANED_CONTAINER_ID).unwrap();
        let services = registry.list_services(cluster.id).unwrap();
        assert!(!services[0].has_container());
    }

    #[test]
    fn test_delete_cluster_removes_services() {
        let registry = Registry::open_in_memory().unwrap();
        let cluster = registry.insert_cluster("a", "u1", "", "").unwrap();
        registry.insert_service(cluster.id, "s1", "c1").unwrap();

        registry.delete_cluster("a").unwrap();
        assert!(registry.get_cluster("a").unwrap().is_none());
        assert_eq!(registry.get_container_id("s1").unwrap(), None);
        assert!(matches!(
            registry.delete_cluster("a"),
            Err(Error::ClusterNotFound(_))
        ));
    }

    #[test]
    fn test_update_topology() {
        let registry = Registry::open_in_memory().unwrap();
        let cluster = registry.insert_cluster("a", "u1", "", "old").unwrap();
        registry.update_topology(cluster.id, "new").unwrap();
        assert_eq!(registry.get_cluster("a").unwrap().unwrap().topology, "new");
    }
}
