//! Configuration schema: recognized keys, their requirements and defaults
//!
//! A [`Schema`] is built once (normally with [`Schema::builtin`]), wrapped in
//! an `Arc` and handed to the expander. It is never mutated afterwards, so
//! resolution only depends on the schema value a caller passes in.

use crate::error::{Error, Result};
use crate::instance::ServiceInstance;
use crate::kind::{ClusterKind, Role};
use crate::value::{Value, parse_bool};
use std::collections::HashMap;

/// Well-known config keys
pub mod keys {
    pub const PREFIX: &str = "prefix";
    pub const REPORT_USAGE: &str = "report_usage";
    pub const CONTAINER_IMAGE: &str = "container_image";
    pub const LOG_DIR: &str = "log_dir";
    pub const DATA_DIR: &str = "data_dir";
    pub const RAFT_DIR: &str = "raft_dir";
    pub const SEQUENCE_OFFSET: &str = "sequence_offset";
    pub const SOURCE_CORE_DIR: &str = "source_core_dir";
    pub const TARGET_CORE_DIR: &str = "target_core_dir";
    pub const ENV: &str = "env";
    pub const VARIABLE: &str = "variable";

    pub const LISTEN_IP: &str = "listen.ip";
    pub const LISTEN_PORT: &str = "listen.port";
    pub const LISTEN_CLIENT_PORT: &str = "listen.client_port";
    pub const LISTEN_DUMMY_PORT: &str = "listen.dummy_port";
    pub const LISTEN_PROXY_PORT: &str = "listen.proxy_port";
    pub const LISTEN_EXTERNAL_IP: &str = "listen.external_ip";
    pub const LISTEN_EXTERNAL_PORT: &str = "listen.external_port";
    pub const ENABLE_EXTERNAL_SERVER: &str = "global.enable_external_server";

    pub const SERVER_PORT: &str = "server.port";
    pub const RAFT_PORT: &str = "raft.port";
    pub const SERVER_LISTEN_HOST: &str = "server_listen_host";
    pub const RAFT_LISTEN_HOST: &str = "raft_listen_host";
    pub const INSTANCE_START_ID: &str = "instance_start_id";
    pub const COORDINATOR_ADDR: &str = "coordinator_addr";

    pub const COPYSETS: &str = "copysets";
    pub const DEFAULT_REPLICA_NUM: &str = "default_replica_num";
    pub const ENABLE_RDMA: &str = "enable_rdma";

    pub const S3_ACCESS_KEY: &str = "s3.ak";
    pub const S3_SECRET_KEY: &str = "s3.sk";
    pub const S3_ADDRESS: &str = "s3.nos_address";
    pub const S3_BUCKET_NAME: &str = "s3.snapshot_bucket_name";

    pub const ETCD_AUTH_ENABLE: &str = "etcd.auth.enable";
    pub const ETCD_AUTH_USERNAME: &str = "etcd.auth.username";
    pub const ETCD_AUTH_PASSWORD: &str = "etcd.auth.password";
}

/// Type constraint a config value must satisfy after rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Require {
    Any,
    String,
    Int,
    PositiveInt,
    Bool,
}

impl Require {
    /// Convert a rendered string into the typed value this requirement asks for
    pub fn convert(self, key: &str, raw: &str) -> Result<Value> {
        let invalid = |expected| Error::InvalidValue {
            key: key.to_string(),
            expected,
            value: raw.to_string(),
        };
        match self {
            Self::Any => Ok(Value::from(raw)),
            Self::String => {
                if raw.is_empty() {
                    Err(invalid("a non-empty string"))
                } else {
                    Ok(Value::from(raw))
                }
            }
            Self::Int => raw
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| invalid("an integer")),
            Self::PositiveInt => match raw.trim().parse::<i64>() {
                Ok(n) if n > 0 => Ok(Value::Int(n)),
                _ => Err(invalid("a positive integer")),
            },
            Self::Bool => parse_bool(raw)
                .map(Value::Bool)
                .ok_or_else(|| invalid("a boolean")),
        }
    }
}

/// Function computing a default from the owning instance
pub type ComputeFn = fn(&ServiceInstance) -> Option<Value>;

/// Default applied when a key is absent from the instance config
#[derive(Debug, Clone)]
pub enum DefaultValue {
    None,
    Literal(Value),
    Computed(ComputeFn),
}

/// One recognized configuration key
#[derive(Debug, Clone)]
pub struct ConfigItem {
    pub key: &'static str,
    pub require: Require,
    /// Keep out of the service config written into remote files
    pub exclude: bool,
    pub default: DefaultValue,
}

impl ConfigItem {
    pub fn new(key: &'static str, require: Require, exclude: bool, default: DefaultValue) -> Self {
        Self {
            key,
            require,
            exclude,
            default,
        }
    }
}

/// A service configuration file and the delimiter between its keys and values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfFile {
    pub name: &'static str,
    pub delimiter: &'static str,
}

impl ConfFile {
    pub const fn kv(name: &'static str) -> Self {
        Self {
            name,
            delimiter: "=",
        }
    }

    pub const fn yaml(name: &'static str) -> Self {
        Self {
            name,
            delimiter: ": ",
        }
    }
}

/// The set of recognized config items plus per-role config files
#[derive(Debug, Clone, Default)]
pub struct Schema {
    items: Vec<ConfigItem>,
    index: HashMap<&'static str, usize>,
    conf_files: HashMap<Role, Vec<ConfFile>>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an item, replacing any earlier item with the same key
    pub fn insert(&mut self, item: ConfigItem) {
        if let Some(&i) = self.index.get(item.key) {
            self.items[i] = item;
        } else {
            self.index.insert(item.key, self.items.len());
            self.items.push(item);
        }
    }

    pub fn item(&self, key: &str) -> Option<&ConfigItem> {
        self.index.get(key).map(|&i| &self.items[i])
    }

    pub fn items(&self) -> &[ConfigItem] {
        &self.items
    }

    pub fn set_conf_files(&mut self, role: Role, files: Vec<ConfFile>) {
        self.conf_files.insert(role, files);
    }

    /// Config files synced into containers of `role`
    pub fn conf_files(&self, role: Role) -> &[ConfFile] {
        self.conf_files.get(&role).map_or(&[], Vec::as_slice)
    }

    /// The schema every deployment uses
    pub fn builtin() -> Self {
        use DefaultValue::{Computed, Literal, None as NoDefault};
        use Require::{Any, Bool, Int, PositiveInt, String as Str};
        use keys::*;

        let mut s = Self::new();
        let mut add = |key, require, exclude, default| {
            s.insert(ConfigItem::new(key, require, exclude, default));
        };

        // paths and container
        add(PREFIX, Str, true, Computed(default_prefix));
        add(REPORT_USAGE, Bool, true, Literal(Value::Bool(true)));
        add(CONTAINER_IMAGE, Str, true, Computed(default_image));
        add(LOG_DIR, Str, true, NoDefault);
        add(DATA_DIR, Str, true, NoDefault);
        add(RAFT_DIR, Str, true, NoDefault);
        add(SEQUENCE_OFFSET, Int, true, Literal(Value::Int(0)));
        add(SOURCE_CORE_DIR, Str, true, NoDefault);
        add(TARGET_CORE_DIR, Str, true, Literal(Value::from("/core")));
        add(ENV, Str, true, NoDefault);
        add(VARIABLE, Any, true, NoDefault);
        add(ENABLE_RDMA, Bool, true, Literal(Value::Bool(false)));

        // listen
        add(LISTEN_IP, Str, false, Computed(|dc| Some(Value::from(dc.hostname()))));
        add(LISTEN_PORT, Int, false, Computed(default_listen_port));
        add(LISTEN_CLIENT_PORT, Int, false, Literal(Value::Int(2379)));
        add(LISTEN_DUMMY_PORT, Int, false, Computed(default_dummy_port));
        add(LISTEN_PROXY_PORT, Int, false, Literal(Value::Int(8080)));
        add(
            LISTEN_EXTERNAL_IP,
            Str,
            false,
            Computed(|dc| Some(Value::from(dc.get_string(LISTEN_IP)))),
        );
        add(
            LISTEN_EXTERNAL_PORT,
            Int,
            false,
            Computed(|dc| non_zero(dc.get_int(LISTEN_PORT))),
        );
        add(ENABLE_EXTERNAL_SERVER, Bool, false, Literal(Value::Bool(false)));

        // raft based servers
        add(SERVER_PORT, Int, false, Computed(|dc| non_zero(dc.get_int(LISTEN_PORT))));
        add(
            RAFT_PORT,
            Int,
            false,
            Computed(|dc| match dc.get_int(SERVER_PORT) {
                0 => None,
                port => Some(Value::Int(port + 1000)),
            }),
        );
        add(SERVER_LISTEN_HOST, Str, false, Literal(Value::from("0.0.0.0")));
        add(RAFT_LISTEN_HOST, Str, false, Literal(Value::from("0.0.0.0")));
        add(
            INSTANCE_START_ID,
            Int,
            false,
            Computed(|dc| Some(Value::Int(1001 + dc.host_sequence() as i64))),
        );
        add(
            COORDINATOR_ADDR,
            Str,
            false,
            Computed(|dc| {
                Some(Value::from(
                    dc.variables().get(COORDINATOR_ADDR).unwrap_or("-"),
                ))
            }),
        );

        // cluster
        add(COPYSETS, Int, false, Literal(Value::Int(100)));
        add(DEFAULT_REPLICA_NUM, PositiveInt, false, Literal(Value::Int(3)));

        // s3
        add(S3_ACCESS_KEY, Str, false, NoDefault);
        add(S3_SECRET_KEY, Str, false, NoDefault);
        add(S3_ADDRESS, Str, false, NoDefault);
        add(S3_BUCKET_NAME, Str, false, NoDefault);

        // etcd auth
        add(ETCD_AUTH_ENABLE, Bool, false, Literal(Value::Bool(false)));
        add(ETCD_AUTH_USERNAME, Str, false, NoDefault);
        add(ETCD_AUTH_PASSWORD, Str, false, NoDefault);

        s.set_conf_files(Role::Etcd, vec![ConfFile::yaml("etcd.conf")]);
        s.set_conf_files(Role::Mds, vec![ConfFile::kv("mds.conf")]);
        s.set_conf_files(
            Role::Chunkserver,
            vec![
                ConfFile::kv("chunkserver.conf"),
                ConfFile::kv("cs_client.conf"),
                ConfFile::kv("s3.conf"),
            ],
        );
        s.set_conf_files(
            Role::Snapshotclone,
            vec![
                ConfFile::kv("snapshotclone.conf"),
                ConfFile::kv("snap_client.conf"),
                ConfFile::kv("s3.conf"),
            ],
        );
        s.set_conf_files(Role::Metaserver, vec![ConfFile::kv("metaserver.conf")]);
        s.set_conf_files(Role::MdsV2, vec![ConfFile::kv("mdsv2.conf")]);
        // raft based servers take their settings from the container environment
        s
    }
}

fn non_zero(n: i64) -> Option<Value> {
    (n != 0).then_some(Value::Int(n))
}

fn default_prefix(dc: &ServiceInstance) -> Option<Value> {
    let role = dc.role();
    let prefix = match (dc.kind(), role) {
        (ClusterKind::CurveBs, _) => format!("/curvebs/{role}"),
        (_, r) if r.is_store_family() => "/opt/dingo-store".to_string(),
        (_, Role::Executor | Role::Web | Role::Proxy) => "/opt/dingo".to_string(),
        (_, Role::Tmp) => format!("/dingofs/{}", Role::MdsV2),
        _ => format!("/dingofs/{role}"),
    };
    Some(Value::Str(prefix))
}

fn default_image(dc: &ServiceInstance) -> Option<Value> {
    Some(Value::from(dc.kind().default_image()))
}

fn default_listen_port(dc: &ServiceInstance) -> Option<Value> {
    let port = match dc.role() {
        Role::Etcd => 2380,
        Role::Mds | Role::Document => 6700,
        Role::Chunkserver => 8200,
        Role::Snapshotclone => 5555,
        Role::Metaserver | Role::Index => 6800,
        Role::MdsV2 | Role::Tmp | Role::Diskann => 6900,
        Role::Coordinator => 6500,
        Role::Store => 6600,
        Role::Executor => 3307,
        Role::Web => 13000,
        Role::Proxy => 13001,
    };
    Some(Value::Int(port))
}

fn default_dummy_port(dc: &ServiceInstance) -> Option<Value> {
    match dc.role() {
        Role::Mds => Some(Value::Int(7700)),
        Role::Snapshotclone => Some(Value::Int(8081)),
        _ => None,
    }
}
