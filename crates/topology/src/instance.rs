//! Service instances and config resolution
//!
//! A [`ServiceInstance`] is one deployed copy of a role. It is created by the
//! expander, completed by the variable passes and [`ServiceInstance::build`],
//! and then shared read-only.

use crate::context::Context;
use crate::error::{Error, Result};
use crate::kind::{ClusterKind, Role};
use crate::schema::{DefaultValue, Schema, keys};
use crate::value::{ConfigMap, Value};
use crate::variables::{Variable, Variables};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

/// Identity and merged config of an instance about to be created
#[derive(Debug, Clone)]
pub struct InstanceSpec {
    pub kind: ClusterKind,
    pub role: Role,
    pub host: String,
    pub name: String,
    pub instances: usize,
    pub host_sequence: usize,
    pub instance_sequence: usize,
    pub config: ConfigMap,
}

/// Build an instance id
///
/// The deploy entry `name` only appears when set, so an unnamed etcd on `h1`
/// is `etcd_h1_0`.
pub fn format_id(role: Role, host: &str, name: &str, instance_sequence: usize) -> String {
    if name.is_empty() {
        format!("{role}_{host}_{instance_sequence}")
    } else {
        format!("{role}_{host}_{name}_{instance_sequence}")
    }
}

/// Memoized computed defaults, dropped whenever the instance changes
#[derive(Debug, Default)]
struct DefaultCache(Mutex<HashMap<&'static str, Option<Value>>>);

impl DefaultCache {
    fn get(&self, key: &str) -> Option<Option<Value>> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn put(&self, key: &'static str, value: Option<Value>) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, value);
    }

    fn clear(&mut self) {
        self.0
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// One deployed copy of a role
#[derive(Debug)]
pub struct ServiceInstance {
    kind: ClusterKind,
    role: Role,
    host: String,
    hostname: String,
    name: String,
    instances: usize,
    host_sequence: usize,
    instance_sequence: usize,
    id: String,
    parent_id: String,
    config: ConfigMap,
    service_config: BTreeMap<String, String>,
    variables: Variables,
    context: Arc<Context>,
    schema: Arc<Schema>,
    defaults: DefaultCache,
}

impl ServiceInstance {
    /// Create an instance from its merged config
    ///
    /// Scalar values are kept as strings until [`build`](Self::build) renders
    /// and converts them. Entries of the `variable` map become user variables.
    pub fn new(spec: InstanceSpec, context: Arc<Context>, schema: Arc<Schema>) -> Result<Self> {
        let id = format_id(spec.role, &spec.host, &spec.name, spec.instance_sequence);
        let parent_id = format_id(spec.role, &spec.host, &spec.name, 0);

        let mut config = ConfigMap::new();
        let mut variables = Variables::new();
        for (key, value) in spec.config {
            let key = key.to_lowercase();
            if key == keys::VARIABLE {
                if let Value::Map(vars) = &value {
                    for (name, v) in vars {
                        let literal = v
                            .to_scalar_string()
                            .ok_or_else(|| Error::UnsupportedValueType(format!("variable.{name}")))?;
                        variables.register(Variable::literal(name.clone(), literal))?;
                    }
                }
                config.insert(key, value);
                continue;
            }
            let rendered = value
                .to_scalar_string()
                .ok_or_else(|| Error::UnsupportedValueType(key.clone()))?;
            config.insert(key, Value::Str(rendered));
        }

        Ok(Self {
            kind: spec.kind,
            role: spec.role,
            hostname: spec.host.clone(),
            host: spec.host,
            name: spec.name,
            instances: spec.instances,
            host_sequence: spec.host_sequence,
            instance_sequence: spec.instance_sequence,
            id,
            parent_id,
            config,
            service_config: BTreeMap::new(),
            variables,
            context,
            schema,
            defaults: DefaultCache::default(),
        })
    }

    pub fn kind(&self) -> ClusterKind {
        self.kind
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Reachable address of the host, resolved from the inventory
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of instances declared on this host entry
    pub fn instances(&self) -> usize {
        self.instances
    }

    pub fn host_sequence(&self) -> usize {
        self.host_sequence
    }

    pub fn instance_sequence(&self) -> usize {
        self.instance_sequence
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Id of the first instance declared by the same host entry
    pub fn parent_id(&self) -> &str {
        &self.parent_id
    }

    pub fn config(&self) -> &ConfigMap {
        &self.config
    }

    /// Rendered values written into service config files
    pub fn service_config(&self) -> &BTreeMap<String, String> {
        &self.service_config
    }

    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    // ========================================================================
    // Resolution
    // ========================================================================

    /// Look up `key`, falling back to the schema default
    pub fn resolve(&self, key: &str) -> Option<Value> {
        if let Some(value) = self.config.get(key) {
            return Some(value.clone());
        }
        let item = self.schema.item(key)?;
        match &item.default {
            DefaultValue::None => None,
            DefaultValue::Literal(value) => Some(value.clone()),
            DefaultValue::Computed(compute) => {
                if let Some(hit) = self.defaults.get(item.key) {
                    return hit;
                }
                let value = compute(self);
                self.defaults.put(item.key, value.clone());
                value
            }
        }
    }

    /// String value of `key`, empty when unset
    pub fn get_string(&self, key: &str) -> String {
        self.resolve(key)
            .and_then(|v| v.to_scalar_string())
            .unwrap_or_default()
    }

    /// Integer value of `key`, 0 when unset or not numeric
    pub fn get_int(&self, key: &str) -> i64 {
        self.resolve(key).and_then(|v| v.as_int()).unwrap_or(0)
    }

    /// Boolean value of `key`, false when unset
    pub fn get_bool(&self, key: &str) -> bool {
        self.resolve(key).and_then(|v| v.as_bool()).unwrap_or(false)
    }

    pub fn prefix(&self) -> String {
        self.get_string(keys::PREFIX)
    }

    pub fn container_image(&self) -> String {
        self.get_string(keys::CONTAINER_IMAGE)
    }

    pub fn log_dir(&self) -> String {
        self.get_string(keys::LOG_DIR)
    }

    pub fn data_dir(&self) -> String {
        self.get_string(keys::DATA_DIR)
    }

    pub fn raft_dir(&self) -> String {
        self.get_string(keys::RAFT_DIR)
    }

    pub fn core_dir(&self) -> String {
        self.get_string(keys::SOURCE_CORE_DIR)
    }

    pub fn env(&self) -> String {
        self.get_string(keys::ENV)
    }

    pub fn listen_ip(&self) -> String {
        self.get_string(keys::LISTEN_IP)
    }

    pub fn listen_port(&self) -> i64 {
        self.get_int(keys::LISTEN_PORT)
    }

    pub fn listen_client_port(&self) -> i64 {
        self.get_int(keys::LISTEN_CLIENT_PORT)
    }

    pub fn listen_dummy_port(&self) -> i64 {
        self.get_int(keys::LISTEN_DUMMY_PORT)
    }

    pub fn listen_proxy_port(&self) -> i64 {
        self.get_int(keys::LISTEN_PROXY_PORT)
    }

    pub fn listen_external_ip(&self) -> String {
        self.get_string(keys::LISTEN_EXTERNAL_IP)
    }

    pub fn listen_external_port(&self) -> i64 {
        self.get_int(keys::LISTEN_EXTERNAL_PORT)
    }

    pub fn server_port(&self) -> i64 {
        self.get_int(keys::SERVER_PORT)
    }

    pub fn raft_port(&self) -> i64 {
        self.get_int(keys::RAFT_PORT)
    }

    pub fn etcd_auth_enabled(&self) -> bool {
        self.get_bool(keys::ETCD_AUTH_ENABLE)
    }

    // ========================================================================
    // Mutation (expansion only)
    // ========================================================================

    /// Replace the topology host name with its inventory address
    pub(crate) fn resolve_host(&mut self) -> Result<()> {
        self.hostname = self.context.hostname(&self.host)?;
        self.defaults.clear();
        Ok(())
    }

    pub(crate) fn register_variable(&mut self, var: Variable) -> Result<()> {
        self.defaults.clear();
        self.variables.register(var)
    }

    pub(crate) fn resolve_variable(&mut self, name: &str) -> Result<String> {
        self.defaults.clear();
        self.variables.resolve_named(name)
    }

    pub(crate) fn build_variables(&mut self) -> Result<()> {
        self.defaults.clear();
        self.variables.build()
    }

    /// Render variables into config values and enforce item requirements
    ///
    /// Keys the schema does not know stay strings. The service config keeps
    /// every rendered key whose item is not excluded.
    pub fn build(&mut self) -> Result<()> {
        self.build_variables()?;

        let mut config = ConfigMap::new();
        let mut service_config = BTreeMap::new();
        for (key, value) in &self.config {
            let item = self.schema.item(key);
            let Value::Str(raw) = value else {
                config.insert(key.clone(), value.clone());
                continue;
            };
            let rendered = self.variables.render(raw)?;
            let typed = match item {
                Some(item) => item.require.convert(key, &rendered)?,
                None => Value::Str(rendered.clone()),
            };
            if !item.is_some_and(|i| i.exclude) {
                service_config.insert(key.clone(), rendered);
            }
            config.insert(key.clone(), typed);
        }

        self.config = config;
        self.service_config = service_config;
        self.defaults.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(role: Role, config: &[(&str, Value)]) -> InstanceSpec {
        InstanceSpec {
            kind: ClusterKind::DingoFs,
            role,
            host: "h1".into(),
            name: String::new(),
            instances: 1,
            host_sequence: 0,
            instance_sequence: 0,
            config: config
                .iter()
                .map(|(k, v)| ((*k).to_string(), v.clone()))
                .collect(),
        }
    }

    fn instance(role: Role, config: &[(&str, Value)]) -> ServiceInstance {
        ServiceInstance::new(
            spec(role, config),
            Arc::new(Context::new()),
            Arc::new(Schema::builtin()),
        )
        .unwrap()
    }

    #[test]
    fn test_format_id() {
        assert_eq!(format_id(Role::Etcd, "h1", "", 2), "etcd_h1_2");
        assert_eq!(format_id(Role::Store, "h1", "s", 0), "store_h1_s_0");
    }

    #[test]
    fn test_values_stored_as_strings() {
        let dc = instance(Role::Mds, &[("copysets", Value::Int(7))]);
        assert_eq!(dc.config().get("copysets"), Some(&Value::from("7")));
        assert_eq!(dc.get_int("copysets"), 7);
    }

    #[test]
    fn test_nested_map_rejected() {
        let mut nested = ConfigMap::new();
        nested.insert("a".into(), Value::Int(1));
        let result = ServiceInstance::new(
            spec(Role::Mds, &[("s3", Value::Map(nested))]),
            Arc::new(Context::new()),
            Arc::new(Schema::builtin()),
        );
        assert!(matches!(result, Err(Error::UnsupportedValueType(k)) if k == "s3"));
    }

    #[test]
    fn test_defaults() {
        let dc = instance(Role::Coordinator, &[]);
        assert_eq!(dc.listen_port(), 6500);
        assert_eq!(dc.server_port(), 6500);
        assert_eq!(dc.raft_port(), 7500);
        assert_eq!(dc.listen_ip(), "h1");
        assert_eq!(dc.prefix(), "/opt/dingo-store");
        assert_eq!(dc.get_int(keys::INSTANCE_START_ID), 1001);
        assert_eq!(dc.get_string(keys::COORDINATOR_ADDR), "-");
    }

    #[test]
    fn test_absent_values_are_zero() {
        let dc = instance(Role::Etcd, &[]);
        assert_eq!(dc.get_string(keys::LOG_DIR), "");
        assert_eq!(dc.get_int(keys::LISTEN_DUMMY_PORT), 0);
        assert!(!dc.get_bool("no.such.key"));
        assert_eq!(dc.get_string(keys::S3_ACCESS_KEY), "");
    }

    #[test]
    fn test_build_renders_and_converts() {
        let mut vars = ConfigMap::new();
        vars.insert("base".into(), Value::from("/data"));
        let mut dc = instance(
            Role::Etcd,
            &[
                ("variable", Value::Map(vars)),
                ("data_dir", Value::from("${base}/etcd")),
                ("listen.port", Value::Int(3000)),
                ("custom.key", Value::from("x")),
            ],
        );
        dc.build().unwrap();

        assert_eq!(dc.data_dir(), "/data/etcd");
        assert_eq!(dc.config().get("listen.port"), Some(&Value::Int(3000)));
        assert_eq!(dc.service_config().get("listen.port").unwrap(), "3000");
        assert_eq!(dc.service_config().get("custom.key").unwrap(), "x");
        assert!(!dc.service_config().contains_key("data_dir"));
        assert!(!dc.service_config().contains_key("variable"));
    }

    #[test]
    fn test_build_rejects_malformed_literal() {
        let mut dc = instance(Role::Etcd, &[("listen.port", Value::from("http"))]);
        assert!(matches!(
            dc.build(),
            Err(Error::InvalidValue { key, .. }) if key == "listen.port"
        ));
    }

    #[test]
    fn test_computed_default_refreshes_after_mutation() {
        let mut dc = instance(Role::MdsV2, &[]);
        assert_eq!(dc.get_string(keys::COORDINATOR_ADDR), "-");
        dc.register_variable(Variable::literal(keys::COORDINATOR_ADDR, "10.0.0.1:6500"))
            .unwrap();
        dc.build_variables().unwrap();
        assert_eq!(dc.get_string(keys::COORDINATOR_ADDR), "10.0.0.1:6500");
    }
}
