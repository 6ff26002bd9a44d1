use std::collections::BTreeSet;

use idlewatch_core::{Instance, InstanceName};

use crate::error::ConfigError;

/// Static name → remote id table, resolved once at startup.
#[derive(Debug, Clone, Default)]
pub struct InstanceRegistry {
    instances: Vec<Instance>,
}

impl InstanceRegistry {
    pub fn new(instances: Vec<Instance>) -> Result<Self, ConfigError> {
        let mut seen = BTreeSet::new();
        for inst in &instances {
            if !seen.insert(&inst.name) {
                return Err(ConfigError::Invalid {
                    var: "IDLEWATCH_SERVERS",
                    reason: format!("duplicate server name: {}", inst.name),
                });
            }
        }
        Ok(Self { instances })
    }

    /// Parses `name:remote_id,name:remote_id`. Entries without `:` are skipped.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let mut instances = Vec::new();
        for part in raw.split(',') {
            let Some((name, id)) = part.split_once(':') else {
                continue;
            };
            let (name, id) = (name.trim(), id.trim());
            if name.is_empty() || id.is_empty() {
                return Err(ConfigError::Invalid {
                    var: "IDLEWATCH_SERVERS",
                    reason: format!("empty name or id in entry {:?}", part.trim()),
                });
            }
            instances.push(Instance::new(name, id));
        }
        Self::new(instances)
    }

    pub fn get(&self, name: &str) -> Option<&Instance> {
        self.instances.iter().find(|i| i.name.0 == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Instance> {
        self.instances.iter()
    }

    pub fn names(&self) -> Vec<InstanceName> {
        self.instances.iter().map(|i| i.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}
