//! Read-only cluster template lookup.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::TemplateApi;
use crate::error::{Result, ValidationError};

/// Cluster template as exposed by the remote API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterTemplate {
    pub uuid: String,
    pub name: String,
    pub version: String,
    pub project_id: String,
    pub user_id: String,
    pub apiserver_port: u16,
    pub cluster_distro: String,
    pub dns_nameserver: String,
    pub docker_storage_driver: String,
    pub docker_volume_size: u32,
    pub external_network_id: String,
    pub flavor: String,
    pub master_flavor: String,
    pub floating_ip_enabled: bool,
    pub image: String,
    pub insecure_registry: String,
    pub keypair_id: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    pub master_lb_enabled: bool,
    pub network_driver: String,
    pub no_proxy: String,
    pub public: bool,
    pub registry_enabled: bool,
    pub server_type: String,
    pub tls_disabled: bool,
    pub volume_driver: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Identifies a template by exactly one of name, version or uuid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateQuery {
    pub name: Option<String>,
    pub version: Option<String>,
    pub uuid: Option<String>,
}

impl TemplateQuery {
    /// The single identifier this query carries.
    pub fn identifier(&self) -> std::result::Result<&str, ValidationError> {
        let given: Vec<&str> = [&self.name, &self.version, &self.uuid]
            .into_iter()
            .filter_map(|v| v.as_deref())
            .filter(|v| !v.is_empty())
            .collect();

        match given.as_slice() {
            [one] => Ok(*one),
            _ => Err(ValidationError::TemplateIdentifier {
                fields: "name, version, cluster_template_uuid",
                given: given.len(),
            }),
        }
    }
}

/// Looks up cluster templates through a [`TemplateApi`].
pub struct TemplateLookup<T: ?Sized> {
    api: Arc<T>,
}

impl<T: TemplateApi + ?Sized> TemplateLookup<T> {
    pub fn new(api: Arc<T>) -> Self {
        Self { api }
    }

    pub async fn lookup(&self, query: &TemplateQuery) -> Result<ClusterTemplate> {
        let identifier = query.identifier()?;
        debug!("Looking up cluster template {}", identifier);
        let template = self.api.get_cluster_template(identifier).await?;
        Ok(template)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn template(uuid: &str, name: &str, version: &str) -> ClusterTemplate {
        let created = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        ClusterTemplate {
            uuid: uuid.to_string(),
            name: name.to_string(),
            version: version.to_string(),
            project_id: "project-1".to_string(),
            user_id: "user-1".to_string(),
            apiserver_port: 6443,
            cluster_distro: "fedora-atomic".to_string(),
            dns_nameserver: "8.8.8.8".to_string(),
            docker_storage_driver: "overlay2".to_string(),
            docker_volume_size: 20,
            external_network_id: "ext-net".to_string(),
            flavor: "flavor-small".to_string(),
            master_flavor: "flavor-medium".to_string(),
            floating_ip_enabled: true,
            image: "image-1".to_string(),
            insecure_registry: String::new(),
            keypair_id: "ops-key".to_string(),
            labels: BTreeMap::from([("kube_tag".to_string(), version.to_string())]),
            master_lb_enabled: true,
            network_driver: "calico".to_string(),
            no_proxy: String::new(),
            public: true,
            registry_enabled: false,
            server_type: "vm".to_string(),
            tls_disabled: false,
            volume_driver: "cinder".to_string(),
            created_at: created,
            updated_at: created,
        }
    }
}
