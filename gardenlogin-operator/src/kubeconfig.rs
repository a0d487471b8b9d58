//! Kubeconfig generation for shoot clusters.
//!
//! A generated kubeconfig never embeds credentials. Its single user entry
//! references the `gardenlogin` kubectl plugin, which fetches a short-lived
//! client certificate when the kubeconfig is used. Each cluster entry carries
//! an exec extension that tells the plugin which shoot it authenticates for.
//!
//! # Example
//!
//! ```
//! use gardenlogin_operator::kubeconfig::{ClusterEndpoint, KubeconfigRequest};
//!
//! let request = KubeconfigRequest {
//!     namespace: "garden-ns1".to_string(),
//!     shoot_name: "shoot-a".to_string(),
//!     garden_cluster_identity: "garden-1".to_string(),
//!     clusters: vec![ClusterEndpoint {
//!         name: "external".to_string(),
//!         api_server_host: "api.example.com:443".to_string(),
//!         ca_cert: None,
//!     }],
//! };
//!
//! request.validate().unwrap();
//! let yaml = request.generate().unwrap();
//! assert!(yaml.contains("current-context: garden-ns1--shoot-a-external"));
//! ```

use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Name of the cluster extension read by exec credential plugins.
pub const EXEC_EXTENSION_NAME: &str = "client.authentication.k8s.io/exec";

/// API version of the exec credential exchanged with the plugin.
pub const EXEC_CREDENTIAL_API_VERSION: &str = "client.authentication.k8s.io/v1beta1";

/// Command invoked by clients to obtain credentials.
pub const EXEC_COMMAND: &str = "kubectl";

/// Arguments passed to [`EXEC_COMMAND`].
pub const EXEC_ARGS: [&str; 2] = ["gardenlogin", "get-client-certificate"];

/// Errors raised while validating or generating a kubeconfig.
#[derive(Debug, Error)]
pub enum KubeconfigError {
    /// No cluster endpoint was given.
    #[error("missing clusters")]
    MissingClusters,

    /// A cluster endpoint has no name.
    #[error("no name defined for cluster[{0}]")]
    MissingClusterName(usize),

    /// A cluster endpoint has no host.
    #[error("no api server host defined for cluster[{0}]")]
    MissingApiServerHost(usize),

    /// The shoot namespace is empty.
    #[error("no namespace defined for kubeconfig request")]
    MissingNamespace,

    /// The shoot name is empty.
    #[error("no shoot name defined for kubeconfig request")]
    MissingShootName,

    /// The garden cluster identity is empty.
    #[error("no garden cluster identity defined for kubeconfig request")]
    MissingGardenClusterIdentity,

    /// The exec extension could not be encoded.
    #[error("could not json marshal cluster extension: {0}")]
    Extension(#[source] serde_json::Error),

    /// The kubeconfig document could not be serialized.
    #[error("could not serialize kubeconfig: {0}")]
    Serialize(#[source] serde_yaml::Error),
}

/// A kube-apiserver endpoint of a shoot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterEndpoint {
    /// Name of the advertised address, usually `external`, `internal` or `unmanaged`.
    pub name: String,
    /// Host (and optional port) of the kube-apiserver.
    pub api_server_host: String,
    /// PEM encoded CA bundle of the kube-apiserver.
    pub ca_cert: Option<Vec<u8>>,
}

/// Everything needed to generate the kubeconfig of one shoot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KubeconfigRequest {
    /// Namespace of the shoot.
    pub namespace: String,
    /// Name of the shoot.
    pub shoot_name: String,
    /// Identity of the garden cluster hosting the shoot.
    pub garden_cluster_identity: String,
    /// Endpoints of the shoot. The first one becomes the current context.
    pub clusters: Vec<ClusterEndpoint>,
}

/// Payload of the exec extension attached to every cluster entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecPluginConfig {
    /// Shoot the kubeconfig belongs to.
    pub shoot_ref: ShootRef,
    /// Identity of the garden cluster.
    pub garden_cluster_identity: String,
}

/// Reference to a shoot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShootRef {
    /// Namespace of the shoot.
    pub namespace: String,
    /// Name of the shoot.
    pub name: String,
}

/// A `v1` kubeconfig document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Kubeconfig {
    /// Always `v1`.
    pub api_version: String,
    /// Cluster entries.
    pub clusters: Vec<NamedCluster>,
    /// Context entries.
    pub contexts: Vec<NamedContext>,
    /// Name of the default context.
    pub current_context: String,
    /// Always `Config`.
    pub kind: String,
    /// Client preferences.
    #[serde(default)]
    pub preferences: Preferences,
    /// User entries.
    pub users: Vec<NamedAuthInfo>,
}

/// Client preferences; always empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Preferences {}

/// Named cluster entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedCluster {
    /// Cluster config.
    pub cluster: Cluster,
    /// Entry name.
    pub name: String,
}

/// Cluster connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Cluster {
    /// Base64 encoded CA bundle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_authority_data: Option<String>,
    /// Cluster extensions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions: Vec<NamedExtension>,
    /// kube-apiserver URL.
    pub server: String,
}

/// Named extension with an arbitrary JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedExtension {
    /// Extension payload.
    pub extension: serde_json::Value,
    /// Extension name.
    pub name: String,
}

/// Named context entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedContext {
    /// Context config.
    pub context: Context,
    /// Entry name.
    pub name: String,
}

/// Pairs a cluster with a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Context {
    /// Cluster entry name.
    pub cluster: String,
    /// User entry name.
    pub user: String,
}

/// Named user entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedAuthInfo {
    /// Entry name.
    pub name: String,
    /// User config.
    pub user: AuthInfo,
}

/// User authentication settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthInfo {
    /// Exec credential plugin.
    pub exec: ExecConfig,
}

/// Exec credential plugin invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecConfig {
    /// Exec credential API version.
    pub api_version: String,
    /// Plugin arguments.
    pub args: Vec<String>,
    /// Plugin command.
    pub command: String,
    /// Extra environment; unset.
    pub env: Option<Vec<ExecEnvVar>>,
    /// Hint printed when the plugin is missing.
    #[serde(default)]
    pub install_hint: String,
    /// Whether the cluster entry (and its extension) is passed to the plugin.
    pub provide_cluster_info: bool,
}

/// Environment variable for an exec plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecEnvVar {
    /// Variable name.
    pub name: String,
    /// Variable value.
    pub value: String,
}

impl KubeconfigRequest {
    /// Name of the shared user entry: `<namespace>--<shoot>`.
    pub fn auth_name(&self) -> String {
        format!("{}--{}", self.namespace, self.shoot_name)
    }

    /// Ensure every required field is set. The first violation is returned.
    pub fn validate(&self) -> Result<(), KubeconfigError> {
        if self.clusters.is_empty() {
            return Err(KubeconfigError::MissingClusters);
        }

        for (n, cluster) in self.clusters.iter().enumerate() {
            if cluster.name.is_empty() {
                return Err(KubeconfigError::MissingClusterName(n));
            }
            if cluster.api_server_host.is_empty() {
                return Err(KubeconfigError::MissingApiServerHost(n));
            }
        }

        if self.namespace.is_empty() {
            return Err(KubeconfigError::MissingNamespace);
        }
        if self.shoot_name.is_empty() {
            return Err(KubeconfigError::MissingShootName);
        }
        if self.garden_cluster_identity.is_empty() {
            return Err(KubeconfigError::MissingGardenClusterIdentity);
        }

        Ok(())
    }

    /// Build the kubeconfig document.
    ///
    /// One cluster and one context is created per endpoint, all sharing the
    /// same exec user. The first endpoint becomes the current context.
    pub fn build(&self) -> Result<Kubeconfig, KubeconfigError> {
        let first = self.clusters.first().ok_or(KubeconfigError::MissingClusters)?;
        let auth_name = self.auth_name();

        let extension = ExecPluginConfig {
            shoot_ref: ShootRef {
                namespace: self.namespace.clone(),
                name: self.shoot_name.clone(),
            },
            garden_cluster_identity: self.garden_cluster_identity.clone(),
        };
        let extension = serde_json::to_value(&extension).map_err(KubeconfigError::Extension)?;

        let mut clusters = Vec::with_capacity(self.clusters.len());
        let mut contexts = Vec::with_capacity(self.clusters.len());
        for endpoint in &self.clusters {
            let name = format!("{}-{}", auth_name, endpoint.name);

            clusters.push(NamedCluster {
                name: name.clone(),
                cluster: Cluster {
                    certificate_authority_data: endpoint
                        .ca_cert
                        .as_ref()
                        .map(|ca| base64::engine::general_purpose::STANDARD.encode(ca)),
                    extensions: vec![NamedExtension {
                        name: EXEC_EXTENSION_NAME.to_string(),
                        extension: extension.clone(),
                    }],
                    server: format!("https://{}", endpoint.api_server_host),
                },
            });
            contexts.push(NamedContext {
                name: name.clone(),
                context: Context {
                    cluster: name,
                    user: auth_name.clone(),
                },
            });
        }

        Ok(Kubeconfig {
            api_version: "v1".to_string(),
            kind: "Config".to_string(),
            preferences: Preferences::default(),
            current_context: format!("{}-{}", auth_name, first.name),
            clusters,
            contexts,
            users: vec![NamedAuthInfo {
                name: auth_name,
                user: AuthInfo {
                    exec: ExecConfig {
                        api_version: EXEC_CREDENTIAL_API_VERSION.to_string(),
                        command: EXEC_COMMAND.to_string(),
                        args: EXEC_ARGS.iter().map(|a| a.to_string()).collect(),
                        env: None,
                        install_hint: String::new(),
                        provide_cluster_info: true,
                    },
                },
            }],
        })
    }

    /// Build the kubeconfig and serialize it to YAML.
    pub fn generate(&self) -> Result<String, KubeconfigError> {
        let kubeconfig = self.build()?;
        serde_yaml::to_string(&kubeconfig).map_err(KubeconfigError::Serialize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(name: &str, host: &str) -> ClusterEndpoint {
        ClusterEndpoint {
            name: name.to_string(),
            api_server_host: host.to_string(),
            ca_cert: Some(b"CA1".to_vec()),
        }
    }

    fn request(clusters: Vec<ClusterEndpoint>) -> KubeconfigRequest {
        KubeconfigRequest {
            namespace: "garden-ns1".to_string(),
            shoot_name: "shoot-a".to_string(),
            garden_cluster_identity: "garden-1".to_string(),
            clusters,
        }
    }

    #[test]
    fn validate_complete_request() {
        let req = request(vec![endpoint("external", "api.example.com:443")]);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn validate_missing_clusters() {
        let err = request(vec![]).validate().unwrap_err();
        assert!(matches!(err, KubeconfigError::MissingClusters));
        assert_eq!(err.to_string(), "missing clusters");
    }

    #[test]
    fn validate_names_offending_index() {
        let req = request(vec![
            endpoint("external", "api.example.com"),
            endpoint("internal", ""),
        ]);
        let err = req.validate().unwrap_err();
        assert!(matches!(err, KubeconfigError::MissingApiServerHost(1)));
        assert_eq!(err.to_string(), "no api server host defined for cluster[1]");

        let req = request(vec![endpoint("", "")]);
        assert!(matches!(
            req.validate().unwrap_err(),
            KubeconfigError::MissingClusterName(0)
        ));
    }

    #[test]
    fn validate_scalar_fields_in_order() {
        let mut req = request(vec![endpoint("external", "api.example.com")]);
        req.shoot_name.clear();
        req.garden_cluster_identity.clear();
        assert!(matches!(
            req.validate().unwrap_err(),
            KubeconfigError::MissingShootName
        ));

        let mut req = request(vec![endpoint("external", "api.example.com")]);
        req.namespace.clear();
        assert!(matches!(
            req.validate().unwrap_err(),
            KubeconfigError::MissingNamespace
        ));

        let mut req = request(vec![endpoint("external", "api.example.com")]);
        req.garden_cluster_identity.clear();
        assert!(matches!(
            req.validate().unwrap_err(),
            KubeconfigError::MissingGardenClusterIdentity
        ));
    }

    #[test]
    fn generate_single_endpoint() {
        let req = request(vec![endpoint("external", "api.example.com:443")]);

        let yaml = req.generate().unwrap();
        let kubeconfig: Kubeconfig = serde_yaml::from_str(&yaml).unwrap();

        assert_eq!(kubeconfig.api_version, "v1");
        assert_eq!(kubeconfig.kind, "Config");
        assert_eq!(kubeconfig.current_context, "garden-ns1--shoot-a-external");

        assert_eq!(kubeconfig.clusters.len(), 1);
        let cluster = &kubeconfig.clusters[0];
        assert_eq!(cluster.name, "garden-ns1--shoot-a-external");
        assert_eq!(cluster.cluster.server, "https://api.example.com:443");
        let ca = base64::engine::general_purpose::STANDARD
            .decode(cluster.cluster.certificate_authority_data.as_ref().unwrap())
            .unwrap();
        assert_eq!(ca, b"CA1");

        assert_eq!(kubeconfig.contexts.len(), 1);
        assert_eq!(kubeconfig.contexts[0].context.cluster, cluster.name);
        assert_eq!(kubeconfig.contexts[0].context.user, "garden-ns1--shoot-a");

        assert_eq!(kubeconfig.users.len(), 1);
        assert_eq!(kubeconfig.users[0].name, "garden-ns1--shoot-a");
    }

    #[test]
    fn generate_preserves_endpoint_order() {
        let req = request(vec![
            endpoint("internal", "api.internal.example.com"),
            endpoint("external", "api.example.com"),
            endpoint("unmanaged", "api.unmanaged.example.com"),
        ]);

        let kubeconfig = req.build().unwrap();

        let names: Vec<_> = kubeconfig.clusters.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "garden-ns1--shoot-a-internal",
                "garden-ns1--shoot-a-external",
                "garden-ns1--shoot-a-unmanaged",
            ]
        );
        assert_eq!(kubeconfig.contexts.len(), 3);
        assert_eq!(kubeconfig.users.len(), 1);
        assert_eq!(kubeconfig.current_context, "garden-ns1--shoot-a-internal");
    }

    #[test]
    fn generate_references_exec_plugin() {
        let req = request(vec![endpoint("external", "api.example.com")]);
        let kubeconfig = req.build().unwrap();

        let exec = &kubeconfig.users[0].user.exec;
        assert_eq!(exec.command, "kubectl");
        assert_eq!(exec.args, vec!["gardenlogin", "get-client-certificate"]);
        assert_eq!(exec.api_version, "client.authentication.k8s.io/v1beta1");
        assert!(exec.provide_cluster_info);

        let yaml = req.generate().unwrap();
        assert!(!yaml.contains("token"));
        assert!(!yaml.contains("client-key-data"));
    }

    #[test]
    fn generate_attaches_exec_extension() {
        let req = request(vec![endpoint("external", "api.example.com")]);
        let kubeconfig = req.build().unwrap();

        let extensions = &kubeconfig.clusters[0].cluster.extensions;
        assert_eq!(extensions.len(), 1);
        assert_eq!(extensions[0].name, EXEC_EXTENSION_NAME);

        let config: ExecPluginConfig =
            serde_json::from_value(extensions[0].extension.clone()).unwrap();
        assert_eq!(config.shoot_ref.namespace, "garden-ns1");
        assert_eq!(config.shoot_ref.name, "shoot-a");
        assert_eq!(config.garden_cluster_identity, "garden-1");
    }

    #[test]
    fn generate_without_ca() {
        let mut ep = endpoint("external", "api.example.com");
        ep.ca_cert = None;

        let yaml = request(vec![ep]).generate().unwrap();
        assert!(!yaml.contains("certificate-authority-data"));
    }

    #[test]
    fn generate_without_clusters_fails() {
        let err = request(vec![]).generate().unwrap_err();
        assert!(matches!(err, KubeconfigError::MissingClusters));
    }

    #[test]
    fn generate_is_deterministic() {
        let req = request(vec![
            endpoint("external", "api.example.com"),
            endpoint("internal", "api.internal.example.com"),
        ]);
        assert_eq!(req.generate().unwrap(), req.generate().unwrap());
    }
}
