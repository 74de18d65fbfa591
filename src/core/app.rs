//! Built-in application configuration: pipelines, DNS, the backend with its
//! AWS environment and environments, and web environments.
//!
//! Draft types carry `Option` where a default exists; resolved types don't.
//! Types with nothing to default are shared by both sides. The only
//! defaults tree is `backend_defaults`: the AWS region, each environment's
//! deployment wave and autoscaling, the listening port and the health check.

use super::definition::ConfigDefinition;
use super::schema::{Field, Schema, Shape};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Shared
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    /// Deployment-ordering group; lower waves deploy first
    pub wave: u32,
}

/// Never defaulted: a project either names its hosted zone or has no DNS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DnsConfig {
    pub hosted_zone_id: String,
    pub hosted_zone_name: String,
    /// Appended to every environment subdomain when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub common_subdomain: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoConfig {
    pub owner: String,
    pub name: String,
    pub branch: String,
    /// Pre-created source connection
    #[serde(rename = "connectionARN")]
    pub connection_arn: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
    pub repo: RepoConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CdkConfig {
    pub infrastructure_pipeline: Pipeline,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebConfig {
    pub web_pipeline: Pipeline,
    pub environments: Vec<WebEnvironmentConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebEnvironmentConfig {
    pub name: String,
    pub subdomain: String,
    pub backend_subdomain: String,
    pub deployment: Deployment,
}

/// Health check protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Protocol {
    #[serde(rename = "HTTP")]
    Http,
    #[serde(rename = "HTTPS")]
    Https,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http => write!(f, "HTTP"),
            Self::Https => write!(f, "HTTPS"),
        }
    }
}

// ============================================================================
// Resolved
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    pub app_name: String,
    pub cdk: CdkConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns: Option<DnsConfig>,
    pub backend: BackendConfig,
    pub web: WebConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendConfig {
    pub application_pipeline: Pipeline,
    pub aws_environment: AwsEnvironment,
    pub environments: Vec<EnvironmentConfig>,
    pub application: ApplicationConfig,
    pub health_check: HealthCheckConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwsEnvironment {
    /// Unset when neither config nor defaults name an account
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    pub region: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub subdomain: String,
    pub deployment: Deployment,
    pub autoscaling: AutoscalingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoscalingConfig {
    pub enabled: bool,
    pub min_instances: u32,
    pub max_instances: u32,
    /// Comma-separated instance types, e.g. `t3.nano,t3.micro`
    pub instance_types: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationConfig {
    pub listening_port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheckConfig {
    pub protocol: Protocol,
    pub path: String,
}

// ============================================================================
// Draft
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfigDraft {
    pub app_name: String,
    pub cdk: CdkConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns: Option<DnsConfig>,
    pub backend: BackendDraft,
    pub web: WebConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendDraft {
    pub application_pipeline: Pipeline,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws_environment: Option<AwsEnvironmentDraft>,
    pub environments: Vec<EnvironmentDraft>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application: Option<ApplicationDraft>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_check: Option<HealthCheckDraft>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwsEnvironmentDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentDraft {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub subdomain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment: Option<DeploymentDraft>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoscaling: Option<AutoscalingDraft>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wave: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoscalingDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_instances: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_instances: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_types: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listening_port: Option<u16>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheckDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<Protocol>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl AppConfigDraft {
    /// A single-environment project, used by `stackdef init`.
    pub fn example() -> Self {
        let repo = |name: &str| Pipeline {
            repo: RepoConfig {
                owner: "example-org".to_string(),
                name: name.to_string(),
                branch: "main".to_string(),
                connection_arn: "arn:aws:codestar-connections:us-west-2:000000000000:connection/example"
                    .to_string(),
            },
        };
        Self {
            app_name: "Games".to_string(),
            cdk: CdkConfig {
                infrastructure_pipeline: repo("GamesInfrastructure"),
            },
            dns: Some(DnsConfig {
                hosted_zone_id: "Z0000000000000000000".to_string(),
                hosted_zone_name: "example.com".to_string(),
                common_subdomain: Some("api.games".to_string()),
            }),
            backend: BackendDraft {
                application_pipeline: repo("GamesServer"),
                aws_environment: Some(AwsEnvironmentDraft {
                    account: Some("000000000000".to_string()),
                    region: None,
                }),
                environments: vec![EnvironmentDraft {
                    name: "Beta".to_string(),
                    description: Some("Beta environment for Games".to_string()),
                    subdomain: "beta".to_string(),
                    deployment: None,
                    autoscaling: None,
                }],
                application: None,
                health_check: Some(HealthCheckDraft {
                    path: Some("/ping".to_string()),
                    ..HealthCheckDraft::default()
                }),
            },
            web: WebConfig {
                web_pipeline: repo("GamesWeb"),
                environments: vec![WebEnvironmentConfig {
                    name: "Beta".to_string(),
                    subdomain: "beta.games".to_string(),
                    backend_subdomain: "beta.api.games".to_string(),
                    deployment: Deployment { wave: 0 },
                }],
            },
        }
    }
}

// ============================================================================
// Defaults
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfigDefaults {
    #[serde(rename = "backend_defaults")]
    pub backend: BackendDefaults,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendDefaults {
    #[serde(rename = "awsEnvironment")]
    pub aws_environment: AwsEnvironmentDraft,
    #[serde(rename = "awsEnvironment_defaults")]
    pub aws_environment_defaults: AwsEnvironmentDefaults,
    #[serde(rename = "environments_defaults")]
    pub environments: EnvironmentDefaults,
    pub application: ApplicationDraft,
    pub application_defaults: ApplicationConfig,
    #[serde(rename = "healthCheck")]
    pub health_check: HealthCheckDraft,
    #[serde(rename = "healthCheck_defaults")]
    pub health_check_defaults: HealthCheckConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwsEnvironmentDefaults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    pub region: String,
}

/// Defaults shared by every backend environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentDefaults {
    pub deployment: DeploymentDraft,
    pub deployment_defaults: Deployment,
    pub autoscaling: AutoscalingDraft,
    pub autoscaling_defaults: AutoscalingConfig,
}

impl AppConfigDefaults {
    /// Region `us-west-2`, wave 0, a single non-autoscaled instance, port 80
    /// and an HTTP health check on `/`. No account.
    pub fn standard() -> Self {
        Self {
            backend: BackendDefaults {
                aws_environment: AwsEnvironmentDraft::default(),
                aws_environment_defaults: AwsEnvironmentDefaults {
                    account: None,
                    region: "us-west-2".to_string(),
                },
                environments: EnvironmentDefaults {
                    deployment: DeploymentDraft::default(),
                    deployment_defaults: Deployment { wave: 0 },
                    autoscaling: AutoscalingDraft::default(),
                    autoscaling_defaults: AutoscalingConfig {
                        enabled: false,
                        min_instances: 1,
                        max_instances: 1,
                        instance_types: "t3.nano,t3.micro".to_string(),
                    },
                },
                application: ApplicationDraft::default(),
                application_defaults: ApplicationConfig { listening_port: 80 },
                health_check: HealthCheckDraft::default(),
                health_check_defaults: HealthCheckConfig {
                    protocol: Protocol::Http,
                    path: "/".to_string(),
                },
            },
        }
    }

    /// Default AWS account for configs that name none.
    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.backend.aws_environment_defaults.account = Some(account.into());
        self
    }
}

// ============================================================================
// Definition
// ============================================================================

/// The built-in application definition.
pub struct AppDefinition;

impl ConfigDefinition for AppDefinition {
    type Draft = AppConfigDraft;
    type Defaults = AppConfigDefaults;
    type Resolved = AppConfig;

    fn schema() -> Schema {
        app_schema()
    }
}

fn pipeline() -> Field {
    let repo = Field::object(
        Schema::new()
            .with("owner", Field::string())
            .with("name", Field::string())
            .with("branch", Field::string())
            .with("connectionARN", Field::string()),
    );
    Field::object(Schema::new().with("repo", repo))
}

fn environment() -> Schema {
    Schema::new()
        .with("name", Field::string())
        .with("description", Field::string().optional().no_default())
        .with("subdomain", Field::string())
        .with(
            "deployment",
            Field::object(Schema::new().with("wave", Field::integer().optional())).optional(),
        )
        .with(
            "autoscaling",
            Field::object(
                Schema::new()
                    .with("enabled", Field::boolean().optional())
                    .with("minInstances", Field::integer().optional())
                    .with("maxInstances", Field::integer().optional())
                    .with("instanceTypes", Field::string().optional()),
            )
            .optional(),
        )
}

fn web_environment() -> Schema {
    Schema::new()
        .with("name", Field::string())
        .with("subdomain", Field::string())
        .with("backendSubdomain", Field::string())
        .with(
            "deployment",
            Field::object(Schema::new().with("wave", Field::integer())),
        )
}

/// Schema of the built-in application config.
pub fn app_schema() -> Schema {
    Schema::new()
        .with("appName", Field::string())
        .with(
            "cdk",
            Field::object(Schema::new().with("infrastructurePipeline", pipeline())),
        )
        .with(
            "dns",
            Field::object(
                Schema::new()
                    .with("hostedZoneId", Field::string())
                    .with("hostedZoneName", Field::string())
                    .with("commonSubdomain", Field::string().optional()),
            )
            .optional()
            .no_default(),
        )
        .with(
            "backend",
            Field::object(
                Schema::new()
                    .with("applicationPipeline", pipeline())
                    .with(
                        "awsEnvironment",
                        Field::object(
                            Schema::new()
                                .with("account", Field::string().optional().nullable_default())
                                .with("region", Field::string().optional()),
                        )
                        .optional(),
                    )
                    .with(
                        "environments",
                        Field::array(Shape::Object(environment())).non_empty(),
                    )
                    .with(
                        "application",
                        Field::object(
                            Schema::new().with("listeningPort", Field::integer().optional()),
                        )
                        .optional(),
                    )
                    .with(
                        "healthCheck",
                        Field::object(
                            Schema::new()
                                .with(
                                    "protocol",
                                    Field::string().optional().choices(["HTTP", "HTTPS"]),
                                )
                                .with("path", Field::string().optional()),
                        )
                        .optional(),
                    ),
            ),
        )
        .with(
            "web",
            Field::object(
                Schema::new()
                    .with("webPipeline", pipeline())
                    .with(
                        "environments",
                        Field::array(Shape::Object(web_environment())).non_empty(),
                    ),
            ),
        )
}
