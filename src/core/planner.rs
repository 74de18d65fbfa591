//! Deployment waves. Group environments by `deployment.wave` and derive
//! the stage, stack and DNS record names each environment deploys under.

use super::app::{AppConfig, DnsConfig};
use std::collections::BTreeMap;
use std::fmt;

/// Group `items` by key. Groups come out in key order; items keep their
/// original order inside a group.
pub fn group_by<T, K, F>(items: impl IntoIterator<Item = T>, selector: F) -> BTreeMap<K, Vec<T>>
where
    K: Ord,
    F: Fn(&T) -> K,
{
    let mut groups: BTreeMap<K, Vec<T>> = BTreeMap::new();
    for item in items {
        groups.entry(selector(&item)).or_default().push(item);
    }
    groups
}

/// Which part of the application a wave deploys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Backend,
    Web,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backend => write!(f, "Backend"),
            Self::Web => write!(f, "Web"),
        }
    }
}

/// One environment's deployment within a wave.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagePlan {
    pub environment: String,
    pub stack_name: String,
    pub record_name: String,
}

/// A group of environments deployed together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wave {
    pub tier: Tier,
    pub number: u32,
    pub stages: Vec<StagePlan>,
}

impl Wave {
    /// Pipeline wave label, e.g. `Backend-Wave-0`.
    pub fn label(&self) -> String {
        format!("{}-Wave-{}", self.tier, self.number)
    }
}

/// Full DNS record name for an environment subdomain. Without DNS, or
/// without a common subdomain, it is the subdomain itself.
pub fn record_name(subdomain: &str, dns: Option<&DnsConfig>) -> String {
    match dns.and_then(|d| d.common_subdomain.as_deref()) {
        Some(common) if !common.is_empty() => format!("{}.{}", subdomain, common),
        _ => subdomain.to_string(),
    }
}

/// Backend waves first, then web waves, each in ascending wave order.
pub fn plan_waves(config: &AppConfig) -> Vec<Wave> {
    let app = &config.app_name;
    let mut waves = Vec::new();

    for (number, envs) in group_by(&config.backend.environments, |e| e.deployment.wave) {
        waves.push(Wave {
            tier: Tier::Backend,
            number,
            stages: envs
                .into_iter()
                .map(|e| StagePlan {
                    environment: e.name.clone(),
                    stack_name: format!("{}{}BackendEnvironment", app, e.name),
                    record_name: record_name(&e.subdomain, config.dns.as_ref()),
                })
                .collect(),
        });
    }

    for (number, envs) in group_by(&config.web.environments, |e| e.deployment.wave) {
        waves.push(Wave {
            tier: Tier::Web,
            number,
            stages: envs
                .into_iter()
                .map(|e| StagePlan {
                    environment: e.name.clone(),
                    stack_name: format!("{}-WEB-{}", app, e.name),
                    record_name: record_name(&e.subdomain, config.dns.as_ref()),
                })
                .collect(),
        });
    }

    waves
}

/// Web environments whose `backendSubdomain` matches no backend record.
/// Returns `(web environment, backendSubdomain)` pairs.
pub fn unmatched_backends(config: &AppConfig) -> Vec<(String, String)> {
    let records: Vec<String> = config
        .backend
        .environments
        .iter()
        .map(|e| record_name(&e.subdomain, config.dns.as_ref()))
        .collect();
    config
        .web
        .environments
        .iter()
        .filter(|w| !records.contains(&w.backend_subdomain))
        .map(|w| (w.name.clone(), w.backend_subdomain.clone()))
        .collect()
}
