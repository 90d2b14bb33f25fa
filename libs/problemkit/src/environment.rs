//! Deployment environment detection

use serde::{Deserialize, Serialize};

/// Environment name and the names treated as developer-experience environments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnvironmentConfig {
    pub name: String,
    pub developer_environments: Vec<String>,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            name: "production".to_owned(),
            developer_environments: vec![
                "development".to_owned(),
                "local".to_owned(),
                "demo".to_owned(),
            ],
        }
    }
}

/// Resolved view of the current deployment environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEnvironment {
    name: String,
    developer: bool,
}

impl HostEnvironment {
    /// Names are compared case-insensitively.
    #[must_use]
    pub fn from_config(cfg: &EnvironmentConfig) -> Self {
        let developer = cfg
            .developer_environments
            .iter()
            .any(|env| env.eq_ignore_ascii_case(&cfg.name));
        Self {
            name: cfg.name.clone(),
            developer,
        }
    }

    /// Named environment checked against the default developer list.
    pub fn named(name: impl Into<String>) -> Self {
        Self::from_config(&EnvironmentConfig {
            name: name.into(),
            ..EnvironmentConfig::default()
        })
    }

    #[must_use]
    pub fn production() -> Self {
        Self::named("production")
    }

    #[must_use]
    pub fn development() -> Self {
        Self::named("development")
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True for environments where raw failure details may be disclosed.
    #[must_use]
    pub fn is_developer(&self) -> bool {
        self.developer
    }
}

impl Default for HostEnvironment {
    fn default() -> Self {
        Self::production()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn developer_environments_match_case_insensitively() {
        assert!(HostEnvironment::named("Development").is_developer());
        assert!(HostEnvironment::named("DEMO").is_developer());
        assert!(HostEnvironment::named("local").is_developer());
        assert!(!HostEnvironment::named("Staging").is_developer());
        assert!(!HostEnvironment::default().is_developer());
    }

    #[test]
    fn custom_developer_list_replaces_defaults() {
        let cfg = EnvironmentConfig {
            name: "sandbox".to_owned(),
            developer_environments: vec!["Sandbox".to_owned()],
        };
        let env = HostEnvironment::from_config(&cfg);
        assert!(env.is_developer());
        assert_eq!(env.name(), "sandbox");
        assert!(!HostEnvironment::from_config(&EnvironmentConfig {
            name: "development".to_owned(),
            developer_environments: Vec::new(),
        })
        .is_developer());
    }
}
