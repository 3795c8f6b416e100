//! `[deploy]` section configuration.
//!
//! Options handed to layout collaborators by `publish`.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// `[deploy]` section in kiln.toml - publish options.
///
/// # Example
/// ```toml
/// [deploy]
/// base_url = "https://example.com"
///
/// [deploy.extra]
/// analytics = "UA-12345"
/// ```
#[derive(Debug, Clone, PartialEq, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct DeployOptions {
    /// Production URL of the site.
    #[serde(default = "defaults::deploy::base_url")]
    #[educe(Default = defaults::deploy::base_url())]
    pub base_url: Option<String>,

    /// Free-form values for templates.
    #[serde(default)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::super::SiteConfig;

    #[test]
    fn test_deploy_options() {
        let config = r#"
            [deploy]
            base_url = "https://example.com"

            [deploy.extra]
            analytics = "UA-12345"
            banner = true
        "#;
        let config: SiteConfig = toml::from_str(config).unwrap();

        assert_eq!(config.deploy.base_url.as_deref(), Some("https://example.com"));
        assert_eq!(
            config.deploy.extra.get("analytics").and_then(|v| v.as_str()),
            Some("UA-12345")
        );
        assert_eq!(
            config.deploy.extra.get("banner").and_then(|v| v.as_bool()),
            Some(true)
        );
    }

    #[test]
    fn test_deploy_options_defaults() {
        let config: SiteConfig = toml::from_str("").unwrap();
        assert!(config.deploy.base_url.is_none());
        assert!(config.deploy.extra.is_empty());
    }

    #[test]
    fn test_deploy_unknown_field_rejection() {
        let config = r#"
            [deploy]
            provider = "github"
        "#;
        let result: Result<SiteConfig, _> = toml::from_str(config);
        assert!(result.is_err());
    }
}
