//! Provider configuration.
//!
//! The provider is configured via a TOML file, with support for environment
//! variable interpolation using `${VAR_NAME}` syntax. Every option also has an
//! environment-variable fallback; an explicitly configured value always wins.
//!
//! # Example
//!
//! ```toml
//! client_id = "${PINGONE_CLIENT_ID}"
//! client_secret = "${PINGONE_CLIENT_SECRET}"
//! environment_id = "f2c3a0b4-5d61-4e7a-9b8c-0d1e2f3a4b5c"
//! region_code = "EU"
//!
//! [global_options.population]
//! contains_users_force_delete = false
//!
//! [retry]
//! default_timeout_secs = 600
//! ```

mod observability;
mod region;
mod retry;

use std::{fmt, path::Path, sync::LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

pub use observability::*;
pub use region::*;
pub use retry::*;

use crate::framework::types::{RESOURCE_ID_PATTERN, RESOURCE_ID_REGEX};

pub const ENV_CLIENT_ID: &str = "PINGONE_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "PINGONE_CLIENT_SECRET";
pub const ENV_ENVIRONMENT_ID: &str = "PINGONE_ENVIRONMENT_ID";
pub const ENV_ACCESS_TOKEN: &str = "PINGONE_API_ACCESS_TOKEN";
pub const ENV_REGION_CODE: &str = "PINGONE_REGION_CODE";
pub const ENV_LEGACY_REGION: &str = "PINGONE_REGION";
pub const ENV_API_HOSTNAME: &str = "PINGONE_API_SERVICE_HOSTNAME";
pub const ENV_AUTH_HOSTNAME: &str = "PINGONE_AUTH_SERVICE_HOSTNAME";
pub const ENV_HTTPS_PROXY: &str = "HTTPS_PROXY";
pub const ENV_HTTP_PROXY: &str = "HTTP_PROXY";
pub const ENV_APPEND_USER_AGENT: &str = "PINGONE_TF_APPEND_USER_AGENT";
pub const ENV_POPULATION_FORCE_DELETE: &str = "PINGONE_POPULATION_CONTAINS_USERS_FORCE_DELETE";

/// Root configuration for the provider.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// OAuth2 client identifier of the worker application.
    #[serde(default)]
    pub client_id: Option<String>,

    /// OAuth2 client secret of the worker application.
    #[serde(default)]
    pub client_secret: Option<String>,

    /// Environment that hosts the worker application.
    #[serde(default)]
    pub environment_id: Option<String>,

    /// Pre-obtained bearer token. Mutually exclusive with the client credentials.
    #[serde(default)]
    pub access_token: Option<String>,

    /// Region code selecting the service hostname suffix.
    #[serde(default)]
    pub region_code: Option<String>,

    /// Deprecated region name (`AsiaPacific`, `Canada`, `Europe`, `NorthAmerica`).
    #[serde(default)]
    pub region: Option<String>,

    /// Hostname override for the management API (`api.pingone.<suffix>`).
    #[serde(default)]
    pub api_hostname_override: Option<String>,

    /// Hostname override for the auth service (`auth.pingone.<suffix>`).
    #[serde(default)]
    pub auth_hostname_override: Option<String>,

    /// Outbound HTTP/HTTPS proxy.
    #[serde(default)]
    pub proxy_url: Option<String>,

    /// Appended to the `User-Agent` header.
    #[serde(default)]
    pub append_user_agent: Option<String>,

    #[serde(default)]
    pub global_options: GlobalOptions,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Set when `region_code` was derived from the deprecated `region` option.
    #[serde(skip)]
    legacy_region_used: bool,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "****"))
            .field("environment_id", &self.environment_id)
            .field("access_token", &self.access_token.as_ref().map(|_| "****"))
            .field("region_code", &self.region_code)
            .field("api_hostname_override", &self.api_hostname_override)
            .field("auth_hostname_override", &self.auth_hostname_override)
            .field("proxy_url", &self.proxy_url)
            .field("append_user_agent", &self.append_user_agent)
            .field("global_options", &self.global_options)
            .finish_non_exhaustive()
    }
}

/// Options that change provider-wide resource behaviour.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GlobalOptions {
    #[serde(default)]
    pub population: PopulationOptions,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PopulationOptions {
    /// Force-delete populations that still contain users. Only honoured in
    /// `SANDBOX` environments.
    #[serde(default)]
    pub contains_users_force_delete: Option<bool>,
}

impl GlobalOptions {
    pub fn population_force_delete(&self) -> bool {
        self.population.contains_users_force_delete.unwrap_or(false)
    }
}

/// How the provider authenticates against the management API.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    AccessToken(String),
    ClientCredentials {
        client_id: String,
        client_secret: String,
        environment_id: String,
    },
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::AccessToken(_) => f.write_str("AccessToken(****)"),
            Credentials::ClientCredentials {
                client_id,
                environment_id,
                ..
            } => f
                .debug_struct("ClientCredentials")
                .field("client_id", client_id)
                .field("environment_id", environment_id)
                .finish_non_exhaustive(),
        }
    }
}

impl ProviderConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e, path.as_ref().to_path_buf()))?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string, then fill unset options from
    /// the environment and validate.
    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        // Expand environment variables
        let expanded = expand_env_vars(contents)?;

        let mut config: ProviderConfig = toml::from_str(&expanded).map_err(ConfigError::Parse)?;

        config.apply_env();
        config.validate()?;

        Ok(config)
    }

    /// Build configuration purely from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = ProviderConfig::default();
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Fill every unset option from its environment variable.
    pub fn apply_env(&mut self) {
        fill_from_env(&mut self.client_id, ENV_CLIENT_ID);
        fill_from_env(&mut self.client_secret, ENV_CLIENT_SECRET);
        fill_from_env(&mut self.environment_id, ENV_ENVIRONMENT_ID);
        fill_from_env(&mut self.access_token, ENV_ACCESS_TOKEN);
        fill_from_env(&mut self.region_code, ENV_REGION_CODE);
        fill_from_env(&mut self.region, ENV_LEGACY_REGION);
        fill_from_env(&mut self.api_hostname_override, ENV_API_HOSTNAME);
        fill_from_env(&mut self.auth_hostname_override, ENV_AUTH_HOSTNAME);
        fill_from_env(&mut self.proxy_url, ENV_HTTPS_PROXY);
        fill_from_env(&mut self.proxy_url, ENV_HTTP_PROXY);
        fill_from_env(&mut self.append_user_agent, ENV_APPEND_USER_AGENT);

        let force_delete = &mut self.global_options.population.contains_users_force_delete;
        if force_delete.is_none()
            && let Some(value) = env_value(ENV_POPULATION_FORCE_DELETE)
        {
            *force_delete = Some(matches!(
                value.to_ascii_lowercase().as_str(),
                "true" | "1" | "yes"
            ));
        }
    }

    /// Validate the configuration for consistency and completeness.
    fn validate(&mut self) -> Result<(), ConfigError> {
        if self.region_code.is_none()
            && let Some(region) = self.region.as_deref()
        {
            let code = RegionCode::from_legacy_region(region).ok_or_else(|| {
                ConfigError::Validation(format!(
                    "region '{}' is not a recognised legacy region; use region_code instead",
                    region
                ))
            })?;
            self.region_code = Some(code.as_str().to_string());
            self.legacy_region_used = true;
        }

        if self.region.is_some() && !self.legacy_region_used {
            // `region` set alongside `region_code`: still deprecated, but ignored.
            self.legacy_region_used = true;
        }

        if self.region_code.is_none() {
            return Err(ConfigError::Validation(format!(
                "region_code is required (or set the {} environment variable)",
                ENV_REGION_CODE
            )));
        }

        self.credentials()?;

        if let Some(environment_id) = &self.environment_id
            && !RESOURCE_ID_REGEX.is_match(environment_id)
        {
            return Err(ConfigError::Validation(format!(
                "environment_id '{}' is malformed; must match regex \"{}\"",
                environment_id, RESOURCE_ID_PATTERN
            )));
        }

        if let Some(proxy) = &self.proxy_url {
            url::Url::parse(proxy).map_err(|e| {
                ConfigError::Validation(format!("proxy_url '{}' is not a valid URL: {}", proxy, e))
            })?;
        }

        self.retry.validate().map_err(ConfigError::Validation)?;

        Ok(())
    }

    /// Resolve the credential mode. Exactly one of `access_token` or the full
    /// `client_id` + `client_secret` + `environment_id` triple must be present.
    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        let has_client = self.client_id.is_some() || self.client_secret.is_some();

        match (&self.access_token, has_client) {
            (Some(_), true) => Err(ConfigError::Validation(
                "access_token cannot be combined with client_id/client_secret".into(),
            )),
            (Some(token), false) => Ok(Credentials::AccessToken(token.clone())),
            (None, _) => {
                let missing: Vec<&str> = [
                    ("client_id", self.client_id.is_none()),
                    ("client_secret", self.client_secret.is_none()),
                    ("environment_id", self.environment_id.is_none()),
                ]
                .into_iter()
                .filter_map(|(name, absent)| absent.then_some(name))
                .collect();

                match (&self.client_id, &self.client_secret, &self.environment_id) {
                    (Some(client_id), Some(client_secret), Some(environment_id)) => {
                        Ok(Credentials::ClientCredentials {
                            client_id: client_id.clone(),
                            client_secret: client_secret.clone(),
                            environment_id: environment_id.clone(),
                        })
                    }
                    _ if !has_client => Err(ConfigError::Validation(
                        "either access_token or client_id, client_secret and environment_id must be set"
                            .into(),
                    )),
                    _ => Err(ConfigError::Validation(format!(
                        "client credentials are incomplete, missing: {}",
                        missing.join(", ")
                    ))),
                }
            }
        }
    }

    /// Whether the deprecated `region` option was used.
    pub fn legacy_region_used(&self) -> bool {
        self.legacy_region_used
    }

    /// The configured region code, empty when none is set.
    pub fn region_code(&self) -> &str {
        self.region_code.as_deref().unwrap_or_default()
    }
}

static ENV_VAR_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").unwrap());

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn fill_from_env(field: &mut Option<String>, name: &str) {
    if field.is_none() {
        *field = env_value(name);
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {1}: {0}")]
    Io(std::io::Error, std::path::PathBuf),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

/// Expand `${VAR}` references, ignoring anything after a `#` comment marker.
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut result = String::with_capacity(input.len());

    for line in input.lines() {
        let comment_pos = line.find('#');

        let mut line_result = String::with_capacity(line.len());
        let mut last_end = 0;

        for cap in ENV_VAR_REGEX.captures_iter(line) {
            let Some(whole) = cap.get(0) else {
                continue;
            };

            // Skip if this variable is inside a comment
            if let Some(pos) = comment_pos
                && whole.start() >= pos
            {
                continue;
            }

            line_result.push_str(&line[last_end..whole.start()]);

            let var_name = &cap[1];
            let value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;
            line_result.push_str(&value);

            last_end = whole.end();
        }

        line_result.push_str(&line[last_end..]);
        result.push_str(&line_result);
        result.push('\n');
    }

    // Remove trailing newline if input didn't have one
    if !input.ends_with('\n') && result.ends_with('\n') {
        result.pop();
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    const ENV_ID: &str = "f2c3a0b4-5d61-4e7a-9b8c-0d1e2f3a4b5c";

    const ALL_VARS: [&str; 12] = [
        ENV_CLIENT_ID,
        ENV_CLIENT_SECRET,
        ENV_ENVIRONMENT_ID,
        ENV_ACCESS_TOKEN,
        ENV_REGION_CODE,
        ENV_LEGACY_REGION,
        ENV_API_HOSTNAME,
        ENV_AUTH_HOSTNAME,
        ENV_HTTPS_PROXY,
        ENV_HTTP_PROXY,
        ENV_APPEND_USER_AGENT,
        ENV_POPULATION_FORCE_DELETE,
    ];

    fn with_clean_env<R>(vars: &[(&str, &str)], f: impl FnOnce() -> R) -> R {
        let mut all: Vec<(&str, Option<&str>)> = ALL_VARS.iter().map(|v| (*v, None)).collect();
        for &(key, value) in vars {
            all.retain(|(k, _)| *k != key);
            all.push((key, Some(value)));
        }
        temp_env::with_vars(all, f)
    }

    #[test]
    #[serial]
    fn test_client_credentials_config() {
        with_clean_env(&[], || {
            let config = ProviderConfig::from_str(&format!(
                r#"
                client_id = "worker"
                client_secret = "s3cret"
                environment_id = "{ENV_ID}"
                region_code = "EU"
            "#
            ))
            .unwrap();

            assert_eq!(config.region_code(), "EU");
            assert!(matches!(
                config.credentials().unwrap(),
                Credentials::ClientCredentials { ref client_id, .. } if client_id == "worker"
            ));
            assert!(!config.global_options.population_force_delete());
        });
    }

    #[test]
    #[serial]
    fn test_access_token_config() {
        with_clean_env(&[], || {
            let config = ProviderConfig::from_str(
                r#"
                access_token = "abc.def.ghi"
                region_code = "NA"
            "#,
            )
            .unwrap();

            assert_eq!(
                config.credentials().unwrap(),
                Credentials::AccessToken("abc.def.ghi".into())
            );
        });
    }

    #[test]
    #[serial]
    fn test_access_token_and_client_credentials_conflict() {
        with_clean_env(&[], || {
            let err = ProviderConfig::from_str(&format!(
                r#"
                access_token = "abc"
                client_id = "worker"
                client_secret = "s3cret"
                environment_id = "{ENV_ID}"
                region_code = "NA"
            "#
            ))
            .unwrap_err();

            assert!(err.to_string().contains("cannot be combined"));
        });
    }

    #[test]
    #[serial]
    fn test_partial_client_credentials_names_missing_fields() {
        with_clean_env(&[], || {
            let err = ProviderConfig::from_str(
                r#"
                client_id = "worker"
                region_code = "NA"
            "#,
            )
            .unwrap_err();

            let message = err.to_string();
            assert!(message.contains("client_secret"));
            assert!(message.contains("environment_id"));
            assert!(!message.contains("client_id,"));
        });
    }

    #[test]
    #[serial]
    fn test_no_credentials_is_an_error() {
        with_clean_env(&[], || {
            let err = ProviderConfig::from_str(r#"region_code = "NA""#).unwrap_err();
            assert!(matches!(err, ConfigError::Validation(_)));
        });
    }

    #[test]
    #[serial]
    fn test_env_fallback_fills_unset_options() {
        with_clean_env(
            &[
                (ENV_CLIENT_ID, "env-client"),
                (ENV_CLIENT_SECRET, "env-secret"),
                (ENV_ENVIRONMENT_ID, ENV_ID),
                (ENV_REGION_CODE, "CA"),
                (ENV_APPEND_USER_AGENT, "ci-run/42"),
                (ENV_POPULATION_FORCE_DELETE, "true"),
            ],
            || {
                let config = ProviderConfig::from_env().unwrap();
                assert_eq!(config.client_id.as_deref(), Some("env-client"));
                assert_eq!(config.region_code(), "CA");
                assert_eq!(config.append_user_agent.as_deref(), Some("ci-run/42"));
                assert!(config.global_options.population_force_delete());
            },
        );
    }

    #[test]
    #[serial]
    fn test_explicit_config_wins_over_env() {
        with_clean_env(
            &[(ENV_REGION_CODE, "CA"), (ENV_ACCESS_TOKEN, "from-env")],
            || {
                let config = ProviderConfig::from_str(
                    r#"
                    access_token = "from-file"
                    region_code = "SG"
                "#,
                )
                .unwrap();

                assert_eq!(config.region_code(), "SG");
                assert_eq!(config.access_token.as_deref(), Some("from-file"));
            },
        );
    }

    #[test]
    #[serial]
    fn test_https_proxy_preferred_over_http_proxy() {
        with_clean_env(
            &[
                (ENV_ACCESS_TOKEN, "t"),
                (ENV_REGION_CODE, "NA"),
                (ENV_HTTPS_PROXY, "http://secure-proxy:3128"),
                (ENV_HTTP_PROXY, "http://plain-proxy:3128"),
            ],
            || {
                let config = ProviderConfig::from_env().unwrap();
                assert_eq!(config.proxy_url.as_deref(), Some("http://secure-proxy:3128"));
            },
        );
    }

    #[test]
    #[serial]
    fn test_legacy_region_maps_to_region_code() {
        with_clean_env(&[(ENV_LEGACY_REGION, "Europe")], || {
            let config = ProviderConfig::from_str(r#"access_token = "t""#).unwrap();
            assert_eq!(config.region_code(), "EU");
            assert!(config.legacy_region_used());
        });
    }

    #[test]
    #[serial]
    fn test_unknown_legacy_region_is_rejected() {
        with_clean_env(&[], || {
            let err = ProviderConfig::from_str(
                r#"
                access_token = "t"
                region = "Atlantis"
            "#,
            )
            .unwrap_err();
            assert!(err.to_string().contains("Atlantis"));
        });
    }

    #[test]
    #[serial]
    fn test_malformed_environment_id_is_rejected() {
        with_clean_env(&[], || {
            let err = ProviderConfig::from_str(
                r#"
                client_id = "worker"
                client_secret = "s3cret"
                environment_id = "not-a-uuid"
                region_code = "NA"
            "#,
            )
            .unwrap_err();
            assert!(err.to_string().contains("malformed"));
        });
    }

    #[test]
    #[serial]
    fn test_env_var_expansion() {
        with_clean_env(&[("TEST_P1_TOKEN", "expanded-token")], || {
            let config = ProviderConfig::from_str(
                r#"
                access_token = "${TEST_P1_TOKEN}"
                region_code = "AU" # ${NOT_EXPANDED_IN_COMMENT}
            "#,
            )
            .unwrap();
            assert_eq!(config.access_token.as_deref(), Some("expanded-token"));
        });
    }

    #[test]
    #[serial]
    fn test_missing_env_var_in_file() {
        with_clean_env(&[], || {
            temp_env::with_var_unset("TEST_P1_MISSING", || {
                let err = ProviderConfig::from_str(r#"access_token = "${TEST_P1_MISSING}""#)
                    .unwrap_err();
                assert!(matches!(err, ConfigError::EnvVarNotFound(ref v) if v == "TEST_P1_MISSING"));
            });
        });
    }

    #[test]
    #[serial]
    fn test_from_file() {
        with_clean_env(&[], || {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("provider.toml");
            std::fs::write(
                &path,
                r#"
                access_token = "t"
                region_code = "EU"

                [global_options.population]
                contains_users_force_delete = true

                [retry]
                initial_delay_ms = 10
                max_delay_ms = 100

                [logging]
                level = "debug"
                format = "json"
            "#,
            )
            .unwrap();

            let config = ProviderConfig::from_file(&path).unwrap();
            assert!(config.global_options.population_force_delete());
            assert_eq!(config.retry.initial_delay_ms, 10);
            assert_eq!(config.logging.format, LogFormat::Json);
        });
    }

    #[test]
    fn test_missing_file() {
        let err = ProviderConfig::from_file("/nonexistent/provider.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(..)));
    }

    #[test]
    #[serial]
    fn test_unknown_field_rejected() {
        with_clean_env(&[], || {
            let err = ProviderConfig::from_str(
                r#"
                access_token = "t"
                region_code = "EU"
                tenant = "nope"
            "#,
            )
            .unwrap_err();
            assert!(matches!(err, ConfigError::Parse(_)));
        });
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = ProviderConfig {
            client_secret: Some("very-secret".into()),
            access_token: Some("bearer-value".into()),
            ..Default::default()
        };
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("very-secret"));
        assert!(!rendered.contains("bearer-value"));
    }
}
