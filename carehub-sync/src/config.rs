//! Runtime configuration for the sync layer
//!
//! Defaults suit a single desktop install; every field can be overridden
//! through `CAREHUB_*` environment variables via [`SyncConfig::from_env`].

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};

/// What the synchronizing repository does with a delete it cannot send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletePolicy {
    /// Delete locally only. A record created offline and deleted before
    /// replay is still created remotely on the next sync.
    #[default]
    LocalOnly,
    /// Drop a still-queued Create for the same record, then delete locally.
    SuppressPendingCreate,
    /// Queue the delete for replay alongside creates.
    QueueDelete,
}

impl FromStr for DeletePolicy {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local_only" | "local-only" | "local" => Ok(DeletePolicy::LocalOnly),
            "suppress_pending_create" | "suppress-pending-create" | "suppress" => {
                Ok(DeletePolicy::SuppressPendingCreate)
            }
            "queue_delete" | "queue-delete" | "queue" => Ok(DeletePolicy::QueueDelete),
            other => Err(SyncError::Configuration(format!(
                "Unknown delete policy: {}. Valid options: local_only, suppress_pending_create, queue_delete",
                other
            ))),
        }
    }
}

/// Sync layer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Writable directory holding one JSON file per entity type
    pub data_dir: PathBuf,
    /// Read-only directory with the bundled seed templates
    pub seed_dir: Option<PathBuf>,
    /// Base URL of the remote authority
    pub api_base_url: String,
    /// Upper bound for any single network call
    #[serde(with = "duration_millis")]
    pub request_timeout: Duration,
    /// Attempts for a local file write before giving up
    pub write_retries: u32,
    /// Pause between local write attempts
    #[serde(with = "duration_millis")]
    pub write_retry_delay: Duration,
    /// Handling of deletes that cannot reach the remote
    pub delete_policy: DeletePolicy,
    /// Name stamped into order audit fields
    pub operator: String,
    /// Bearer token for the remote authority
    pub auth_token: Option<String>,
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("carehub-data"),
            seed_dir: None,
            api_base_url: "http://localhost:5001/".to_string(),
            request_timeout: Duration::from_secs(10),
            write_retries: 3,
            write_retry_delay: Duration::from_millis(50),
            delete_policy: DeletePolicy::LocalOnly,
            operator: "Staff".to_string(),
            auth_token: None,
        }
    }
}

impl SyncConfig {
    /// Defaults overlaid with `CAREHUB_*` environment variables.
    pub fn from_env() -> SyncResult<Self> {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("CAREHUB_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("CAREHUB_SEED_DIR") {
            config.seed_dir = Some(PathBuf::from(dir));
        }
        if let Ok(url) = std::env::var("CAREHUB_API_BASE_URL") {
            config.api_base_url = url;
        }
        if let Ok(secs) = std::env::var("CAREHUB_REQUEST_TIMEOUT_SECONDS") {
            config.request_timeout = Duration::from_secs(parse_var("CAREHUB_REQUEST_TIMEOUT_SECONDS", &secs)?);
        }
        if let Ok(retries) = std::env::var("CAREHUB_WRITE_RETRIES") {
            config.write_retries = parse_var("CAREHUB_WRITE_RETRIES", &retries)?;
        }
        if let Ok(millis) = std::env::var("CAREHUB_WRITE_RETRY_DELAY_MS") {
            config.write_retry_delay = Duration::from_millis(parse_var("CAREHUB_WRITE_RETRY_DELAY_MS", &millis)?);
        }
        if let Ok(policy) = std::env::var("CAREHUB_DELETE_POLICY") {
            config.delete_policy = policy.parse()?;
        }
        if let Ok(operator) = std::env::var("CAREHUB_OPERATOR") {
            if !operator.trim().is_empty() {
                config.operator = operator;
            }
        }
        config.auth_token = std::env::var("CAREHUB_AUTH_TOKEN").ok().filter(|t| !t.is_empty());

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the sync layer cannot work with.
    pub fn validate(&self) -> SyncResult<()> {
        if self.write_retries == 0 {
            return Err(SyncError::Configuration(
                "write_retries must be at least 1".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(SyncError::Configuration(
                "request_timeout must be greater than zero".to_string(),
            ));
        }
        reqwest::Url::parse(&self.api_base_url).map_err(|e| {
            SyncError::Configuration(format!("Invalid api_base_url {}: {}", self.api_base_url, e))
        })?;
        Ok(())
    }

    /// Session derived from the configured operator and token.
    pub fn session(&self) -> Session {
        Session {
            operator: self.operator.clone(),
            auth_token: self.auth_token.clone(),
        }
    }
}

fn parse_var<T: FromStr>(name: &str, value: &str) -> SyncResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| SyncError::Configuration(format!("{} has an invalid value: {}", name, value)))
}

/// Who is operating this device, passed explicitly to the components that
/// need it instead of living in a process-wide singleton.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Display name stamped into `*By` audit fields
    pub operator: String,
    /// Bearer token attached to remote calls
    pub auth_token: Option<String>,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            operator: "Staff".to_string(),
            auth_token: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SyncConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.write_retries, 3);
        assert_eq!(config.write_retry_delay, Duration::from_millis(50));
        assert_eq!(config.delete_policy, DeletePolicy::LocalOnly);
    }

    #[test]
    fn test_delete_policy_parsing() {
        assert_eq!("local_only".parse::<DeletePolicy>().unwrap(), DeletePolicy::LocalOnly);
        assert_eq!(
            "Suppress-Pending-Create".parse::<DeletePolicy>().unwrap(),
            DeletePolicy::SuppressPendingCreate
        );
        assert_eq!("queue".parse::<DeletePolicy>().unwrap(), DeletePolicy::QueueDelete);
        assert!("sometimes".parse::<DeletePolicy>().is_err());
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let mut config = SyncConfig::default();
        config.write_retries = 0;
        assert!(matches!(config.validate(), Err(SyncError::Configuration(_))));

        let mut config = SyncConfig::default();
        config.api_base_url = "not a url".to_string();
        assert!(matches!(config.validate(), Err(SyncError::Configuration(_))));
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let config = SyncConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: SyncConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.request_timeout, config.request_timeout);
        assert_eq!(back.api_base_url, config.api_base_url);
    }

    #[test]
    fn test_session_from_config() {
        let mut config = SyncConfig::default();
        config.operator = "Nurse Ada".to_string();
        config.auth_token = Some("token".to_string());
        let session = config.session();
        assert_eq!(session.operator, "Nurse Ada");
        assert_eq!(session.auth_token.as_deref(), Some("token"));
    }
}
