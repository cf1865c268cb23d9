//! Configuration structures for StrataDB indexes.

use crate::error::{Result, StrataError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Number of entries level-0 absorbs before it is merged into level-1.
pub const DEFAULT_LEVEL0_CAPACITY: u32 = 2;

/// Name suffix for the provisioned level-1 index.
pub const DEFAULT_LEVEL1_SUFFIX: &str = "_lev1";

/// Largest posting list limit a leaf page can hold.
///
/// A posting entry with a maximum-size key (256 bytes) and N references
/// takes 262 + 10 * N bytes, and a leaf must fit two such entries plus
/// their slots after its 48 header bytes.
pub const MAX_POSTING_REFS: u16 = 790;

/// Top-level configuration bundle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrataConfig {
    /// Two-tier routing and merge policy.
    pub tier: TierConfig,
    /// B+ tree engine behavior.
    pub btree: BTreeConfig,
    /// Planner cost constants used by cost estimation.
    pub cost: CostParams,
}

impl StrataConfig {
    /// Parses a configuration from TOML text. Missing keys take defaults.
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: StrataConfig =
            toml::from_str(text).map_err(|e| StrataError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates every section.
    pub fn validate(&self) -> Result<()> {
        self.tier.validate()?;
        self.btree.validate()?;
        self.cost.validate()
    }
}

/// Two-tier index configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierConfig {
    /// Entries level-0 holds before the next insert merges it into level-1.
    pub level0_capacity: u32,
    /// Suffix appended to the level-0 index name to name level-1.
    pub level1_suffix: String,
    /// Maximum wait for the control page or a relation lock, in milliseconds.
    pub lock_timeout_ms: u64,
}

impl Default for TierConfig {
    fn default() -> Self {
        Self {
            level0_capacity: DEFAULT_LEVEL0_CAPACITY,
            level1_suffix: DEFAULT_LEVEL1_SUFFIX.to_string(),
            lock_timeout_ms: 5_000,
        }
    }
}

impl TierConfig {
    /// Returns the lock timeout as a Duration.
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Validates the tier policy.
    pub fn validate(&self) -> Result<()> {
        if self.level0_capacity == 0 {
            return Err(StrataError::InvalidParameter {
                name: "level0_capacity".to_string(),
                value: self.level0_capacity.to_string(),
            });
        }
        if self.level1_suffix.is_empty() {
            return Err(StrataError::ConfigError(
                "level1_suffix must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// B+ tree engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BTreeConfig {
    /// Fold duplicate keys on a leaf into one multi-reference entry.
    pub deduplicate: bool,
    /// Maximum row references held by a single multi-reference entry.
    pub max_posting_refs: u16,
}

impl Default for BTreeConfig {
    fn default() -> Self {
        Self {
            deduplicate: true,
            max_posting_refs: 256,
        }
    }
}

impl BTreeConfig {
    /// Validates the engine configuration.
    pub fn validate(&self) -> Result<()> {
        if !(2..=MAX_POSTING_REFS).contains(&self.max_posting_refs) {
            return Err(StrataError::InvalidParameter {
                name: "max_posting_refs".to_string(),
                value: self.max_posting_refs.to_string(),
            });
        }
        Ok(())
    }
}

/// Planner cost constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostParams {
    /// Cost of a non-sequentially fetched page.
    pub random_page_cost: f64,
    /// Cost of processing one index entry.
    pub cpu_index_tuple_cost: f64,
    /// Cost of one comparison.
    pub cpu_operator_cost: f64,
}

impl Default for CostParams {
    fn default() -> Self {
        Self {
            random_page_cost: 4.0,
            cpu_index_tuple_cost: 0.005,
            cpu_operator_cost: 0.0025,
        }
    }
}

impl CostParams {
    /// Validates the cost constants.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("random_page_cost", self.random_page_cost),
            ("cpu_index_tuple_cost", self.cpu_index_tuple_cost),
            ("cpu_operator_cost", self.cpu_operator_cost),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(StrataError::InvalidParameter {
                    name: name.to_string(),
                    value: value.to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_config_defaults() {
        let config = TierConfig::default();
        assert_eq!(config.level0_capacity, 2);
        assert_eq!(config.level1_suffix, "_lev1");
        assert_eq!(config.lock_timeout(), Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_tier_config_rejects_zero_capacity() {
        let config = TierConfig {
            level0_capacity: 0,
            ..TierConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(StrataError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_tier_config_rejects_empty_suffix() {
        let config = TierConfig {
            level1_suffix: String::new(),
            ..TierConfig::default()
        };
        assert!(matches!(config.validate(), Err(StrataError::ConfigError(_))));
    }

    #[test]
    fn test_btree_config_rejects_tiny_posting_limit() {
        let config = BTreeConfig {
            deduplicate: true,
            max_posting_refs: 1,
        };
        assert!(config.validate().is_err());
        assert!(BTreeConfig::default().validate().is_ok());
    }

    #[test]
    fn test_btree_config_rejects_posting_larger_than_page() {
        let config = BTreeConfig {
            deduplicate: true,
            max_posting_refs: 5000,
        };
        assert!(matches!(
            config.validate(),
            Err(StrataError::InvalidParameter { .. })
        ));

        let at_limit = BTreeConfig {
            max_posting_refs: MAX_POSTING_REFS,
            ..BTreeConfig::default()
        };
        assert!(at_limit.validate().is_ok());
    }

    #[test]
    fn test_cost_params_reject_negative() {
        let params = CostParams {
            random_page_cost: -1.0,
            ..CostParams::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_from_toml_partial() {
        let config = StrataConfig::from_toml(
            r#"
            [tier]
            level0_capacity = 4

            [btree]
            deduplicate = false
            "#,
        )
        .unwrap();

        assert_eq!(config.tier.level0_capacity, 4);
        assert_eq!(config.tier.level1_suffix, "_lev1");
        assert!(!config.btree.deduplicate);
        assert_eq!(config.cost, CostParams::default());
    }

    #[test]
    fn test_from_toml_empty_is_default() {
        let config = StrataConfig::from_toml("").unwrap();
        assert_eq!(config, StrataConfig::default());
    }

    #[test]
    fn test_from_toml_invalid() {
        assert!(matches!(
            StrataConfig::from_toml("[tier]\nlevel0_capacity = \"two\""),
            Err(StrataError::ConfigError(_))
        ));
        assert!(matches!(
            StrataConfig::from_toml("[tier]\nlevel0_capacity = 0"),
            Err(StrataError::InvalidParameter { .. })
        ));
    }
}
