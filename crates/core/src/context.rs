//! Process-wide engine settings resolved once from configuration.

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::bucketer::TimeBucketer;
use crate::config::AnalyticsConfig;
use crate::error::{AnalyticsError, AnalyticsResult};

/// Rounding applied when snapshots are presented. Internal math keeps full precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresentationConfig {
    pub percentage_decimal_places: u32,
    pub currency_decimal_places: u32,
}

impl Default for PresentationConfig {
    fn default() -> Self {
        Self {
            percentage_decimal_places: 2,
            currency_decimal_places: 2,
        }
    }
}

/// Settings shared by every query of a process.
#[derive(Debug, Clone, Copy)]
pub struct AnalyticsContext {
    pub timezone: Tz,
    pub presentation: PresentationConfig,
    pub recent_points: usize,
}

impl AnalyticsContext {
    /// # Errors
    ///
    /// Returns `Config` if the timezone name is not a known IANA zone.
    pub fn from_config(config: &AnalyticsConfig) -> AnalyticsResult<Self> {
        let timezone: Tz = config.timezone.parse().map_err(|e| {
            AnalyticsError::Config(format!("unknown timezone '{}': {e}", config.timezone))
        })?;

        Ok(Self {
            timezone,
            presentation: PresentationConfig {
                percentage_decimal_places: config.percentage_decimal_places,
                currency_decimal_places: config.currency_decimal_places,
            },
            recent_points: config.recent_points,
        })
    }

    /// Context with UTC boundaries and default presentation.
    #[must_use]
    pub fn utc() -> Self {
        Self {
            timezone: chrono_tz::UTC,
            presentation: PresentationConfig::default(),
            recent_points: 7,
        }
    }

    #[must_use]
    pub fn bucketer(&self) -> TimeBucketer {
        TimeBucketer::new(self.timezone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_configured_timezone() {
        let ctx = AnalyticsContext::from_config(&AnalyticsConfig::default()).unwrap();
        assert_eq!(ctx.timezone, chrono_tz::America::Sao_Paulo);
        assert_eq!(ctx.presentation.percentage_decimal_places, 2);
        assert_eq!(ctx.recent_points, 7);
    }

    #[test]
    fn rejects_unknown_timezone() {
        let config = AnalyticsConfig {
            timezone: "Mars/Olympus_Mons".to_string(),
            ..AnalyticsConfig::default()
        };
        let err = AnalyticsContext::from_config(&config).unwrap_err();
        assert!(matches!(err, AnalyticsError::Config(_)));
    }
}
