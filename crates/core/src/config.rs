use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::bucketer::Period;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub analytics: AnalyticsConfig,
    pub cache: CacheConfig,
    pub data: DataConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// IANA name of the reference timezone used for every bucket boundary.
    pub timezone: String,
    pub percentage_decimal_places: u32,
    pub currency_decimal_places: u32,
    pub default_lookback_days: i64,
    pub default_period: Period,
    pub default_limit: i64,
    /// Number of trailing series points reported as the dashboard's recent trend.
    pub recent_points: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_seconds: u64,
    pub max_entries: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub sales_csv: String,
    /// Maps category spellings found in raw data to their canonical name.
    pub category_aliases: BTreeMap<String, String>,
    pub min_product_name_len: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            timezone: "America/Sao_Paulo".to_string(),
            percentage_decimal_places: 2,
            currency_decimal_places: 2,
            default_lookback_days: 30,
            default_period: Period::Month,
            default_limit: 10,
            recent_points: 7,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_seconds: 300,
            max_entries: 1024,
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        let category_aliases = [
            ("Analgesico", "Analgesics"),
            ("Analgesicos", "Analgesics"),
            ("Analgesic", "Analgesics"),
            ("Anti-Inflamatorio", "Anti-inflammatories"),
            ("Antiinflamatorio", "Anti-inflammatories"),
            ("Anti-Inflammatory", "Anti-inflammatories"),
            ("Antibiotico", "Antibiotics"),
            ("Antibioticos", "Antibiotics"),
            ("Antibiotic", "Antibiotics"),
        ]
        .into_iter()
        .map(|(from, to)| (from.to_string(), to.to_string()))
        .collect();

        Self {
            sales_csv: "data/sales.csv".to_string(),
            category_aliases,
            min_product_name_len: 3,
        }
    }
}
