// Runtime configuration, loaded with the 'config' crate and 'dotenv'.
// Every knob the pipeline uses (fees, delays, stop words, locale) lives here
// and is passed down explicitly.

use anyhow::Result;
use config::{Config, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server_address: String,
    #[serde(default)]
    pub source: SourceSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub locale: Locale,
    #[serde(default)]
    pub report: ReportSettings,
    #[serde(default)]
    pub fees: FeeSettings,
    #[serde(default)]
    pub search: SearchLimits,
}

impl Settings {
    pub fn new() -> Result<Self> {
        dotenv::dotenv().ok(); // Load .env file if present

        let builder = Config::builder()
            .set_default("server_address", "127.0.0.1:3000")?
            // Optional config.toml next to the binary
            .add_source(File::with_name("config").required(false))
            // e.g. APP_SOURCE__MODE=html, APP_SOURCE__CREDENTIAL=...
            .add_source(Environment::with_prefix("APP").prefix_separator("_").separator("__"));

        let settings = builder.build()?.try_deserialize()?;
        Ok(settings)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_address: "127.0.0.1:3000".to_string(),
            source: SourceSettings::default(),
            cache: CacheSettings::default(),
            locale: Locale::default(),
            report: ReportSettings::default(),
            fees: FeeSettings::default(),
            search: SearchLimits::default(),
        }
    }
}

/// Where listings come from.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceMode {
    /// Public JSON search API plus per-item detail calls.
    Api,
    /// Listing pages parsed with CSS selectors.
    Html,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CredentialPlacement {
    /// `Authorization: Bearer <token>`
    Header,
    /// `?access_token=<token>`
    Query,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SourceSettings {
    pub mode: SourceMode,
    pub api_base_url: String,
    pub site_id: String,
    pub listing_base_url: String,
    // Supplied externally (config.toml or APP_SOURCE__CREDENTIAL); no default.
    pub credential: Option<String>,
    pub credential_placement: CredentialPlacement,
    pub fetch_details: bool,
    pub page_delay_ms: u64,
    pub detail_delay_ms: u64,
    pub request_timeout_secs: u64,
    pub api_page_size: u32,
    pub html_page_size: u32,
    pub max_pages: u32,
    pub user_agent: String,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            mode: SourceMode::Api,
            api_base_url: "https://api.mercadolibre.com".to_string(),
            site_id: "MLB".to_string(),
            listing_base_url: "https://lista.mercadolivre.com.br".to_string(),
            credential: None,
            credential_placement: CredentialPlacement::Header,
            fetch_details: true,
            page_delay_ms: 2000,
            detail_delay_ms: 1000,
            request_timeout_secs: 15,
            api_page_size: 50,
            html_page_size: 48,
            max_pages: 10,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/108.0.0.0 Safari/537.36".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CacheSettings {
    /// 0 disables the result cache.
    pub ttl_secs: u64,
    pub capacity: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self { ttl_secs: 600, capacity: 32 }
    }
}

/// Number formatting conventions of the marketplace (pt-BR by default).
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Locale {
    pub thousands_separator: char,
    pub decimal_separator: char,
    pub currency_symbol: String,
    /// Magnitude suffix meaning "thousand" in sold-count labels ("1,2mil").
    pub thousand_suffix: String,
    /// Words stripped from sold-count labels before parsing ("+5 vendidos").
    pub sold_label_words: Vec<String>,
    /// Display sentinel for absent values.
    pub missing_label: String,
}

impl Default for Locale {
    fn default() -> Self {
        Self {
            thousands_separator: '.',
            decimal_separator: ',',
            currency_symbol: "R$".to_string(),
            thousand_suffix: "mil".to_string(),
            sold_label_words: vec!["vendidos".to_string(), "vendido".to_string()],
            missing_label: "N/A".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ReportSettings {
    /// Share of best-selling listings treated as "high performing".
    pub top_fraction: f64,
    pub min_top_records: usize,
    pub keyword_count: usize,
    pub min_token_len: usize,
    pub stop_words: Vec<String>,
    pub markup_targets: Vec<f64>,
}

impl Default for ReportSettings {
    fn default() -> Self {
        let stop_words = [
            // Portuguese function words
            "com", "para", "por", "uma", "dos", "das", "que", "sem", "mais", "pelo", "pela",
            "nos", "nas", "seu", "sua", "até", "entre", "como",
            // Listing noise
            "kit", "novo", "nova", "original", "unidade", "unidades", "frete", "grátis",
            "promoção", "oferta", "envio", "full",
        ];
        Self {
            top_fraction: 0.20,
            min_top_records: 10,
            keyword_count: 10,
            min_token_len: 3,
            stop_words: stop_words.iter().map(|w| w.to_string()).collect(),
            markup_targets: vec![0.80, 1.00],
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct MarketplaceFee {
    pub name: String,
    /// Commission as a fraction of the sale price.
    pub commission_rate: f64,
    /// Fixed cost charged per order.
    pub fixed_cost: f64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FeeSettings {
    /// Taxes and marketing charged as a fraction of the sale price.
    pub charges_rate: f64,
    pub marketplaces: Vec<MarketplaceFee>,
}

impl Default for FeeSettings {
    fn default() -> Self {
        Self {
            charges_rate: 0.07,
            marketplaces: vec![
                MarketplaceFee {
                    name: "Mercado Livre".to_string(),
                    commission_rate: 0.165,
                    fixed_cost: 6.25,
                },
                MarketplaceFee {
                    name: "Shopee".to_string(),
                    commission_rate: 0.20,
                    fixed_cost: 4.00,
                },
            ],
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SearchLimits {
    pub default_limit: u32,
    pub max_limit: u32,
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self { default_limit: 20, max_limit: 200 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Only this test touches APP_* variables; nothing else reads them concurrently.
    #[test]
    fn environment_overrides_nested_settings() {
        unsafe {
            std::env::set_var("APP_SOURCE__CREDENTIAL", "token-from-env");
            std::env::set_var("APP_SOURCE__MODE", "html");
            std::env::set_var("APP_CACHE__TTL_SECS", "0");
        }
        let settings = Settings::new();
        unsafe {
            std::env::remove_var("APP_SOURCE__CREDENTIAL");
            std::env::remove_var("APP_SOURCE__MODE");
            std::env::remove_var("APP_CACHE__TTL_SECS");
        }

        let settings = settings.unwrap();
        assert_eq!(settings.source.credential.as_deref(), Some("token-from-env"));
        assert_eq!(settings.source.mode, SourceMode::Html);
        assert_eq!(settings.cache.ttl_secs, 0);
        assert_eq!(settings.server_address, "127.0.0.1:3000");
    }

    #[test]
    fn credential_has_no_default() {
        assert!(Settings::default().source.credential.is_none());
    }
}
