//! Configuration handed to the embedded cross-chain swap widget.
//!
//! The widget owns every transfer; this side only chooses the listed assets
//! and the theme.

use serde::Serialize;

pub const DEFAULT_TOKENS: [&str; 6] = ["ETH", "WETH", "MATIC", "WMATIC", "AVAX", "SOL"];

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WidgetConfig {
    pub tokens: Vec<String>,
    pub theme: WidgetTheme,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetTheme {
    pub mode: ThemeMode,
    pub input: String,
    pub primary: String,
    pub secondary: String,
    pub text: String,
    pub text_secondary: String,
    pub error: String,
    pub success: String,
    pub badge: String,
    pub font: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    Dark,
    Light,
}

impl std::str::FromStr for ThemeMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dark" => Ok(ThemeMode::Dark),
            "light" => Ok(ThemeMode::Light),
            other => Err(anyhow::format_err!("unknown widget mode {:?}", other)),
        }
    }
}

impl Default for WidgetTheme {
    fn default() -> Self {
        Self {
            mode: ThemeMode::Dark,
            input: "#181a2d".to_string(),
            primary: "#9E77ED".to_string(),
            secondary: "#667085".to_string(),
            text: "#ffffff".to_string(),
            text_secondary: "#79859e".to_string(),
            error: "#F04438".to_string(),
            success: "#12B76A".to_string(),
            badge: "#010101".to_string(),
            font: "\"Inter\", sans-serif".to_string(),
        }
    }
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            tokens: DEFAULT_TOKENS.iter().map(|t| t.to_string()).collect(),
            theme: WidgetTheme::default(),
        }
    }
}

/// Splits a comma separated symbol list, dropping blanks.
pub fn parse_tokens(list: &str) -> Vec<String> {
    list.split(',')
        .map(|symbol| symbol.trim().to_ascii_uppercase())
        .filter(|symbol| !symbol.is_empty())
        .collect()
}
