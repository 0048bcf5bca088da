//! Report configuration loaded from `report_config.json`.
//!
//! If the config file doesn't exist, default values are used. The file is
//! read fresh on every command, so edits take effect on the next run.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const DEFAULT_CONFIG_PATH: &str = "report_config.json";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ReportConfig {
    pub data: DataConfig,
    pub layout: LayoutConfig,
    pub chart: ChartConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DataConfig {
    /// Backing CSV file
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Page width in pixels
    pub page_width: u32,
    /// Page height in pixels
    pub page_height: u32,
    /// Title band height in pixels
    pub title_height: u32,
    pub table: TableLayoutConfig,
    /// Rows shown in every ranked table
    pub max_rows: usize,
    /// Wrap width for summary table labels
    pub summary_wrap: usize,
    /// Wrap width for drill-down and critical-events labels
    pub detail_wrap: usize,
    /// Wrap width for chart tick labels
    pub chart_wrap: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TableLayoutConfig {
    /// Height of a single-line row
    pub base_height: f64,
    /// Added height per extra wrapped line
    pub line_height: f64,
    /// Column widths as fractions of the panel
    pub column_widths: Vec<f64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChartConfig {
    /// Weekly downtime target, minutes
    pub target_minutes: f64,
    /// Y-axis headroom multiplier
    pub headroom: f64,
    pub colors: ColorConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ColorConfig {
    pub area: [u8; 3],
    pub class: [u8; 3],
    pub event: [u8; 3],
    pub highlight: [u8; 3],
    pub weekly: [u8; 3],
    pub monthly_downtime: [u8; 3],
    pub monthly_frequency: [u8; 3],
    pub trend: [u8; 3],
    pub table_header: [u8; 3],
    pub table_total: [u8; 3],
    pub table_border: [u8; 3],
}

impl Default for DataConfig {
    fn default() -> Self {
        Self { path: PathBuf::from("data").join("itbitacora1.csv") }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            page_width: 1169,
            page_height: 827,
            title_height: 60,
            table: TableLayoutConfig::default(),
            max_rows: 3,
            summary_wrap: 22,
            detail_wrap: 20,
            chart_wrap: 18,
        }
    }
}

impl Default for TableLayoutConfig {
    fn default() -> Self {
        Self {
            base_height: 0.30,
            line_height: 0.12,
            column_widths: vec![0.72, 0.28],
        }
    }
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            target_minutes: 83.0,
            headroom: 1.15,
            colors: ColorConfig::default(),
        }
    }
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            area: [41, 128, 185],              // #2980B9
            class: [211, 84, 0],               // #D35400
            event: [22, 160, 133],             // #16A085
            highlight: [52, 152, 219],         // #3498DB
            weekly: [41, 128, 185],
            monthly_downtime: [142, 68, 173],  // #8E44AD
            monthly_frequency: [39, 174, 96],  // #27AE60
            trend: [230, 126, 34],             // #E67E22
            table_header: [44, 62, 80],        // #2C3E50
            table_total: [236, 240, 241],      // #ECF0F1
            table_border: [149, 165, 166],     // #95A5A6
        }
    }
}

impl ReportConfig {
    /// Load config from file, or return defaults if the file doesn't exist
    /// or can't be parsed.
    pub fn load(config_path: &Path) -> Self {
        if !config_path.exists() {
            return Self::default();
        }
        match fs::read_to_string(config_path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(config) => {
                    info!("Loaded report config from {}", config_path.display());
                    config
                }
                Err(e) => {
                    warn!("Failed to parse report config: {}. Using defaults.", e);
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Failed to read report config: {}. Using defaults.", e);
                Self::default()
            }
        }
    }

    /// Save default config to file (for reference).
    pub fn save_default(config_path: &Path) -> crate::error::Result<()> {
        let json = serde_json::to_string_pretty(&Self::default())?;
        fs::write(config_path, json)?;
        Ok(())
    }
}
