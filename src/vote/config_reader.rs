use crate::vote::*;

use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// A secret as written in the configuration file. Not printed in debug output.
#[derive(Eq, PartialEq, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigSecret(String);

impl Debug for ConfigSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "***")
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct SubcategoryConfig {
    pub name: String,
    pub candidates: Vec<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct PositionConfig {
    pub name: String,
    #[serde(rename = "filePath")]
    pub file_path: Option<String>,
    pub mode: Option<String>,
    #[serde(rename = "excelWorksheetName")]
    pub excel_worksheet_name: Option<String>,
    pub subcategories: Option<Vec<SubcategoryConfig>>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct CodeSourceConfig {
    #[serde(rename = "filePath")]
    pub file_path: Option<String>,
    #[serde(rename = "excelWorksheetName")]
    pub excel_worksheet_name: Option<String>,
    pub codes: Option<Vec<String>>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ElectionConfig {
    #[serde(rename = "adminSecret")]
    pub admin_secret: ConfigSecret,
    #[serde(rename = "wipeSecret")]
    pub wipe_secret: Option<ConfigSecret>,
    #[serde(rename = "requireAdminReentry")]
    pub require_admin_reentry: Option<bool>,
    #[serde(rename = "wipeConfirmation")]
    pub wipe_confirmation: Option<String>,
    #[serde(rename = "wipeSteps")]
    pub wipe_steps: Option<JSValue>,
    pub positions: Vec<PositionConfig>,
    #[serde(rename = "codeSource")]
    pub code_source: CodeSourceConfig,
    #[serde(rename = "ballotLogPath")]
    pub ballot_log_path: String,
    #[serde(rename = "topN")]
    pub top_n: Option<JSValue>,
    #[serde(rename = "catalogRefresh")]
    pub catalog_refresh: Option<String>,
}

fn read_js_int(x: &Option<JSValue>, field: &str) -> VoteResult<Option<usize>> {
    match x {
        None => Ok(None),
        Some(JSValue::Number(n)) => match n.as_u64() {
            Some(v) => Ok(Some(v as usize)),
            None => whatever!("{}: expected a non-negative integer, got {}", field, n),
        },
        Some(JSValue::String(s)) => match s.trim().parse::<usize>() {
            Ok(v) => Ok(Some(v)),
            Err(_) => whatever!("{}: expected a non-negative integer, got {:?}", field, s),
        },
        Some(v) => whatever!("{}: expected a non-negative integer, got {}", field, v),
    }
}

fn validate_position(pc: &PositionConfig) -> VoteResult<Position> {
    let mode = match pc.mode.as_deref() {
        None | Some("twoStep") => SelectionMode::TwoStep,
        Some("flat") => SelectionMode::Flat,
        Some(x) => {
            whatever!(
                "Position {}: unknown mode {:?} (expected \"flat\" or \"twoStep\")",
                pc.name,
                x
            )
        }
    };
    if pc.file_path.is_none() && pc.subcategories.is_none() {
        whatever!(
            "Position {}: either filePath or subcategories must be provided",
            pc.name
        )
    }
    Ok(Position {
        name: pc.name.trim().to_string(),
        mode,
    })
}

/// Turns the loosely typed configuration into election settings. Everything
/// that can be checked before reading any other file is checked here.
pub fn validate_settings(config: &ElectionConfig) -> VoteResult<ElectionSettings> {
    let positions = config
        .positions
        .iter()
        .map(validate_position)
        .collect::<VoteResult<Vec<Position>>>()?;

    let wipe_steps = read_js_int(&config.wipe_steps, "wipeSteps")?;
    let wipe_policy = match (config.wipe_confirmation.as_deref(), wipe_steps) {
        (None | Some("clicks"), None) => WipePolicy::DEFAULT,
        (None | Some("clicks"), Some(steps)) if steps <= WipePolicy::MAX_STEPS as usize => {
            WipePolicy::Clicks { steps: steps as u8 }
        }
        (None | Some("clicks"), Some(steps)) => {
            whatever!(
                "wipeSteps: at most {} confirmations, got {}",
                WipePolicy::MAX_STEPS,
                steps
            )
        }
        (Some("password"), _) => WipePolicy::Password,
        (Some(x), _) => {
            whatever!(
                "Cannot use wipe confirmation {:?} (expected \"clicks\" or \"password\")",
                x
            )
        }
    };

    let catalog_refresh = match config.catalog_refresh.as_deref() {
        None | Some("perSession") => CatalogRefresh::PerSession,
        Some("once") => CatalogRefresh::Once,
        Some(x) => {
            whatever!(
                "Cannot use catalog refresh {:?} (expected \"perSession\" or \"once\")",
                x
            )
        }
    };

    let settings = ElectionSettings {
        admin_secret: Secret::new(&config.admin_secret.0),
        wipe_secret: config
            .wipe_secret
            .as_ref()
            .map(|s| Secret::new(&s.0))
            .filter(|s| !s.is_empty()),
        require_admin_reentry: config.require_admin_reentry.unwrap_or(false),
        wipe_policy,
        positions,
        top_n: read_js_int(&config.top_n, "topN")?.unwrap_or(ElectionSettings::DEFAULT_TOP_N),
        catalog_refresh,
    };
    ballot_box::builder::validate(&settings).context(InvalidElectionSnafu {})?;
    Ok(settings)
}
