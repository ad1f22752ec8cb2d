use std::collections::HashMap;

use serde_json::Value;

use crate::deck::ButtonState;
use crate::decimal::Decimal;

/// Read a string field from a settings payload; missing or non-string
/// fields read as empty. Settings arrive from an external configuration
/// UI that may transiently hold incomplete state, so absence is normal.
pub(crate) fn settings_str(settings: &Value, key: &str) -> String {
    settings
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

pub(crate) fn settings_bool(settings: &Value, key: &str, default: bool) -> bool {
    settings
        .get(key)
        .and_then(|v| v.as_bool())
        .unwrap_or(default)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareCondition {
    EqualTo,
    LessThan,
    GreaterThan,
}

impl CompareCondition {
    /// The configuration UI defaults to greater-than; unknown strings
    /// resolve the same way.
    fn parse(raw: &str) -> Self {
        match raw {
            "EQUAL_TO" => CompareCondition::EqualTo,
            "LESS_THAN" => CompareCondition::LessThan,
            _ => CompareCondition::GreaterThan,
        }
    }
}

/// Telemetry id whose numeric value re-seeds the increment accumulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncrementMonitor {
    pub telemetry_id: u32,
}

/// Telemetry id compared against a threshold to drive the two-valued
/// display state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompareMonitor {
    pub telemetry_id: u32,
    pub condition: CompareCondition,
    pub threshold: Decimal,
}

impl CompareMonitor {
    /// Equality is exact decimal equality; the inequalities are strict.
    /// A false test yields the first state.
    pub fn state_for(&self, value: Decimal) -> ButtonState {
        let second = match self.condition {
            CompareCondition::EqualTo => value == self.threshold,
            CompareCondition::LessThan => value < self.threshold,
            CompareCondition::GreaterThan => value > self.threshold,
        };
        if second {
            ButtonState::Second
        } else {
            ButtonState::First
        }
    }
}

/// Telemetry id rendered into the button title, either verbatim or via a
/// value→text mapping table, with optional vertical padding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringMonitor {
    pub telemetry_id: u32,
    pub passthrough: bool,
    pub mapping: HashMap<String, String>,
    /// Signed newline count: positive pads below the title, negative above.
    pub vertical_spacing: i32,
}

impl StringMonitor {
    pub fn title_for(&self, raw: &str) -> String {
        let mut title = if self.passthrough {
            raw.to_string()
        } else {
            self.mapping.get(raw).cloned().unwrap_or_default()
        };
        if self.vertical_spacing < 0 {
            for _ in self.vertical_spacing..0 {
                title.insert(0, '\n');
            }
        } else {
            for _ in 0..self.vertical_spacing {
                title.push('\n');
            }
        }
        title
    }
}

/// The monitors a context has validly configured. A monitor is set only
/// when its required fields are present and parse; anything partial or
/// malformed silently leaves that monitor disabled.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonitorSet {
    pub increment: Option<IncrementMonitor>,
    pub compare: Option<CompareMonitor>,
    pub string: Option<StringMonitor>,
}

impl MonitorSet {
    pub fn from_settings(settings: &Value) -> Self {
        let increment = settings_str(settings, "dcs_id_increment_monitor")
            .trim()
            .parse::<u32>()
            .ok()
            .map(|telemetry_id| IncrementMonitor { telemetry_id });

        let compare_id = settings_str(settings, "dcs_id_compare_monitor")
            .trim()
            .parse::<u32>()
            .ok();
        let threshold = Decimal::parse(&settings_str(settings, "dcs_id_comparison_value"));
        let compare = match (compare_id, threshold) {
            (Some(telemetry_id), Some(threshold)) => Some(CompareMonitor {
                telemetry_id,
                condition: CompareCondition::parse(&settings_str(
                    settings,
                    "dcs_id_compare_condition",
                )),
                threshold,
            }),
            _ => None,
        };

        let string = settings_str(settings, "dcs_id_string_monitor")
            .trim()
            .parse::<u32>()
            .ok()
            .map(|telemetry_id| {
                let passthrough = settings_bool(settings, "string_monitor_passthrough_check", true);
                let mapping = if passthrough {
                    HashMap::new()
                } else {
                    parse_mapping(&settings_str(settings, "string_monitor_mapping"))
                };
                StringMonitor {
                    telemetry_id,
                    passthrough,
                    mapping,
                    vertical_spacing: settings_str(settings, "string_monitor_vertical_spacing")
                        .trim()
                        .parse()
                        .unwrap_or(0),
                }
            });

        Self {
            increment,
            compare,
            string,
        }
    }
}

/// Parse a comma-separated list of `key=value` pairs. Entries without an
/// `=` are skipped.
fn parse_mapping(raw: &str) -> HashMap<String, String> {
    raw.split(',')
        .filter_map(|pair| pair.split_once('='))
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}
