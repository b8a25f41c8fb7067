use crate::compiler::CompileError;
use crate::models::{
    AdxComparison, AdxCondition, BollingerComparison, BollingerCondition, IndicatorKind,
    MaComparison, MaCondition, MaType, MacdComparison, MacdCondition, MacdCrossover,
    RsiComparison, RsiCondition,
};
use crate::param_utils::{parse_number, parse_optional_number, parse_period};
use serde::{Deserialize, Deserializer, Serialize};

/// Text exactly as the user typed it. Form files may carry either JSON numbers or strings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct RawInput(String);

impl RawInput {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RawInput {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawInputRepr {
    Text(String),
    Number(serde_json::Number),
    Blank(()),
}

impl<'de> Deserialize<'de> for RawInput {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match RawInputRepr::deserialize(deserializer)? {
            RawInputRepr::Text(text) => RawInput(text),
            RawInputRepr::Number(number) => RawInput(number.to_string()),
            RawInputRepr::Blank(()) => RawInput::default(),
        })
    }
}

/// One indicator block in the builder. Parameters live here as raw input until compile time.
pub trait IndicatorConfig {
    type Condition;

    const KIND: IndicatorKind;

    fn is_enabled(&self) -> bool;

    fn set_enabled(&mut self, enabled: bool);

    fn to_condition(&self) -> Result<Self::Condition, CompileError>;
}

fn field(kind: IndicatorKind, name: &str) -> String {
    format!("{}.{}", kind.as_str(), name)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaConfig {
    pub enabled: bool,
    pub period: RawInput,
    pub ma_type: MaType,
    pub comparison: MaComparison,
    pub deviation_pct: RawInput,
}

impl Default for MaConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            period: "20".into(),
            ma_type: MaType::Sma,
            comparison: MaComparison::Above,
            deviation_pct: "0".into(),
        }
    }
}

impl IndicatorConfig for MaConfig {
    type Condition = MaCondition;

    const KIND: IndicatorKind = IndicatorKind::Ma;

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn to_condition(&self) -> Result<MaCondition, CompileError> {
        Ok(MaCondition {
            kind: Self::KIND,
            period: parse_period(&field(Self::KIND, "period"), self.period.as_str())?,
            ma_type: self.ma_type,
            comparison: self.comparison,
            deviation_pct: parse_number(
                &field(Self::KIND, "deviation_pct"),
                self.deviation_pct.as_str(),
            )?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RsiConfig {
    pub enabled: bool,
    pub period: RawInput,
    pub comparison: RsiComparison,
    pub value: RawInput,
}

impl Default for RsiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            period: "14".into(),
            comparison: RsiComparison::Below,
            value: "30".into(),
        }
    }
}

impl IndicatorConfig for RsiConfig {
    type Condition = RsiCondition;

    const KIND: IndicatorKind = IndicatorKind::Rsi;

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn to_condition(&self) -> Result<RsiCondition, CompileError> {
        Ok(RsiCondition {
            kind: Self::KIND,
            period: parse_period(&field(Self::KIND, "period"), self.period.as_str())?,
            comparison: self.comparison,
            value: parse_number(&field(Self::KIND, "value"), self.value.as_str())?,
        })
    }
}

/// MACD uses fixed 12/26/9 periods on the engine side; only the signal shape is configurable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MacdConfig {
    pub enabled: bool,
    pub crossover: Option<MacdCrossover>,
    pub macd_comparison: Option<MacdComparison>,
    pub histogram_positive: Option<bool>,
    pub macd_signal_deviation_pct: RawInput,
}

impl Default for MacdConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            crossover: Some(MacdCrossover::Bullish),
            macd_comparison: None,
            histogram_positive: None,
            macd_signal_deviation_pct: RawInput::default(),
        }
    }
}

impl IndicatorConfig for MacdConfig {
    type Condition = MacdCondition;

    const KIND: IndicatorKind = IndicatorKind::Macd;

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn to_condition(&self) -> Result<MacdCondition, CompileError> {
        Ok(MacdCondition {
            kind: Self::KIND,
            crossover: self.crossover,
            macd_comparison: self.macd_comparison,
            histogram_positive: self.histogram_positive,
            macd_signal_deviation_pct: parse_optional_number(
                &field(Self::KIND, "macd_signal_deviation_pct"),
                self.macd_signal_deviation_pct.as_str(),
            )?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BollingerConfig {
    pub enabled: bool,
    pub period: RawInput,
    pub std_dev: RawInput,
    pub comparison: BollingerComparison,
}

impl Default for BollingerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            period: "20".into(),
            std_dev: "2".into(),
            comparison: BollingerComparison::BelowLower,
        }
    }
}

impl IndicatorConfig for BollingerConfig {
    type Condition = BollingerCondition;

    const KIND: IndicatorKind = IndicatorKind::Bollinger;

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn to_condition(&self) -> Result<BollingerCondition, CompileError> {
        Ok(BollingerCondition {
            kind: Self::KIND,
            period: parse_period(&field(Self::KIND, "period"), self.period.as_str())?,
            std_dev: parse_number(&field(Self::KIND, "std_dev"), self.std_dev.as_str())?,
            comparison: self.comparison,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdxConfig {
    pub enabled: bool,
    pub period: RawInput,
    pub comparison: AdxComparison,
    pub value: RawInput,
}

impl Default for AdxConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            period: "14".into(),
            comparison: AdxComparison::Above,
            value: "25".into(),
        }
    }
}

impl IndicatorConfig for AdxConfig {
    type Condition = AdxCondition;

    const KIND: IndicatorKind = IndicatorKind::Adx;

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn to_condition(&self) -> Result<AdxCondition, CompileError> {
        Ok(AdxCondition {
            kind: Self::KIND,
            period: parse_period(&field(Self::KIND, "period"), self.period.as_str())?,
            comparison: self.comparison,
            value: parse_number(&field(Self::KIND, "value"), self.value.as_str())?,
        })
    }
}

/// All indicator blocks of the builder. Disabled blocks keep their parameters so that
/// re-enabling restores what the user typed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorSet {
    pub ma: MaConfig,
    pub rsi: RsiConfig,
    pub macd: MacdConfig,
    pub bollinger: BollingerConfig,
    pub adx: AdxConfig,
}

impl IndicatorSet {
    pub fn is_enabled(&self, kind: IndicatorKind) -> bool {
        match kind {
            IndicatorKind::Ma => self.ma.is_enabled(),
            IndicatorKind::Rsi => self.rsi.is_enabled(),
            IndicatorKind::Macd => self.macd.is_enabled(),
            IndicatorKind::Bollinger => self.bollinger.is_enabled(),
            IndicatorKind::Adx => self.adx.is_enabled(),
        }
    }

    pub fn set_enabled(&mut self, kind: IndicatorKind, enabled: bool) {
        match kind {
            IndicatorKind::Ma => self.ma.set_enabled(enabled),
            IndicatorKind::Rsi => self.rsi.set_enabled(enabled),
            IndicatorKind::Macd => self.macd.set_enabled(enabled),
            IndicatorKind::Bollinger => self.bollinger.set_enabled(enabled),
            IndicatorKind::Adx => self.adx.set_enabled(enabled),
        }
    }

    pub fn toggle(&mut self, kind: IndicatorKind) {
        let enabled = self.is_enabled(kind);
        self.set_enabled(kind, !enabled);
    }

    pub fn enabled_kinds(&self) -> Vec<IndicatorKind> {
        IndicatorKind::ALL
            .into_iter()
            .filter(|kind| self.is_enabled(*kind))
            .collect()
    }
}
