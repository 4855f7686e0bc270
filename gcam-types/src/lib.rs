//! Closed option vocabulary for GenICam-style machine vision cameras.
//!
//! Every configurable property has one canonical table mapping its presets to
//! the numeric value and node-map entry string the device expects. All call
//! sites (the capture layer, the CLI, tests) share these tables.

use serde::{Deserialize, Serialize};

mod presets;

pub use presets::{
    BalancePreset, BinningMode, BlackLevelPreset, DecimationMode, DimensionPreset, ExposurePreset,
    GainPreset, GammaPreset, PixelFormatOption,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AutoMode {
    Off,
    Once,
    Continuous,
}

// use Debug to impl Display
impl std::fmt::Display for AutoMode {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, fmt)
    }
}

impl Default for AutoMode {
    fn default() -> Self {
        AutoMode::Continuous
    }
}

impl AutoMode {
    pub fn variants() -> &'static [Self] {
        &[AutoMode::Off, AutoMode::Once, AutoMode::Continuous]
    }

    /// The node-map enumeration entry name.
    pub fn as_node_str(self) -> &'static str {
        match self {
            AutoMode::Off => "Off",
            AutoMode::Once => "Once",
            AutoMode::Continuous => "Continuous",
        }
    }

    pub fn from_node_str(val: &str) -> Option<Self> {
        match val {
            "Off" => Some(AutoMode::Off),
            "Once" => Some(AutoMode::Once),
            "Continuous" => Some(AutoMode::Continuous),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcquisitionMode {
    Continuous,
    SingleFrame,
    MultiFrame,
}

impl std::fmt::Display for AcquisitionMode {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, fmt)
    }
}

impl AcquisitionMode {
    pub fn variants() -> &'static [Self] {
        &[
            AcquisitionMode::Continuous,
            AcquisitionMode::SingleFrame,
            AcquisitionMode::MultiFrame,
        ]
    }

    pub fn as_node_str(self) -> &'static str {
        match self {
            AcquisitionMode::Continuous => "Continuous",
            AcquisitionMode::SingleFrame => "SingleFrame",
            AcquisitionMode::MultiFrame => "MultiFrame",
        }
    }

    pub fn from_node_str(val: &str) -> Option<Self> {
        match val {
            "Continuous" => Some(AcquisitionMode::Continuous),
            "SingleFrame" => Some(AcquisitionMode::SingleFrame),
            "MultiFrame" => Some(AcquisitionMode::MultiFrame),
            _ => None,
        }
    }
}

/// Which buffered frame the stream layer hands out on the next pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BufferPolicy {
    OldestFirst,
    OldestFirstOverwrite,
    NewestOnly,
    NewestFirst,
}

impl std::fmt::Display for BufferPolicy {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, fmt)
    }
}

impl BufferPolicy {
    pub fn variants() -> &'static [Self] {
        &[
            BufferPolicy::OldestFirst,
            BufferPolicy::OldestFirstOverwrite,
            BufferPolicy::NewestOnly,
            BufferPolicy::NewestFirst,
        ]
    }

    pub fn as_node_str(self) -> &'static str {
        match self {
            BufferPolicy::OldestFirst => "OldestFirst",
            BufferPolicy::OldestFirstOverwrite => "OldestFirstOverwrite",
            BufferPolicy::NewestOnly => "NewestOnly",
            BufferPolicy::NewestFirst => "NewestFirst",
        }
    }
}

/// Selector entry for the per-channel white balance ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BalanceChannel {
    Red,
    Blue,
}

impl std::fmt::Display for BalanceChannel {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, fmt)
    }
}

impl BalanceChannel {
    pub fn variants() -> &'static [Self] {
        &[BalanceChannel::Red, BalanceChannel::Blue]
    }

    pub fn selector_entry(self) -> &'static str {
        match self {
            BalanceChannel::Red => "Red",
            BalanceChannel::Blue => "Blue",
        }
    }
}

// ---------------------------
// per-property requests

/// Exposure request: automatic, a named preset, or a raw value in µs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ExposureSetting {
    Auto,
    Preset(ExposurePreset),
    Manual(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum GainSetting {
    Auto,
    Preset(GainPreset),
    Manual(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum GammaSetting {
    Disable,
    Preset(GammaPreset),
    Manual(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BlackLevelSetting {
    Auto,
    Preset(BlackLevelPreset),
    Manual(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BalanceSetting {
    Auto,
    Preset(BalancePreset),
    Manual(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DimensionSetting {
    Preset(DimensionPreset),
    Custom {
        width: i64,
        height: i64,
        offset_x: i64,
        offset_y: i64,
    },
}

/// One translated setting request for any supported property.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Setting {
    PixelFormat(PixelFormatOption),
    Binning(BinningMode),
    Decimation(DecimationMode),
    Exposure(ExposureSetting),
    Gain(GainSetting),
    Gamma(GammaSetting),
    BlackLevel(BlackLevelSetting),
    Balance(BalanceChannel, BalanceSetting),
    Dimensions(DimensionSetting),
}

impl Setting {
    /// Parse a `(property, value)` pair as used by string entry points.
    ///
    /// `value` is `"Auto"` (`"Disable"` for gamma), a preset name from the
    /// canonical tables, or a raw number for the numeric properties. Returns
    /// `None` for an unknown property or unrecognized value: the caller must
    /// perform zero device writes in that case.
    pub fn parse(property: &str, value: &str) -> Option<Setting> {
        match property {
            "PixelFormat" => PixelFormatOption::from_name(value).map(Setting::PixelFormat),
            "Binning" => BinningMode::from_name(value).map(Setting::Binning),
            "Decimation" => DecimationMode::from_name(value).map(Setting::Decimation),
            "ExposureTime" => {
                Some(Setting::Exposure(parse_amp(value, ExposurePreset::from_name)?))
            }
            "Gain" => Some(Setting::Gain(parse_amp(value, GainPreset::from_name)?)),
            "Gamma" => {
                if value == "Disable" {
                    Some(Setting::Gamma(GammaSetting::Disable))
                } else if let Some(p) = GammaPreset::from_name(value) {
                    Some(Setting::Gamma(GammaSetting::Preset(p)))
                } else {
                    value.parse().ok().map(|v| Setting::Gamma(GammaSetting::Manual(v)))
                }
            }
            "BlackLevel" => {
                Some(Setting::BlackLevel(parse_amp(value, BlackLevelPreset::from_name)?))
            }
            "RedBalanceRatio" => Some(Setting::Balance(
                BalanceChannel::Red,
                parse_amp(value, BalancePreset::from_name)?,
            )),
            "BlueBalanceRatio" => Some(Setting::Balance(
                BalanceChannel::Blue,
                parse_amp(value, BalancePreset::from_name)?,
            )),
            "ImageDimensions" => {
                DimensionPreset::from_name(value).map(|p| Setting::Dimensions(DimensionSetting::Preset(p)))
            }
            _ => None,
        }
    }
}

/// Shared Auto/preset/manual parse for the value-bearing properties.
fn parse_amp<P, S>(value: &str, from_name: impl Fn(&str) -> Option<P>) -> Option<S>
where
    S: From<AmpSetting<P>>,
{
    if value == "Auto" {
        return Some(AmpSetting::Auto.into());
    }
    if let Some(p) = from_name(value) {
        return Some(AmpSetting::Preset(p).into());
    }
    value.parse().ok().map(|v| AmpSetting::Manual(v).into())
}

enum AmpSetting<P> {
    Auto,
    Preset(P),
    Manual(f64),
}

macro_rules! impl_from_amp {
    ($setting:ident, $preset:ident) => {
        impl From<AmpSetting<$preset>> for $setting {
            fn from(orig: AmpSetting<$preset>) -> $setting {
                match orig {
                    AmpSetting::Auto => $setting::Auto,
                    AmpSetting::Preset(p) => $setting::Preset(p),
                    AmpSetting::Manual(v) => $setting::Manual(v),
                }
            }
        }
    };
}

impl_from_amp!(ExposureSetting, ExposurePreset);
impl_from_amp!(GainSetting, GainPreset);
impl_from_amp!(BlackLevelSetting, BlackLevelPreset);
impl_from_amp!(BalanceSetting, BalancePreset);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_mode_node_strs_round_trip() {
        for mode in AutoMode::variants() {
            assert_eq!(AutoMode::from_node_str(mode.as_node_str()), Some(*mode));
        }
    }

    #[test]
    fn parse_auto_and_preset_and_raw() {
        assert_eq!(
            Setting::parse("ExposureTime", "Auto"),
            Some(Setting::Exposure(ExposureSetting::Auto))
        );
        assert_eq!(
            Setting::parse("ExposureTime", "Shutter_1_1000"),
            Some(Setting::Exposure(ExposureSetting::Preset(
                ExposurePreset::Shutter1_1000
            )))
        );
        assert_eq!(
            Setting::parse("Gain", "12.5"),
            Some(Setting::Gain(GainSetting::Manual(12.5)))
        );
        assert_eq!(
            Setting::parse("Gamma", "Disable"),
            Some(Setting::Gamma(GammaSetting::Disable))
        );
        assert_eq!(
            Setting::parse("BlueBalanceRatio", "Preset_2_25"),
            Some(Setting::Balance(
                BalanceChannel::Blue,
                BalanceSetting::Preset(BalancePreset::P2_25)
            ))
        );
    }

    #[test]
    fn parse_rejects_unknown_input() {
        assert_eq!(Setting::parse("ExposureTime", "Shutter_1_7"), None);
        assert_eq!(Setting::parse("FocusDistance", "Auto"), None);
        assert_eq!(Setting::parse("PixelFormat", "BayerRG9"), None);
        assert_eq!(Setting::parse("ImageDimensions", "Preset_17x4"), None);
    }
}
