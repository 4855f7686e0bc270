//! Canonical preset tables.
//!
//! Each invocation of [`preset_enum!`] is the single source of truth for one
//! property: the Rust variant, the user-facing preset name, and the value
//! written to the device. `Display` prints the preset name.

use serde::{Deserialize, Serialize};

macro_rules! preset_enum {
    ($(#[$meta:meta])* $name:ident, $value_fn:ident, $valty:ty,
     { $($variant:ident => ($key:literal, $val:expr),)+ }) => {
        $(#[$meta])*
        #[allow(non_camel_case_types)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            $($variant,)+
        }

        impl $name {
            pub fn variants() -> &'static [Self] {
                &[$($name::$variant,)+]
            }

            /// The canonical preset name, as accepted by [`Self::from_name`].
            pub fn name(self) -> &'static str {
                match self {
                    $($name::$variant => $key,)+
                }
            }

            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($key => Some($name::$variant),)+
                    _ => None,
                }
            }

            /// The device-side value this preset translates to.
            pub fn $value_fn(self) -> $valty {
                match self {
                    $($name::$variant => $val,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
                fmt.write_str(self.name())
            }
        }
    };
}

preset_enum! {
    /// Raw sensor readout formats (`PixelFormat` node entries).
    ///
    /// The 10/12-bit entries are packed transport formats; the device accepts
    /// them but the frame post-processing in this workspace handles the 8-bit
    /// layouts.
    PixelFormatOption, node_str, &'static str, {
        BayerRG8 => ("BayerRG8", "BayerRG8"),
        BayerRG10p => ("BayerRG10p", "BayerRG10p"),
        BayerRG12p => ("BayerRG12p", "BayerRG12p"),
        BayerRG16 => ("BayerRG16", "BayerRG16"),
        Mono8 => ("Mono8", "Mono8"),
        Mono10p => ("Mono10p", "Mono10p"),
        Mono12p => ("Mono12p", "Mono12p"),
        Mono16 => ("Mono16", "Mono16"),
    }
}

preset_enum! {
    /// Pixel binning factor, applied to both sensor axes.
    BinningMode, factor, i64, {
        NoBinning => ("NoBinning", 1),
        TwoByTwo => ("TwoByTwoBinning", 2),
        FourByFour => ("FourByFourBinning", 4),
    }
}

preset_enum! {
    /// Pixel decimation factor, applied to both sensor axes.
    DecimationMode, factor, i64, {
        NoDecimation => ("NoDecimation", 1),
        TwoByTwo => ("TwoByTwoDecimation", 2),
        FourByFour => ("FourByFourDecimation", 4),
    }
}

preset_enum! {
    /// Exposure time presets, translated to microseconds.
    ///
    /// `MinimumValue`/`MaximumValue` request the extreme of the device's
    /// reported range; range clamping turns them into the actual bound.
    ExposurePreset, microseconds, f64, {
        MinimumValue => ("MinimumValue", 0.0),
        MaximumValue => ("MaximumValue", f64::MAX),
        Us10 => ("Preset_10us", 10.0),
        Us20 => ("Preset_20us", 20.0),
        Us50 => ("Preset_50us", 50.0),
        Us100 => ("Preset_100us", 100.0),
        Us200 => ("Preset_200us", 200.0),
        Us500 => ("Preset_500us", 500.0),
        Ms1 => ("Preset_1ms", 1_000.0),
        Ms2 => ("Preset_2ms", 2_000.0),
        Ms5 => ("Preset_5ms", 5_000.0),
        Ms10 => ("Preset_10ms", 10_000.0),
        Ms20 => ("Preset_20ms", 20_000.0),
        Ms50 => ("Preset_50ms", 50_000.0),
        Ms100 => ("Preset_100ms", 100_000.0),
        Ms200 => ("Preset_200ms", 200_000.0),
        Ms500 => ("Preset_500ms", 500_000.0),
        S1 => ("Preset_1s", 1_000_000.0),
        S2 => ("Preset_2s", 2_000_000.0),
        S5 => ("Preset_5s", 5_000_000.0),
        S10 => ("Preset_10s", 10_000_000.0),
        S20 => ("Preset_20s", 20_000_000.0),
        Shutter1_1000 => ("Shutter_1_1000", 1_000.0),
        Shutter1_500 => ("Shutter_1_500", 2_000.0),
        Shutter1_250 => ("Shutter_1_250", 4_000.0),
        Shutter1_125 => ("Shutter_1_125", 8_000.0),
        Shutter1_60 => ("Shutter_1_60", 16_667.0),
        Shutter1_30 => ("Shutter_1_30", 33_333.0),
        Shutter1_15 => ("Shutter_1_15", 66_667.0),
        Shutter1_8 => ("Shutter_1_8", 125_000.0),
        Shutter1_4 => ("Shutter_1_4", 250_000.0),
        Shutter1_2 => ("Shutter_1_2", 500_000.0),
        Shutter1_1 => ("Shutter_1_1", 1_000_000.0),
    }
}

preset_enum! {
    /// Gain presets in dB. The ISO aliases follow the usual conversion of one
    /// sensitivity doubling per 6 dB starting from ISO 100 at 0 dB.
    GainPreset, db, f64, {
        Db0 => ("Preset_0dB", 0.0),
        Db3 => ("Preset_3dB", 3.0),
        Db6 => ("Preset_6dB", 6.0),
        Db9 => ("Preset_9dB", 9.0),
        Db12 => ("Preset_12dB", 12.0),
        Db15 => ("Preset_15dB", 15.0),
        Db18 => ("Preset_18dB", 18.0),
        Db21 => ("Preset_21dB", 21.0),
        Db24 => ("Preset_24dB", 24.0),
        Db27 => ("Preset_27dB", 27.0),
        Db30 => ("Preset_30dB", 30.0),
        Db33 => ("Preset_33dB", 33.0),
        Db36 => ("Preset_36dB", 36.0),
        Db39 => ("Preset_39dB", 39.0),
        Db42 => ("Preset_42dB", 42.0),
        Iso100 => ("ISO_100", 0.0),
        Iso200 => ("ISO_200", 6.0),
        Iso400 => ("ISO_400", 12.0),
        Iso800 => ("ISO_800", 18.0),
        Iso1600 => ("ISO_1600", 24.0),
        Iso3200 => ("ISO_3200", 30.0),
        Iso6400 => ("ISO_6400", 36.0),
        Iso12800 => ("ISO_12800", 42.0),
    }
}

preset_enum! {
    /// Gamma correction presets. Values below 1 darken, above 1 brighten.
    GammaPreset, value, f64, {
        P0_00 => ("Preset_0_00", 0.0),
        P0_25 => ("Preset_0_25", 0.25),
        P0_50 => ("Preset_0_50", 0.5),
        P0_75 => ("Preset_0_75", 0.75),
        P1_00 => ("Preset_1_00", 1.0),
        P1_25 => ("Preset_1_25", 1.25),
        P1_50 => ("Preset_1_50", 1.5),
        P1_75 => ("Preset_1_75", 1.75),
        P2_00 => ("Preset_2_00", 2.0),
        P2_25 => ("Preset_2_25", 2.25),
        P2_50 => ("Preset_2_50", 2.5),
        P2_75 => ("Preset_2_75", 2.75),
        P3_00 => ("Preset_3_00", 3.0),
    }
}

preset_enum! {
    /// Black level (baseline brightness) presets.
    BlackLevelPreset, value, f64, {
        P0_00 => ("Preset_0_00", 0.0),
        P0_25 => ("Preset_0_25", 0.25),
        P0_50 => ("Preset_0_50", 0.5),
        P0_75 => ("Preset_0_75", 0.75),
        P1_00 => ("Preset_1_00", 1.0),
        P1_25 => ("Preset_1_25", 1.25),
        P1_50 => ("Preset_1_50", 1.5),
        P1_75 => ("Preset_1_75", 1.75),
        P2_00 => ("Preset_2_00", 2.0),
    }
}

preset_enum! {
    /// Per-channel white balance ratio presets (shared by red and blue).
    BalancePreset, value, f64, {
        P0_00 => ("Preset_0_00", 0.0),
        P0_25 => ("Preset_0_25", 0.25),
        P0_50 => ("Preset_0_50", 0.5),
        P0_75 => ("Preset_0_75", 0.75),
        P1_00 => ("Preset_1_00", 1.0),
        P1_25 => ("Preset_1_25", 1.25),
        P1_50 => ("Preset_1_50", 1.5),
        P1_75 => ("Preset_1_75", 1.75),
        P2_00 => ("Preset_2_00", 2.0),
        P2_25 => ("Preset_2_25", 2.25),
        P2_50 => ("Preset_2_50", 2.5),
        P2_75 => ("Preset_2_75", 2.75),
        P3_00 => ("Preset_3_00", 3.0),
    }
}

preset_enum! {
    /// Centered region-of-interest presets as `(width, height)`.
    DimensionPreset, dimensions, (i64, i64), {
        D1440x1080 => ("Preset_1440x1080", (1440, 1080)),
        D1080x1440 => ("Preset_1080x1440", (1080, 1440)),
        D1280x960 => ("Preset_1280x960", (1280, 960)),
        D960x1280 => ("Preset_960x1280", (960, 1280)),
        D720x540 => ("Preset_720x540", (720, 540)),
        D540x720 => ("Preset_540x720", (540, 720)),
        D640x480 => ("Preset_640x480", (640, 480)),
        D480x640 => ("Preset_480x640", (480, 640)),
        D320x240 => ("Preset_320x240", (320, 240)),
        D240x320 => ("Preset_240x320", (240, 320)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exposure_preset_values() {
        assert_eq!(ExposurePreset::Shutter1_1000.microseconds(), 1_000.0);
        assert_eq!(ExposurePreset::Shutter1_30.microseconds(), 33_333.0);
        assert_eq!(ExposurePreset::S20.microseconds(), 20_000_000.0);
        assert_eq!(ExposurePreset::MinimumValue.microseconds(), 0.0);
    }

    #[test]
    fn gain_iso_aliases_match_db_presets() {
        assert_eq!(GainPreset::Iso100.db(), GainPreset::Db0.db());
        assert_eq!(GainPreset::Iso1600.db(), GainPreset::Db24.db());
        assert_eq!(GainPreset::Iso12800.db(), GainPreset::Db42.db());
    }

    #[test]
    fn names_round_trip() {
        for p in ExposurePreset::variants() {
            assert_eq!(ExposurePreset::from_name(p.name()), Some(*p));
        }
        for p in GainPreset::variants() {
            assert_eq!(GainPreset::from_name(p.name()), Some(*p));
        }
        for p in DimensionPreset::variants() {
            assert_eq!(DimensionPreset::from_name(p.name()), Some(*p));
        }
        for p in PixelFormatOption::variants() {
            assert_eq!(PixelFormatOption::from_name(p.name()), Some(*p));
        }
        assert_eq!(ExposurePreset::from_name("Shutter_1_7"), None);
    }

    #[test]
    fn dimension_presets_cover_both_orientations() {
        let (w, h) = DimensionPreset::D1440x1080.dimensions();
        assert_eq!((w, h), (1440, 1080));
        let (w, h) = DimensionPreset::D240x320.dimensions();
        assert_eq!((w, h), (240, 320));
    }
}
