//! Translation of setting requests into node-map writes.
//!
//! All writes here are best-effort: a missing or read-only node, a failed
//! range query, or a rejected write is reported through `tracing` and skipped
//! rather than propagated. Numeric values are always clamped into the range
//! the device reports at the time of the call.

use std::fmt::Write as _;

use tracing::{debug, warn};

use gcam::Camera;
use gcam_types::{
    AutoMode, BalanceChannel, BalanceSetting, BinningMode, BlackLevelSetting, DecimationMode,
    DimensionSetting, ExposureSetting, GainSetting, GammaSetting, PixelFormatOption,
};

pub(crate) fn write_float_clamped<C: Camera>(cam: &mut C, node: &str, requested: f64) -> Option<f64> {
    match cam.feature_is_writable(node) {
        Ok(true) => {}
        Ok(false) => {
            warn!("{node} is not writable on this device; skipping");
            return None;
        }
        Err(e) => {
            warn!("{node} unavailable: {e}; skipping");
            return None;
        }
    }
    let (min, max) = match cam.feature_float_range(node) {
        Ok(range) => range,
        Err(e) => {
            warn!("could not read {node} range: {e}; skipping");
            return None;
        }
    };
    let value = requested.clamp(min, max);
    if value != requested {
        warn!("{node}: requested {requested} outside [{min}, {max}], clamping to {value}");
    }
    match cam.feature_float_set(node, value) {
        Ok(()) => {
            debug!("{node} set to {value}");
            Some(value)
        }
        Err(e) => {
            warn!("failed to set {node} to {value}: {e}");
            None
        }
    }
}

pub(crate) fn write_int_clamped<C: Camera>(cam: &mut C, node: &str, requested: i64) -> Option<i64> {
    match cam.feature_is_writable(node) {
        Ok(true) => {}
        Ok(false) => {
            warn!("{node} is not writable on this device; skipping");
            return None;
        }
        Err(e) => {
            warn!("{node} unavailable: {e}; skipping");
            return None;
        }
    }
    let (min, max) = match cam.feature_int_range(node) {
        Ok(range) => range,
        Err(e) => {
            warn!("could not read {node} range: {e}; skipping");
            return None;
        }
    };
    let value = requested.clamp(min, max);
    if value != requested {
        warn!("{node}: requested {requested} outside [{min}, {max}], clamping to {value}");
    }
    match cam.feature_int_set(node, value) {
        Ok(()) => {
            debug!("{node} set to {value}");
            Some(value)
        }
        Err(e) => {
            warn!("failed to set {node} to {value}: {e}");
            None
        }
    }
}

pub(crate) fn write_enum<C: Camera>(cam: &mut C, node: &str, entry: &str) {
    match cam.feature_is_writable(node) {
        Ok(true) => {}
        Ok(false) => {
            warn!("{node} is not writable on this device; skipping");
            return;
        }
        Err(e) => {
            warn!("{node} unavailable: {e}; skipping");
            return;
        }
    }
    match cam.feature_enum_set(node, entry) {
        Ok(()) => debug!("{node} set to {entry}"),
        Err(e) => warn!("failed to set {node} to {entry}: {e}"),
    }
}

pub(crate) fn write_bool<C: Camera>(cam: &mut C, node: &str, value: bool) {
    match cam.feature_is_writable(node) {
        Ok(true) => {}
        Ok(false) => {
            warn!("{node} is not writable on this device; skipping");
            return;
        }
        Err(e) => {
            warn!("{node} unavailable: {e}; skipping");
            return;
        }
    }
    match cam.feature_bool_set(node, value) {
        Ok(()) => debug!("{node} set to {value}"),
        Err(e) => warn!("failed to set {node} to {value}: {e}"),
    }
}

/// Switch a property's auto-mode enumeration on (`Continuous`) or off.
fn set_auto_mode<C: Camera>(cam: &mut C, node: &str, enable: bool) {
    let mode = if enable {
        AutoMode::Continuous
    } else {
        AutoMode::Off
    };
    write_enum(cam, node, mode.as_node_str());
}

pub(crate) fn apply_pixel_format<C: Camera>(cam: &mut C, format: PixelFormatOption) {
    write_enum(cam, "PixelFormat", format.node_str());
}

pub(crate) fn apply_binning<C: Camera>(cam: &mut C, mode: BinningMode) {
    write_int_clamped(cam, "BinningHorizontal", mode.factor());
    write_int_clamped(cam, "BinningVertical", mode.factor());
}

pub(crate) fn apply_decimation<C: Camera>(cam: &mut C, mode: DecimationMode) {
    write_int_clamped(cam, "DecimationHorizontal", mode.factor());
    write_int_clamped(cam, "DecimationVertical", mode.factor());
}

pub(crate) fn apply_exposure<C: Camera>(cam: &mut C, setting: ExposureSetting) {
    match setting {
        ExposureSetting::Auto => set_auto_mode(cam, "ExposureAuto", true),
        ExposureSetting::Preset(preset) => {
            set_auto_mode(cam, "ExposureAuto", false);
            write_float_clamped(cam, "ExposureTime", preset.microseconds());
        }
        ExposureSetting::Manual(us) => {
            set_auto_mode(cam, "ExposureAuto", false);
            write_float_clamped(cam, "ExposureTime", us);
        }
    }
}

pub(crate) fn apply_gain<C: Camera>(cam: &mut C, setting: GainSetting) {
    match setting {
        GainSetting::Auto => set_auto_mode(cam, "GainAuto", true),
        GainSetting::Preset(preset) => {
            set_auto_mode(cam, "GainAuto", false);
            write_float_clamped(cam, "Gain", preset.db());
        }
        GainSetting::Manual(db) => {
            set_auto_mode(cam, "GainAuto", false);
            write_float_clamped(cam, "Gain", db);
        }
    }
}

pub(crate) fn apply_gamma<C: Camera>(cam: &mut C, setting: GammaSetting) {
    match setting {
        GammaSetting::Disable => write_bool(cam, "GammaEnable", false),
        GammaSetting::Preset(preset) => {
            write_bool(cam, "GammaEnable", true);
            write_float_clamped(cam, "Gamma", preset.value());
        }
        GammaSetting::Manual(value) => {
            write_bool(cam, "GammaEnable", true);
            write_float_clamped(cam, "Gamma", value);
        }
    }
}

pub(crate) fn apply_black_level<C: Camera>(cam: &mut C, setting: BlackLevelSetting) {
    write_bool(cam, "BlackLevelEnable", true);
    match setting {
        BlackLevelSetting::Auto => set_auto_mode(cam, "BlackLevelAuto", true),
        BlackLevelSetting::Preset(preset) => {
            set_auto_mode(cam, "BlackLevelAuto", false);
            write_float_clamped(cam, "BlackLevel", preset.value());
        }
        BlackLevelSetting::Manual(value) => {
            set_auto_mode(cam, "BlackLevelAuto", false);
            write_float_clamped(cam, "BlackLevel", value);
        }
    }
}

pub(crate) fn apply_balance<C: Camera>(cam: &mut C, channel: BalanceChannel, setting: BalanceSetting) {
    let value = match setting {
        BalanceSetting::Auto => {
            set_auto_mode(cam, "BalanceWhiteAuto", true);
            return;
        }
        BalanceSetting::Preset(preset) => preset.value(),
        BalanceSetting::Manual(value) => value,
    };
    set_auto_mode(cam, "BalanceWhiteAuto", false);
    write_enum(cam, "BalanceRatioSelector", channel.selector_entry());
    write_float_clamped(cam, "BalanceRatio", value);
}

/// The full sensor extent, from the dedicated nodes when present, otherwise
/// from the maximum of the writable region nodes.
fn sensor_extent<C: Camera>(cam: &C) -> (i64, i64) {
    let width = cam
        .feature_int("SensorWidth")
        .or_else(|_| cam.feature_int_range("Width").map(|(_, max)| max))
        .unwrap_or(0);
    let height = cam
        .feature_int("SensorHeight")
        .or_else(|_| cam.feature_int_range("Height").map(|(_, max)| max))
        .unwrap_or(0);
    (width, height)
}

pub(crate) fn apply_dimensions<C: Camera>(cam: &mut C, setting: DimensionSetting) {
    let (width, height, offsets) = match setting {
        DimensionSetting::Preset(preset) => {
            let (w, h) = preset.dimensions();
            (w, h, None)
        }
        DimensionSetting::Custom {
            width,
            height,
            offset_x,
            offset_y,
        } => (width, height, Some((offset_x, offset_y))),
    };

    let (sensor_w, sensor_h) = sensor_extent(cam);
    let final_w = write_int_clamped(cam, "Width", width).unwrap_or(width);
    let final_h = write_int_clamped(cam, "Height", height).unwrap_or(height);

    // Presets center the region on the sensor; custom offsets are clamped so
    // the region stays inside it.
    let (offset_x, offset_y) = match offsets {
        None => ((sensor_w - final_w) / 2, (sensor_h - final_h) / 2),
        Some((x, y)) => (
            x.clamp(0, (sensor_w - final_w).max(0)),
            y.clamp(0, (sensor_h - final_h).max(0)),
        ),
    };
    write_int_clamped(cam, "OffsetX", offset_x);
    write_int_clamped(cam, "OffsetY", offset_y);
}

fn float_str<C: Camera>(cam: &C, node: &str) -> String {
    cam.feature_float(node)
        .map(|v| v.to_string())
        .unwrap_or_else(|_| "[unreadable]".to_string())
}

fn int_str<C: Camera>(cam: &C, node: &str) -> String {
    cam.feature_int(node)
        .map(|v| v.to_string())
        .unwrap_or_else(|_| "[unreadable]".to_string())
}

fn bool_str<C: Camera>(cam: &C, node: &str) -> String {
    cam.feature_bool(node)
        .map(|v| v.to_string())
        .unwrap_or_else(|_| "[unreadable]".to_string())
}

fn enum_str<C: Camera>(cam: &C, node: &str) -> String {
    cam.feature_enum(node)
        .unwrap_or_else(|_| "[unreadable]".to_string())
}

/// Read back every translated property, tolerating unreadable nodes.
pub(crate) fn settings_report<C: Camera>(cam: &mut C) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "PixelFormat: {}", enum_str(cam, "PixelFormat"));
    let _ = writeln!(
        out,
        "Binning: {} x {}",
        int_str(cam, "BinningHorizontal"),
        int_str(cam, "BinningVertical")
    );
    let _ = writeln!(
        out,
        "Decimation: {} x {}",
        int_str(cam, "DecimationHorizontal"),
        int_str(cam, "DecimationVertical")
    );
    let _ = writeln!(out, "ExposureAuto: {}", enum_str(cam, "ExposureAuto"));
    let _ = writeln!(out, "ExposureTime: {} us", float_str(cam, "ExposureTime"));
    let _ = writeln!(
        out,
        "Dimensions: {} x {} (offset {}, {})",
        int_str(cam, "Width"),
        int_str(cam, "Height"),
        int_str(cam, "OffsetX"),
        int_str(cam, "OffsetY")
    );
    let _ = writeln!(out, "GainAuto: {}", enum_str(cam, "GainAuto"));
    let _ = writeln!(out, "Gain: {} dB", float_str(cam, "Gain"));
    let _ = writeln!(out, "GammaEnable: {}", bool_str(cam, "GammaEnable"));
    let _ = writeln!(out, "Gamma: {}", float_str(cam, "Gamma"));
    let _ = writeln!(out, "BlackLevelAuto: {}", enum_str(cam, "BlackLevelAuto"));
    let _ = writeln!(out, "BlackLevel: {}", float_str(cam, "BlackLevel"));
    let _ = writeln!(
        out,
        "BalanceWhiteAuto: {}",
        enum_str(cam, "BalanceWhiteAuto")
    );
    for channel in BalanceChannel::variants() {
        // reading a per-channel ratio goes through the selector
        if cam
            .feature_enum_set("BalanceRatioSelector", channel.selector_entry())
            .is_ok()
        {
            let _ = writeln!(
                out,
                "{channel}BalanceRatio: {}",
                float_str(cam, "BalanceRatio")
            );
        } else {
            let _ = writeln!(out, "{channel}BalanceRatio: [unreadable]");
        }
    }
    out
}
