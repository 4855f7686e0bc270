//! In-process `gcam` backend backed by a synthetic sensor.
//!
//! The simulated device carries a real node map (values, ranges,
//! writability), the transport-layer stream nodes used by the capture paths,
//! and a fault queue so tests can script incomplete frames and pull timeouts
//! where a hardware camera would produce them.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use machine_vision_formats::PixFmt;
use tracing::debug;

use gcam::{Camera, CameraInfo, CameraModule, Error};
use owned_frame::FrameBuffer;

// Sensor geometry of the simulated device.
const SENSOR_WIDTH: i64 = 1440;
const SENSOR_HEIGHT: i64 = 1080;

pub type Result<M> = gcam::Result<M>;

#[derive(Clone)]
pub struct SimModule {
    infos: Vec<SimCameraInfo>,
}

pub fn new_module() -> Result<SimModule> {
    Ok(SimModule::with_cameras(1))
}

impl SimModule {
    /// A module exposing `count` identical virtual cameras, named `sim-0`,
    /// `sim-1`, ...
    pub fn with_cameras(count: usize) -> SimModule {
        let infos = (0..count)
            .map(|i| SimCameraInfo {
                name: format!("sim-{i}"),
                serial: format!("SIM{i:06}"),
                model: "SimSensor".to_string(),
                vendor: "gcam".to_string(),
            })
            .collect();
        SimModule { infos }
    }
}

impl CameraModule for SimModule {
    type CameraType = SimCamera;

    fn name(&self) -> &str {
        "sim"
    }

    fn camera_infos(&self) -> Result<Vec<Box<dyn CameraInfo>>> {
        Ok(self
            .infos
            .iter()
            .map(|info| {
                let boxed: Box<dyn CameraInfo> = Box::new(info.clone());
                boxed
            })
            .collect())
    }

    fn camera(&mut self, name: &str) -> Result<SimCamera> {
        let info = self
            .infos
            .iter()
            .find(|info| info.name == name)
            .cloned()
            .ok_or_else(|| Error::CameraNotFound {
                name: name.to_string(),
            })?;
        Ok(SimCamera::new(info))
    }
}

#[derive(Debug, Clone)]
pub struct SimCameraInfo {
    name: String,
    serial: String,
    model: String,
    vendor: String,
}

impl CameraInfo for SimCameraInfo {
    fn name(&self) -> &str {
        &self.name
    }
    fn serial(&self) -> &str {
        &self.serial
    }
    fn model(&self) -> &str {
        &self.model
    }
    fn vendor(&self) -> &str {
        &self.vendor
    }
}

/// Scripted outcome for one frame pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullOutcome {
    Complete,
    /// The device delivers the frame but flags it as damaged.
    Incomplete,
    /// The pull deadline passes without a frame.
    Timeout,
}

struct FloatNode {
    value: f64,
    min: f64,
    max: f64,
    writable: bool,
}

struct IntNode {
    value: i64,
    min: i64,
    max: i64,
    writable: bool,
}

struct BoolNode {
    value: bool,
    writable: bool,
}

struct EnumNode {
    value: String,
    entries: &'static [&'static str],
    writable: bool,
}

pub struct SimCamera {
    info: SimCameraInfo,
    floats: HashMap<&'static str, FloatNode>,
    ints: HashMap<&'static str, IntNode>,
    bools: HashMap<&'static str, BoolNode>,
    enums: HashMap<&'static str, EnumNode>,
    stream_ints: HashMap<&'static str, IntNode>,
    stream_enums: HashMap<&'static str, EnumNode>,
    // BalanceRatio holds one value per BalanceRatioSelector entry.
    blue_balance: f64,
    acquiring: bool,
    frame_id: u64,
    device_clock_ns: u64,
    planned: VecDeque<PullOutcome>,
    write_log: Vec<String>,
}

fn _test_camera_is_send() {
    // Compile-time test to ensure SimCamera implements Send trait.
    fn implements<T: Send>() {}
    implements::<SimCamera>();
}

fn float_node(value: f64, min: f64, max: f64) -> FloatNode {
    FloatNode {
        value,
        min,
        max,
        writable: true,
    }
}

fn int_node(value: i64, min: i64, max: i64) -> IntNode {
    IntNode {
        value,
        min,
        max,
        writable: true,
    }
}

fn ro_int_node(value: i64) -> IntNode {
    IntNode {
        value,
        min: value,
        max: value,
        writable: false,
    }
}

fn enum_node(value: &str, entries: &'static [&'static str]) -> EnumNode {
    EnumNode {
        value: value.to_string(),
        entries,
        writable: true,
    }
}

const AUTO_ENTRIES: &[&str] = &["Off", "Once", "Continuous"];
const PIXEL_FORMAT_ENTRIES: &[&str] = &[
    "BayerRG8",
    "BayerRG10p",
    "BayerRG12p",
    "BayerRG16",
    "Mono8",
    "Mono10p",
    "Mono12p",
    "Mono16",
];

impl SimCamera {
    fn new(info: SimCameraInfo) -> SimCamera {
        let mut floats = HashMap::new();
        floats.insert("ExposureTime", float_node(33_333.0, 20.0, 30_000_000.0));
        floats.insert("Gain", float_node(0.0, 0.0, 47.99));
        floats.insert("Gamma", float_node(1.0, 0.25, 4.0));
        floats.insert("BlackLevel", float_node(0.0, 0.0, 12.75));
        floats.insert("BalanceRatio", float_node(1.0, 0.25, 4.0));

        let mut ints = HashMap::new();
        ints.insert("Width", int_node(SENSOR_WIDTH, 8, SENSOR_WIDTH));
        ints.insert("Height", int_node(SENSOR_HEIGHT, 6, SENSOR_HEIGHT));
        ints.insert("OffsetX", int_node(0, 0, SENSOR_WIDTH - 8));
        ints.insert("OffsetY", int_node(0, 0, SENSOR_HEIGHT - 6));
        ints.insert("SensorWidth", ro_int_node(SENSOR_WIDTH));
        ints.insert("SensorHeight", ro_int_node(SENSOR_HEIGHT));
        ints.insert("BinningHorizontal", int_node(1, 1, 4));
        ints.insert("BinningVertical", int_node(1, 1, 4));
        ints.insert("DecimationHorizontal", int_node(1, 1, 4));
        ints.insert("DecimationVertical", int_node(1, 1, 4));

        let mut bools = HashMap::new();
        bools.insert(
            "GammaEnable",
            BoolNode {
                value: true,
                writable: true,
            },
        );
        bools.insert(
            "BlackLevelEnable",
            BoolNode {
                value: true,
                writable: true,
            },
        );

        let mut enums = HashMap::new();
        enums.insert("PixelFormat", enum_node("BayerRG8", PIXEL_FORMAT_ENTRIES));
        enums.insert("ExposureAuto", enum_node("Continuous", AUTO_ENTRIES));
        enums.insert("GainAuto", enum_node("Continuous", AUTO_ENTRIES));
        enums.insert("BlackLevelAuto", enum_node("Off", &["Off", "Continuous"]));
        enums.insert("BalanceWhiteAuto", enum_node("Continuous", AUTO_ENTRIES));
        enums.insert("BalanceRatioSelector", enum_node("Red", &["Red", "Blue"]));
        enums.insert(
            "AcquisitionMode",
            enum_node("Continuous", &["Continuous", "SingleFrame", "MultiFrame"]),
        );

        let mut stream_ints = HashMap::new();
        stream_ints.insert("StreamBufferCountManual", int_node(10, 1, 1000));
        stream_ints.insert(
            "StreamLostFrameCount",
            IntNode {
                value: 0,
                min: 0,
                max: i64::MAX,
                writable: false,
            },
        );

        let mut stream_enums = HashMap::new();
        stream_enums.insert(
            "StreamBufferHandlingMode",
            enum_node(
                "OldestFirst",
                &[
                    "OldestFirst",
                    "OldestFirstOverwrite",
                    "NewestOnly",
                    "NewestFirst",
                ],
            ),
        );
        stream_enums.insert(
            "StreamBufferCountMode",
            enum_node("Auto", &["Auto", "Manual"]),
        );

        SimCamera {
            info,
            floats,
            ints,
            bools,
            enums,
            stream_ints,
            stream_enums,
            blue_balance: 1.0,
            acquiring: false,
            frame_id: 0,
            device_clock_ns: 0,
            planned: VecDeque::new(),
            write_log: Vec::new(),
        }
    }

    /// Script the outcome of the next pulls, in order. Unscripted pulls
    /// complete normally.
    pub fn plan_pulls(&mut self, plans: &[PullOutcome]) {
        self.planned.extend(plans.iter().copied());
    }

    /// Every node write so far, as `name=value` strings, in order.
    pub fn write_log(&self) -> &[String] {
        &self.write_log
    }

    /// Number of writes recorded for one node.
    pub fn writes_to(&self, node: &str) -> usize {
        let prefix = format!("{node}=");
        self.write_log
            .iter()
            .filter(|entry| entry.starts_with(&prefix))
            .count()
    }

    /// Mark a camera-side node as read-only, as devices do for features that
    /// are locked in the current state.
    pub fn make_read_only(&mut self, name: &str) {
        if let Some(n) = self.floats.get_mut(name) {
            n.writable = false;
        }
        if let Some(n) = self.ints.get_mut(name) {
            n.writable = false;
        }
        if let Some(n) = self.bools.get_mut(name) {
            n.writable = false;
        }
        if let Some(n) = self.enums.get_mut(name) {
            n.writable = false;
        }
    }

    fn balance_selector_is_blue(&self) -> bool {
        self.enums
            .get("BalanceRatioSelector")
            .map(|n| n.value == "Blue")
            .unwrap_or(false)
    }

    fn advance_clock(&mut self) {
        let exposure_us = self
            .floats
            .get("ExposureTime")
            .map(|n| n.value)
            .unwrap_or(0.0);
        self.device_clock_ns += (exposure_us * 1_000.0) as u64;
    }

    fn bump_lost_count(&mut self) {
        if let Some(node) = self.stream_ints.get_mut("StreamLostFrameCount") {
            node.value += 1;
        }
    }

    fn synthesize(&self, width: usize, height: usize) -> Vec<u8> {
        let mut data = vec![0u8; width * height];
        for y in 0..height {
            for x in 0..width {
                data[y * width + x] = (x as u64 + 2 * y as u64 + 3 * self.frame_id) as u8;
            }
        }
        data
    }
}

impl CameraInfo for SimCamera {
    fn name(&self) -> &str {
        self.info.name()
    }
    fn serial(&self) -> &str {
        self.info.serial()
    }
    fn model(&self) -> &str {
        self.info.model()
    }
    fn vendor(&self) -> &str {
        self.info.vendor()
    }
}

impl Camera for SimCamera {
    fn feature_float(&self, name: &str) -> Result<f64> {
        if name == "BalanceRatio" && self.balance_selector_is_blue() {
            return Ok(self.blue_balance);
        }
        self.floats
            .get(name)
            .map(|n| n.value)
            .ok_or_else(|| Error::FeatureNotPresent(name.to_string()))
    }

    fn feature_float_range(&self, name: &str) -> Result<(f64, f64)> {
        self.floats
            .get(name)
            .map(|n| (n.min, n.max))
            .ok_or_else(|| Error::FeatureNotPresent(name.to_string()))
    }

    fn feature_float_set(&mut self, name: &str, value: f64) -> Result<()> {
        let to_blue_balance = name == "BalanceRatio" && self.balance_selector_is_blue();
        let node = self
            .floats
            .get_mut(name)
            .ok_or_else(|| Error::FeatureNotPresent(name.to_string()))?;
        if !node.writable {
            return Err(Error::FeatureNotWritable(name.to_string()));
        }
        if value < node.min || value > node.max {
            return Err(Error::GcamError {
                msg: format!("{name}: value {value} outside [{}, {}]", node.min, node.max),
            });
        }
        if to_blue_balance {
            self.blue_balance = value;
        } else {
            node.value = value;
        }
        self.write_log.push(format!("{name}={value}"));
        Ok(())
    }

    fn feature_int(&self, name: &str) -> Result<i64> {
        self.ints
            .get(name)
            .map(|n| n.value)
            .ok_or_else(|| Error::FeatureNotPresent(name.to_string()))
    }

    fn feature_int_range(&self, name: &str) -> Result<(i64, i64)> {
        self.ints
            .get(name)
            .map(|n| (n.min, n.max))
            .ok_or_else(|| Error::FeatureNotPresent(name.to_string()))
    }

    fn feature_int_set(&mut self, name: &str, value: i64) -> Result<()> {
        let node = self
            .ints
            .get_mut(name)
            .ok_or_else(|| Error::FeatureNotPresent(name.to_string()))?;
        if !node.writable {
            return Err(Error::FeatureNotWritable(name.to_string()));
        }
        if value < node.min || value > node.max {
            return Err(Error::GcamError {
                msg: format!("{name}: value {value} outside [{}, {}]", node.min, node.max),
            });
        }
        node.value = value;
        self.write_log.push(format!("{name}={value}"));
        Ok(())
    }

    fn feature_bool(&self, name: &str) -> Result<bool> {
        self.bools
            .get(name)
            .map(|n| n.value)
            .ok_or_else(|| Error::FeatureNotPresent(name.to_string()))
    }

    fn feature_bool_set(&mut self, name: &str, value: bool) -> Result<()> {
        let node = self
            .bools
            .get_mut(name)
            .ok_or_else(|| Error::FeatureNotPresent(name.to_string()))?;
        if !node.writable {
            return Err(Error::FeatureNotWritable(name.to_string()));
        }
        node.value = value;
        self.write_log.push(format!("{name}={value}"));
        Ok(())
    }

    fn feature_enum(&self, name: &str) -> Result<String> {
        self.enums
            .get(name)
            .map(|n| n.value.clone())
            .ok_or_else(|| Error::FeatureNotPresent(name.to_string()))
    }

    fn feature_enum_set(&mut self, name: &str, value: &str) -> Result<()> {
        let node = self
            .enums
            .get_mut(name)
            .ok_or_else(|| Error::FeatureNotPresent(name.to_string()))?;
        if !node.writable {
            return Err(Error::FeatureNotWritable(name.to_string()));
        }
        if !node.entries.contains(&value) {
            return Err(Error::GcamError {
                msg: format!("{name}: unknown enumeration entry {value:?}"),
            });
        }
        node.value = value.to_string();
        self.write_log.push(format!("{name}={value}"));
        Ok(())
    }

    fn feature_is_writable(&self, name: &str) -> Result<bool> {
        if let Some(n) = self.floats.get(name) {
            return Ok(n.writable);
        }
        if let Some(n) = self.ints.get(name) {
            return Ok(n.writable);
        }
        if let Some(n) = self.bools.get(name) {
            return Ok(n.writable);
        }
        if let Some(n) = self.enums.get(name) {
            return Ok(n.writable);
        }
        Err(Error::FeatureNotPresent(name.to_string()))
    }

    fn stream_feature_int(&self, name: &str) -> Result<i64> {
        self.stream_ints
            .get(name)
            .map(|n| n.value)
            .ok_or_else(|| Error::FeatureNotPresent(name.to_string()))
    }

    fn stream_feature_int_set(&mut self, name: &str, value: i64) -> Result<()> {
        let node = self
            .stream_ints
            .get_mut(name)
            .ok_or_else(|| Error::FeatureNotPresent(name.to_string()))?;
        if !node.writable {
            return Err(Error::FeatureNotWritable(name.to_string()));
        }
        if value < node.min || value > node.max {
            return Err(Error::GcamError {
                msg: format!("{name}: value {value} outside [{}, {}]", node.min, node.max),
            });
        }
        node.value = value;
        self.write_log.push(format!("{name}={value}"));
        Ok(())
    }

    fn stream_feature_enum_set(&mut self, name: &str, value: &str) -> Result<()> {
        let node = self
            .stream_enums
            .get_mut(name)
            .ok_or_else(|| Error::FeatureNotPresent(name.to_string()))?;
        if !node.writable {
            return Err(Error::FeatureNotWritable(name.to_string()));
        }
        if !node.entries.contains(&value) {
            return Err(Error::GcamError {
                msg: format!("{name}: unknown enumeration entry {value:?}"),
            });
        }
        node.value = value.to_string();
        self.write_log.push(format!("{name}={value}"));
        Ok(())
    }

    fn acquisition_start(&mut self) -> Result<()> {
        if self.acquiring {
            return Err(Error::from("acquisition already active"));
        }
        self.acquiring = true;
        debug!("{}: acquisition started", self.info.name);
        Ok(())
    }

    fn acquisition_stop(&mut self) -> Result<()> {
        if !self.acquiring {
            return Err(Error::from("acquisition not active"));
        }
        self.acquiring = false;
        debug!("{}: acquisition stopped", self.info.name);
        Ok(())
    }

    fn next_frame(&mut self, timeout: Option<Duration>) -> Result<FrameBuffer> {
        let _ = timeout;
        if !self.acquiring {
            return Err(Error::from("acquisition not active"));
        }
        match self.planned.pop_front().unwrap_or(PullOutcome::Complete) {
            PullOutcome::Timeout => return Err(Error::Timeout),
            PullOutcome::Incomplete => {
                self.frame_id += 1;
                self.advance_clock();
                self.bump_lost_count();
                return Err(Error::IncompleteFrame(format!(
                    "frame {} missing transport data",
                    self.frame_id
                )));
            }
            PullOutcome::Complete => {}
        }
        self.frame_id += 1;
        self.advance_clock();

        let width = self.feature_int("Width")? as usize;
        let height = self.feature_int("Height")? as usize;
        let pixfmt = match self.feature_enum("PixelFormat")?.as_str() {
            "BayerRG8" => PixFmt::BayerRG8,
            "Mono8" => PixFmt::Mono8,
            other => {
                return Err(Error::GcamError {
                    msg: format!("pixel format {other} not simulated"),
                })
            }
        };
        let data = self.synthesize(width, height);
        FrameBuffer::new(
            width as u32,
            height as u32,
            width,
            data,
            pixfmt,
            self.frame_id,
            self.device_clock_ns,
            chrono::Utc::now(),
        )
        .ok_or_else(|| Error::from("synthesized frame has inconsistent layout"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_camera() -> SimCamera {
        let mut module = SimModule::with_cameras(1);
        module.camera("sim-0").unwrap()
    }

    #[test]
    fn module_enumerates_cameras() {
        let module = SimModule::with_cameras(2);
        let infos = module.camera_infos().unwrap();
        assert_eq!(infos.len(), 2);
        assert_eq!(infos[0].name(), "sim-0");
        assert_eq!(infos[1].name(), "sim-1");
    }

    #[test]
    fn unknown_camera_name_is_an_error() {
        let mut module = SimModule::with_cameras(1);
        assert!(matches!(
            module.camera("sim-7"),
            Err(Error::CameraNotFound { .. })
        ));
    }

    #[test]
    fn exposure_range_matches_device_report() {
        let cam = open_camera();
        assert_eq!(
            cam.feature_float_range("ExposureTime").unwrap(),
            (20.0, 30_000_000.0)
        );
    }

    #[test]
    fn read_only_nodes_reject_writes() {
        let mut cam = open_camera();
        assert!(matches!(
            cam.feature_int_set("SensorWidth", 640),
            Err(Error::FeatureNotWritable(_))
        ));
        assert!(matches!(
            cam.stream_feature_int_set("StreamLostFrameCount", 0),
            Err(Error::FeatureNotWritable(_))
        ));
    }

    #[test]
    fn missing_nodes_are_reported() {
        let cam = open_camera();
        assert!(matches!(
            cam.feature_float("FocusDistance"),
            Err(Error::FeatureNotPresent(_))
        ));
    }

    #[test]
    fn out_of_range_write_is_rejected() {
        let mut cam = open_camera();
        assert!(cam.feature_float_set("ExposureTime", 50_000_000.0).is_err());
    }

    #[test]
    fn frames_require_active_acquisition() {
        let mut cam = open_camera();
        assert!(cam.next_frame(None).is_err());
    }

    #[test]
    fn frame_ids_increment() {
        let mut cam = open_camera();
        cam.acquisition_start().unwrap();
        let f1 = cam.next_frame(None).unwrap();
        let f2 = cam.next_frame(None).unwrap();
        assert_eq!(f1.frame_id, 1);
        assert_eq!(f2.frame_id, 2);
        assert!(f2.device_timestamp_ns > f1.device_timestamp_ns);
        cam.acquisition_stop().unwrap();
    }

    #[test]
    fn mono8_frames_follow_the_pixel_format_node() {
        let mut cam = open_camera();
        cam.feature_enum_set("PixelFormat", "Mono8").unwrap();
        cam.acquisition_start().unwrap();
        let frame = cam.next_frame(None).unwrap();
        assert_eq!(frame.pixel_format, PixFmt::Mono8);
    }

    #[test]
    fn packed_formats_are_not_simulated() {
        let mut cam = open_camera();
        cam.feature_enum_set("PixelFormat", "BayerRG10p").unwrap();
        cam.acquisition_start().unwrap();
        assert!(cam.next_frame(None).is_err());
    }

    #[test]
    fn balance_ratio_follows_the_selector() {
        let mut cam = open_camera();
        cam.feature_enum_set("BalanceRatioSelector", "Red").unwrap();
        cam.feature_float_set("BalanceRatio", 1.25).unwrap();
        cam.feature_enum_set("BalanceRatioSelector", "Blue").unwrap();
        cam.feature_float_set("BalanceRatio", 2.25).unwrap();
        assert_eq!(cam.feature_float("BalanceRatio").unwrap(), 2.25);
        cam.feature_enum_set("BalanceRatioSelector", "Red").unwrap();
        assert_eq!(cam.feature_float("BalanceRatio").unwrap(), 1.25);
    }

    #[test]
    fn scripted_incomplete_pull_feeds_lost_counter() {
        let mut cam = open_camera();
        cam.plan_pulls(&[PullOutcome::Incomplete]);
        cam.acquisition_start().unwrap();
        assert!(matches!(
            cam.next_frame(None),
            Err(Error::IncompleteFrame(_))
        ));
        assert_eq!(cam.stream_feature_int("StreamLostFrameCount").unwrap(), 1);
        let frame = cam.next_frame(None).unwrap();
        assert_eq!(frame.frame_id, 2);
    }
}
