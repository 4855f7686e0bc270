//! Camera sessions and capture sequencing on top of the [gcam] reference
//! interface.
//!
//! A [CameraSession] owns one camera for its whole lifetime and layers three
//! things over it: best-effort setting application with range clamping
//! (property failures are reported, never propagated), an explicit
//! acquisition lifecycle, and the capture entry points: single frame,
//! trigger-gated single frame, and continuous burst collection.

use std::time::Duration;

use tracing::{debug, error, info, warn};

use gcam::{Camera, CameraModule, Error};
use owned_frame::FrameBuffer;

mod settings;
mod trigger;

pub use trigger::TriggerFlag;

pub use gcam_types::{
    AcquisitionMode, BalanceChannel, BalanceSetting, BinningMode, BlackLevelSetting, BufferPolicy,
    DecimationMode, DimensionSetting, ExposureSetting, GainSetting, GammaSetting,
    PixelFormatOption, Setting,
};

use gcam_types::{BalancePreset, BlackLevelPreset, DimensionPreset, ExposurePreset, GainPreset, GammaPreset};

/// Tuning for [CameraSession::collect_frames].
#[derive(Debug, Clone)]
pub struct CollectOptions {
    /// Size of the manually allocated transport buffer pool.
    pub buffer_count: i64,
    /// Per-frame pull deadline.
    pub frame_timeout: Duration,
}

impl Default for CollectOptions {
    fn default() -> Self {
        CollectOptions {
            buffer_count: 100,
            frame_timeout: Duration::from_secs(1),
        }
    }
}

/// Result of a burst collection. `frames` is shorter than `requested` when
/// individual pulls failed; those failures are soft.
#[derive(Debug)]
pub struct Collection {
    pub frames: Vec<FrameBuffer>,
    pub requested: usize,
    /// Total lost frames reported by the device's stream layer.
    pub lost_count: i64,
}

/// Exclusive owner of one camera, from open to shutdown.
pub struct CameraSession<C: Camera> {
    camera: Option<C>,
    acquisition_active: bool,
}

impl<C: Camera> CameraSession<C> {
    pub fn open<M>(module: &mut M, name: &str) -> gcam::Result<CameraSession<C>>
    where
        M: CameraModule<CameraType = C>,
    {
        Ok(CameraSession {
            camera: Some(module.camera(name)?),
            acquisition_active: false,
        })
    }

    pub fn from_camera(camera: C) -> CameraSession<C> {
        CameraSession {
            camera: Some(camera),
            acquisition_active: false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.camera.is_some()
    }

    pub fn camera(&self) -> Option<&C> {
        self.camera.as_ref()
    }

    pub fn camera_mut(&mut self) -> Option<&mut C> {
        self.camera.as_mut()
    }

    fn cam_mut(&mut self) -> gcam::Result<&mut C> {
        self.camera.as_mut().ok_or(Error::CameraClosed)
    }

    /// Release the camera. Safe to call repeatedly; afterwards every
    /// lifecycle and capture operation fails with [Error::CameraClosed] and
    /// setting calls are diagnostic no-ops.
    pub fn shutdown(&mut self) -> gcam::Result<()> {
        if self.acquisition_active {
            if let Some(camera) = self.camera.as_mut() {
                if let Err(e) = camera.acquisition_stop() {
                    warn!("stopping acquisition during shutdown failed: {e}");
                }
            }
            self.acquisition_active = false;
        }
        self.camera = None;
        Ok(())
    }

    pub fn start_acquisition(&mut self) -> gcam::Result<()> {
        self.cam_mut()?.acquisition_start()?;
        self.acquisition_active = true;
        Ok(())
    }

    pub fn stop_acquisition(&mut self) -> gcam::Result<()> {
        self.cam_mut()?.acquisition_stop()?;
        self.acquisition_active = false;
        Ok(())
    }

    // ----- settings (best-effort, reported not propagated) -----

    /// Apply one translated setting request.
    pub fn apply(&mut self, setting: Setting) {
        let Some(cam) = self.camera.as_mut() else {
            warn!("camera session closed; ignoring {setting:?}");
            return;
        };
        match setting {
            Setting::PixelFormat(format) => settings::apply_pixel_format(cam, format),
            Setting::Binning(mode) => settings::apply_binning(cam, mode),
            Setting::Decimation(mode) => settings::apply_decimation(cam, mode),
            Setting::Exposure(setting) => settings::apply_exposure(cam, setting),
            Setting::Gain(setting) => settings::apply_gain(cam, setting),
            Setting::Gamma(setting) => settings::apply_gamma(cam, setting),
            Setting::BlackLevel(setting) => settings::apply_black_level(cam, setting),
            Setting::Balance(channel, setting) => settings::apply_balance(cam, channel, setting),
            Setting::Dimensions(setting) => settings::apply_dimensions(cam, setting),
        }
    }

    /// String entry point for settings, as used by the CLI. An unknown
    /// property or value performs zero device writes.
    pub fn apply_named(&mut self, property: &str, value: &str) {
        match Setting::parse(property, value) {
            Some(setting) => self.apply(setting),
            None => warn!("unknown value {value:?} for property {property:?}; nothing written"),
        }
    }

    pub fn set_pixel_format(&mut self, format: PixelFormatOption) {
        self.apply(Setting::PixelFormat(format));
    }

    pub fn set_binning(&mut self, mode: BinningMode) {
        self.apply(Setting::Binning(mode));
    }

    pub fn set_decimation(&mut self, mode: DecimationMode) {
        self.apply(Setting::Decimation(mode));
    }

    pub fn set_exposure(&mut self, setting: ExposureSetting) {
        self.apply(Setting::Exposure(setting));
    }

    pub fn set_gain(&mut self, setting: GainSetting) {
        self.apply(Setting::Gain(setting));
    }

    pub fn set_gamma(&mut self, setting: GammaSetting) {
        self.apply(Setting::Gamma(setting));
    }

    pub fn set_black_level(&mut self, setting: BlackLevelSetting) {
        self.apply(Setting::BlackLevel(setting));
    }

    pub fn set_balance(&mut self, channel: BalanceChannel, setting: BalanceSetting) {
        self.apply(Setting::Balance(channel, setting));
    }

    pub fn set_dimensions(&mut self, setting: DimensionSetting) {
        self.apply(Setting::Dimensions(setting));
    }

    /// Fixed manual values for every property.
    pub fn set_defaults(&mut self) {
        self.set_pixel_format(PixelFormatOption::BayerRG8);
        self.set_binning(BinningMode::NoBinning);
        self.set_decimation(DecimationMode::NoDecimation);
        self.set_exposure(ExposureSetting::Preset(ExposurePreset::Shutter1_30));
        self.set_dimensions(DimensionSetting::Preset(DimensionPreset::D1440x1080));
        self.set_gain(GainSetting::Preset(GainPreset::Db24));
        self.set_gamma(GammaSetting::Preset(GammaPreset::P0_75));
        self.set_black_level(BlackLevelSetting::Preset(BlackLevelPreset::P0_25));
        self.set_balance(BalanceChannel::Red, BalanceSetting::Preset(BalancePreset::P1_25));
        self.set_balance(BalanceChannel::Blue, BalanceSetting::Preset(BalancePreset::P2_25));
    }

    /// Device-controlled values wherever an auto mode exists.
    pub fn set_auto(&mut self) {
        self.set_pixel_format(PixelFormatOption::BayerRG8);
        self.set_binning(BinningMode::NoBinning);
        self.set_decimation(DecimationMode::NoDecimation);
        self.set_exposure(ExposureSetting::Auto);
        self.set_dimensions(DimensionSetting::Preset(DimensionPreset::D1440x1080));
        self.set_gain(GainSetting::Auto);
        self.set_gamma(GammaSetting::Disable);
        self.set_black_level(BlackLevelSetting::Auto);
        self.set_balance(BalanceChannel::Red, BalanceSetting::Auto);
        self.set_balance(BalanceChannel::Blue, BalanceSetting::Auto);
    }

    /// Read back the current value of every translated property.
    pub fn settings_report(&mut self) -> String {
        match self.camera.as_mut() {
            Some(cam) => settings::settings_report(cam),
            None => "camera session closed".to_string(),
        }
    }

    /// Select how the device sequences frames once acquisition starts.
    pub fn set_acquisition_mode(&mut self, mode: AcquisitionMode) {
        let Some(cam) = self.camera.as_mut() else {
            warn!("camera session closed; ignoring acquisition mode {mode}");
            return;
        };
        settings::write_enum(cam, "AcquisitionMode", mode.as_node_str());
    }

    /// Choose which buffered frame the stream layer hands out on each pull.
    pub fn set_buffer_policy(&mut self, policy: BufferPolicy) {
        let Some(cam) = self.camera.as_mut() else {
            warn!("camera session closed; ignoring buffer policy {policy}");
            return;
        };
        if let Err(e) = cam.stream_feature_enum_set("StreamBufferHandlingMode", policy.as_node_str())
        {
            warn!("failed to set buffer handling mode to {policy}: {e}");
        }
    }

    // ----- capture -----

    fn configure_acquisition(&mut self, mode: AcquisitionMode, policy: BufferPolicy) {
        self.set_acquisition_mode(mode);
        self.set_buffer_policy(policy);
    }

    /// Stop acquisition after a capture that started it, without masking an
    /// earlier capture error.
    fn finish_capture<T>(
        &mut self,
        started_here: bool,
        result: gcam::Result<T>,
    ) -> gcam::Result<T> {
        if started_here {
            if let Err(e) = self.stop_acquisition() {
                if result.is_ok() {
                    return Err(e);
                }
                warn!("stopping acquisition after failed capture also failed: {e}");
            }
        }
        result
    }

    /// Capture one frame. An incomplete frame is a capture error.
    pub fn capture_single(&mut self) -> gcam::Result<FrameBuffer> {
        let started_here = !self.acquisition_active;
        if started_here {
            self.configure_acquisition(AcquisitionMode::SingleFrame, BufferPolicy::NewestOnly);
            self.start_acquisition()?;
        }
        let result = self.cam_mut()?.next_frame(None);
        self.finish_capture(started_here, result)
    }

    /// Capture the first frame whose exposure began at or after `trigger`
    /// fired, while streaming continuously.
    ///
    /// The trigger gates this sequencer's pulls, not the device's per-frame
    /// exposure start, so the frame in flight when the flag becomes visible
    /// may have begun exposing before the signal. That frame is pulled and
    /// discarded; the next one is the result.
    pub fn capture_on_trigger(&mut self, trigger: &TriggerFlag) -> gcam::Result<FrameBuffer> {
        let started_here = !self.acquisition_active;
        if started_here {
            self.configure_acquisition(AcquisitionMode::Continuous, BufferPolicy::NewestOnly);
            self.start_acquisition()?;
        }
        let result = self.pull_after_trigger(trigger);
        self.finish_capture(started_here, result)
    }

    fn pull_after_trigger(&mut self, trigger: &TriggerFlag) -> gcam::Result<FrameBuffer> {
        trigger.wait();

        // The frame whose exposure straddles the trigger instant. An
        // incomplete discard does not abort the sequence.
        match self.cam_mut()?.next_frame(None) {
            Ok(frame) => debug!("discarded in-flight frame {}", frame.frame_id),
            Err(Error::IncompleteFrame(msg)) => {
                warn!("discarded in-flight frame was incomplete: {msg}")
            }
            Err(e) => return Err(e),
        }

        // The first frame guaranteed to start exposing after the trigger.
        match self.cam_mut()?.next_frame(None) {
            Ok(frame) => Ok(frame),
            Err(Error::IncompleteFrame(msg)) => {
                error!("post-trigger frame incomplete, capture failed: {msg}");
                Err(Error::IncompleteFrame(msg))
            }
            Err(e) => Err(e),
        }
    }

    /// Capture up to `num_frames` frames in order, draining the transport
    /// buffers oldest-first so a slow consumer loses as little as possible.
    ///
    /// A frame that times out or arrives incomplete leaves a gap in the
    /// output instead of failing the collection.
    pub fn collect_frames(
        &mut self,
        num_frames: usize,
        opts: &CollectOptions,
    ) -> gcam::Result<Collection> {
        {
            let cam = self.cam_mut()?;
            // Size the buffer pool by hand so a burst does not overrun the
            // backend's default allocation.
            if let Err(e) = cam.stream_feature_enum_set("StreamBufferCountMode", "Manual") {
                warn!("failed to set manual buffer count mode: {e}");
            }
            if let Err(e) = cam.stream_feature_int_set("StreamBufferCountManual", opts.buffer_count)
            {
                warn!("failed to set buffer count to {}: {e}", opts.buffer_count);
            }
        }

        let started_here = !self.acquisition_active;
        if started_here {
            self.configure_acquisition(AcquisitionMode::Continuous, BufferPolicy::OldestFirst);
            self.start_acquisition()?;
        }

        let mut frames = Vec::with_capacity(num_frames);
        let mut fatal = Ok(());
        for i in 1..=num_frames {
            match self.cam_mut()?.next_frame(Some(opts.frame_timeout)) {
                Ok(frame) => {
                    debug!("frame {i}/{num_frames} complete");
                    frames.push(frame);
                }
                Err(Error::IncompleteFrame(msg)) => {
                    warn!("frame {i}/{num_frames} incomplete, skipping: {msg}")
                }
                Err(Error::Timeout) => warn!("frame {i}/{num_frames} timed out, skipping"),
                Err(e) => {
                    fatal = Err(e);
                    break;
                }
            }
        }

        let lost_count = match self.cam_mut()?.stream_feature_int("StreamLostFrameCount") {
            Ok(count) => count,
            Err(e) => {
                warn!("could not read lost frame count: {e}");
                0
            }
        };

        let fatal = self.finish_capture(started_here, fatal);
        fatal?;
        info!(
            "collected {}/{} frames, device reports {} lost",
            frames.len(),
            num_frames,
            lost_count
        );
        Ok(Collection {
            frames,
            requested: num_frames,
            lost_count,
        })
    }
}

impl<C: Camera> Drop for CameraSession<C> {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

/// Run the trigger-gated sequencer for every session on its own thread.
///
/// All threads observe the same flag but pull frames independently, so
/// cross-camera frame alignment is best-effort, bounded by each camera's own
/// exposure and transfer latency.
pub fn capture_all_on_trigger<C: Camera>(
    sessions: &mut [CameraSession<C>],
    trigger: &TriggerFlag,
) -> Vec<gcam::Result<FrameBuffer>> {
    std::thread::scope(|scope| {
        let handles: Vec<_> = sessions
            .iter_mut()
            .map(|session| scope.spawn(move || session.capture_on_trigger(trigger)))
            .collect();
        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|_| Err(Error::from("capture thread panicked")))
            })
            .collect()
    })
}

/// Run the burst collector for every session on its own thread, as when
/// several cameras record in parallel.
pub fn collect_all_frames<C: Camera>(
    sessions: &mut [CameraSession<C>],
    num_frames: usize,
    opts: &CollectOptions,
) -> Vec<gcam::Result<Collection>> {
    std::thread::scope(|scope| {
        let handles: Vec<_> = sessions
            .iter_mut()
            .map(|session| scope.spawn(move || session.collect_frames(num_frames, opts)))
            .collect();
        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|_| Err(Error::from("capture thread panicked")))
            })
            .collect()
    })
}
