//! Reference interface to GenICam-style machine vision cameras.
//!
//! The traits here are the stable boundary between the capture layer and a
//! vendor acquisition engine: a backend exposes its node map through the
//! weakly typed feature accessors and its transport through the blocking
//! frame pull. Everything above this boundary is backend-agnostic.

use std::time::Duration;

use owned_frame::FrameBuffer;

// ---------------------------
// errors

pub type Result<M> = std::result::Result<M, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The session was shut down; the handle is permanently invalid.
    #[error("camera session closed")]
    CameraClosed,
    #[error("camera not found: {name}")]
    CameraNotFound { name: String },
    #[error("timeout waiting for frame")]
    Timeout,
    /// The device flagged the frame as having missing or corrupted data.
    #[error("incomplete frame: {0}")]
    IncompleteFrame(String),
    #[error("feature not present: {0}")]
    FeatureNotPresent(String),
    #[error("feature not writable: {0}")]
    FeatureNotWritable(String),
    #[error("GcamError({msg})")]
    GcamError { msg: String },
    #[error("BackendError({0})")]
    BackendError(#[from] anyhow::Error),
    #[error("io error: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },
    #[error("try from int error: {source}")]
    TryFromIntError {
        #[from]
        source: std::num::TryFromIntError,
    },
}

fn _test_error_is_send() {
    // Compile-time test to ensure Error implements Send trait.
    fn implements<T: Send>() {}
    implements::<Error>();
}

impl<'a> From<&'a str> for Error {
    fn from(orig: &'a str) -> Error {
        Error::GcamError {
            msg: orig.to_string(),
        }
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Error {
        Error::GcamError { msg }
    }
}

// ---------------------------
// CameraModule

/// A module for opening cameras (one per acquisition backend).
pub trait CameraModule: Send {
    type CameraType: Camera;

    fn name(&self) -> &str;
    fn camera_infos(&self) -> Result<Vec<Box<dyn CameraInfo>>>;
    fn camera(&mut self, name: &str) -> Result<Self::CameraType>;
}

// ---------------------------
// CameraInfo

pub trait CameraInfo {
    fn name(&self) -> &str;
    fn serial(&self) -> &str;
    fn model(&self) -> &str;
    fn vendor(&self) -> &str;
}

// ---------------------------
// Camera

pub trait Camera: CameraInfo + Send {
    // ----- node map access -----

    fn feature_float(&self, name: &str) -> Result<f64>;
    /// The `(min, max)` range currently reported for a float feature.
    fn feature_float_range(&self, name: &str) -> Result<(f64, f64)>;
    fn feature_float_set(&mut self, name: &str, value: f64) -> Result<()>;
    fn feature_int(&self, name: &str) -> Result<i64>;
    /// The `(min, max)` range currently reported for an integer feature.
    fn feature_int_range(&self, name: &str) -> Result<(i64, i64)>;
    fn feature_int_set(&mut self, name: &str, value: i64) -> Result<()>;
    fn feature_bool(&self, name: &str) -> Result<bool>;
    fn feature_bool_set(&mut self, name: &str, value: bool) -> Result<()>;
    fn feature_enum(&self, name: &str) -> Result<String>;
    fn feature_enum_set(&mut self, name: &str, value: &str) -> Result<()>;
    fn feature_is_writable(&self, name: &str) -> Result<bool>;

    // ----- transport-layer stream node map -----

    fn stream_feature_int(&self, name: &str) -> Result<i64>;
    fn stream_feature_int_set(&mut self, name: &str, value: i64) -> Result<()>;
    fn stream_feature_enum_set(&mut self, name: &str, value: &str) -> Result<()>;

    // ----- acquisition -----

    fn acquisition_start(&mut self) -> Result<()>;
    fn acquisition_stop(&mut self) -> Result<()>;

    /// Synchronous (blocking) frame acquisition.
    ///
    /// With a timeout, waits at most that long and returns [Error::Timeout].
    /// A frame the device marks as damaged is returned as
    /// [Error::IncompleteFrame].
    fn next_frame(&mut self, timeout: Option<Duration>) -> Result<FrameBuffer>;
}
