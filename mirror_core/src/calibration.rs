//! The "CALIBRATION" Store - installation parameters for the mirror rig
//!
//! Seven scalars describe where the sensor and the display physically sit.
//! Five are fixed at install time; the two fine offsets can be nudged live
//! from the debug overlay and are written back to storage immediately.
//!
//! Storage is pluggable:
//! - [`JsonFileStorage`]: a human-editable settings file
//! - [`SledCalibrationStorage`]: an embedded key-value database

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

// ============================================================================
// KEYS
// ============================================================================

/// Storage keys for the seven calibration parameters.
pub mod keys {
    pub const SENSOR_POS_X: &str = "MB_SENSOR_POS_X";
    pub const SENSOR_POS_Z: &str = "MB_SENSOR_POS_Z";
    pub const MIRROR_POS_Y: &str = "MB_MIRROR_POS_Y";
    pub const MIRROR_WIDTH: &str = "MB_MIRROR_WIDTH";
    pub const MIRROR_HEIGHT: &str = "MB_MIRROR_HEIGHT";
    pub const OFFSET_X: &str = "MB_OFFSET_X";
    pub const OFFSET_Y: &str = "MB_OFFSET_Y";

    /// All keys, in parameter order.
    pub const ALL: [&str; 7] = [
        SENSOR_POS_X,
        SENSOR_POS_Z,
        MIRROR_POS_Y,
        MIRROR_WIDTH,
        MIRROR_HEIGHT,
        OFFSET_X,
        OFFSET_Y,
    ];
}

/// Fine offsets are persisted with millimetre precision.
const OFFSET_DECIMALS: f64 = 1000.0;

/// Snaps a fine offset onto the persisted millimetre grid.
pub fn round_offset(value: f64) -> f64 {
    (value * OFFSET_DECIMALS).round() / OFFSET_DECIMALS
}

// ============================================================================
// ERRORS
// ============================================================================

/// Calibration loading and persistence errors.
///
/// Any of these at startup is fatal: the mirror cannot be placed without
/// its installation parameters.
#[derive(Debug, Error)]
pub enum CalibrationError {
    #[error("Failed to access calibration file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed calibration data: {0}")]
    Parse(String),

    #[error("Missing calibration key: {0}")]
    MissingKey(&'static str),

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },

    #[error("Storage error: {0}")]
    Storage(String),
}

// ============================================================================
// PARAMETERS
// ============================================================================

/// The seven installation parameters, in metres.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationParameters {
    /// Sensor lateral position relative to the mirror center
    pub sensor_position_x: f64,

    /// Sensor depth position relative to the mirror plane
    pub sensor_position_z: f64,

    /// Height of the mirror's bottom edge above the floor
    pub mirror_position_y: f64,

    pub mirror_width: f64,
    pub mirror_height: f64,

    /// Live correction added to the sensor X position
    pub fine_offset_x: f64,

    /// Live correction added to the sensor height
    pub fine_offset_y: f64,
}

impl CalibrationParameters {
    /// Builds parameters by looking every key up, then validates them.
    fn from_lookup<F>(mut lookup: F) -> Result<Self, CalibrationError>
    where
        F: FnMut(&'static str) -> Result<f64, CalibrationError>,
    {
        let params = Self {
            sensor_position_x: lookup(keys::SENSOR_POS_X)?,
            sensor_position_z: lookup(keys::SENSOR_POS_Z)?,
            mirror_position_y: lookup(keys::MIRROR_POS_Y)?,
            mirror_width: lookup(keys::MIRROR_WIDTH)?,
            mirror_height: lookup(keys::MIRROR_HEIGHT)?,
            fine_offset_x: lookup(keys::OFFSET_X)?,
            fine_offset_y: lookup(keys::OFFSET_Y)?,
        };
        params.validate()?;
        Ok(params)
    }

    /// `(key, value)` pairs in storage order.
    pub fn entries(&self) -> [(&'static str, f64); 7] {
        [
            (keys::SENSOR_POS_X, self.sensor_position_x),
            (keys::SENSOR_POS_Z, self.sensor_position_z),
            (keys::MIRROR_POS_Y, self.mirror_position_y),
            (keys::MIRROR_WIDTH, self.mirror_width),
            (keys::MIRROR_HEIGHT, self.mirror_height),
            (keys::OFFSET_X, self.fine_offset_x),
            (keys::OFFSET_Y, self.fine_offset_y),
        ]
    }

    /// Checks that every value is finite and the mirror size is non-negative.
    pub fn validate(&self) -> Result<(), CalibrationError> {
        for (key, value) in self.entries() {
            if !value.is_finite() {
                return Err(CalibrationError::InvalidValue {
                    key,
                    reason: format!("{} is not finite", value),
                });
            }
        }
        for (key, value) in [
            (keys::MIRROR_WIDTH, self.mirror_width),
            (keys::MIRROR_HEIGHT, self.mirror_height),
        ] {
            if value < 0.0 {
                return Err(CalibrationError::InvalidValue {
                    key,
                    reason: format!("mirror size must be >= 0, got {}", value),
                });
            }
        }
        Ok(())
    }
}

// ============================================================================
// STORAGE
// ============================================================================

/// Persistent backing for calibration parameters.
pub trait CalibrationStorage {
    /// Reads all seven parameters.
    fn load(&self) -> Result<CalibrationParameters, CalibrationError>;

    /// Rewrites only the two fine offsets, leaving everything else in place.
    fn write_fine_offsets(&mut self, offset_x: f64, offset_y: f64) -> Result<(), CalibrationError>;
}

/// JSON settings file: one top-level object keyed by [`keys`].
///
/// Values may be numbers or numeric strings.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    /// Points at an existing settings file. Nothing is read until `load`.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Writes a fresh settings file containing `params`.
    pub fn create<P: AsRef<Path>>(path: P, params: &CalibrationParameters) -> Result<Self, CalibrationError> {
        params.validate()?;
        let storage = Self::new(path);
        let mut document = Map::new();
        for (key, value) in params.entries() {
            document.insert(key.to_string(), json_number(key, value)?);
        }
        storage.write_document(document)?;
        Ok(storage)
    }

    /// Path of the settings file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> CalibrationError {
        CalibrationError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }

    fn read_document(&self) -> Result<Map<String, Value>, CalibrationError> {
        let text = fs::read_to_string(&self.path).map_err(|e| self.io_error(e))?;
        let root: Value = serde_json::from_str(&text)
            .map_err(|e| CalibrationError::Parse(format!("{}: {}", self.path.display(), e)))?;
        match root {
            Value::Object(map) => Ok(map),
            _ => Err(CalibrationError::Parse(format!(
                "{}: settings root must be an object",
                self.path.display()
            ))),
        }
    }

    fn write_document(&self, document: Map<String, Value>) -> Result<(), CalibrationError> {
        let text = serde_json::to_string_pretty(&Value::Object(document))
            .map_err(|e| CalibrationError::Parse(e.to_string()))?;
        fs::write(&self.path, text).map_err(|e| self.io_error(e))
    }
}

impl CalibrationStorage for JsonFileStorage {
    fn load(&self) -> Result<CalibrationParameters, CalibrationError> {
        let document = self.read_document()?;
        CalibrationParameters::from_lookup(|key| match document.get(key) {
            Some(value) => parse_value(key, value),
            None => Err(CalibrationError::MissingKey(key)),
        })
    }

    fn write_fine_offsets(&mut self, offset_x: f64, offset_y: f64) -> Result<(), CalibrationError> {
        let mut document = self.read_document()?;
        document.insert(keys::OFFSET_X.to_string(), json_number(keys::OFFSET_X, offset_x)?);
        document.insert(keys::OFFSET_Y.to_string(), json_number(keys::OFFSET_Y, offset_y)?);
        self.write_document(document)
    }
}

fn parse_value(key: &'static str, value: &Value) -> Result<f64, CalibrationError> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| CalibrationError::InvalidValue {
        key,
        reason: format!("expected a number, got {}", value),
    })
}

fn checked_offset(key: &'static str, value: f64) -> Result<f64, CalibrationError> {
    if value.is_finite() {
        Ok(round_offset(value))
    } else {
        Err(CalibrationError::InvalidValue {
            key,
            reason: format!("{} is not finite", value),
        })
    }
}

fn json_number(key: &'static str, value: f64) -> Result<Value, CalibrationError> {
    Number::from_f64(value)
        .map(Value::Number)
        .ok_or_else(|| CalibrationError::InvalidValue {
            key,
            reason: format!("{} cannot be stored", value),
        })
}

/// Sled-based calibration storage.
///
/// Each key maps to a big-endian `f64`.
pub struct SledCalibrationStorage {
    db: sled::Db,
}

impl SledCalibrationStorage {
    /// Open a persistent store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CalibrationError> {
        let db = sled::open(path)
            .map_err(|e| CalibrationError::Storage(format!("Failed to open sled DB: {}", e)))?;
        Ok(Self { db })
    }

    /// Create a temporary store, removed when dropped
    pub fn open_temp() -> Result<Self, CalibrationError> {
        let config = sled::Config::new().temporary(true);
        let db = config
            .open()
            .map_err(|e| CalibrationError::Storage(format!("Failed to open temp DB: {}", e)))?;
        Ok(Self { db })
    }

    /// Writes all seven parameters, replacing whatever was stored.
    pub fn seed(&self, params: &CalibrationParameters) -> Result<(), CalibrationError> {
        params.validate()?;
        for (key, value) in params.entries() {
            self.insert(key, value)?;
        }
        self.flush()
    }

    fn insert(&self, key: &str, value: f64) -> Result<(), CalibrationError> {
        self.db
            .insert(key, value.to_be_bytes().to_vec())
            .map_err(|e| CalibrationError::Storage(format!("Insert {} failed: {}", key, e)))?;
        Ok(())
    }

    fn flush(&self) -> Result<(), CalibrationError> {
        self.db
            .flush()
            .map_err(|e| CalibrationError::Storage(format!("Flush failed: {}", e)))?;
        Ok(())
    }

    fn read(&self, key: &'static str) -> Result<f64, CalibrationError> {
        let raw = self
            .db
            .get(key)
            .map_err(|e| CalibrationError::Storage(format!("Read {} failed: {}", key, e)))?
            .ok_or(CalibrationError::MissingKey(key))?;
        let bytes = <[u8; 8]>::try_from(&raw[..]).map_err(|_| CalibrationError::InvalidValue {
            key,
            reason: format!("expected 8 bytes, got {}", raw.len()),
        })?;
        Ok(f64::from_be_bytes(bytes))
    }
}

impl CalibrationStorage for SledCalibrationStorage {
    fn load(&self) -> Result<CalibrationParameters, CalibrationError> {
        CalibrationParameters::from_lookup(|key| self.read(key))
    }

    fn write_fine_offsets(&mut self, offset_x: f64, offset_y: f64) -> Result<(), CalibrationError> {
        self.insert(keys::OFFSET_X, offset_x)?;
        self.insert(keys::OFFSET_Y, offset_y)?;
        self.flush()
    }
}

// ============================================================================
// CALIBRATION STORE
// ============================================================================

/// In-memory calibration backed by a storage.
///
/// Loaded once at startup. Only the fine offsets change at runtime, and
/// every change is persisted before the setter returns. The in-memory value
/// is updated first, so a failed write still takes effect for the session.
pub struct CalibrationStore<S: CalibrationStorage> {
    storage: S,
    params: CalibrationParameters,
}

impl<S: CalibrationStorage> CalibrationStore<S> {
    /// Loads all parameters from `storage`.
    pub fn load(storage: S) -> Result<Self, CalibrationError> {
        let params = storage.load()?;
        info!(
            "Calibration loaded: sensor=({:.3}, {:.3}) mirror_y={:.3} size={}x{} offset=({:.3}, {:.3})",
            params.sensor_position_x,
            params.sensor_position_z,
            params.mirror_position_y,
            params.mirror_width,
            params.mirror_height,
            params.fine_offset_x,
            params.fine_offset_y,
        );
        Ok(Self { storage, params })
    }

    /// Current parameters.
    #[inline]
    pub fn get(&self) -> CalibrationParameters {
        self.params
    }

    /// Sets the X fine offset and persists it.
    ///
    /// A non-finite value is rejected and leaves the parameters untouched.
    pub fn set_fine_offset_x(&mut self, value: f64) -> Result<(), CalibrationError> {
        self.params.fine_offset_x = checked_offset(keys::OFFSET_X, value)?;
        self.persist()
    }

    /// Sets the Y fine offset and persists it.
    pub fn set_fine_offset_y(&mut self, value: f64) -> Result<(), CalibrationError> {
        self.params.fine_offset_y = checked_offset(keys::OFFSET_Y, value)?;
        self.persist()
    }

    /// Shifts both fine offsets by the given deltas and persists once.
    pub fn nudge_fine_offset(&mut self, dx: f64, dy: f64) -> Result<(), CalibrationError> {
        let x = checked_offset(keys::OFFSET_X, self.params.fine_offset_x + dx)?;
        let y = checked_offset(keys::OFFSET_Y, self.params.fine_offset_y + dy)?;
        self.params.fine_offset_x = x;
        self.params.fine_offset_y = y;
        self.persist()
    }

    /// Re-reads every parameter from storage.
    pub fn reload(&mut self) -> Result<(), CalibrationError> {
        self.params = self.storage.load()?;
        Ok(())
    }

    /// The backing storage.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Consumes the store, returning its storage.
    pub fn into_storage(self) -> S {
        self.storage
    }

    fn persist(&mut self) -> Result<(), CalibrationError> {
        debug!(
            "Persisting fine offset ({:.3}, {:.3})",
            self.params.fine_offset_x, self.params.fine_offset_y
        );
        self.storage
            .write_fine_offsets(self.params.fine_offset_x, self.params.fine_offset_y)
    }
}

// ============================================================================
// TESTS
// ============================================================================
