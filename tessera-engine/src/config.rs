//! Engine, display and touch configuration
//!
//! Everything here deserializes from TOML. Omitted fields take the
//! defaults below, so a minimal file only names the panel:
//!
//! ```toml
//! [engine]
//! fps = 30
//!
//! [[display]]
//! h_res = 320
//! v_res = 240
//! buffers = { buf_pixels = 6400 }
//! flags = { double_buffer = true }
//!
//! [touch]
//! use_interrupt = true
//! ```

use serde::Deserialize;
use tessera_core::{DisplayFlags, Error};

/// Configuration load or validation failure
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("config parse error: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(&'static str),
}

impl From<ConfigError> for Error {
    fn from(_: ConfigError) -> Self {
        Error::InvalidArg
    }
}

/// Render thread placement
///
/// Priority, core affinity and stack capabilities only mean something on an
/// RTOS; on hosted targets they are logged and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    pub priority: u8,
    pub stack_size: usize,
    /// Core to pin to, -1 for any
    pub affinity: i32,
    pub stack_caps: u32,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            priority: 4,
            stack_size: 7168,
            affinity: -1,
            stack_caps: 0,
        }
    }
}

/// Graphics context settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Target frame rate, also the default animation rate
    pub fps: u32,
    /// Scheduler tick rate the idle delay is rounded to
    pub tick_hz: u32,
    /// Longest wait for a flush acknowledgement
    pub flush_timeout_ms: u32,
    pub task: TaskConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fps: 30,
            tick_hz: 100,
            flush_timeout_ms: 20,
            task: TaskConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: Self = toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fps == 0 {
            return Err(ConfigError::Invalid("fps must be positive"));
        }
        if self.tick_hz == 0 || self.tick_hz > 1000 {
            return Err(ConfigError::Invalid("tick_hz must be within 1..=1000"));
        }
        if self.flush_timeout_ms == 0 {
            return Err(ConfigError::Invalid("flush_timeout_ms must be positive"));
        }
        if self.task.stack_size == 0 {
            return Err(ConfigError::Invalid("task stack_size must be positive"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct BufferConfig {
    /// Pixels per frame buffer; a dirty rect is flushed in bands of
    /// `buf_pixels / width` rows
    pub buf_pixels: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct DisplayConfig {
    pub h_res: u32,
    pub v_res: u32,
    #[serde(default)]
    pub flags: DisplayFlags,
    pub buffers: BufferConfig,
}

impl DisplayConfig {
    pub fn new(h_res: u32, v_res: u32, buf_pixels: usize) -> Self {
        Self {
            h_res,
            v_res,
            flags: DisplayFlags::default(),
            buffers: BufferConfig { buf_pixels },
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.h_res == 0 || self.v_res == 0 {
            return Err(ConfigError::Invalid("display resolution must be non-zero"));
        }
        if self.buffers.buf_pixels == 0 {
            return Err(ConfigError::Invalid("buf_pixels must be positive"));
        }
        if self.flags.buff_dma && self.flags.buff_spiram {
            return Err(ConfigError::Invalid("buff_dma and buff_spiram are exclusive"));
        }
        Ok(())
    }
}

/// Where a display's frame buffers come from
#[derive(Debug, Default)]
pub enum DisplayBuffers {
    /// Allocated by the engine
    #[default]
    Internal,
    /// Provided by the caller and handed back when the display is deleted
    External { buf1: Vec<u16>, buf2: Option<Vec<u16>> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct TouchConfig {
    /// Poll period, 0 picks the default for the mode
    pub poll_ms: u32,
    /// Gate reads on the controller's interrupt line
    pub use_interrupt: bool,
}

/// A complete TOML configuration file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub engine: EngineConfig,
    pub display: Vec<DisplayConfig>,
    pub touch: Option<TouchConfig>,
}

impl Settings {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let settings: Self = toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine.validate()?;
        for d in &self.display {
            d.validate()?;
        }
        Ok(())
    }
}
