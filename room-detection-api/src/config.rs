use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
pub const DEFAULT_MODEL_PATH: &str = "maskrcnn_best.onnx";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Requested compute device for inference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DevicePreference {
    /// CUDA when the execution provider is available, otherwise CPU
    #[default]
    Auto,
    Cpu,
    Cuda,
}

impl FromStr for DevicePreference {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "cuda" | "gpu" => Ok(Self::Cuda),
            other => Err(anyhow!("unknown device '{}', expected auto, cpu or cuda", other)),
        }
    }
}

impl fmt::Display for DevicePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda => write!(f, "cuda"),
        }
    }
}

/// Service configuration, read from the environment at startup
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind_addr: SocketAddr,
    /// Exported Mask R-CNN graph; a missing file is not fatal
    pub model_path: PathBuf,
    pub device: DevicePreference,
    /// ONNX Runtime intra-op thread count, runtime default when `None`
    pub intra_threads: Option<usize>,
    /// CORS origins; empty means any origin
    pub allowed_origins: Vec<String>,
    pub max_upload_bytes: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            device: DevicePreference::Auto,
            intra_threads: None,
            allowed_origins: Vec::new(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl ServiceConfig {
    /// Read configuration from process environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// Recognised keys: `BIND_ADDR`, `MODEL_PATH`, `DEVICE`, `INTRA_THREADS`,
    /// `ALLOWED_ORIGINS`, `MAX_UPLOAD_BYTES`. Unset or blank keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(addr) = get("BIND_ADDR") {
            config.bind_addr = addr
                .trim()
                .parse()
                .with_context(|| format!("Invalid BIND_ADDR '{}'", addr))?;
        }

        if let Some(path) = get("MODEL_PATH") {
            config.model_path = PathBuf::from(path.trim());
        }

        if let Some(device) = get("DEVICE") {
            config.device = device.parse().context("Invalid DEVICE")?;
        }

        if let Some(threads) = get("INTRA_THREADS") {
            let threads: usize = threads
                .trim()
                .parse()
                .with_context(|| format!("Invalid INTRA_THREADS '{}'", threads))?;
            if threads == 0 {
                return Err(anyhow!("INTRA_THREADS must be at least 1"));
            }
            config.intra_threads = Some(threads);
        }

        if let Some(origins) = get("ALLOWED_ORIGINS") {
            config.allowed_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Some(limit) = get("MAX_UPLOAD_BYTES") {
            config.max_upload_bytes = limit
                .trim()
                .parse()
                .with_context(|| format!("Invalid MAX_UPLOAD_BYTES '{}'", limit))?;
        }

        Ok(config)
    }
}
