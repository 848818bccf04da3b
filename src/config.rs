//! Runtime configuration for an [`EngineConfig`].
//!
//! Mirrors the handful of compile-time constants the reference protocol
//! recognizes (`MaxOwnNodes`, `ObjectDataSize`, `FileTimeout`,
//! `ParamQueueSize`) as validated, runtime-checked construction parameters
//! rather than preprocessor macros.

/// Validation failure building an [`EngineConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// `object_data_size` must be at least 16 bytes (room for the largest
    /// fixed header plus at least a few payload bytes).
    ObjectDataSizeTooSmall(u16),
    /// `max_own_nodes` and `param_queue_size` must be non-zero.
    ZeroCapacity(&'static str),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ObjectDataSizeTooSmall(got) => {
                write!(f, "object_data_size must be >= 16, got {got}")
            }
            ConfigError::ZeroCapacity(field) => write!(f, "{field} must be non-zero"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Frozen configuration for one engine instance.
///
/// Built incrementally via [`EngineConfigBuilder`] and validated once, the
/// way the teacher crate accumulates mount options before finalizing a
/// kernel configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    max_own_nodes: u16,
    object_data_size: u16,
    file_timeout_ms: u32,
    param_queue_size: u16,
}

impl EngineConfig {
    /// Starts building a config with the reference defaults
    /// (`FileTimeout = 500`ms, everything else must be supplied).
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Maximum number of local nodes this engine instance services.
    pub fn max_own_nodes(&self) -> u16 {
        self.max_own_nodes
    }

    /// Size, in bytes, of the largest record the transport can carry in one
    /// message (`ObjectDataSize` in the wire-layer vocabulary).
    pub fn object_data_size(&self) -> u16 {
        self.object_data_size
    }

    /// Per-attempt timeout, in milliseconds, for the synchronous
    /// request/ack primitive and for each read/write chunk.
    pub fn file_timeout_ms(&self) -> u32 {
        self.file_timeout_ms
    }

    /// Depth of the bounded asynchronous parameter-request queue.
    pub fn param_queue_size(&self) -> u16 {
        self.param_queue_size
    }
}

/// Builder for [`EngineConfig`].
#[derive(Debug, Clone)]
pub struct EngineConfigBuilder {
    max_own_nodes: u16,
    object_data_size: u16,
    file_timeout_ms: u32,
    param_queue_size: u16,
}

impl Default for EngineConfigBuilder {
    fn default() -> Self {
        EngineConfigBuilder {
            max_own_nodes: 1,
            object_data_size: 64,
            file_timeout_ms: 500,
            param_queue_size: 8,
        }
    }
}

impl EngineConfigBuilder {
    /// Sets the number of local nodes this engine instance services.
    pub fn max_own_nodes(mut self, n: u16) -> Self {
        self.max_own_nodes = n;
        self
    }

    /// Sets the largest record size the transport can carry.
    pub fn object_data_size(mut self, n: u16) -> Self {
        self.object_data_size = n;
        self
    }

    /// Sets the per-attempt timeout for synchronous operations.
    pub fn file_timeout_ms(mut self, ms: u32) -> Self {
        self.file_timeout_ms = ms;
        self
    }

    /// Sets the depth of the asynchronous parameter-request queue.
    pub fn param_queue_size(mut self, n: u16) -> Self {
        self.param_queue_size = n;
        self
    }

    /// Validates and freezes the configuration.
    pub fn build(self) -> Result<EngineConfig, ConfigError> {
        if self.object_data_size < 16 {
            return Err(ConfigError::ObjectDataSizeTooSmall(self.object_data_size));
        }
        if self.max_own_nodes == 0 {
            return Err(ConfigError::ZeroCapacity("max_own_nodes"));
        }
        if self.param_queue_size == 0 {
            return Err(ConfigError::ZeroCapacity("param_queue_size"));
        }
        Ok(EngineConfig {
            max_own_nodes: self.max_own_nodes,
            object_data_size: self.object_data_size,
            file_timeout_ms: self.file_timeout_ms,
            param_queue_size: self.param_queue_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_build_successfully() {
        let cfg = EngineConfig::builder().build().unwrap();
        assert_eq!(cfg.file_timeout_ms(), 500);
        assert_eq!(cfg.object_data_size(), 64);
    }

    #[test]
    fn rejects_too_small_object_data_size() {
        let err = EngineConfig::builder()
            .object_data_size(8)
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::ObjectDataSizeTooSmall(8));
    }

    #[test]
    fn rejects_zero_capacity() {
        let err = EngineConfig::builder()
            .param_queue_size(0)
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::ZeroCapacity("param_queue_size"));
    }
}
