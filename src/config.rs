//! Bridge configuration.

use hostbridge_core::NativeFn;
use hostbridge_registry::{COMMON_CLASS, CONST_PREFIX};

use crate::Bridge;

/// Builder for [`Bridge`] settings.
///
/// ```
/// use hostbridge::BridgeConfig;
///
/// let bridge = BridgeConfig::new()
///     .with_library_module(None::<&str>)
///     .collect_on_ownership_change(false)
///     .build();
/// assert!(bridge.config().library_module.is_none());
/// ```
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Run a collection cycle before taking or releasing ownership, so a
    /// pending handle whose address was reused is finalized first.
    pub collect_on_ownership_change: bool,
    /// Collector for owned objects whose type registered none.
    ///
    /// The bridge only sees opaque addresses and cannot free them itself.
    /// When neither the type nor this field supplies a collector, finalizing
    /// an owned object logs a warning, drops its ledger entry and leaks the
    /// native object. Bindings that hand ownership to scripts should register
    /// a collector per type or set this one.
    pub default_collector: Option<NativeFn>,
    /// Prefix of const shadow type names.
    pub const_prefix: String,
    /// Name of the root class of every declared inheritance chain.
    pub common_class: String,
    /// Module the built-in library is installed under; `None` skips it.
    pub library_module: Option<String>,
}

impl BridgeConfig {
    pub fn new() -> Self {
        Self {
            collect_on_ownership_change: true,
            default_collector: None,
            const_prefix: CONST_PREFIX.to_string(),
            common_class: COMMON_CLASS.to_string(),
            library_module: Some("hostbridge".to_string()),
        }
    }

    pub fn collect_on_ownership_change(mut self, enabled: bool) -> Self {
        self.collect_on_ownership_change = enabled;
        self
    }

    pub fn with_default_collector(mut self, collector: NativeFn) -> Self {
        self.default_collector = Some(collector);
        self
    }

    pub fn with_const_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.const_prefix = prefix.into();
        self
    }

    pub fn with_common_class<S: Into<String>>(mut self, name: S) -> Self {
        self.common_class = name.into();
        self
    }

    pub fn with_library_module<S: Into<String>>(mut self, name: Option<S>) -> Self {
        self.library_module = name.map(Into::into);
        self
    }

    pub fn build(self) -> Bridge {
        Bridge::with_config(self)
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self::new()
    }
}
