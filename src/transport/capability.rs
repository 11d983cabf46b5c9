use serde::{Deserialize, Serialize};

/// Version information about the host platform.
pub trait PlatformInfo: Send + Sync {
    /// Platform API level.
    fn sdk_version(&self) -> u32;

    /// Version of the platform extension introduced at `sdk` level, or 0 if
    /// the extension is not installed.
    fn extension_version(&self, sdk: u32) -> u32;
}

impl<P: PlatformInfo + ?Sized> PlatformInfo for Box<P> {
    fn sdk_version(&self) -> u32 {
        (**self).sdk_version()
    }

    fn extension_version(&self, sdk: u32) -> u32 {
        (**self).extension_version(sdk)
    }
}

/// Fixed platform description, used by hosts that know their level up
/// front and by tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticPlatform {
    pub sdk: u32,
    pub extension: u32,
}

impl StaticPlatform {
    pub fn new(sdk: u32, extension: u32) -> Self {
        Self { sdk, extension }
    }
}

impl Default for StaticPlatform {
    /// A current platform where the engine ships natively.
    fn default() -> Self {
        Self {
            sdk: CapabilityPolicy::DEFAULT_NATIVE_MIN_SDK,
            extension: 0,
        }
    }
}

impl PlatformInfo for StaticPlatform {
    fn sdk_version(&self) -> u32 {
        self.sdk
    }

    fn extension_version(&self, _sdk: u32) -> u32 {
        self.extension
    }
}

/// Thresholds deciding whether the modern engine can be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapabilityPolicy {
    /// Platform level where the engine is built in.
    pub native_min_sdk: u32,
    /// Oldest level that can receive the engine through an extension update.
    pub backport_min_sdk: u32,
    /// Extension version carrying the engine on a backport level.
    pub backport_extension_min: u32,
}

impl CapabilityPolicy {
    pub const DEFAULT_NATIVE_MIN_SDK: u32 = 34;
    pub const DEFAULT_BACKPORT_MIN_SDK: u32 = 31;
    pub const DEFAULT_BACKPORT_EXTENSION_MIN: u32 = 7;

    pub fn native_min_sdk(mut self, sdk: u32) -> Self {
        self.native_min_sdk = sdk;
        self
    }

    pub fn backport_min_sdk(mut self, sdk: u32) -> Self {
        self.backport_min_sdk = sdk;
        self
    }

    pub fn backport_extension_min(mut self, version: u32) -> Self {
        self.backport_extension_min = version;
        self
    }

    /// Either branch alone is enough.
    pub fn is_modern_available(&self, platform: &dyn PlatformInfo) -> bool {
        let sdk = platform.sdk_version();
        let native = sdk >= self.native_min_sdk;
        let backport = sdk >= self.backport_min_sdk
            && platform.extension_version(self.backport_min_sdk) >= self.backport_extension_min;
        native || backport
    }
}

impl Default for CapabilityPolicy {
    fn default() -> Self {
        Self {
            native_min_sdk: Self::DEFAULT_NATIVE_MIN_SDK,
            backport_min_sdk: Self::DEFAULT_BACKPORT_MIN_SDK,
            backport_extension_min: Self::DEFAULT_BACKPORT_EXTENSION_MIN,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_level_is_enough() {
        let policy = CapabilityPolicy::default();
        assert!(policy.is_modern_available(&StaticPlatform::new(34, 0)));
        assert!(policy.is_modern_available(&StaticPlatform::new(35, 0)));
    }

    #[test]
    fn test_backport_needs_extension() {
        let policy = CapabilityPolicy::default();
        assert!(policy.is_modern_available(&StaticPlatform::new(31, 7)));
        assert!(policy.is_modern_available(&StaticPlatform::new(33, 9)));
        assert!(!policy.is_modern_available(&StaticPlatform::new(31, 6)));
        assert!(!policy.is_modern_available(&StaticPlatform::new(33, 0)));
    }

    #[test]
    fn test_below_both_thresholds() {
        let policy = CapabilityPolicy::default();
        assert!(!policy.is_modern_available(&StaticPlatform::new(30, 99)));
        assert!(!policy.is_modern_available(&StaticPlatform::new(21, 0)));
    }

    #[test]
    fn test_extension_queried_at_backport_level() {
        struct Probe;
        impl PlatformInfo for Probe {
            fn sdk_version(&self) -> u32 {
                32
            }
            fn extension_version(&self, sdk: u32) -> u32 {
                if sdk == 31 {
                    7
                } else {
                    0
                }
            }
        }
        assert!(CapabilityPolicy::default().is_modern_available(&Probe));
    }

    #[test]
    fn test_policy_from_partial_json() {
        let policy: CapabilityPolicy = serde_json::from_str(r#"{"native_min_sdk": 40}"#).unwrap();
        assert_eq!(policy.native_min_sdk, 40);
        assert_eq!(policy.backport_min_sdk, 31);
        assert_eq!(policy.backport_extension_min, 7);
    }
}
