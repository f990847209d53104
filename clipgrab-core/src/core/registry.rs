use serde::Serialize;

use crate::platforms::{builtin_descriptors, PlatformDescriptor};

pub const OTHER_KEY: &str = "other";
pub const OTHER_NAME: &str = "Other platform";
pub const UNKNOWN_KEY: &str = "unknown";
pub const UNKNOWN_NAME: &str = "Unknown platform";

/// Read-only platform table, built once at startup and shared by reference.
pub struct PlatformRegistry {
    platforms: Vec<PlatformDescriptor>,
}

/// Outcome of classifying a URL.
#[derive(Debug, Clone, Copy)]
pub enum Detection<'a> {
    Platform(&'a PlatformDescriptor),
    /// Non-empty input no descriptor claimed; generic extraction may still work.
    Other,
    /// Empty input. Terminal for the caller.
    Unknown,
}

impl<'a> Detection<'a> {
    pub fn key(&self) -> &'static str {
        match self {
            Detection::Platform(d) => d.key,
            Detection::Other => OTHER_KEY,
            Detection::Unknown => UNKNOWN_KEY,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Detection::Platform(d) => d.name,
            Detection::Other => OTHER_NAME,
            Detection::Unknown => UNKNOWN_NAME,
        }
    }

    pub fn descriptor(&self) -> Option<&'a PlatformDescriptor> {
        match self {
            Detection::Platform(d) => Some(*d),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlatformSummary {
    pub key: &'static str,
    pub name: &'static str,
    pub icon: &'static str,
}

impl PlatformRegistry {
    pub fn new(platforms: Vec<PlatformDescriptor>) -> Self {
        Self { platforms }
    }

    pub fn builtin() -> Self {
        Self::new(builtin_descriptors())
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlatformDescriptor> {
        self.platforms.iter()
    }

    pub fn get(&self, key: &str) -> Option<&PlatformDescriptor> {
        self.platforms.iter().find(|p| p.key == key)
    }

    pub fn detect(&self, url: &str) -> Detection<'_> {
        let lowered = url.trim().to_lowercase();
        if lowered.is_empty() {
            return Detection::Unknown;
        }
        self.platforms
            .iter()
            .find(|p| p.matches_host(&lowered))
            .map(Detection::Platform)
            .unwrap_or(Detection::Other)
    }

    pub fn supported(&self) -> Vec<PlatformSummary> {
        self.platforms
            .iter()
            .map(|p| PlatformSummary {
                key: p.key,
                name: p.name,
                icon: p.icon,
            })
            .collect()
    }
}

impl Default for PlatformRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
