//! Registry mapping profile identifiers to device profiles.

use std::sync::{Arc, LazyLock, RwLock};

use indexmap::IndexMap;

use super::definition::DeviceProfile;
use super::vendors;
use crate::error::ProfileError;

/// Global profile registry, pre-populated with the built-in profiles.
static REGISTRY: LazyLock<RwLock<ProfileRegistry>> = LazyLock::new(|| {
    let mut registry = ProfileRegistry::new();
    registry.register_builtin_profiles();
    RwLock::new(registry)
});

/// Registry for device profiles.
///
/// Profiles are validated on registration and shared as `Arc`s, so every
/// session built from the same entry sees the same immutable value.
#[derive(Debug, Default)]
pub struct ProfileRegistry {
    profiles: IndexMap<String, Arc<DeviceProfile>>,
}

impl ProfileRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the global registry.
    pub fn global() -> &'static RwLock<ProfileRegistry> {
        &REGISTRY
    }

    /// Look up a profile in the global registry.
    pub fn lookup(name: &str) -> Result<Arc<DeviceProfile>, ProfileError> {
        let registry = REGISTRY
            .read()
            .map_err(|_| ProfileError::InvalidDefinition {
                message: "profile registry lock poisoned".to_string(),
            })?;
        registry
            .get(name)
            .ok_or_else(|| ProfileError::UnknownProfile {
                name: name.to_string(),
            })
    }

    fn register_builtin_profiles(&mut self) {
        for profile in [
            vendors::adtran::profile(),
            vendors::audiocodes::profile(),
            vendors::audiocodes::profile_66(),
            vendors::cisco_asa::profile(),
        ] {
            self.profiles
                .insert(profile.name.clone(), Arc::new(profile));
        }
    }

    /// Register a profile. Fails if the name is taken or the profile is
    /// invalid.
    pub fn register(&mut self, profile: DeviceProfile) -> Result<(), ProfileError> {
        if self.profiles.contains_key(&profile.name) {
            return Err(ProfileError::AlreadyRegistered {
                name: profile.name.clone(),
            });
        }
        profile.validate()?;
        self.profiles.insert(profile.name.clone(), Arc::new(profile));
        Ok(())
    }

    /// Get a profile by name.
    pub fn get(&self, name: &str) -> Option<Arc<DeviceProfile>> {
        self.profiles.get(name).cloned()
    }

    /// Check if a profile is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.profiles.contains_key(name)
    }

    /// List registered names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.profiles.keys()
    }
}
