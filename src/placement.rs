//! Placement results: which device hosts which module.
//!
//! The placement algorithm itself is out of scope; the orchestrator only
//! consumes its result. [`ModuleMapping`] is the name-based form a
//! scenario author writes, resolved against the registered devices into
//! a [`Placement`] keyed by device id.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::application::Application;
use crate::device::{DeviceId, FogDevice};
use crate::error::{FogError, FogResult};

// ── Placement ─────────────────────────────────────────────────────────

/// Device id → names of the modules it hosts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    assignments: BTreeMap<DeviceId, Vec<String>>,
}

impl Placement {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place `module` on `device`. Placing the same pair twice is a no-op.
    pub fn assign(&mut self, device: DeviceId, module: &str) -> &mut Self {
        let modules = self.assignments.entry(device).or_default();
        if !modules.iter().any(|m| m == module) {
            modules.push(module.to_string());
        }
        self
    }

    /// `(device, modules)` pairs in device order.
    pub fn iter(&self) -> impl Iterator<Item = (DeviceId, &[String])> {
        self.assignments.iter().map(|(d, m)| (*d, m.as_slice()))
    }

    pub fn modules_on(&self, device: DeviceId) -> &[String] {
        self.assignments.get(&device).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every device hosting `module`.
    pub fn devices_for(&self, module: &str) -> impl Iterator<Item = DeviceId> + '_ {
        let module = module.to_string();
        self.assignments
            .iter()
            .filter(move |(_, mods)| mods.iter().any(|m| *m == module))
            .map(|(d, _)| *d)
    }

    /// Modules of `app` with no device.
    pub fn missing_modules(&self, app: &Application) -> Vec<String> {
        app.module_names()
            .filter(|name| self.devices_for(name).next().is_none())
            .map(str::to_string)
            .collect()
    }

    /// Fails unless every module of `app` is placed and every placed
    /// module belongs to `app`.
    pub fn validate(&self, app: &Application) -> FogResult<()> {
        let missing = self.missing_modules(app);
        if !missing.is_empty() {
            return Err(FogError::PlacementIncomplete {
                app_id: app.id().to_string(),
                missing,
            });
        }
        if let Some(unknown) = self
            .assignments
            .values()
            .flatten()
            .find(|m| !app.has_module(m))
        {
            return Err(FogError::UnknownModule {
                app_id: app.id().to_string(),
                module: unknown.clone(),
            });
        }
        Ok(())
    }
}

// ── ModuleMapping ─────────────────────────────────────────────────────

/// Device name → module names, as written by a scenario author.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleMapping {
    mapping: BTreeMap<String, Vec<String>>,
}

impl ModuleMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every module of `app` on the device named `device`.
    pub fn all_on(device: &str, app: &Application) -> Self {
        let mut mapping = ModuleMapping::new();
        for module in app.module_names() {
            mapping.add(device, module);
        }
        mapping
    }

    pub fn add(&mut self, device: &str, module: &str) -> &mut Self {
        let modules = self.mapping.entry(device.to_string()).or_default();
        if !modules.iter().any(|m| m == module) {
            modules.push(module.to_string());
        }
        self
    }

    /// Resolve device names against `devices`.
    pub fn resolve(&self, devices: &BTreeMap<DeviceId, Box<dyn FogDevice>>) -> FogResult<Placement> {
        let by_name: BTreeMap<&str, DeviceId> =
            devices.iter().map(|(id, d)| (d.name(), *id)).collect();
        let mut placement = Placement::new();
        for (name, modules) in &self.mapping {
            let id = by_name
                .get(name.as_str())
                .copied()
                .ok_or_else(|| FogError::DeviceNameNotFound(name.clone()))?;
            for module in modules {
                placement.assign(id, module);
            }
        }
        Ok(placement)
    }
}
