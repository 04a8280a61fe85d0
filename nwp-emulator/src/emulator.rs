//! Synthetic field generation DSL and host-side state for the emulator.
//!
//! Supplements `examples/original_source/src/nwp_emulator/nwp_data_provider.h`/`.cc`,
//! which drives real GRIB fields or synthetic ones from a config DSL (the
//! GRIB path is the Non-goal this crate drops; the DSL path is what this
//! module reimplements). Each DSL entry becomes one piece of host-owned
//! storage the emulator `provide*`s into a `plume_rs::ModelData`, then
//! mutates directly every step — exactly the "host increments, plugin
//! observes through the pointer" contract SPEC_FULL.md's scenario S1 spells
//! out.

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use plume_rs::{Availability, FieldHandle, ModelData, Protocol};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub ptype: String,
    #[serde(default)]
    pub initial: serde_json::Value,
    #[serde(default)]
    pub step: serde_json::Value,
    #[serde(default)]
    pub available: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmulatorConfig {
    pub fields: Vec<FieldSpec>,
}

impl EmulatorConfig {
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yml") | Some("yaml") => {
                serde_yaml::from_str(&contents).with_context(|| format!("parsing {} as YAML", path.display()))
            }
            _ => serde_json::from_str(&contents).with_context(|| format!("parsing {} as JSON", path.display())),
        }
    }
}

fn availability_of(spec: &FieldSpec, default: &str) -> Result<Availability> {
    Ok(Availability::parse(spec.available.as_deref().unwrap_or(default))?)
}

/// Host-owned storage for every field the DSL describes, grouped by
/// concrete type so each entry's address is stable for the run (no vector
/// here is ever resized after [`HostState::build`] returns).
#[derive(Default)]
pub struct HostState {
    ints: Vec<(String, i64, i64, Availability, Option<String>)>,
    bools: Vec<(String, bool, Availability, Option<String>)>,
    floats: Vec<(String, f32, f32, Availability, Option<String>)>,
    doubles: Vec<(String, f64, f64, Availability, Option<String>)>,
    strings: Vec<(String, String, Availability, Option<String>)>,
    atlas: Vec<(String, i64, Availability, Option<String>)>,
}

impl HostState {
    pub fn build(config: &EmulatorConfig) -> Result<Self> {
        let mut state = HostState::default();
        for spec in &config.fields {
            match spec.ptype.as_str() {
                "INT" => {
                    let initial = json_i64(&spec.initial).unwrap_or(0);
                    let step = json_i64(&spec.step).unwrap_or(0);
                    state.ints.push((
                        spec.name.clone(),
                        initial,
                        step,
                        availability_of(spec, "always")?,
                        spec.comment.clone(),
                    ));
                }
                "BOOL" => {
                    let initial = spec.initial.as_bool().unwrap_or(false);
                    state.bools.push((spec.name.clone(), initial, availability_of(spec, "always")?, spec.comment.clone()));
                }
                "FLOAT" => {
                    let initial = json_f64(&spec.initial).unwrap_or(0.0) as f32;
                    let step = json_f64(&spec.step).unwrap_or(0.0) as f32;
                    state.floats.push((
                        spec.name.clone(),
                        initial,
                        step,
                        availability_of(spec, "always")?,
                        spec.comment.clone(),
                    ));
                }
                "DOUBLE" => {
                    let initial = json_f64(&spec.initial).unwrap_or(0.0);
                    let step = json_f64(&spec.step).unwrap_or(0.0);
                    state.doubles.push((
                        spec.name.clone(),
                        initial,
                        step,
                        availability_of(spec, "always")?,
                        spec.comment.clone(),
                    ));
                }
                "STRING" => {
                    let initial = spec.initial.as_str().unwrap_or("").to_string();
                    state.strings.push((
                        spec.name.clone(),
                        initial,
                        availability_of(spec, "always")?,
                        spec.comment.clone(),
                    ));
                }
                "ATLAS_FIELD" => {
                    state.atlas.push((spec.name.clone(), 0, availability_of(spec, "on-request")?, spec.comment.clone()));
                }
                other => bail!("unrecognised field type in emulator config: {other}"),
            }
        }
        Ok(state)
    }

    /// The offers `Protocol` this host advertises, one entry per DSL field.
    pub fn offers(&self) -> Protocol {
        let mut offers = Protocol::new();
        for (name, _, avail, comment) in &self.ints {
            offers.offer_int(name.as_str(), *avail, comment.clone().unwrap_or_default());
        }
        for (name, _, avail, comment) in &self.bools {
            offers.offer_bool(name.as_str(), *avail, comment.clone().unwrap_or_default());
        }
        for (name, _, _, avail, comment) in &self.floats {
            offers.offer_float(name.as_str(), *avail, comment.clone().unwrap_or_default());
        }
        for (name, _, _, avail, comment) in &self.doubles {
            offers.offer_double(name.as_str(), *avail, comment.clone().unwrap_or_default());
        }
        for (name, _, avail, comment) in &self.strings {
            offers.offer_string(name.as_str(), *avail, comment.clone().unwrap_or_default());
        }
        for (name, _, avail, comment) in &self.atlas {
            offers.offer_atlas_field(name.as_str(), *avail, comment.clone().unwrap_or_default());
        }
        offers
    }

    /// Builds the initial `ModelData` fed to the manager: every scalar is
    /// `provide`d by pointer into this `HostState`'s own storage, and an
    /// `ATLAS_FIELD` entry is only inserted if some accepted plugin actually
    /// asked for it (S5's on-request gating).
    pub fn provide_initial(&mut self, is_requested: impl Fn(&str) -> bool) -> Result<ModelData> {
        let mut data = ModelData::new();
        for (name, value, _, _, _) in &mut self.ints {
            data.provide_int(name.clone(), value as *mut i64)?;
        }
        for (name, value, _, _) in &mut self.bools {
            data.provide_bool(name.clone(), value as *mut bool)?;
        }
        for (name, value, _, _, _) in &mut self.floats {
            data.provide_float(name.clone(), value as *mut f32)?;
        }
        for (name, value, _, _, _) in &mut self.doubles {
            data.provide_double(name.clone(), value as *mut f64)?;
        }
        for (name, value, _, _) in &mut self.strings {
            data.provide_string(name.clone(), value as *mut String)?;
        }
        for (name, counter, _, _) in &mut self.atlas {
            if is_requested(name) {
                let handle = FieldHandle::from_raw(counter as *mut i64 as *mut std::os::raw::c_void)?;
                data.provide_atlas_field_shared(name.clone(), handle)?;
            }
        }
        Ok(data)
    }

    /// Advances every scalar field by its configured `step`, mirroring the
    /// host's own per-timestep model update. `ATLAS_FIELD` entries have no
    /// step semantics in this DSL (a real gridded field is mutated by the
    /// host model itself, not by the emulator's scalar stepping loop).
    pub fn advance(&mut self) {
        for (_, value, step, _, _) in &mut self.ints {
            *value += *step;
        }
        for (_, value, step, _, _) in &mut self.floats {
            *value += *step;
        }
        for (_, value, step, _, _) in &mut self.doubles {
            *value += *step;
        }
    }
}

fn json_i64(value: &serde_json::Value) -> Option<i64> {
    value.as_i64()
}

fn json_f64(value: &serde_json::Value) -> Option<f64> {
    value.as_f64()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> EmulatorConfig {
        serde_json::from_value(serde_json::json!({
            "fields": [
                {"name": "I", "type": "INT", "initial": 0, "step": 1},
                {"name": "J", "type": "INT", "initial": 10, "step": 1},
                {"name": "K", "type": "INT", "initial": 100, "step": 1},
                {"name": "field_dummy_1", "type": "ATLAS_FIELD"}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn builds_offers_with_expected_availability() {
        let config = sample_config();
        let state = HostState::build(&config).unwrap();
        let offers = state.offers();
        assert_eq!(offers.offers().get_param("I").unwrap().availability(), plume_rs::Availability::Always);
        assert_eq!(
            offers.offers().get_param("field_dummy_1").unwrap().availability(),
            plume_rs::Availability::OnRequest
        );
    }

    #[test]
    fn advance_increments_ints_by_step() {
        let config = sample_config();
        let mut state = HostState::build(&config).unwrap();
        let mut data = state.provide_initial(|_| false).unwrap();
        assert_eq!(data.get_int("I").unwrap(), 0);
        state.advance();
        // ModelData::provide borrows through the HostState's own storage, so
        // no re-provide is needed between steps: the pointer keeps reading
        // live host values (S1's core guarantee).
        data = state.provide_initial(|_| false).unwrap();
        assert_eq!(data.get_int("I").unwrap(), 1);
    }

    #[test]
    fn atlas_field_only_provided_when_requested() {
        let config = sample_config();
        let mut state = HostState::build(&config).unwrap();
        let data = state.provide_initial(|name| name == "field_dummy_1").unwrap();
        assert!(data.has_parameter("field_dummy_1", None).unwrap());
    }
}
