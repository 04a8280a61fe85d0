//! Typed parameter descriptors and the catalogue that collects them.
//!
//! Grounded on `examples/original_source/src/plume/data/Parameter.h`/`.cc`
//! and `ParameterCatalogue.h`/`.cc`.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};

/// Closed enumeration of parameter kinds. `ATLAS_FIELD` is an opaque
/// external-handle type; the rest are scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterType {
    #[serde(rename = "INT")]
    Int,
    #[serde(rename = "BOOL")]
    Bool,
    #[serde(rename = "FLOAT")]
    Float,
    #[serde(rename = "DOUBLE")]
    Double,
    #[serde(rename = "STRING")]
    String,
    #[serde(rename = "ATLAS_FIELD")]
    AtlasField,
}

impl ParameterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterType::Int => "INT",
            ParameterType::Bool => "BOOL",
            ParameterType::Float => "FLOAT",
            ParameterType::Double => "DOUBLE",
            ParameterType::String => "STRING",
            ParameterType::AtlasField => "ATLAS_FIELD",
        }
    }

    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "INT" => Ok(ParameterType::Int),
            "BOOL" => Ok(ParameterType::Bool),
            "FLOAT" => Ok(ParameterType::Float),
            "DOUBLE" => Ok(ParameterType::Double),
            "STRING" => Ok(ParameterType::String),
            "ATLAS_FIELD" => Ok(ParameterType::AtlasField),
            other => Err(Error::bad_value(format!("unrecognised parameter type: {other}"))),
        }
    }
}

/// `always` | `on-request` | unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Availability {
    #[default]
    Unset,
    Always,
    OnRequest,
}

impl Availability {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "" => Ok(Availability::Unset),
            "always" => Ok(Availability::Always),
            "on-request" => Ok(Availability::OnRequest),
            other => Err(Error::bad_value(format!("invalid availability: {other}"))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Availability::Unset => "",
            Availability::Always => "always",
            Availability::OnRequest => "on-request",
        }
    }
}

/// A validated parameter descriptor. Equality is defined by `(name, type)`,
/// matching the original's value semantics.
#[derive(Debug, Clone)]
pub struct Parameter {
    name: String,
    ptype: ParameterType,
    availability: Availability,
    comment: String,
}

impl PartialEq for Parameter {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.ptype == other.ptype
    }
}
impl Eq for Parameter {}

impl Parameter {
    pub fn new(name: impl Into<String>, ptype: ParameterType) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::bad_value("parameter name must be non-empty"));
        }
        Ok(Self {
            name,
            ptype,
            availability: Availability::Unset,
            comment: String::new(),
        })
    }

    pub fn with_availability(mut self, availability: Availability) -> Self {
        self.availability = availability;
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    pub fn from_descriptor(desc: &ParameterDescriptor) -> Result<Self> {
        let ptype = ParameterType::from_str(&desc.r#type)?;
        let availability = Availability::parse(desc.available.as_deref().unwrap_or(""))?;
        let mut p = Parameter::new(desc.name.clone(), ptype)?.with_availability(availability);
        if let Some(c) = &desc.comment {
            p = p.with_comment(c.clone());
        }
        Ok(p)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ptype(&self) -> ParameterType {
        self.ptype
    }

    pub fn availability(&self) -> Availability {
        self.availability
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn to_descriptor(&self) -> ParameterDescriptor {
        ParameterDescriptor {
            name: self.name.clone(),
            r#type: self.ptype.as_str().to_string(),
            available: if self.availability == Availability::Unset {
                None
            } else {
                Some(self.availability.as_str().to_string())
            },
            comment: if self.comment.is_empty() { None } else { Some(self.comment.clone()) },
        }
    }
}

/// Wire/config shape of a parameter descriptor: `{name, type[, available, comment]}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParameterDescriptor {
    pub name: String,
    pub r#type: String,
    #[serde(default)]
    pub available: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

/// An ordered, deduplicated-by-name collection of [`Parameter`]s.
#[derive(Debug, Clone, Default)]
pub struct ParameterCatalogue {
    params: Vec<Parameter>,
}

impl ParameterCatalogue {
    pub fn new() -> Self {
        Self::default()
    }

    /// If `name` is absent, append. If present with the same type, warn and
    /// leave unchanged. If present with a different type, fail.
    pub fn insert_param(&mut self, p: Parameter) -> Result<()> {
        if let Some(existing) = self.params.iter().find(|e| e.name() == p.name()) {
            if existing.ptype() == p.ptype() {
                warn!(name = p.name(), "duplicate parameter insert ignored");
                return Ok(());
            }
            return Err(Error::bad_value(format!(
                "parameter '{}' already registered with a different type",
                p.name()
            )));
        }
        self.params.push(p);
        Ok(())
    }

    pub fn has_param(&self, name: &str) -> bool {
        self.params.iter().any(|p| p.name() == name)
    }

    pub fn get_param(&self, name: &str) -> Result<&Parameter> {
        self.params
            .iter()
            .find(|p| p.name() == name)
            .ok_or_else(|| Error::not_found(format!("no such parameter: {name}")))
    }

    pub fn params(&self) -> &[Parameter] {
        &self.params
    }

    pub fn param_names(&self) -> Vec<String> {
        self.params.iter().map(|p| p.name().to_string()).collect()
    }

    /// A new catalogue containing exactly the named parameters, in the
    /// order `names` lists them. Any missing name fails.
    pub fn filter(&self, names: &[String]) -> Result<ParameterCatalogue> {
        let mut out = ParameterCatalogue::new();
        for name in names {
            let p = self.get_param(name)?.clone();
            out.params.push(p);
        }
        Ok(out)
    }

    pub fn to_descriptors(&self) -> Vec<ParameterDescriptor> {
        self.params.iter().map(Parameter::to_descriptor).collect()
    }

    pub fn from_descriptors(descs: &[ParameterDescriptor]) -> Result<Self> {
        let mut cat = ParameterCatalogue::new();
        for d in descs {
            cat.insert_param(Parameter::from_descriptor(d)?)?;
        }
        Ok(cat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_same_name_same_type_is_idempotent() {
        let mut cat = ParameterCatalogue::new();
        cat.insert_param(Parameter::new("I", ParameterType::Int).unwrap()).unwrap();
        cat.insert_param(Parameter::new("I", ParameterType::Int).unwrap()).unwrap();
        assert_eq!(cat.param_names(), vec!["I".to_string()]);
    }

    #[test]
    fn insert_same_name_different_type_fails() {
        let mut cat = ParameterCatalogue::new();
        cat.insert_param(Parameter::new("I", ParameterType::Int).unwrap()).unwrap();
        let err = cat.insert_param(Parameter::new("I", ParameterType::Float).unwrap());
        assert!(err.is_err());
    }

    #[test]
    fn filter_missing_name_fails() {
        let mut cat = ParameterCatalogue::new();
        cat.insert_param(Parameter::new("I", ParameterType::Int).unwrap()).unwrap();
        assert!(cat.filter(&["J".to_string()]).is_err());
    }

    #[test]
    fn filter_preserves_requested_order() {
        let mut cat = ParameterCatalogue::new();
        cat.insert_param(Parameter::new("I", ParameterType::Int).unwrap()).unwrap();
        cat.insert_param(Parameter::new("J", ParameterType::Int).unwrap()).unwrap();
        let filtered = cat.filter(&["J".to_string(), "I".to_string()]).unwrap();
        assert_eq!(filtered.param_names(), vec!["J".to_string(), "I".to_string()]);
    }

    #[test]
    fn descriptor_round_trip_preserves_all_fields() {
        let p = Parameter::new("I", ParameterType::Int)
            .unwrap()
            .with_availability(Availability::Always)
            .with_comment("an int");
        let desc = p.to_descriptor();
        let back = Parameter::from_descriptor(&desc).unwrap();
        assert_eq!(p, back);
        assert_eq!(back.availability(), Availability::Always);
        assert_eq!(back.comment(), "an int");
    }

    #[test]
    fn unknown_type_string_is_bad_value() {
        assert!(ParameterType::from_str("NOT_A_TYPE").is_err());
    }
}
