//! A symmetric pair of catalogues (requires/offers) plus the four version
//! constraints. Grounded on `examples/original_source/src/plume/Protocol.h`/`.cc`.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;
use crate::parameter::{Availability, Parameter, ParameterCatalogue, ParameterDescriptor, ParameterType};
use crate::version::LibVersion;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProtocolConfig {
    #[serde(default)]
    pub required: Vec<ParameterDescriptor>,
    #[serde(default)]
    pub offered: Vec<ParameterDescriptor>,
    #[serde(default)]
    pub required_plume_version: Option<String>,
    #[serde(default)]
    pub offered_plume_version: Option<String>,
    #[serde(default)]
    pub required_atlas_version: Option<String>,
    #[serde(default)]
    pub offered_atlas_version: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Protocol {
    requires: ParameterCatalogue,
    offers: ParameterCatalogue,
    requested_plume_version: LibVersion,
    offered_plume_version: LibVersion,
    requested_atlas_version: LibVersion,
    offered_atlas_version: LibVersion,
}

macro_rules! require_builder {
    ($name:ident, $variant:expr) => {
        pub fn $name(&mut self, name: impl Into<String>) -> &mut Self {
            self.insert_require(name.into(), $variant, Availability::Unset, "")
        }
    };
}

macro_rules! offer_builder {
    ($name:ident, $variant:expr) => {
        pub fn $name(
            &mut self,
            name: impl Into<String>,
            availability: Availability,
            comment: impl Into<String>,
        ) -> &mut Self {
            self.insert_offer(name.into(), $variant, availability, comment.into())
        }
    };
}

impl Protocol {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(cfg: &ProtocolConfig) -> Result<Self> {
        let mut proto = Protocol::new();
        proto.requires = ParameterCatalogue::from_descriptors(&cfg.required)?;
        proto.offers = ParameterCatalogue::from_descriptors(&cfg.offered)?;
        proto.requested_plume_version = LibVersion::parse(cfg.required_plume_version.as_deref().unwrap_or(""));
        proto.offered_plume_version = LibVersion::parse(cfg.offered_plume_version.as_deref().unwrap_or(""));
        proto.requested_atlas_version = LibVersion::parse(cfg.required_atlas_version.as_deref().unwrap_or(""));
        proto.offered_atlas_version = LibVersion::parse(cfg.offered_atlas_version.as_deref().unwrap_or(""));
        Ok(proto)
    }

    /// Builders never overwrite an existing parameter of the same name
    /// (first wins, warn).
    fn insert_require(
        &mut self,
        name: String,
        ptype: ParameterType,
        availability: Availability,
        comment: impl Into<String>,
    ) -> &mut Self {
        insert_first_wins(&mut self.requires, name, ptype, availability, comment.into());
        self
    }

    fn insert_offer(
        &mut self,
        name: String,
        ptype: ParameterType,
        availability: Availability,
        comment: String,
    ) -> &mut Self {
        insert_first_wins(&mut self.offers, name, ptype, availability, comment);
        self
    }

    require_builder!(require_int, ParameterType::Int);
    require_builder!(require_bool, ParameterType::Bool);
    require_builder!(require_float, ParameterType::Float);
    require_builder!(require_double, ParameterType::Double);
    require_builder!(require_string, ParameterType::String);
    require_builder!(require_atlas_field, ParameterType::AtlasField);

    offer_builder!(offer_int, ParameterType::Int);
    offer_builder!(offer_bool, ParameterType::Bool);
    offer_builder!(offer_float, ParameterType::Float);
    offer_builder!(offer_double, ParameterType::Double);
    offer_builder!(offer_string, ParameterType::String);
    offer_builder!(offer_atlas_field, ParameterType::AtlasField);

    pub fn requires(&self) -> &ParameterCatalogue {
        &self.requires
    }

    pub fn offers(&self) -> &ParameterCatalogue {
        &self.offers
    }

    pub fn requested_plume_version(&self) -> LibVersion {
        self.requested_plume_version
    }

    pub fn offered_plume_version(&self) -> LibVersion {
        self.offered_plume_version
    }

    pub fn requested_atlas_version(&self) -> LibVersion {
        self.requested_atlas_version
    }

    pub fn offered_atlas_version(&self) -> LibVersion {
        self.offered_atlas_version
    }

    pub fn with_plume_versions(mut self, requested: &str, offered: &str) -> Self {
        self.requested_plume_version = LibVersion::parse(requested);
        self.offered_plume_version = LibVersion::parse(offered);
        self
    }

    pub fn with_atlas_versions(mut self, requested: &str, offered: &str) -> Self {
        self.requested_atlas_version = LibVersion::parse(requested);
        self.offered_atlas_version = LibVersion::parse(offered);
        self
    }
}

fn insert_first_wins(
    cat: &mut ParameterCatalogue,
    name: String,
    ptype: ParameterType,
    availability: Availability,
    comment: String,
) {
    if cat.has_param(&name) {
        warn!(name, "protocol builder ignored duplicate parameter name");
        return;
    }
    let p = match Parameter::new(name, ptype) {
        Ok(p) => p.with_availability(availability).with_comment(comment),
        Err(_) => return,
    };
    let _ = cat.insert_param(p);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_are_first_wins() {
        let mut proto = Protocol::new();
        proto.offer_int("I", Availability::Always, "first");
        proto.offer_int("I", Availability::OnRequest, "second");
        let p = proto.offers().get_param("I").unwrap();
        assert_eq!(p.comment(), "first");
        assert_eq!(p.availability(), Availability::Always);
    }

    #[test]
    fn empty_version_parses_to_zero() {
        let proto = Protocol::new();
        assert_eq!(proto.requested_plume_version(), LibVersion::parse("0.0.0"));
    }
}
