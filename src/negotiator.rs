//! Pure negotiation function matching a plugin's requirements against a
//! host's offers, including grouped alternatives.
//!
//! Grounded on `examples/original_source/src/plume/Negotiator.h`/`.cc`.

use std::collections::BTreeSet;

use tracing::debug;

use crate::parameter::ParameterCatalogue;
use crate::protocol::Protocol;

/// Outcome of negotiating one plugin: acceptance plus, when accepted, the
/// union of agreed parameter names (intrinsic requires ∪ satisfied groups).
#[derive(Debug, Clone, Default)]
pub struct PluginDecision {
    accepted: bool,
    agreed: Vec<String>,
}

impl PluginDecision {
    pub fn rejected() -> Self {
        Self { accepted: false, agreed: Vec::new() }
    }

    pub fn accepted(agreed: Vec<String>) -> Self {
        Self { accepted: true, agreed }
    }

    pub fn is_accepted(&self) -> bool {
        self.accepted
    }

    pub fn agreed_names(&self) -> &[String] {
        &self.agreed
    }
}

/// A group is a list of parameter descriptors read from a plugin's
/// `parameters` config entry; it is represented here simply as the set of
/// names it covers, since the negotiator only ever checks membership.
pub type Group = Vec<String>;

/// `(offers, requires, groups) -> decision`. Pure: no I/O beyond logging.
pub fn negotiate(offers: &Protocol, requires: &Protocol, groups: &[Group]) -> PluginDecision {
    if requires.requested_plume_version() > offers.offered_plume_version() {
        debug!("negotiation rejected: plume version requirement not met");
        return PluginDecision::rejected();
    }
    if requires.requested_atlas_version() > offers.offered_atlas_version() {
        debug!("negotiation rejected: atlas version requirement not met");
        return PluginDecision::rejected();
    }

    let mut agreed = BTreeSet::new();
    for name in requires.requires().param_names() {
        if !offers.offers().has_param(&name) {
            debug!(name, "negotiation rejected: required parameter not offered");
            return PluginDecision::rejected();
        }
        agreed.insert(name);
    }

    for (idx, group) in groups.iter().enumerate() {
        let satisfied = group.iter().all(|name| offers.offers().has_param(name));
        if satisfied {
            agreed.extend(group.iter().cloned());
        } else {
            debug!(group = idx, "negotiation: unsatisfied group skipped");
        }
    }

    PluginDecision::accepted(agreed.into_iter().collect())
}

/// Convenience: derive an active catalogue (the descriptors for every
/// agreed name) from the offered catalogue, for feed-time checks.
pub fn active_catalogue(offers: &ParameterCatalogue, agreed: &[String]) -> crate::error::Result<ParameterCatalogue> {
    offers.filter(agreed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameter::Availability;

    fn simple_offers() -> Protocol {
        let mut p = Protocol::new();
        p.offer_int("I", Availability::Always, "");
        p.offer_int("J", Availability::Always, "");
        p
    }

    #[test]
    fn empty_requires_and_groups_accepts() {
        let offers = simple_offers();
        let requires = Protocol::new();
        let decision = negotiate(&offers, &requires, &[]);
        assert!(decision.is_accepted());
        assert!(decision.agreed_names().is_empty());
    }

    #[test]
    fn missing_required_parameter_rejects() {
        let offers = simple_offers();
        let mut requires = Protocol::new();
        requires.require_int("K");
        let decision = negotiate(&offers, &requires, &[]);
        assert!(!decision.is_accepted());
    }

    #[test]
    fn version_mismatch_rejects_even_if_params_offered() {
        let offers = simple_offers().with_plume_versions("0.0.0", "1.0.0");
        let mut requires = Protocol::new();
        requires.require_int("I");
        let requires = requires.clone().with_plume_versions("99.0.0", "0.0.0");
        let decision = negotiate(&offers, &requires, &[]);
        assert!(!decision.is_accepted());
    }

    #[test]
    fn satisfied_group_enlarges_agreed_unsatisfied_does_not() {
        let mut offers = Protocol::new();
        offers.offer_int("I", Availability::Always, "");
        offers.offer_int("J", Availability::Always, "");
        offers.offer_int("JJJ", Availability::Always, "");
        offers.offer_int("XYZ", Availability::Always, "");
        offers.offer_int("K", Availability::Always, "");

        let requires = Protocol::new();
        let groups = vec![
            vec!["I".to_string(), "J".to_string()],
            vec!["JJJ".to_string(), "J".to_string(), "KKMM".to_string()],
            vec!["XYZ".to_string(), "K".to_string()],
        ];
        let decision = negotiate(&offers, &requires, &groups);
        assert!(decision.is_accepted());
        let mut agreed = decision.agreed_names().to_vec();
        agreed.sort();
        assert_eq!(agreed, vec!["I", "J", "K", "XYZ"]);
    }
}
