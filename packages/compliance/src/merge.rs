use std::collections::BTreeMap;

use strum::{Display, EnumString};

use crate::section::Section;
use crate::types::{BuildingInfo, ComplianceResponse, PartialReport};

/// How `buildingInfo` fields from several sections are reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum BuildingInfoPolicy {
    /// The earliest section (in canonical order) with a value wins.
    #[default]
    FirstNonNull,
    /// The latest section (in canonical order) with a value wins.
    LastNonNull,
}

/// Accumulates validated section results into one report.
///
/// Partials are keyed by section, so re-applying a section replaces its
/// earlier contribution. Output order follows [`Section`]'s ordering, not
/// the order in which sections arrived.
#[derive(Debug)]
pub struct ReportBuilder {
    policy: BuildingInfoPolicy,
    partials: BTreeMap<Section, PartialReport>,
}

impl ReportBuilder {
    pub fn new(policy: BuildingInfoPolicy) -> Self {
        Self {
            policy,
            partials: BTreeMap::new(),
        }
    }

    pub fn apply(&mut self, partial: PartialReport) {
        self.partials.insert(partial.section, partial);
    }

    /// Number of distinct sections applied so far.
    pub fn succeeded(&self) -> usize {
        self.partials.len()
    }

    pub fn finish(self) -> ComplianceResponse {
        let mut response = ComplianceResponse::default();

        for (section, partial) in self.partials {
            if let Some(info) = &partial.building_info {
                merge_building_info(&mut response.building_info, info, self.policy);
            }

            for (category, items) in partial.solutions {
                *response.items_mut(category) = items;
            }

            let label = section.citation_label();
            response
                .citations
                .extend(partial.citations.into_iter().map(|mut citation| {
                    if let Some(label) = label {
                        citation.category = Some(label.to_string());
                    }
                    citation
                }));
        }

        response
    }
}

fn merge_building_info(into: &mut BuildingInfo, from: &BuildingInfo, policy: BuildingInfoPolicy) {
    merge_field(&mut into.floors, &from.floors, policy);
    merge_field(&mut into.height, &from.height, policy);
    merge_field(&mut into.floor_area, &from.floor_area, policy);
    merge_field(&mut into.building_type, &from.building_type, policy);
    merge_field(&mut into.fire_class, &from.fire_class, policy);
    merge_field(&mut into.hazard_group, &from.hazard_group, policy);
}

fn merge_field<T: Clone>(into: &mut Option<T>, from: &Option<T>, policy: BuildingInfoPolicy) {
    let Some(value) = from else {
        return;
    };
    match policy {
        BuildingInfoPolicy::FirstNonNull if into.is_some() => {}
        _ => *into = Some(value.clone()),
    }
}
