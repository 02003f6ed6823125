use std::collections::{BTreeMap, HashSet};

use serde::{de, Deserialize, Deserializer, Serialize};
use strum::{Display, EnumString};

use crate::section::{Category, Section};

/// Occupancy class from QCVN 06:2022/BXD, or `Other`.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum BuildingType {
    #[serde(rename = "F1.1")]
    #[strum(serialize = "F1.1")]
    F1_1,
    #[serde(rename = "F1.2")]
    #[strum(serialize = "F1.2")]
    F1_2,
    #[serde(rename = "F1.3")]
    #[strum(serialize = "F1.3")]
    F1_3,
    #[serde(rename = "F1.4")]
    #[strum(serialize = "F1.4")]
    F1_4,
    #[serde(rename = "F2.1")]
    #[strum(serialize = "F2.1")]
    F2_1,
    #[serde(rename = "F2.2")]
    #[strum(serialize = "F2.2")]
    F2_2,
    #[serde(rename = "F2.3")]
    #[strum(serialize = "F2.3")]
    F2_3,
    #[serde(rename = "F2.4")]
    #[strum(serialize = "F2.4")]
    F2_4,
    #[serde(rename = "F3.1")]
    #[strum(serialize = "F3.1")]
    F3_1,
    #[serde(rename = "F3.2")]
    #[strum(serialize = "F3.2")]
    F3_2,
    #[serde(rename = "F3.3")]
    #[strum(serialize = "F3.3")]
    F3_3,
    #[serde(rename = "F3.4")]
    #[strum(serialize = "F3.4")]
    F3_4,
    #[serde(rename = "F3.5")]
    #[strum(serialize = "F3.5")]
    F3_5,
    #[serde(rename = "F3.6")]
    #[strum(serialize = "F3.6")]
    F3_6,
    #[serde(rename = "F4.1")]
    #[strum(serialize = "F4.1")]
    F4_1,
    #[serde(rename = "F4.2")]
    #[strum(serialize = "F4.2")]
    F4_2,
    #[serde(rename = "F4.3")]
    #[strum(serialize = "F4.3")]
    F4_3,
    #[serde(rename = "F4.4")]
    #[strum(serialize = "F4.4")]
    F4_4,
    #[serde(rename = "F5.1")]
    #[strum(serialize = "F5.1")]
    F5_1,
    #[serde(rename = "F5.2")]
    #[strum(serialize = "F5.2")]
    F5_2,
    #[serde(rename = "F5.3")]
    #[strum(serialize = "F5.3")]
    F5_3,
    Other,
}

/// A user submission. Only produced by `SchemaValidator::validate_request`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawRequest")]
pub struct ComplianceRequest {
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub building_type: Option<BuildingType>,
    /// Meters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub floors: Option<u32>,
}

// Older clients send `type`; `buildingType` wins when both are present.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRequest {
    description: String,
    #[serde(default)]
    building_type: Option<BuildingType>,
    #[serde(default, rename = "type")]
    legacy_type: Option<BuildingType>,
    #[serde(default)]
    height: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_floors")]
    floors: Option<u32>,
}

impl From<RawRequest> for ComplianceRequest {
    fn from(raw: RawRequest) -> Self {
        Self {
            description: raw.description,
            building_type: raw.building_type.or(raw.legacy_type),
            height: raw.height,
            floors: raw.floors,
        }
    }
}

/// A floor count, if `n` is a whole number that fits in `u32`. `3.0` counts.
pub fn whole_floors(n: f64) -> Option<u32> {
    (n >= 0.0 && n.fract() == 0.0 && n <= f64::from(u32::MAX)).then_some(n as u32)
}

fn deserialize_floors<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<f64>::deserialize(deserializer)? {
        None => Ok(None),
        Some(n) => whole_floors(n).map(Some).ok_or_else(|| {
            de::Error::invalid_value(de::Unexpected::Float(n), &"a whole number of floors")
        }),
    }
}

/// Facts the model inferred about the building. `null` is a valid answer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuildingInfo {
    #[serde(deserialize_with = "deserialize_floors")]
    pub floors: Option<u32>,
    pub height: Option<f64>,
    pub floor_area: Option<f64>,
    pub building_type: Option<String>,
    pub fire_class: Option<String>,
    pub hazard_group: Option<String>,
}

impl BuildingInfo {
    pub fn is_empty(&self) -> bool {
        self == &BuildingInfo::default()
    }
}

/// Legal basis attached to one proposed measure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawReference")]
pub struct Reference {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clause: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requirement: Option<String>,
}

// Models emit either `url` or `link`; some emit both.
#[derive(Deserialize)]
struct RawReference {
    source: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    clause: Option<String>,
    #[serde(default)]
    requirement: Option<String>,
}

impl From<RawReference> for Reference {
    fn from(raw: RawReference) -> Self {
        Self {
            source: raw.source,
            text: raw.text,
            url: raw.url.or(raw.link),
            clause: raw.clause,
            requirement: raw.requirement,
        }
    }
}

/// One concrete proposed measure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub content: String,
    #[serde(default)]
    pub references: Vec<Reference>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub source: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clause: Option<String>,
    /// Report tab this citation belongs to; used for filtering only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// The aggregate report returned to the frontend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceResponse {
    pub building_info: BuildingInfo,
    pub escape_solutions: Vec<ComplianceItem>,
    pub fire_spread_prevention: Vec<ComplianceItem>,
    pub fire_traffic: Vec<ComplianceItem>,
    pub technical_systems: Vec<ComplianceItem>,
    #[serde(default)]
    pub citations: Vec<Citation>,
}

impl ComplianceResponse {
    pub fn items(&self, category: Category) -> &[ComplianceItem] {
        match category {
            Category::Escape => &self.escape_solutions,
            Category::FireSpread => &self.fire_spread_prevention,
            Category::Traffic => &self.fire_traffic,
            Category::Technical => &self.technical_systems,
        }
    }

    pub fn items_mut(&mut self, category: Category) -> &mut Vec<ComplianceItem> {
        match category {
            Category::Escape => &mut self.escape_solutions,
            Category::FireSpread => &mut self.fire_spread_prevention,
            Category::Traffic => &mut self.fire_traffic,
            Category::Technical => &mut self.technical_systems,
        }
    }

    /// Citations shown on a tab. Uncategorised citations show everywhere.
    pub fn citations_for<'a>(&'a self, label: &'a str) -> impl Iterator<Item = &'a Citation> + 'a {
        self.citations
            .iter()
            .filter(move |c| c.category.as_deref().map_or(true, |cat| cat == label))
    }

    /// Citations de-duplicated by `source`; the first occurrence wins.
    pub fn unique_citations(&self) -> Vec<&Citation> {
        let mut seen = HashSet::new();
        self.citations
            .iter()
            .filter(|c| seen.insert(c.source.as_str()))
            .collect()
    }

    /// Every reference attached to any measure, in tab order.
    pub fn references_mut(&mut self) -> impl Iterator<Item = &mut Reference> {
        self.escape_solutions
            .iter_mut()
            .chain(self.fire_spread_prevention.iter_mut())
            .chain(self.fire_traffic.iter_mut())
            .chain(self.technical_systems.iter_mut())
            .flat_map(|item| item.references.iter_mut())
    }

    pub fn is_empty(&self) -> bool {
        self.building_info.is_empty()
            && Category::ALL.iter().all(|c| self.items(*c).is_empty())
            && self.citations.is_empty()
    }
}

/// Validated output of one section, before merging.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialReport {
    pub section: Section,
    pub building_info: Option<BuildingInfo>,
    /// Full list per category the section supplied. A category is either
    /// present with its complete list or absent.
    pub solutions: BTreeMap<Category, Vec<ComplianceItem>>,
    pub citations: Vec<Citation>,
}

impl PartialReport {
    pub fn new(section: Section) -> Self {
        Self {
            section,
            building_info: None,
            solutions: BTreeMap::new(),
            citations: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn citation(source: &str, category: Option<&str>) -> Citation {
        Citation {
            source: source.into(),
            text: "text".into(),
            url: None,
            clause: None,
            category: category.map(String::from),
        }
    }

    #[test]
    fn test_reference_accepts_link_alias() {
        let reference: Reference = serde_json::from_value(json!({
            "source": "QCVN 06:2022/BXD",
            "link": "https://example.com/qcvn06"
        }))
        .expect("reference");
        assert_eq!(reference.url.as_deref(), Some("https://example.com/qcvn06"));
    }

    #[test]
    fn test_reference_prefers_url_over_link() {
        let reference: Reference = serde_json::from_value(json!({
            "source": "TCVN 5738:2021",
            "url": "https://a.example",
            "link": "https://b.example"
        }))
        .expect("reference");
        assert_eq!(reference.url.as_deref(), Some("https://a.example"));
    }

    #[test]
    fn test_item_defaults_missing_references() {
        let item: ComplianceItem =
            serde_json::from_value(json!({ "content": "Hai cầu thang thoát nạn" })).expect("item");
        assert!(item.references.is_empty());
        assert!(item.title.is_none());
    }

    #[test]
    fn test_building_info_serializes_nulls() {
        let value = serde_json::to_value(BuildingInfo {
            floors: Some(25),
            ..Default::default()
        })
        .expect("serialize");
        assert_eq!(
            value,
            json!({
                "floors": 25,
                "height": null,
                "floorArea": null,
                "buildingType": null,
                "fireClass": null,
                "hazardGroup": null
            })
        );
    }

    #[test]
    fn test_request_accepts_legacy_type_key() {
        let request: ComplianceRequest = serde_json::from_value(json!({
            "description": "Chung cư 25 tầng ở Hà Nội",
            "type": "F1.3"
        }))
        .expect("request");
        assert_eq!(request.building_type, Some(BuildingType::F1_3));
    }

    #[test]
    fn test_request_prefers_building_type_over_legacy_key() {
        let request: ComplianceRequest = serde_json::from_value(json!({
            "description": "Chung cư 25 tầng ở Hà Nội",
            "type": "F1.1",
            "buildingType": "F1.3"
        }))
        .expect("request");
        assert_eq!(request.building_type, Some(BuildingType::F1_3));
    }

    #[test]
    fn test_whole_floors() {
        assert_eq!(whole_floors(3.0), Some(3));
        assert_eq!(whole_floors(0.0), Some(0));
        assert_eq!(whole_floors(2.5), None);
        assert_eq!(whole_floors(-1.0), None);
        assert_eq!(whole_floors(5_000_000_000.0), None);
    }

    #[test]
    fn test_building_info_accepts_whole_float_floors() {
        let info: BuildingInfo =
            serde_json::from_value(json!({ "floors": 12.0, "height": 40 })).expect("info");
        assert_eq!(info.floors, Some(12));
        assert_eq!(info.height, Some(40.0));
    }

    #[test]
    fn test_citations_for_includes_uncategorised() {
        let response = ComplianceResponse {
            citations: vec![
                citation("QCVN 06:2022/BXD", Some("escape")),
                citation("TCVN 5738:2021", Some("tech")),
                citation("Nghị định 136/2020/NĐ-CP", None),
            ],
            ..Default::default()
        };
        let sources: Vec<&str> = response
            .citations_for("escape")
            .map(|c| c.source.as_str())
            .collect();
        assert_eq!(sources, vec!["QCVN 06:2022/BXD", "Nghị định 136/2020/NĐ-CP"]);
    }

    #[test]
    fn test_unique_citations_first_wins() {
        let response = ComplianceResponse {
            citations: vec![
                citation("QCVN 06:2022/BXD", Some("escape")),
                citation("QCVN 06:2022/BXD", Some("fire")),
                citation("TCVN 7336:2021", Some("tech")),
            ],
            ..Default::default()
        };
        let unique = response.unique_citations();
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].category.as_deref(), Some("escape"));
    }

    #[test]
    fn test_empty_response() {
        assert!(ComplianceResponse::default().is_empty());
    }
}
