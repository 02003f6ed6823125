use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// One unit of work sent to the model.
///
/// The derived ordering is the canonical merge order: overview first, so its
/// building information takes precedence under the default merge policy.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Section {
    Overview,
    Escape,
    FireSpread,
    Traffic,
    Technical,
    /// Single prompt asking for the whole report at once.
    Full,
}

impl Section {
    /// Sections dispatched by [`AnalysisMode::Sections`].
    pub const SPLIT: [Section; 5] = [
        Section::Overview,
        Section::Escape,
        Section::FireSpread,
        Section::Traffic,
        Section::Technical,
    ];

    /// Solution categories this section is responsible for.
    pub fn categories(self) -> &'static [Category] {
        match self {
            Section::Overview => &[],
            Section::Escape => &[Category::Escape],
            Section::FireSpread => &[Category::FireSpread],
            Section::Traffic => &[Category::Traffic],
            Section::Technical => &[Category::Technical],
            Section::Full => &Category::ALL,
        }
    }

    pub fn owns_building_info(self) -> bool {
        matches!(self, Section::Overview | Section::Full)
    }

    /// Label stamped on citations coming from this section.
    ///
    /// `None` for the full-analysis prompt: the model tags those itself.
    pub fn citation_label(self) -> Option<&'static str> {
        match self {
            Section::Overview => Some("overview"),
            Section::Escape => Some(Category::Escape.label()),
            Section::FireSpread => Some(Category::FireSpread.label()),
            Section::Traffic => Some(Category::Traffic.label()),
            Section::Technical => Some(Category::Technical.label()),
            Section::Full => None,
        }
    }
}

/// A report tab: one ordered list of proposed measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    Escape,
    FireSpread,
    Traffic,
    Technical,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Escape,
        Category::FireSpread,
        Category::Traffic,
        Category::Technical,
    ];

    /// Key of the list in the response JSON.
    pub fn json_key(self) -> &'static str {
        match self {
            Category::Escape => "escapeSolutions",
            Category::FireSpread => "fireSpreadPrevention",
            Category::Traffic => "fireTraffic",
            Category::Technical => "technicalSystems",
        }
    }

    /// Short label the frontend filters citations by.
    pub fn label(self) -> &'static str {
        match self {
            Category::Escape => "escape",
            Category::FireSpread => "fire",
            Category::Traffic => "traffic",
            Category::Technical => "tech",
        }
    }
}

/// How the request is split into model calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum AnalysisMode {
    /// One prompt per section, run concurrently.
    #[default]
    Sections,
    /// One prompt for the whole report.
    Full,
}

impl AnalysisMode {
    pub fn sections(self) -> &'static [Section] {
        match self {
            AnalysisMode::Sections => &Section::SPLIT,
            AnalysisMode::Full => &[Section::Full],
        }
    }
}
