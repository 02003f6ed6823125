use crate::section::{AnalysisMode, Section};
use crate::types::ComplianceRequest;

macro_rules! system_prompt {
    ($file:literal) => {
        concat!(include_str!("../prompts/base.txt"), include_str!(concat!("../prompts/", $file)))
    };
}

const SYSTEM_OVERVIEW: &str = system_prompt!("overview.txt");
const SYSTEM_ESCAPE: &str = system_prompt!("escape.txt");
const SYSTEM_FIRE_SPREAD: &str = system_prompt!("fire_spread.txt");
const SYSTEM_TRAFFIC: &str = system_prompt!("traffic.txt");
const SYSTEM_TECHNICAL: &str = system_prompt!("technical.txt");
const SYSTEM_FULL: &str = system_prompt!("full.txt");

const ANALYSIS_INSTRUCTION: &str =
    "Hãy phân tích tuân thủ PCCC cho công trình trên và trả về dữ liệu theo đúng cấu trúc JSON đã mô tả.";

/// Fixed system instruction for a section.
pub fn system_prompt(section: Section) -> &'static str {
    match section {
        Section::Overview => SYSTEM_OVERVIEW,
        Section::Escape => SYSTEM_ESCAPE,
        Section::FireSpread => SYSTEM_FIRE_SPREAD,
        Section::Traffic => SYSTEM_TRAFFIC,
        Section::Technical => SYSTEM_TECHNICAL,
        Section::Full => SYSTEM_FULL,
    }
}

/// Build the user prompt shared by every section of one request.
pub fn build_user_prompt(request: &ComplianceRequest) -> String {
    let mut prompt = String::new();

    prompt.push_str(&format!(
        "Mô tả công trình: {}\n",
        strip_fences(request.description.trim())
    ));

    if let Some(building_type) = request.building_type {
        prompt.push_str(&format!("Loại công trình: {building_type}\n"));
    }
    if let Some(height) = request.height {
        prompt.push_str(&format!("Chiều cao: {height} m\n"));
    }
    if let Some(floors) = request.floors {
        prompt.push_str(&format!("Số tầng: {floors}\n"));
    }

    prompt.push('\n');
    prompt.push_str(ANALYSIS_INSTRUCTION);

    prompt
}

/// Triple backticks would be read as a fence around the instruction.
fn strip_fences(text: &str) -> String {
    text.replace("```", "")
}

/// One prompt pair ready to be sent to the gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionPrompt {
    pub section: Section,
    pub system: &'static str,
    pub user: String,
}

/// Prompts for every section `mode` dispatches, in canonical order.
pub fn plan(request: &ComplianceRequest, mode: AnalysisMode) -> Vec<SectionPrompt> {
    let user = build_user_prompt(request);
    mode.sections()
        .iter()
        .map(|&section| SectionPrompt {
            section,
            system: system_prompt(section),
            user: user.clone(),
        })
        .collect()
}
