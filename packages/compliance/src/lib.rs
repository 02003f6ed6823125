pub mod client;
pub mod config;
pub mod error;
pub mod law_refs;
pub mod merge;
pub mod normalize;
pub mod orchestrator;
pub mod prompt;
pub mod schema;
pub mod section;
pub mod types;

pub use client::{LlmClient, LlmRequest, LlmResponse, OpenRouterClient};
pub use config::ComplianceConfig;
pub use error::{ComplianceError, GatewayError, Result};
pub use merge::{BuildingInfoPolicy, ReportBuilder};
pub use orchestrator::{Analysis, ComplianceAnalyzer, SectionOutcome};
pub use schema::{FieldErrors, SchemaValidator, ValidationError};
pub use section::{AnalysisMode, Category, Section};
pub use types::{
    BuildingInfo, BuildingType, Citation, ComplianceItem, ComplianceRequest, ComplianceResponse,
    PartialReport, Reference,
};
