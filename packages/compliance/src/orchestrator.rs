use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

use crate::client::{LlmClient, LlmRequest};
use crate::config::ComplianceConfig;
use crate::error::{ComplianceError, Result};
use crate::law_refs;
use crate::merge::{BuildingInfoPolicy, ReportBuilder};
use crate::normalize;
use crate::prompt;
use crate::schema::SchemaValidator;
use crate::section::{AnalysisMode, Section};
use crate::types::{ComplianceResponse, PartialReport};

/// How one dispatched section ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionOutcome {
    pub section: Section,
    /// `ComplianceError::kind` of the failure, `None` on success.
    pub failure: Option<&'static str>,
}

impl SectionOutcome {
    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
    }
}

/// A finished analysis together with how each section fared.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub report: ComplianceResponse,
    pub outcomes: Vec<SectionOutcome>,
}

/// Top-level compliance analysis: validate, fan out, normalize, merge.
///
/// Each section is sent to the model concurrently. A failing section leaves
/// its category empty; the call only fails when the request is invalid or
/// when no section succeeded.
pub struct ComplianceAnalyzer {
    client: Arc<dyn LlmClient>,
    validator: Arc<SchemaValidator>,
    mode: AnalysisMode,
    max_tokens: u32,
    temperature: f64,
    timeout: Duration,
    building_info_policy: BuildingInfoPolicy,
}

impl ComplianceAnalyzer {
    pub fn new(client: Arc<dyn LlmClient>, config: &ComplianceConfig) -> Result<Self> {
        Ok(Self {
            client,
            validator: Arc::new(SchemaValidator::new()?),
            mode: config.mode,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            timeout: config.analysis_timeout(),
            building_info_policy: config.building_info_policy,
        })
    }

    pub fn mode(&self) -> AnalysisMode {
        self.mode
    }

    pub async fn analyze(&self, input: &Value) -> Result<ComplianceResponse> {
        self.analyze_detailed(input).await.map(|analysis| analysis.report)
    }

    #[tracing::instrument(skip_all, fields(analysis_id = %Uuid::new_v4(), mode = %self.mode))]
    pub async fn analyze_detailed(&self, input: &Value) -> Result<Analysis> {
        let request = self
            .validator
            .validate_request(input)
            .map_err(ComplianceError::InvalidRequest)?;

        let prompts = prompt::plan(&request, self.mode);
        let attempted = prompts.len();
        info!(state = "fetching", sections = attempted, "dispatching sections");

        let mut tasks = JoinSet::new();
        let mut task_sections = HashMap::new();
        let mut pending: BTreeSet<Section> = BTreeSet::new();

        for section_prompt in prompts {
            let section = section_prompt.section;
            let request = LlmRequest {
                section,
                system: section_prompt.system.to_string(),
                user: section_prompt.user,
                max_tokens: self.max_tokens,
                temperature: self.temperature,
            };
            let client = Arc::clone(&self.client);
            let validator = Arc::clone(&self.validator);
            let span = tracing::info_span!("section", %section);

            let handle = tasks.spawn(
                async move { run_section(client.as_ref(), &validator, request).await }
                    .instrument(span),
            );
            task_sections.insert(handle.id(), section);
            pending.insert(section);
        }

        let deadline = Instant::now() + self.timeout;
        let mut builder = ReportBuilder::new(self.building_info_policy);
        let mut outcomes = Vec::with_capacity(attempted);

        loop {
            let joined = match tokio::time::timeout_at(deadline, tasks.join_next_with_id()).await {
                Ok(Some(joined)) => joined,
                Ok(None) => break,
                Err(_) => {
                    tasks.abort_all();
                    break;
                }
            };

            let (section, result) = match joined {
                Ok((id, result)) => (task_sections.get(&id).copied(), result),
                Err(join_error) => {
                    let Some(section) = task_sections.get(&join_error.id()).copied() else {
                        continue;
                    };
                    (Some(section), Err(ComplianceError::SectionAborted { section }))
                }
            };
            let Some(section) = section else {
                continue;
            };
            pending.remove(&section);

            match result {
                Ok(partial) => {
                    debug!(%section, "section succeeded");
                    builder.apply(partial);
                    outcomes.push(SectionOutcome {
                        section,
                        failure: None,
                    });
                }
                Err(err) => {
                    log_section_failure(section, &err);
                    outcomes.push(SectionOutcome {
                        section,
                        failure: Some(err.kind()),
                    });
                }
            }
        }

        for section in pending {
            log_section_failure(section, &ComplianceError::DeadlineExceeded { section });
            outcomes.push(SectionOutcome {
                section,
                failure: Some("deadline_exceeded"),
            });
        }
        outcomes.sort_by_key(|outcome| outcome.section);

        let succeeded = builder.succeeded();
        info!(
            state = "merging",
            succeeded,
            failed = attempted - succeeded,
            "sections settled"
        );

        if succeeded == 0 {
            warn!(attempted, "every section failed");
            return Err(ComplianceError::TotalFailure { attempted });
        }

        let mut report = builder.finish();
        law_refs::apply_catalog(&mut report);

        info!(state = "complete", citations = report.citations.len(), "analysis finished");
        Ok(Analysis { report, outcomes })
    }
}

async fn run_section(
    client: &dyn LlmClient,
    validator: &SchemaValidator,
    request: LlmRequest,
) -> Result<PartialReport> {
    let response = client.complete(&request).await?;
    debug!(
        input_tokens = response.input_tokens,
        output_tokens = response.output_tokens,
        raw = %response.content,
        "model output"
    );
    normalize::normalize(&response.content, request.section, validator)
}

fn log_section_failure(section: Section, err: &ComplianceError) {
    if let ComplianceError::MalformedModelOutput { raw, .. } = err {
        debug!(%section, raw = %raw, "unparseable model output");
    }
    debug!(%section, error = %err, "section failure detail");
    warn!(%section, kind = err.kind(), "section failed");
}
