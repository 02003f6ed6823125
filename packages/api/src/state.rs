use std::sync::Arc;

use pccc_compliance::ComplianceAnalyzer;

#[derive(Clone)]
pub struct AppState {
    pub analyzer: Arc<ComplianceAnalyzer>,
}
