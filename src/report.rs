use crate::{
    classify::TextType, engine::EngineKind, language::LanguageDecision, policy::PlanKind,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptReport {
    pub engine: EngineKind,
    pub valid: bool,
    pub chars: usize,
    /// True when the classification probe was reused instead of a new call.
    pub reused_probe: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageReport {
    pub page_index: usize,
    pub text_type: TextType,
    pub plan: PlanKind,
    pub attempts: Vec<AttemptReport>,
    /// Engine whose candidate was kept; `None` means the sentinel was emitted.
    pub chosen_engine: Option<EngineKind>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    pub job_id: String,
    pub started: String,
    pub finished: String,
    pub option: String,
    pub input: Option<String>,
    pub language: Option<LanguageDecision>,
    pub pages: Vec<PageReport>,
}
