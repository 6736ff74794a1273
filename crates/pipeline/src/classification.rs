//! Classification verdict: the structured judgment an issue receives before
//! it is allowed to proceed past INTAKE.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueType {
    Feature,
    Bug,
    Documentation,
    Infrastructure,
    Unknown,
}

impl IssueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Feature => "feature",
            Self::Bug => "bug",
            Self::Documentation => "documentation",
            Self::Infrastructure => "infrastructure",
            Self::Unknown => "unknown",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Some(match s {
            "feature" => Self::Feature,
            "bug" => Self::Bug,
            "documentation" => Self::Documentation,
            "infrastructure" => Self::Infrastructure,
            "unknown" => Self::Unknown,
            _ => return None,
        })
    }
}

impl std::fmt::Display for IssueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The classifier's verdict on a single issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueClassification {
    pub issue_type: IssueType,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub affected_packages: Vec<String>,
    pub completeness_score: i32,
    #[serde(default)]
    pub clarification_questions: Vec<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub reasoning: Option<String>,
}

const FALLBACK_QUESTIONS: [&str; 2] = [
    "Could you provide more details about the expected behavior?",
    "What specific changes or features are you requesting?",
];

impl IssueClassification {
    /// True when the issue is too underspecified to provision a workspace
    /// for; below the completeness threshold of 3.
    pub fn needs_clarification(&self) -> bool {
        self.completeness_score < 3
    }

    pub fn is_actionable(&self) -> bool {
        self.completeness_score >= 3
    }

    /// Degraded verdict used whenever classification itself fails — the
    /// pipeline never crashes on a classifier error, it falls back to this.
    pub fn create_unknown(reason: impl Into<String>) -> Self {
        Self {
            issue_type: IssueType::Unknown,
            requirements: Vec::new(),
            affected_packages: Vec::new(),
            completeness_score: 1,
            clarification_questions: FALLBACK_QUESTIONS.iter().map(|s| s.to_string()).collect(),
            confidence: Some(0.0),
            reasoning: Some(reason.into()),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("IssueClassification always serializes")
    }

    pub fn from_json(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}
