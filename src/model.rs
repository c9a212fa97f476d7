use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Format version written by this build. Imports are checked against its major.
pub const DOCUMENT_VERSION: &str = "2.0.0";
pub const SUPPORTED_MAJOR_VERSION: u64 = 2;

pub const MAX_SCORE: u8 = 100;

/// The single persisted root record of a workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub version: String,
    #[serde(default)]
    pub profile: Profile,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub assessments: Vec<Assessment>,
    #[serde(default)]
    pub students: Vec<String>,
    #[serde(default)]
    pub templates: Vec<Template>,
}

impl Default for Document {
    fn default() -> Self {
        Self {
            version: DOCUMENT_VERSION.to_string(),
            profile: Profile::default(),
            settings: Settings::default(),
            assessments: Vec::new(),
            students: Vec::new(),
            templates: Vec::new(),
        }
    }
}

impl Document {
    pub fn has_student(&self, name: &str) -> bool {
        self.students.iter().any(|s| s == name)
    }

    pub fn assessments_for<'a>(&'a self, student_name: &'a str) -> impl Iterator<Item = &'a Assessment> {
        self.assessments
            .iter()
            .filter(move |a| a.student_name == student_name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub school: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "default_true")]
    pub auto_save: bool,
    #[serde(default)]
    pub dark_mode: bool,
    #[serde(default = "default_true")]
    pub notifications: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            auto_save: true,
            dark_mode: false,
            notifications: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Subject taxonomy. Unknown values round-trip verbatim through `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Subject {
    Math,
    Ela,
    Science,
    SocialStudies,
    Other(String),
}

impl Subject {
    pub fn as_str(&self) -> &str {
        match self {
            Subject::Math => "math",
            Subject::Ela => "ela",
            Subject::Science => "science",
            Subject::SocialStudies => "social-studies",
            Subject::Other(s) => s.as_str(),
        }
    }
}

impl From<String> for Subject {
    fn from(value: String) -> Self {
        match value.as_str() {
            "math" => Subject::Math,
            "ela" => Subject::Ela,
            "science" => Subject::Science,
            "social-studies" => Subject::SocialStudies,
            _ => Subject::Other(value),
        }
    }
}

impl From<&str> for Subject {
    fn from(value: &str) -> Self {
        Subject::from(value.to_string())
    }
}

impl From<Subject> for String {
    fn from(value: Subject) -> Self {
        match value {
            Subject::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assessment {
    pub id: String,
    #[serde(default)]
    pub date: String,
    pub student_name: String,
    pub subject: Subject,
    #[serde(default)]
    pub grade_level: String,
    pub results: AssessmentResults,
    pub timestamp: DateTime<Utc>,
    /// Fields written by other clients (work descriptions, file names) kept as-is.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Assessment {
    pub fn score(&self) -> u8 {
        self.results.overall_score
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentResults {
    #[serde(default, deserialize_with = "deserialize_score")]
    pub overall_score: u8,
    #[serde(default)]
    pub competency_levels: Vec<CompetencyLevel>,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub areas_for_growth: Vec<String>,
    #[serde(default)]
    pub connections: Vec<LearningConnection>,
    #[serde(default)]
    pub recommendations: Option<Vec<String>>,
    #[serde(default)]
    pub peer_comparison: Option<PeerComparison>,
    /// Generator output this service does not interpret (quick summaries, next steps).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn deserialize_score<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    // A null score reads as zero, the same as an absent one.
    let raw = Option::<u64>::deserialize(deserializer)?.unwrap_or(0);
    if raw > MAX_SCORE as u64 {
        return Err(serde::de::Error::custom(format!(
            "overallScore {raw} is outside 0..=100"
        )));
    }
    Ok(raw as u8)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompetencyLevel {
    pub name: String,
    pub level: u8,
    #[serde(default)]
    pub progress: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningConnection {
    pub standard: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub strength: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerComparison {
    pub percentile: u8,
    pub grade_level: String,
    pub growth: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub name: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub grade_level: String,
    #[serde(default)]
    pub description: String,
    pub created: DateTime<Utc>,
}
