use crate::model::{Assessment, AssessmentResults, Document, Subject, Template, MAX_SCORE};
use chrono::Utc;
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

pub const MAX_ATTACHMENT_BYTES: u64 = 10 * 1024 * 1024;

pub const ALLOWED_ATTACHMENT_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "text/plain",
    "image/jpeg",
    "image/png",
];

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("invalid file type `{0}`; upload PDF, DOC, DOCX, TXT, JPG, or PNG files")]
    UnsupportedAttachmentType(String),

    #[error("file size {size} exceeds the {max} byte limit")]
    AttachmentTooLarge { size: u64, max: u64 },

    #[error("`{0}` is not a valid email address")]
    MalformedEmail(String),

    #[error("overallScore {0} is outside 0..=100")]
    ScoreOutOfRange(u8),
}

impl ValidationError {
    pub fn code(&self) -> &'static str {
        "bad_params"
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            ValidationError::MissingField(field) => Some(serde_json::json!({ "field": field })),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadMethod {
    #[default]
    Text,
    File,
    Photo,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentMeta {
    #[serde(default)]
    pub name: String,
    pub mime_type: String,
    pub size: u64,
}

/// Raw form values supplied by the presentation layer.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AssessmentForm {
    pub student_name: String,
    pub subject: String,
    pub grade_level: String,
    pub assessment_date: String,
    pub work_description: String,
    pub work_content: String,
    pub upload_method: UploadMethod,
    pub attachments: Vec<AttachmentMeta>,
    pub photos: Vec<AttachmentMeta>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TemplateDraft {
    pub name: String,
    pub subject: String,
    pub grade_level: String,
    pub description: String,
}

pub fn validate_attachment(mime_type: &str, size: u64) -> Result<(), ValidationError> {
    if !ALLOWED_ATTACHMENT_TYPES.contains(&mime_type) {
        return Err(ValidationError::UnsupportedAttachmentType(
            mime_type.to_string(),
        ));
    }
    if size > MAX_ATTACHMENT_BYTES {
        return Err(ValidationError::AttachmentTooLarge {
            size,
            max: MAX_ATTACHMENT_BYTES,
        });
    }
    Ok(())
}

pub fn validate_form(form: &AssessmentForm) -> Result<(), ValidationError> {
    if form.student_name.trim().is_empty() {
        return Err(ValidationError::MissingField("studentName"));
    }
    if form.subject.trim().is_empty() {
        return Err(ValidationError::MissingField("subject"));
    }

    match form.upload_method {
        UploadMethod::Text => {
            if form.work_content.trim().is_empty() {
                return Err(ValidationError::MissingField("workContent"));
            }
        }
        UploadMethod::File => {
            if form.attachments.is_empty() {
                return Err(ValidationError::MissingField("attachments"));
            }
        }
        UploadMethod::Photo => {
            if form.photos.is_empty() {
                return Err(ValidationError::MissingField("photos"));
            }
        }
    }

    for a in form.attachments.iter().chain(form.photos.iter()) {
        validate_attachment(&a.mime_type, a.size)?;
    }
    Ok(())
}

/// Appends a new assessment and registers its student.
///
/// The caller persists `doc`; nothing is written here.
pub fn record(
    doc: &mut Document,
    form: &AssessmentForm,
    results: AssessmentResults,
) -> Result<Assessment, ValidationError> {
    validate_form(form)?;
    if results.overall_score > MAX_SCORE {
        return Err(ValidationError::ScoreOutOfRange(results.overall_score));
    }

    let student_name = form.student_name.trim().to_string();
    let assessment = Assessment {
        id: Uuid::new_v4().to_string(),
        date: form.assessment_date.clone(),
        student_name: student_name.clone(),
        subject: Subject::from(form.subject.as_str()),
        grade_level: form.grade_level.clone(),
        results,
        timestamp: Utc::now(),
        extra: serde_json::Map::new(),
    };

    doc.assessments.push(assessment.clone());
    if !doc.has_student(&student_name) {
        doc.students.push(student_name);
    }
    Ok(assessment)
}

pub fn save_template(doc: &mut Document, draft: &TemplateDraft) -> Result<Template, ValidationError> {
    let name = draft.name.trim();
    if name.is_empty() {
        return Err(ValidationError::MissingField("name"));
    }
    let template = Template {
        name: name.to_string(),
        subject: draft.subject.clone(),
        grade_level: draft.grade_level.clone(),
        description: draft.description.clone(),
        created: Utc::now(),
    };
    doc.templates.push(template.clone());
    Ok(template)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_form(student: &str) -> AssessmentForm {
        AssessmentForm {
            student_name: student.to_string(),
            subject: "math".to_string(),
            grade_level: "5".to_string(),
            assessment_date: "2024-03-01".to_string(),
            work_content: "3 x 4 = 12".to_string(),
            ..AssessmentForm::default()
        }
    }

    fn results(score: u8) -> AssessmentResults {
        AssessmentResults {
            overall_score: score,
            ..AssessmentResults::default()
        }
    }

    #[test]
    fn new_student_is_registered_once() {
        let mut doc = Document::default();
        record(&mut doc, &text_form("Maya"), results(85)).expect("first");
        assert_eq!(doc.students, vec!["Maya".to_string()]);

        record(&mut doc, &text_form("Maya"), results(91)).expect("second");
        assert_eq!(doc.students.len(), 1);
        assert_eq!(doc.assessments.len(), 2);
    }

    #[test]
    fn ids_are_unique_under_rapid_creation() {
        let mut doc = Document::default();
        for _ in 0..200 {
            record(&mut doc, &text_form("Lee"), results(80)).expect("record");
        }
        let mut ids: Vec<&str> = doc.assessments.iter().map(|a| a.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 200);
    }

    #[test]
    fn record_copies_form_fields_and_trims_name() {
        let mut doc = Document::default();
        let a = record(&mut doc, &text_form("  Ana "), results(70)).expect("record");
        assert_eq!(a.student_name, "Ana");
        assert_eq!(a.subject, Subject::Math);
        assert_eq!(a.date, "2024-03-01");
        assert_eq!(a.grade_level, "5");
        assert_eq!(doc.assessments[0], a);
    }

    #[test]
    fn invalid_form_leaves_document_unchanged() {
        let mut doc = Document::default();
        let err = record(&mut doc, &text_form("  "), results(70)).expect_err("blank name");
        assert_eq!(err, ValidationError::MissingField("studentName"));

        let err = record(&mut doc, &text_form("Sam"), results(101)).expect_err("score");
        assert_eq!(err, ValidationError::ScoreOutOfRange(101));
        assert_eq!(doc, Document::default());
    }

    #[test]
    fn upload_method_requires_matching_content() {
        let mut form = text_form("Ivy");
        form.upload_method = UploadMethod::File;
        assert_eq!(
            validate_form(&form),
            Err(ValidationError::MissingField("attachments"))
        );

        form.attachments.push(AttachmentMeta {
            name: "essay.exe".into(),
            mime_type: "application/x-msdownload".into(),
            size: 10,
        });
        assert!(matches!(
            validate_form(&form),
            Err(ValidationError::UnsupportedAttachmentType(_))
        ));

        form.attachments[0].mime_type = "application/pdf".into();
        assert_eq!(validate_form(&form), Ok(()));

        form.upload_method = UploadMethod::Photo;
        assert_eq!(
            validate_form(&form),
            Err(ValidationError::MissingField("photos"))
        );
    }

    #[test]
    fn attachment_size_cap_is_inclusive() {
        assert!(validate_attachment("image/png", MAX_ATTACHMENT_BYTES).is_ok());
        assert_eq!(
            validate_attachment("image/png", MAX_ATTACHMENT_BYTES + 1),
            Err(ValidationError::AttachmentTooLarge {
                size: MAX_ATTACHMENT_BYTES + 1,
                max: MAX_ATTACHMENT_BYTES
            })
        );
    }

    #[test]
    fn template_requires_name() {
        let mut doc = Document::default();
        assert!(save_template(&mut doc, &TemplateDraft::default()).is_err());

        let t = save_template(
            &mut doc,
            &TemplateDraft {
                name: " Fractions quiz ".into(),
                subject: "math".into(),
                ..TemplateDraft::default()
            },
        )
        .expect("template");
        assert_eq!(t.name, "Fractions quiz");
        assert_eq!(doc.templates.len(), 1);
    }
}
