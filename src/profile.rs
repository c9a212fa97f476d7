use crate::model::{Document, Profile, Settings};
use crate::recorder::ValidationError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsPatch {
    pub auto_save: Option<bool>,
    pub dark_mode: Option<bool>,
    pub notifications: Option<bool>,
}

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

/// `local@domain.tld` shape: no whitespace, one `@`, a dot somewhere after it.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

pub fn save_profile(doc: &mut Document, input: &Profile) -> Result<Profile, ValidationError> {
    let profile = Profile {
        name: input.name.trim().to_string(),
        school: input.school.trim().to_string(),
        email: input.email.trim().to_string(),
    };
    if profile.name.is_empty() {
        return Err(ValidationError::MissingField("name"));
    }
    if !profile.email.is_empty() && !is_valid_email(&profile.email) {
        return Err(ValidationError::MalformedEmail(profile.email));
    }
    doc.profile = profile.clone();
    Ok(profile)
}

pub fn apply_settings(settings: &mut Settings, patch: &SettingsPatch) {
    if let Some(v) = patch.auto_save {
        settings.auto_save = v;
    }
    if let Some(v) = patch.dark_mode {
        settings.dark_mode = v;
    }
    if let Some(v) = patch.notifications {
        settings.notifications = v;
    }
}
