pub mod analytics;
pub mod assessments;
pub mod core;
pub mod data;
pub mod profile;
