pub mod catalog;
pub mod codec;
pub mod config;
pub mod grader;
pub mod sandbox;
pub mod session;

pub fn create_timestamp() -> String {
    use chrono::{SecondsFormat, Utc};
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
