// SPDX-FileCopyrightText: 2026 TMS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Brand-aware greeting replies.
//!
//! The template is picked deterministically from the brand fields that are
//! present, so the same tenant always gets the same wording at the same
//! time of day.

use std::sync::Arc;

use chrono::{DateTime, Local, Timelike, Utc};
use serde::Serialize;
use strum::{Display, EnumString};
use tms_core::{BrandInfo, BrandSettingsSource, TmsError};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use uuid::Uuid;

/// Settings key holding the brand document.
pub const BRANDING_SETTINGS_KEY: &str = "branding_settings";

/// Template families, chosen by which brand fields are non-empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TemplateFamily {
    FullBrand,
    CompanyOnly,
    AboutOnly,
    Generic,
}

const FULL_BRAND_TEMPLATES: [&str; 3] = [
    "{timeOfDay}! Welcome to {companyName}. {about} How can we help you today?",
    "Hello! Thanks for reaching out to {companyName}. {about} - What can we assist you with?",
    "Hi there! You've reached {companyName} support. {about} How may we help you?",
];

const COMPANY_ONLY_TEMPLATES: [&str; 3] = [
    "{timeOfDay}! Welcome to {companyName}. How can we assist you today?",
    "Hello! You've reached {companyName} support. What can we help you with?",
    "Hi there! Thanks for contacting {companyName}. How may we help you?",
];

const ABOUT_ONLY_TEMPLATES: [&str; 3] = [
    "{timeOfDay}! {about} How can we help you today?",
    "Hello! {about} What can we assist you with?",
    "Hi there! {about} How may we help you?",
];

const GENERIC_TEMPLATES: [&str; 3] = [
    "{timeOfDay}! Welcome to our support. How can we help you today?",
    "Hello! Thanks for reaching out. What can we assist you with?",
    "Hi there! How may we help you today?",
];

/// The template catalogue, with `{timeOfDay}`, `{companyName}` and `{about}`
/// placeholders.
pub fn templates() -> [(TemplateFamily, [&'static str; 3]); 4] {
    [
        (TemplateFamily::FullBrand, FULL_BRAND_TEMPLATES),
        (TemplateFamily::CompanyOnly, COMPANY_ONLY_TEMPLATES),
        (TemplateFamily::AboutOnly, ABOUT_ONLY_TEMPLATES),
        (TemplateFamily::Generic, GENERIC_TEMPLATES),
    ]
}

/// Salutation for a local wall-clock hour.
pub fn time_of_day(hour: u32) -> &'static str {
    match hour {
        5..=11 => "Good morning",
        12..=16 => "Good afternoon",
        17..=21 => "Good evening",
        _ => "Hello",
    }
}

/// Greeting used when brand settings cannot be read.
pub fn default_greeting(time_of_day: &str) -> String {
    format!("{time_of_day}! Thanks for reaching out. How can we help you today?")
}

/// True when there is enough brand information for a branded greeting.
pub fn has_brand_identity(brand: &BrandInfo) -> bool {
    !brand.company_name.is_empty() || !brand.about.is_empty()
}

/// Pick and fill a template.
///
/// Within a family the index is the byte length of the keying field modulo
/// three; the generic family keys on `unix_secs` instead.
pub fn compose_greeting(
    brand: &BrandInfo,
    time_of_day: &str,
    unix_secs: i64,
) -> (TemplateFamily, String) {
    let company = brand.company_name.as_str();
    let about = brand.about.as_str();

    let (family, candidates, key) = match (company.is_empty(), about.is_empty()) {
        (false, false) => (TemplateFamily::FullBrand, FULL_BRAND_TEMPLATES, company.len()),
        (false, true) => (TemplateFamily::CompanyOnly, COMPANY_ONLY_TEMPLATES, company.len()),
        (true, false) => (TemplateFamily::AboutOnly, ABOUT_ONLY_TEMPLATES, about.len()),
        (true, true) => {
            let key = unix_secs.rem_euclid(GENERIC_TEMPLATES.len() as i64) as usize;
            (TemplateFamily::Generic, GENERIC_TEMPLATES, key)
        }
    };

    let template = candidates[key % candidates.len()];
    let message = render(template, time_of_day, company, about.trim());
    (family, message)
}

/// Single pass placeholder substitution; unknown placeholders are kept.
fn render(template: &str, time_of_day: &str, company: &str, about: &str) -> String {
    let mut out = String::with_capacity(template.len() + company.len() + about.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        let Some(close) = tail.find('}') else {
            out.push_str(tail);
            return out;
        };
        match &tail[1..close] {
            "timeOfDay" => out.push_str(time_of_day),
            "companyName" => out.push_str(company),
            "about" => out.push_str(about),
            _ => out.push_str(&tail[..=close]),
        }
        rest = &tail[close + 1..];
    }
    out.push_str(rest);
    out
}

/// A generated greeting and the brand fields it was built from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GreetingResponse {
    pub message: String,
    pub brand_info: BrandInfo,
    /// `branded_greeting` or `default_greeting`.
    pub template: &'static str,
    pub family: TemplateFamily,
    pub generated_at: DateTime<Utc>,
}

/// Builds greetings from per-project brand settings.
#[derive(Clone)]
pub struct BrandGreeter {
    settings: Arc<dyn BrandSettingsSource>,
}

impl BrandGreeter {
    pub fn new(settings: Arc<dyn BrandSettingsSource>) -> Self {
        Self { settings }
    }

    /// Read the brand fields for a project.
    pub async fn brand_info(
        &self,
        tenant_id: Uuid,
        project_id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<BrandInfo, TmsError> {
        let settings = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TmsError::Cancelled),
            res = self.settings.get_setting(tenant_id, project_id, BRANDING_SETTINGS_KEY) => res?,
        };
        Ok(BrandInfo::from_settings(&settings))
    }

    /// Greeting for a project, using the local clock.
    ///
    /// A failed settings read falls back to the default greeting; only
    /// cancellation is returned as an error.
    pub async fn generate(
        &self,
        tenant_id: Uuid,
        project_id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<GreetingResponse, TmsError> {
        let tod = time_of_day(Local::now().hour());
        let now = Utc::now();

        let brand_info = match self.brand_info(tenant_id, project_id, cancel).await {
            Ok(brand) => brand,
            Err(TmsError::Cancelled) => return Err(TmsError::Cancelled),
            Err(e) => {
                warn!(%tenant_id, %project_id, error = %e, "brand settings unavailable, using default greeting");
                return Ok(GreetingResponse {
                    message: default_greeting(tod),
                    brand_info: BrandInfo::default(),
                    template: "default_greeting",
                    family: TemplateFamily::Generic,
                    generated_at: now,
                });
            }
        };

        let (family, message) = compose_greeting(&brand_info, tod, now.timestamp());
        Ok(GreetingResponse {
            message,
            brand_info,
            template: "branded_greeting",
            family,
            generated_at: now,
        })
    }

    /// What a customer saying "Hello" would receive right now.
    pub async fn preview(
        &self,
        tenant_id: Uuid,
        project_id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<GreetingResponse, TmsError> {
        self.generate(tenant_id, project_id, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{Map, Value, json};

    struct StaticSettings(Option<Value>);

    #[async_trait]
    impl BrandSettingsSource for StaticSettings {
        async fn get_setting(
            &self,
            _tenant_id: Uuid,
            _project_id: Uuid,
            key: &str,
        ) -> Result<Map<String, Value>, TmsError> {
            assert_eq!(key, BRANDING_SETTINGS_KEY);
            match &self.0 {
                Some(Value::Object(map)) => Ok(map.clone()),
                _ => Err(TmsError::Lookup {
                    message: "setting not found".into(),
                    source: None,
                }),
            }
        }
    }

    fn brand(company: &str, about: &str) -> BrandInfo {
        BrandInfo {
            company_name: company.into(),
            about: about.into(),
            support_url: String::new(),
        }
    }

    #[test]
    fn time_of_day_boundaries() {
        assert_eq!(time_of_day(4), "Hello");
        assert_eq!(time_of_day(5), "Good morning");
        assert_eq!(time_of_day(11), "Good morning");
        assert_eq!(time_of_day(12), "Good afternoon");
        assert_eq!(time_of_day(17), "Good evening");
        assert_eq!(time_of_day(21), "Good evening");
        assert_eq!(time_of_day(22), "Hello");
    }

    #[test]
    fn company_only_template_keyed_by_name_length() {
        // "Acme" has 4 bytes: index 1.
        let (family, message) = compose_greeting(&brand("Acme", ""), "Good morning", 0);
        assert_eq!(family, TemplateFamily::CompanyOnly);
        assert_eq!(message, "Hello! You've reached Acme support. What can we help you with?");

        // "Globex" has 6 bytes: index 0.
        let (_, message) = compose_greeting(&brand("Globex", ""), "Good evening", 0);
        assert_eq!(message, "Good evening! Welcome to Globex. How can we assist you today?");
    }

    #[test]
    fn full_brand_template_trims_about() {
        let (family, message) =
            compose_greeting(&brand("Acme", "  We build rockets.  "), "Good morning", 0);
        assert_eq!(family, TemplateFamily::FullBrand);
        assert_eq!(
            message,
            "Hello! Thanks for reaching out to Acme. We build rockets. - What can we assist you with?"
        );
    }

    #[test]
    fn about_only_template_keyed_by_about_length() {
        let (family, message) = compose_greeting(&brand("", "Fast shipping."), "Hello", 0);
        assert_eq!(family, TemplateFamily::AboutOnly);
        assert_eq!(message, "Hi there! Fast shipping. How may we help you?");
    }

    #[test]
    fn generic_template_keyed_by_clock() {
        let empty = BrandInfo::default();
        let (family, first) = compose_greeting(&empty, "Good afternoon", 3);
        assert_eq!(family, TemplateFamily::Generic);
        assert_eq!(first, "Good afternoon! Welcome to our support. How can we help you today?");
        let (_, second) = compose_greeting(&empty, "Good afternoon", 4);
        assert_eq!(second, "Hello! Thanks for reaching out. What can we assist you with?");
    }

    #[test]
    fn equal_inputs_yield_equal_outputs() {
        let info = brand("Initech", "Printers and staplers.");
        assert_eq!(
            compose_greeting(&info, "Good morning", 10),
            compose_greeting(&info, "Good morning", 99)
        );
    }

    #[test]
    fn placeholders_are_substituted_once() {
        let (_, message) = compose_greeting(&brand("{about}", ""), "Hello", 0);
        assert!(message.contains("{about}"));
    }

    #[test]
    fn catalogue_lists_every_family() {
        let catalogue = templates();
        assert_eq!(catalogue.len(), 4);
        assert!(catalogue[0].1[0].contains("{companyName}"));
        assert_eq!(catalogue[3].0, TemplateFamily::Generic);
    }

    #[test]
    fn brand_identity_needs_name_or_about() {
        assert!(has_brand_identity(&brand("Acme", "")));
        assert!(has_brand_identity(&brand("", "About us")));
        assert!(!has_brand_identity(&BrandInfo::default()));
    }

    #[tokio::test]
    async fn generate_uses_brand_settings() {
        let greeter = BrandGreeter::new(Arc::new(StaticSettings(Some(json!({
            "company_name": "Acme",
            "support_url": "https://acme.test/help"
        })))));
        let greeting = greeter
            .generate(Uuid::new_v4(), Uuid::new_v4(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(greeting.template, "branded_greeting");
        assert_eq!(greeting.family, TemplateFamily::CompanyOnly);
        assert!(greeting.message.contains("Acme"));
        assert_eq!(greeting.brand_info.support_url, "https://acme.test/help");
    }

    #[tokio::test]
    async fn settings_failure_falls_back_to_default() {
        let greeter = BrandGreeter::new(Arc::new(StaticSettings(None)));
        let greeting = greeter
            .preview(Uuid::new_v4(), Uuid::new_v4(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(greeting.template, "default_greeting");
        assert!(greeting.message.ends_with("Thanks for reaching out. How can we help you today?"));
        assert_eq!(greeting.brand_info, BrandInfo::default());
    }

    #[tokio::test]
    async fn cancelled_generation_returns_cancelled() {
        let greeter = BrandGreeter::new(Arc::new(StaticSettings(None)));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = greeter
            .generate(Uuid::new_v4(), Uuid::new_v4(), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, TmsError::Cancelled));
    }
}
