//! The project spec: every choice that feeds prompt compilation.
//!
//! Fields serialize with camelCase keys so persisted records, exported
//! files and imported documents all share one shape.
//!
//! Merging is explicit and field by field through [`SpecPatch`]. The
//! precedence, lowest first, is: defaults < persisted < imported < live edits.
//! Each layer is a `SpecPatch` overlaid on the one below, so a field that a
//! newer build adds always keeps its default when an older record lacks it.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::PlannerError;

pub const TEMPERATURE_MIN: f64 = 0.0;
pub const TEMPERATURE_MAX: f64 = 1.0;
pub const TOP_P_MIN: f64 = 0.01;
pub const TOP_P_MAX: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectType {
    #[serde(rename = "API")]
    Api,
    Marketplace,
    #[serde(rename = "CMS-based Website")]
    CmsWebsite,
    #[serde(rename = "Internal Tool")]
    InternalTool,
    Library,
    Custom,
}

impl ProjectType {
    pub const ALL: [ProjectType; 6] = [
        ProjectType::Api,
        ProjectType::Marketplace,
        ProjectType::CmsWebsite,
        ProjectType::InternalTool,
        ProjectType::Library,
        ProjectType::Custom,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProjectType::Api => "API",
            ProjectType::Marketplace => "Marketplace",
            ProjectType::CmsWebsite => "CMS-based Website",
            ProjectType::InternalTool => "Internal Tool",
            ProjectType::Library => "Library",
            ProjectType::Custom => "Custom",
        }
    }
}

impl fmt::Display for ProjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        ProjectType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                let names: Vec<&str> = ProjectType::ALL.iter().map(|t| t.as_str()).collect();
                format!("unknown project type {wanted:?} (expected one of: {})", names.join(", "))
            })
    }
}

/// Structured record of all project and generation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSpec {
    pub project_name: String,
    pub project_type: ProjectType,
    pub goal: String,
    pub core_features: Vec<String>,

    pub php_version: String,
    pub framework: String,
    pub web_server: Vec<String>,
    pub database: String,
    pub frontend_stack: Vec<String>,

    pub composer_packages: Vec<String>,
    pub psr_standards: Vec<String>,

    pub database_layer: String,
    pub use_migrations: bool,
    pub auth_method: String,
    pub design_patterns: Vec<String>,

    pub caching_layer: String,
    pub queue_system: String,
    pub monolog_channels: Vec<String>,
    pub use_api_rate_limiting: bool,
    pub is_api_first: bool,

    pub key_commands: Vec<String>,

    pub model: String,
    pub temperature: f64,
    pub top_p: f64,
    pub enable_thinking: bool,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_owned()).collect()
}

impl Default for ProjectSpec {
    fn default() -> Self {
        Self {
            project_name: "Modern Laravel API with Redis".to_owned(),
            project_type: ProjectType::Api,
            goal: "To create a robust and scalable API backend for a SaaS product, \
                   focusing on performance and maintainability."
                .to_owned(),
            core_features: strings(&[
                "User Authentication (JWT/Sanctum)",
                "Team & Subscription Management",
                "CRUD endpoints for Products",
                "Background Job Processing",
            ]),
            php_version: "8.3".to_owned(),
            framework: "Laravel".to_owned(),
            web_server: strings(&["Nginx"]),
            database: "PostgreSQL".to_owned(),
            frontend_stack: strings(&["Vue.js with Inertia.js"]),
            composer_packages: strings(&[
                "laravel/sanctum",
                "spatie/laravel-query-builder",
                "pestphp/pest-plugin-laravel",
                "spatie/laravel-permission",
                "laravel/horizon",
            ]),
            psr_standards: strings(&["PSR-12", "PSR-4", "PSR-7"]),
            database_layer: "Eloquent ORM".to_owned(),
            use_migrations: true,
            auth_method: "Laravel Sanctum".to_owned(),
            design_patterns: strings(&[
                "Repository Pattern",
                "Service Container (DI)",
                "API Resources",
                "DTOs",
            ]),
            caching_layer: "Redis".to_owned(),
            queue_system: "Redis (Horizon)".to_owned(),
            monolog_channels: strings(&["daily", "slack"]),
            use_api_rate_limiting: true,
            is_api_first: true,
            key_commands: strings(&[
                "composer install",
                "php artisan serve",
                "php artisan migrate --seed",
                "./vendor/bin/pest",
                "php artisan horizon",
            ]),
            model: "gemini-2.5-pro".to_owned(),
            temperature: 0.1,
            top_p: 0.95,
            enable_thinking: true,
        }
    }
}

impl ProjectSpec {
    /// Rebuild a spec from a persisted JSON value, merged over the default.
    ///
    /// Fields that are present but malformed keep their default value and
    /// are returned by name so the caller can log them. A value that is not
    /// a JSON object is an error.
    pub fn from_persisted(value: &Value) -> Result<(ProjectSpec, Vec<String>), String> {
        let map = value
            .as_object()
            .ok_or_else(|| format!("expected a JSON object, found {}", json_kind(value)))?;
        let (patch, rejected) = SpecPatch::from_json_lenient(map);
        Ok((patch.apply_to(&ProjectSpec::default()), rejected))
    }

    pub fn list(&self, field: SpecField) -> Option<&[String]> {
        let list = match field {
            SpecField::CoreFeatures => &self.core_features,
            SpecField::WebServer => &self.web_server,
            SpecField::FrontendStack => &self.frontend_stack,
            SpecField::ComposerPackages => &self.composer_packages,
            SpecField::PsrStandards => &self.psr_standards,
            SpecField::DesignPatterns => &self.design_patterns,
            SpecField::MonologChannels => &self.monolog_channels,
            SpecField::KeyCommands => &self.key_commands,
            _ => return None,
        };
        Some(list)
    }

    pub fn list_mut(&mut self, field: SpecField) -> Option<&mut Vec<String>> {
        let list = match field {
            SpecField::CoreFeatures => &mut self.core_features,
            SpecField::WebServer => &mut self.web_server,
            SpecField::FrontendStack => &mut self.frontend_stack,
            SpecField::ComposerPackages => &mut self.composer_packages,
            SpecField::PsrStandards => &mut self.psr_standards,
            SpecField::DesignPatterns => &mut self.design_patterns,
            SpecField::MonologChannels => &mut self.monolog_channels,
            SpecField::KeyCommands => &mut self.key_commands,
            _ => return None,
        };
        Some(list)
    }

    /// Pull temperature and topP back into their domains. Returns `true`
    /// when anything changed. Non-finite values fall back to the default.
    pub fn clamp_generation_params(&mut self) -> bool {
        let defaults = ProjectSpec::default();
        let before = (self.temperature, self.top_p);
        self.temperature = clamp_or(
            self.temperature,
            TEMPERATURE_MIN,
            TEMPERATURE_MAX,
            defaults.temperature,
        );
        self.top_p = clamp_or(self.top_p, TOP_P_MIN, TOP_P_MAX, defaults.top_p);
        before != (self.temperature, self.top_p)
    }
}

fn clamp_or(v: f64, min: f64, max: f64, fallback: f64) -> f64 {
    if v.is_finite() { v.clamp(min, max) } else { fallback }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// What kind of value a field holds, which decides how text input is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Number,
    Flag,
    ProjectType,
    List,
}

/// Every [`ProjectSpec`] field, addressable by its camelCase key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecField {
    ProjectName,
    ProjectType,
    Goal,
    CoreFeatures,
    PhpVersion,
    Framework,
    WebServer,
    Database,
    FrontendStack,
    ComposerPackages,
    PsrStandards,
    DatabaseLayer,
    UseMigrations,
    AuthMethod,
    DesignPatterns,
    CachingLayer,
    QueueSystem,
    MonologChannels,
    UseApiRateLimiting,
    IsApiFirst,
    KeyCommands,
    Model,
    Temperature,
    TopP,
    EnableThinking,
}

impl SpecField {
    pub const ALL: [SpecField; 25] = [
        SpecField::ProjectName,
        SpecField::ProjectType,
        SpecField::Goal,
        SpecField::CoreFeatures,
        SpecField::PhpVersion,
        SpecField::Framework,
        SpecField::WebServer,
        SpecField::Database,
        SpecField::FrontendStack,
        SpecField::ComposerPackages,
        SpecField::PsrStandards,
        SpecField::DatabaseLayer,
        SpecField::UseMigrations,
        SpecField::AuthMethod,
        SpecField::DesignPatterns,
        SpecField::CachingLayer,
        SpecField::QueueSystem,
        SpecField::MonologChannels,
        SpecField::UseApiRateLimiting,
        SpecField::IsApiFirst,
        SpecField::KeyCommands,
        SpecField::Model,
        SpecField::Temperature,
        SpecField::TopP,
        SpecField::EnableThinking,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SpecField::ProjectName => "projectName",
            SpecField::ProjectType => "projectType",
            SpecField::Goal => "goal",
            SpecField::CoreFeatures => "coreFeatures",
            SpecField::PhpVersion => "phpVersion",
            SpecField::Framework => "framework",
            SpecField::WebServer => "webServer",
            SpecField::Database => "database",
            SpecField::FrontendStack => "frontendStack",
            SpecField::ComposerPackages => "composerPackages",
            SpecField::PsrStandards => "psrStandards",
            SpecField::DatabaseLayer => "databaseLayer",
            SpecField::UseMigrations => "useMigrations",
            SpecField::AuthMethod => "authMethod",
            SpecField::DesignPatterns => "designPatterns",
            SpecField::CachingLayer => "cachingLayer",
            SpecField::QueueSystem => "queueSystem",
            SpecField::MonologChannels => "monologChannels",
            SpecField::UseApiRateLimiting => "useApiRateLimiting",
            SpecField::IsApiFirst => "isApiFirst",
            SpecField::KeyCommands => "keyCommands",
            SpecField::Model => "model",
            SpecField::Temperature => "temperature",
            SpecField::TopP => "topP",
            SpecField::EnableThinking => "enableThinking",
        }
    }

    pub fn kind(self) -> FieldKind {
        match self {
            SpecField::ProjectType => FieldKind::ProjectType,
            SpecField::Temperature | SpecField::TopP => FieldKind::Number,
            SpecField::UseMigrations
            | SpecField::UseApiRateLimiting
            | SpecField::IsApiFirst
            | SpecField::EnableThinking => FieldKind::Flag,
            SpecField::CoreFeatures
            | SpecField::WebServer
            | SpecField::FrontendStack
            | SpecField::ComposerPackages
            | SpecField::PsrStandards
            | SpecField::DesignPatterns
            | SpecField::MonologChannels
            | SpecField::KeyCommands => FieldKind::List,
            _ => FieldKind::Text,
        }
    }
}

impl fmt::Display for SpecField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Accepts the camelCase key as well as snake_case and kebab-case spellings.
impl FromStr for SpecField {
    type Err = PlannerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let folded: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();
        SpecField::ALL
            .into_iter()
            .find(|f| f.name().to_lowercase() == folded)
            .ok_or_else(|| PlannerError::UnknownField { name: s.to_owned() })
    }
}

/// Partial spec: `None` means "leave the field alone".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpecPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_type: Option<ProjectType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub core_features: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub php_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_server: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frontend_stack: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub composer_packages: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub psr_standards: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_layer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_migrations: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub design_patterns: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caching_layer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monolog_channels: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_api_rate_limiting: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_api_first: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_commands: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_number")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_number")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_thinking: Option<bool>,
}

/// Numbers may arrive as JSON numbers or as numeric text ("0.7").
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrText {
        Number(f64),
        Text(String),
    }

    match Option::<NumberOrText>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrText::Number(n)) => Ok(Some(n)),
        Some(NumberOrText::Text(s)) => parse_number(&s).map(Some).map_err(de::Error::custom),
    }
}

fn parse_number(raw: &str) -> Result<f64, String> {
    let n: f64 = raw
        .trim()
        .parse()
        .map_err(|e| format!("expected a number, got {raw:?}: {e}"))?;
    if !n.is_finite() {
        return Err(format!("expected a finite number, got {raw:?}"));
    }
    Ok(n)
}

fn parse_flag(raw: &str) -> Result<bool, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(format!("expected true/false, got {raw:?}")),
    }
}

impl SpecPatch {
    /// Strict parse of a JSON object; any malformed known field fails the whole patch.
    /// Unknown keys are ignored.
    pub fn from_json_object(map: &Map<String, Value>) -> Result<SpecPatch, serde_json::Error> {
        serde_json::from_value(Value::Object(map.clone()))
    }

    /// Parse each key on its own, keeping the fields that parse and
    /// returning the names of those that do not.
    pub fn from_json_lenient(map: &Map<String, Value>) -> (SpecPatch, Vec<String>) {
        let mut patch = SpecPatch::default();
        let mut rejected = Vec::new();
        for (key, value) in map {
            let mut single = Map::new();
            single.insert(key.clone(), value.clone());
            match serde_json::from_value::<SpecPatch>(Value::Object(single)) {
                Ok(one) => patch = patch.overlay(one),
                Err(_) => rejected.push(key.clone()),
            }
        }
        (patch, rejected)
    }

    /// One-field patch from text input, parsed according to the field's kind.
    pub fn from_field_text(field: SpecField, raw: &str) -> Result<SpecPatch, PlannerError> {
        let invalid = |detail: String| PlannerError::InvalidFieldValue {
            field: field.name().to_owned(),
            detail,
        };
        let text = || Some(raw.to_owned());
        let mut patch = SpecPatch::default();
        match field {
            SpecField::ProjectName => {
                if raw.trim().is_empty() {
                    return Err(invalid("project name must not be blank".to_owned()));
                }
                patch.project_name = text()
            }
            SpecField::Goal => patch.goal = text(),
            SpecField::PhpVersion => patch.php_version = text(),
            SpecField::Framework => patch.framework = text(),
            SpecField::Database => patch.database = text(),
            SpecField::DatabaseLayer => patch.database_layer = text(),
            SpecField::AuthMethod => patch.auth_method = text(),
            SpecField::CachingLayer => patch.caching_layer = text(),
            SpecField::QueueSystem => patch.queue_system = text(),
            SpecField::Model => patch.model = text(),
            SpecField::ProjectType => patch.project_type = Some(raw.parse().map_err(invalid)?),
            SpecField::Temperature => patch.temperature = Some(parse_number(raw).map_err(invalid)?),
            SpecField::TopP => patch.top_p = Some(parse_number(raw).map_err(invalid)?),
            SpecField::UseMigrations => {
                patch.use_migrations = Some(parse_flag(raw).map_err(invalid)?)
            }
            SpecField::UseApiRateLimiting => {
                patch.use_api_rate_limiting = Some(parse_flag(raw).map_err(invalid)?)
            }
            SpecField::IsApiFirst => patch.is_api_first = Some(parse_flag(raw).map_err(invalid)?),
            SpecField::EnableThinking => {
                patch.enable_thinking = Some(parse_flag(raw).map_err(invalid)?)
            }
            SpecField::CoreFeatures
            | SpecField::WebServer
            | SpecField::FrontendStack
            | SpecField::ComposerPackages
            | SpecField::PsrStandards
            | SpecField::DesignPatterns
            | SpecField::MonologChannels
            | SpecField::KeyCommands => {
                return Err(PlannerError::ListFieldNeedsListEdit {
                    field: field.name().to_owned(),
                });
            }
        }
        Ok(patch)
    }

    /// Field-by-field overlay: values set in `over` win.
    pub fn overlay(self, over: SpecPatch) -> SpecPatch {
        SpecPatch {
            project_name: over.project_name.or(self.project_name),
            project_type: over.project_type.or(self.project_type),
            goal: over.goal.or(self.goal),
            core_features: over.core_features.or(self.core_features),
            php_version: over.php_version.or(self.php_version),
            framework: over.framework.or(self.framework),
            web_server: over.web_server.or(self.web_server),
            database: over.database.or(self.database),
            frontend_stack: over.frontend_stack.or(self.frontend_stack),
            composer_packages: over.composer_packages.or(self.composer_packages),
            psr_standards: over.psr_standards.or(self.psr_standards),
            database_layer: over.database_layer.or(self.database_layer),
            use_migrations: over.use_migrations.or(self.use_migrations),
            auth_method: over.auth_method.or(self.auth_method),
            design_patterns: over.design_patterns.or(self.design_patterns),
            caching_layer: over.caching_layer.or(self.caching_layer),
            queue_system: over.queue_system.or(self.queue_system),
            monolog_channels: over.monolog_channels.or(self.monolog_channels),
            use_api_rate_limiting: over.use_api_rate_limiting.or(self.use_api_rate_limiting),
            is_api_first: over.is_api_first.or(self.is_api_first),
            key_commands: over.key_commands.or(self.key_commands),
            model: over.model.or(self.model),
            temperature: over.temperature.or(self.temperature),
            top_p: over.top_p.or(self.top_p),
            enable_thinking: over.enable_thinking.or(self.enable_thinking),
        }
    }

    /// Shallow-merge this patch over `base`; fields left `None` keep `base`'s value.
    pub fn apply_to(self, base: &ProjectSpec) -> ProjectSpec {
        let b = base.clone();
        let mut spec = ProjectSpec {
            project_name: self.project_name.unwrap_or(b.project_name),
            project_type: self.project_type.unwrap_or(b.project_type),
            goal: self.goal.unwrap_or(b.goal),
            core_features: self.core_features.unwrap_or(b.core_features),
            php_version: self.php_version.unwrap_or(b.php_version),
            framework: self.framework.unwrap_or(b.framework),
            web_server: self.web_server.unwrap_or(b.web_server),
            database: self.database.unwrap_or(b.database),
            frontend_stack: self.frontend_stack.unwrap_or(b.frontend_stack),
            composer_packages: self.composer_packages.unwrap_or(b.composer_packages),
            psr_standards: self.psr_standards.unwrap_or(b.psr_standards),
            database_layer: self.database_layer.unwrap_or(b.database_layer),
            use_migrations: self.use_migrations.unwrap_or(b.use_migrations),
            auth_method: self.auth_method.unwrap_or(b.auth_method),
            design_patterns: self.design_patterns.unwrap_or(b.design_patterns),
            caching_layer: self.caching_layer.unwrap_or(b.caching_layer),
            queue_system: self.queue_system.unwrap_or(b.queue_system),
            monolog_channels: self.monolog_channels.unwrap_or(b.monolog_channels),
            use_api_rate_limiting: self.use_api_rate_limiting.unwrap_or(b.use_api_rate_limiting),
            is_api_first: self.is_api_first.unwrap_or(b.is_api_first),
            key_commands: self.key_commands.unwrap_or(b.key_commands),
            model: self.model.unwrap_or(b.model),
            temperature: self.temperature.unwrap_or(b.temperature),
            top_p: self.top_p.unwrap_or(b.top_p),
            enable_thinking: self.enable_thinking.unwrap_or(b.enable_thinking),
        };
        if spec.clamp_generation_params() {
            tracing::warn!(
                temperature = spec.temperature,
                top_p = spec.top_p,
                "generation parameters clamped into range"
            );
        }
        spec
    }
}
