//! Framework presets.
//!
//! Choosing a framework pulls in its recommended packages, standards and
//! patterns (set union, current order first) and replaces the facts that
//! belong to exactly one framework: key commands, DB layer and auth method.

use tracing::{debug, info};

use crate::spec::ProjectSpec;

/// Static patch associated with a framework name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameworkPreset {
    pub name: &'static str,
    pub composer_packages: &'static [&'static str],
    pub key_commands: &'static [&'static str],
    pub database_layer: &'static str,
    pub auth_method: &'static str,
    pub psr_standards: &'static [&'static str],
    pub design_patterns: &'static [&'static str],
}

const PRESETS: [FrameworkPreset; 3] = [
    FrameworkPreset {
        name: "Laravel",
        composer_packages: &[
            "laravel/sanctum",
            "spatie/laravel-query-builder",
            "pestphp/pest-plugin-laravel",
            "spatie/laravel-permission",
            "laravel/horizon",
        ],
        key_commands: &[
            "composer install",
            "php artisan serve",
            "php artisan migrate --seed",
            "./vendor/bin/pest",
            "php artisan horizon",
        ],
        database_layer: "Eloquent ORM",
        auth_method: "Laravel Sanctum",
        psr_standards: &["PSR-12", "PSR-4"],
        design_patterns: &[
            "Repository Pattern",
            "Service Container (DI)",
            "API Resources",
            "DTOs",
        ],
    },
    FrameworkPreset {
        name: "Symfony",
        composer_packages: &[
            "symfony/orm-pack",
            "symfony/maker-bundle",
            "symfony/security-bundle",
            "lexik/jwt-authentication-bundle",
            "api-platform/core",
        ],
        key_commands: &[
            "composer install",
            "symfony server:start",
            "php bin/console doctrine:migrations:migrate",
            "./bin/phpunit",
        ],
        database_layer: "Doctrine",
        auth_method: "JWT (JSON Web Tokens)",
        psr_standards: &["PSR-12", "PSR-4", "PSR-7", "PSR-11"],
        design_patterns: &[
            "Service Container (DI)",
            "Repository Pattern",
            "DTOs",
            "Middleware",
        ],
    },
    FrameworkPreset {
        name: "Custom / Vanilla PHP",
        composer_packages: &[
            "vlucas/phpdotenv",
            "monolog/monolog",
            "league/route",
            "php-di/php-di",
            "illuminate/database",
        ],
        key_commands: &[
            "composer install",
            "php -S localhost:8000 -t public",
            "vendor/bin/phinx migrate",
            "vendor/bin/phpunit",
        ],
        database_layer: "Plain PDO",
        auth_method: "JWT (JSON Web Tokens)",
        psr_standards: &["PSR-12", "PSR-4", "PSR-7", "PSR-15"],
        design_patterns: &["Service Container (DI)", "Middleware", "Factory Pattern"],
    },
];

/// Look up the preset for `framework`. Names match exactly.
pub fn resolve(framework: &str) -> Option<&'static FrameworkPreset> {
    PRESETS.iter().find(|p| p.name == framework)
}

pub fn preset_names() -> impl Iterator<Item = &'static str> {
    PRESETS.iter().map(|p| p.name)
}

/// Return `current` with `framework` set and, for a known framework, its preset merged in.
///
/// Unknown names only change the `framework` field.
pub fn apply_preset(current: &ProjectSpec, framework: &str) -> ProjectSpec {
    let mut spec = current.clone();
    spec.framework = framework.to_owned();

    let Some(preset) = resolve(framework) else {
        debug!(framework, "no preset for framework; other fields untouched");
        return spec;
    };

    union_into(&mut spec.composer_packages, preset.composer_packages);
    union_into(&mut spec.psr_standards, preset.psr_standards);
    union_into(&mut spec.design_patterns, preset.design_patterns);

    spec.key_commands = preset.key_commands.iter().map(|c| (*c).to_owned()).collect();
    spec.database_layer = preset.database_layer.to_owned();
    spec.auth_method = preset.auth_method.to_owned();

    info!(
        framework,
        composer_packages = spec.composer_packages.len(),
        psr_standards = spec.psr_standards.len(),
        design_patterns = spec.design_patterns.len(),
        "framework preset applied"
    );

    spec
}

/// Set union keeping first occurrences: existing entries in their order,
/// then new ones in `additions` order. Duplicates already in `target` collapse.
fn union_into(target: &mut Vec<String>, additions: &[&str]) {
    let mut merged: Vec<String> = Vec::with_capacity(target.len() + additions.len());
    let existing = target.drain(..);
    for item in existing.chain(additions.iter().map(|s| (*s).to_owned())) {
        if !merged.contains(&item) {
            merged.push(item);
        }
    }
    *target = merged;
}
