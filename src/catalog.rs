//! Selectable values offered for each spec field.
//!
//! These are suggestions, not constraints: any text is accepted by the store.

pub const AVAILABLE_MODELS: [&str; 2] = ["gemini-2.5-pro", "gemini-2.5-flash"];

pub const PHP_VERSIONS: [&str; 4] = ["8.3", "8.2", "8.1", "8.0"];

/// CodeIgniter is selectable but has no preset.
pub const FRAMEWORKS: [&str; 4] = ["Laravel", "Symfony", "CodeIgniter", "Custom / Vanilla PHP"];

pub const DATABASES: [&str; 4] = ["PostgreSQL", "MySQL", "MariaDB", "SQLite"];

pub const WEB_SERVERS: [&str; 3] = ["Nginx", "Apache", "LiteSpeed"];

pub const CACHING_LAYERS: [&str; 4] = ["Redis", "Memcached", "File", "None"];

pub const QUEUE_SYSTEMS: [&str; 4] = ["Redis (Horizon)", "RabbitMQ", "Database", "Sync (None)"];

pub const DATABASE_LAYERS: [&str; 4] = ["Eloquent ORM", "Doctrine", "Plain PDO", "RedBeanPHP"];

pub const AUTH_METHODS: [&str; 4] = [
    "Laravel Sanctum",
    "JWT (JSON Web Tokens)",
    "Session-based",
    "None",
];

pub const PSR_STANDARDS: [&str; 6] = ["PSR-12", "PSR-4", "PSR-7", "PSR-11", "PSR-15", "PSR-3"];

pub const DESIGN_PATTERNS: [&str; 8] = [
    "Repository Pattern",
    "Service Container (DI)",
    "DTOs (Data Transfer Objects)",
    "API Resources",
    "Middleware",
    "Factory Pattern",
    "Strategy Pattern",
    "Observer Pattern",
];

pub const CORE_COMPOSER_PACKAGES: [&str; 5] = [
    "monolog/monolog",
    "vlucas/phpdotenv",
    "ramsey/uuid",
    "league/flysystem",
    "phpunit/phpunit",
];

/// Catalog sections in display order, as `(title, values)`.
pub fn sections() -> Vec<(&'static str, Vec<&'static str>)> {
    vec![
        ("Models", AVAILABLE_MODELS.to_vec()),
        (
            "Project types",
            crate::spec::ProjectType::ALL.iter().map(|t| t.as_str()).collect(),
        ),
        ("PHP versions", PHP_VERSIONS.to_vec()),
        ("Frameworks", FRAMEWORKS.to_vec()),
        ("Databases", DATABASES.to_vec()),
        ("Web servers", WEB_SERVERS.to_vec()),
        ("Caching layers", CACHING_LAYERS.to_vec()),
        ("Queue systems", QUEUE_SYSTEMS.to_vec()),
        ("DB layers / ORMs", DATABASE_LAYERS.to_vec()),
        ("Authentication", AUTH_METHODS.to_vec()),
        ("PSR standards", PSR_STANDARDS.to_vec()),
        ("Design patterns", DESIGN_PATTERNS.to_vec()),
        ("Core Composer packages", CORE_COMPOSER_PACKAGES.to_vec()),
    ]
}
