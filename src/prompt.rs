//! Prompt compilation: a [`ProjectSpec`] snapshot in, prompt text and model
//! configuration out.
//!
//! This is the only place the text sent to the model is built. Compilation
//! is pure: no I/O, no clock, no randomness, so equal specs produce
//! byte-identical output.
//!
//! Rendering rules:
//!
//! - Bullet lists render one `- item` per line; an empty list renders
//!   `Not specified`.
//! - Inline lists (web servers, PSRs, Monolog channels) are comma-joined,
//!   with the same `Not specified` fallback.
//! - Key commands render one `` - `cmd` `` per line and an empty list renders
//!   as an empty block, not `Not specified`.
//! - Flags render as `Yes` / `No`.

use serde::Serialize;

use crate::spec::ProjectSpec;

/// Thinking budget sent when the spec enables thinking.
pub const THINKING_BUDGET: u32 = 8192;

const NOT_SPECIFIED: &str = "Not specified";

const PREAMBLE: &str = "Act as a world-class senior PHP architect and tech lead. Your task is to \
generate a comprehensive, professional, and actionable project plan for a modern PHP application \
based on the detailed specifications below. The output must be in well-formatted Markdown, with PHP \
code blocks correctly formatted and Mermaid.js syntax for diagrams.";

const TASK_SECTIONS: &str = r#"# Your Task: Generate a Detailed Project Plan

Based on the specification above, create a complete plan with the following sections:

1.  **Project Overview:** A professional summary of the project's purpose, scope, and key technologies.
2.  **System Architecture Diagram (Mermaid.js):** Create a Mermaid.js diagram (using a `graph TD` or `C4Context` block) illustrating the high-level architecture. It should show user interaction, the web server, the PHP application (framework), database, caching layer, and queue system.
3.  **Architectural Approach:** Justify the chosen architecture. Explain how the framework, database, cache, and queue system work together to meet the project's goals. Discuss the benefits of the API-first approach if selected.
4.  **Recommended Folder Structure (PSR-4 Compliant):** Provide a clear, tree-like folder structure appropriate for the chosen framework. Explain the purpose of key directories (`app/Http/Controllers`, `app/Services`, `app/Data`, `config`, etc.).
5.  **`composer.json` File:** Generate a complete, ready-to-use `composer.json` file. It must include the specified project name, description, chosen PHP version, all listed Composer packages, and a correctly configured PSR-4 autoload section for the `App\` namespace.
6.  **Design Pattern Implementation (PHP Examples):** Explain how 2-3 of the most critical specified design patterns should be implemented. Provide brief, framework-aware PHP code examples. For instance, if using Laravel and the Repository Pattern, show a `ProductRepositoryInterface` and a `EloquentProductRepository` implementation. If DTOs are selected, show a simple `ProductDto`.
7.  **Core Feature Implementation Snippets (PHP):** Provide high-quality, framework-aware starter code for one of the core features. For example, a route definition (`routes/api.php`), a controller method, a service class, and a form request for validation.
8.  **Database & Tooling Setup:**
    *   **Migration Example:** If migrations are enabled, provide a "create_products_table" migration using the framework's syntax.
    *   **Cache & Queue Config:** Provide guidance and example snippets for configuring the selected caching layer and queue system in the chosen framework (e.g., `.env` variables for Redis, supervisor config for queues).
    *   **Logging Setup:** Show how to configure Monolog for the specified channels (e.g., a custom channel in Laravel's `config/logging.php`).
9.  **Server Configuration:** Provide essential configuration snippets for the selected web servers (e.g., Apache `.htaccess` rewrite rules for the public directory, an Nginx server block with the correct `try_files` directive for a front controller).
10. **Development Roadmap / First Steps:** Outline a logical, step-by-step plan for developers to start the project, from environment setup to implementing the first feature.

Ensure the entire response is a single, clean Markdown document ready for a developer to use."#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThinkingConfig {
    pub thinking_budget: u32,
}

/// Sampling configuration sent alongside the prompt.
///
/// `thinking_config` is omitted from the JSON entirely when thinking is off.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfig {
    pub temperature: f64,
    pub top_p: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking_config: Option<ThinkingConfig>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledPrompt {
    pub prompt_text: String,
    pub model_config: ModelConfig,
}

pub fn compile(spec: &ProjectSpec) -> CompiledPrompt {
    CompiledPrompt {
        prompt_text: prompt_text(spec),
        model_config: model_config(spec),
    }
}

pub fn model_config(spec: &ProjectSpec) -> ModelConfig {
    ModelConfig {
        temperature: spec.temperature,
        top_p: spec.top_p,
        thinking_config: spec.enable_thinking.then_some(ThinkingConfig {
            thinking_budget: THINKING_BUDGET,
        }),
    }
}

pub fn prompt_text(spec: &ProjectSpec) -> String {
    format!(
        "{PREAMBLE}

# Project Specification

- **Project Name:** {project_name}
- **Project Type:** {project_type}
- **Main Goal:** {goal}

## Core Features
{core_features}

## Technology Stack
- **PHP Version:** {php_version}
- **Framework:** {framework}
- **Web Server(s):** {web_server}
- **Database:** {database}
- **Frontend Stack:**
{frontend_stack}

## Architecture & Standards
- **Authentication Method:** {auth_method}
- **Database Layer / ORM:** {database_layer}
- **Caching Layer:** {caching_layer}
- **Queue System:** {queue_system}
- **Key Architectural Choices:**
  - Use Database Migrations: {use_migrations}
  - API-First Approach: {is_api_first}
  - Use API Rate Limiting: {use_api_rate_limiting}
- **Adhered PSR Standards:** {psr_standards}
- **Intended Design Patterns:**
{design_patterns}

## Dependencies & Tooling
- **Key Composer Packages:**
{composer_packages}
- **Monolog Logging Channels:** {monolog_channels}
- **Key Commands:**
{key_commands}

{TASK_SECTIONS}
",
        project_name = spec.project_name,
        project_type = spec.project_type,
        goal = spec.goal,
        core_features = bullet_list(&spec.core_features),
        php_version = spec.php_version,
        framework = spec.framework,
        web_server = inline_list(&spec.web_server),
        database = spec.database,
        frontend_stack = indent(&bullet_list(&spec.frontend_stack)),
        auth_method = spec.auth_method,
        database_layer = spec.database_layer,
        caching_layer = spec.caching_layer,
        queue_system = spec.queue_system,
        use_migrations = yes_no(spec.use_migrations),
        is_api_first = yes_no(spec.is_api_first),
        use_api_rate_limiting = yes_no(spec.use_api_rate_limiting),
        psr_standards = inline_list(&spec.psr_standards),
        design_patterns = indent(&bullet_list(&spec.design_patterns)),
        composer_packages = indent(&bullet_list(&spec.composer_packages)),
        monolog_channels = inline_list(&spec.monolog_channels),
        key_commands = indent(&command_list(&spec.key_commands)),
    )
}

fn bullet_list(items: &[String]) -> String {
    if items.is_empty() {
        return NOT_SPECIFIED.to_owned();
    }
    items
        .iter()
        .map(|item| format!("- {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn inline_list(items: &[String]) -> String {
    if items.is_empty() {
        return NOT_SPECIFIED.to_owned();
    }
    items.join(", ")
}

// No fallback here: an empty command list stays an empty block.
fn command_list(items: &[String]) -> String {
    items
        .iter()
        .map(|cmd| format!("- `{cmd}`"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Nest a rendered block under a parent bullet.
fn indent(block: &str) -> String {
    block
        .lines()
        .map(|line| format!("  {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "Yes" } else { "No" }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> ProjectSpec {
        ProjectSpec::default()
    }

    #[test]
    fn compile_is_deterministic() {
        let a = compile(&spec());
        let b = compile(&spec());
        assert_eq!(a, b);
        assert_eq!(a.prompt_text.as_bytes(), b.prompt_text.as_bytes());
    }

    #[test]
    fn prompt_has_labelled_sections_in_order() {
        let text = compile(&spec()).prompt_text;
        let headings = [
            "# Project Specification",
            "## Core Features",
            "## Technology Stack",
            "## Architecture & Standards",
            "## Dependencies & Tooling",
            "# Your Task: Generate a Detailed Project Plan",
        ];
        let mut last = 0;
        for heading in headings {
            let pos = text[last..]
                .find(heading)
                .unwrap_or_else(|| panic!("missing or out of order: {heading}"));
            last += pos + heading.len();
        }
    }

    #[test]
    fn prompt_lists_ten_numbered_tasks() {
        let text = compile(&spec()).prompt_text;
        for n in 1..=10 {
            let marker = format!("\n{n}. ");
            assert!(text.contains(&marker), "missing task {n}");
        }
        assert!(!text.contains("\n11. "));
        assert!(text.contains("for the `App\\` namespace"));
    }

    #[test]
    fn spec_fields_are_interpolated_verbatim() {
        let mut s = spec();
        s.project_name = "Shop <Beta> & Co".into();
        s.goal = "Sell things".into();
        let text = compile(&s).prompt_text;

        assert!(text.contains("- **Project Name:** Shop <Beta> & Co"));
        assert!(text.contains("- **Project Type:** API"));
        assert!(text.contains("- **Main Goal:** Sell things"));
        assert!(text.contains("- **Web Server(s):** Nginx"));
        assert!(text.contains("- **Adhered PSR Standards:** PSR-12, PSR-4, PSR-7"));
        assert!(text.contains("- **Monolog Logging Channels:** daily, slack"));
    }

    #[test]
    fn lists_render_one_bullet_per_line() {
        let text = compile(&spec()).prompt_text;
        assert!(text.contains(
            "## Core Features\n- User Authentication (JWT/Sanctum)\n- Team & Subscription Management\n"
        ));
        assert!(text.contains(
            "- **Key Composer Packages:**\n  - laravel/sanctum\n  - spatie/laravel-query-builder\n"
        ));
        assert!(
            text.contains("- **Key Commands:**\n  - `composer install`\n  - `php artisan serve`\n")
        );
    }

    #[test]
    fn flags_render_yes_no() {
        let mut s = spec();
        s.use_migrations = false;
        s.is_api_first = true;
        s.use_api_rate_limiting = false;
        let text = compile(&s).prompt_text;

        assert!(text.contains("Use Database Migrations: No"));
        assert!(text.contains("API-First Approach: Yes"));
        assert!(text.contains("Use API Rate Limiting: No"));
    }

    #[test]
    fn empty_lists_fall_back_to_not_specified() {
        let mut s = spec();
        s.core_features.clear();
        s.frontend_stack.clear();
        s.composer_packages.clear();
        s.design_patterns.clear();
        s.web_server.clear();
        let text = compile(&s).prompt_text;

        assert!(text.contains("## Core Features\nNot specified\n"));
        assert!(text.contains("- **Frontend Stack:**\n  Not specified\n"));
        assert!(text.contains("- **Intended Design Patterns:**\n  Not specified\n"));
        assert!(text.contains("- **Key Composer Packages:**\n  Not specified\n"));
        assert!(text.contains("- **Web Server(s):** Not specified\n"));
    }

    #[test]
    fn empty_key_commands_render_empty_block() {
        let mut s = spec();
        s.key_commands.clear();
        let text = compile(&s).prompt_text;

        assert!(text.contains("- **Key Commands:**\n\n\n# Your Task"));
        assert!(!text.contains("- **Key Commands:**\nNot specified"));
        assert!(!text.contains("- **Key Commands:**\n  Not specified"));
    }

    #[test]
    fn model_config_without_thinking_omits_key() {
        let mut s = spec();
        s.enable_thinking = false;
        s.temperature = 0.3;
        s.top_p = 0.8;
        let cfg = compile(&s).model_config;

        assert_eq!(cfg.thinking_config, None);
        let json = serde_json::to_value(cfg).unwrap();
        assert_eq!(json, serde_json::json!({ "temperature": 0.3, "topP": 0.8 }));
        assert!(json.get("thinkingConfig").is_none());
    }

    #[test]
    fn model_config_with_thinking_sets_budget() {
        let mut s = spec();
        s.enable_thinking = true;
        let json = serde_json::to_value(compile(&s).model_config).unwrap();
        assert_eq!(json["thinkingConfig"]["thinkingBudget"], 8192);
    }
}
