//! Page rendering with minijinja over the HTML files under `templates/`.
//!
//! Pages extend `base.html`. Templates ending in `.html` are auto-escaped
//! and referencing an undefined variable is an error.

use minijinja::{Environment, UndefinedBehavior};
use serde::Serialize;
use std::sync::OnceLock;

pub use minijinja::Error as TemplateError;

static TEMPLATES: &[(&str, &str)] = &[
    ("base.html", include_str!("../../templates/base.html")),
    ("401.html", include_str!("../../templates/401.html")),
    ("404.html", include_str!("../../templates/404.html")),
    ("500.html", include_str!("../../templates/500.html")),
    ("home.html", include_str!("../../templates/home.html")),
    ("about.html", include_str!("../../templates/about.html")),
    ("members.html", include_str!("../../templates/members.html")),
];

fn source(name: &str) -> Option<&'static str> {
    TEMPLATES
        .iter()
        .find(|(template, _)| *template == name)
        .map(|(_, source)| *source)
}

fn environment() -> &'static Environment<'static> {
    static ENV: OnceLock<Environment<'static>> = OnceLock::new();
    ENV.get_or_init(|| {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_loader(|name| Ok(source(name).map(str::to_string)));
        env
    })
}

/// Renders the named template with `ctx`.
pub fn render<S: Serialize>(name: &str, ctx: S) -> Result<String, TemplateError> {
    environment().get_template(name)?.render(ctx)
}
