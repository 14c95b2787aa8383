use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use minijinja::Environment;
use serde::Serialize;
use tracing::{debug, info};

// NOTE:
// Templates are compiled once at startup and shared read-only.
// Placeholders are `{{ context }}` and `{{ post }}`.

macro_rules! template_file {
    ($name:literal) => {
        include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/templates/",
            $name,
            ".jinja"
        ))
    };
}

const GENERATE_TEMPLATE: &str = template_file!("generate");
const REGENERATE_TEMPLATE: &str = template_file!("regenerate");
const REDUCE_TEMPLATE: &str = template_file!("reduce");
const ELABORATE_TEMPLATE: &str = template_file!("elaborate");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptKind {
    Generate,
    Regenerate,
    Reduce,
    Elaborate,
}

impl PromptKind {
    pub const ALL: [PromptKind; 4] = [
        PromptKind::Generate,
        PromptKind::Regenerate,
        PromptKind::Reduce,
        PromptKind::Elaborate,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PromptKind::Generate => "generate",
            PromptKind::Regenerate => "regenerate",
            PromptKind::Reduce => "reduce",
            PromptKind::Elaborate => "elaborate",
        }
    }

    fn builtin_source(self) -> &'static str {
        match self {
            PromptKind::Generate => GENERATE_TEMPLATE,
            PromptKind::Regenerate => REGENERATE_TEMPLATE,
            PromptKind::Reduce => REDUCE_TEMPLATE,
            PromptKind::Elaborate => ELABORATE_TEMPLATE,
        }
    }
}

/// Values substituted into a template. Absent fields render as empty.
#[derive(Debug, Default, Serialize)]
pub struct PromptVars<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post: Option<&'a str>,
}

impl<'a> PromptVars<'a> {
    pub fn context(context: &'a str) -> Self {
        Self {
            context: Some(context),
            post: None,
        }
    }

    pub fn post(post: &'a str, context: &'a str) -> Self {
        Self {
            context: Some(context),
            post: Some(post),
        }
    }
}

pub struct PromptLibrary {
    env: Environment<'static>,
}

impl PromptLibrary {
    pub fn builtin() -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        for kind in PromptKind::ALL {
            env.add_template(kind.name(), kind.builtin_source())?;
        }
        Ok(Self { env })
    }

    /// Builds the library, replacing any built-in template for which
    /// `<dir>/<kind>.jinja` exists.
    pub fn load(override_dir: Option<&Path>) -> Result<Self> {
        let Some(override_dir) = override_dir else {
            return Ok(Self::builtin()?);
        };

        let mut env = Environment::new();

        for kind in PromptKind::ALL {
            let path = override_dir.join(format!("{}.jinja", kind.name()));
            let source: &'static str = if path.exists() {
                let raw = fs::read_to_string(&path).with_context(|| {
                    format!("failed to read prompt template {}", path.display())
                })?;
                info!(
                    target = "prompts",
                    kind = kind.name(),
                    path = path.display().to_string(),
                    "using prompt template override"
                );
                // Lives for the whole process.
                Box::leak(raw.into_boxed_str())
            } else {
                debug!(
                    target = "prompts",
                    path = path.display().to_string(),
                    "no override found, using built-in template"
                );
                kind.builtin_source()
            };

            env.add_template(kind.name(), source)
                .with_context(|| format!("failed to compile {} template", kind.name()))?;
        }

        Ok(Self { env })
    }

    pub fn render(
        &self,
        kind: PromptKind,
        vars: &PromptVars<'_>,
    ) -> Result<String, minijinja::Error> {
        self.env.get_template(kind.name())?.render(vars)
    }
}
