// src/template.rs

//! Template rendering against the context's registered sources
//!
//! Templates are resolved by name through the context's template source
//! directories, in registration order; an absolute path renders that file
//! directly. The variable set is the context's shared values plus the `host`
//! key, overlaid with call-site options; call-site values win on collision.

use crate::context::Context;
use crate::error::{Error, Result};
use minijinja::{Environment, ErrorKind};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Render a named template with the context's values merged with `overrides`.
pub fn render(ctx: &Context, template: &str, overrides: &HashMap<String, Value>) -> Result<String> {
    let vars = merged_vars(ctx, overrides);

    let path = Path::new(template);
    if path.is_absolute() {
        let source = fs::read_to_string(path).map_err(|_| Error::TemplateNotFound {
            name: template.to_string(),
        })?;
        let env = Environment::new();
        return Ok(env.render_str(&source, &vars)?);
    }

    let mut env = Environment::new();
    let sources: Vec<_> = ctx.template_sources().to_vec();
    env.set_loader(move |name| {
        for dir in &sources {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return fs::read_to_string(&candidate).map(Some).map_err(|e| {
                    minijinja::Error::new(
                        ErrorKind::InvalidOperation,
                        format!("failed to read template source: {e}"),
                    )
                });
            }
        }
        Ok(None)
    });

    let tmpl = env.get_template(template).map_err(|e| {
        if e.kind() == ErrorKind::TemplateNotFound {
            Error::TemplateNotFound {
                name: template.to_string(),
            }
        } else {
            Error::Render(e)
        }
    })?;
    Ok(tmpl.render(&vars)?)
}

/// Context values plus `host`, overlaid with call-site options.
fn merged_vars(ctx: &Context, overrides: &HashMap<String, Value>) -> HashMap<String, Value> {
    let mut vars = ctx.values().clone();
    vars.insert("host".to_string(), Value::String(ctx.host().to_string()));
    for (key, value) in overrides {
        vars.insert(key.clone(), value.clone());
    }
    vars
}
