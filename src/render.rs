//! Variable rendering.
//!
//! The workflow engine owns templating; this crate only consumes it through
//! the [`Renderer`] trait. [`TemplateRenderer`] is the built-in
//! implementation used by the CLI and the tests: it substitutes
//! `{{ name }}` and dotted `{{ a.b.c }}` placeholders from a JSON variable map.

use std::collections::BTreeMap;
use std::fmt::Debug;

use serde_json::{Map, Value};
use thiserror::Error;

/// Template variables, keyed by top-level name.
pub type Vars = Map<String, Value>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("undefined variable '{name}' in template '{template}'")]
    UndefinedVariable { name: String, template: String },

    #[error("unclosed '{{{{' in template '{template}'")]
    Unclosed { template: String },

    #[error("empty expression in template '{template}'")]
    EmptyExpression { template: String },
}

/// Pure templating function consumed by the orchestrator.
pub trait Renderer: Send + Sync + Debug {
    fn render(&self, template: &str, vars: &Vars) -> Result<String, RenderError>;

    fn render_all(&self, templates: &[String], vars: &Vars) -> Result<Vec<String>, RenderError> {
        templates.iter().map(|t| self.render(t, vars)).collect()
    }

    /// Render both keys and values of a map.
    fn render_map(
        &self,
        map: &BTreeMap<String, String>,
        vars: &Vars,
    ) -> Result<BTreeMap<String, String>, RenderError> {
        map.iter()
            .map(|(k, v)| Ok((self.render(k, vars)?, self.render(v, vars)?)))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateRenderer;

impl Renderer for TemplateRenderer {
    fn render(&self, template: &str, vars: &Vars) -> Result<String, RenderError> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after.find("}}").ok_or_else(|| RenderError::Unclosed {
                template: template.to_string(),
            })?;

            let expr = after[..end].trim();
            if expr.is_empty() {
                return Err(RenderError::EmptyExpression {
                    template: template.to_string(),
                });
            }

            let value = lookup(vars, expr).ok_or_else(|| RenderError::UndefinedVariable {
                name: expr.to_string(),
                template: template.to_string(),
            })?;
            push_value(&mut out, value);

            rest = &after[end + 2..];
        }

        out.push_str(rest);
        Ok(out)
    }
}

fn lookup<'a>(vars: &'a Vars, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = vars.get(parts.next()?)?;
    for part in parts {
        current = match current {
            Value::Object(map) => map.get(part)?,
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn push_value(out: &mut String, value: &Value) {
    match value {
        Value::String(s) => out.push_str(s),
        Value::Null => {}
        other => out.push_str(&other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn vars() -> Vars {
        let Value::Object(map) = json!({
            "workingDir": "/tmp/w",
            "count": 3,
            "flow": { "namespace": "company.team", "labels": ["a", "b"] }
        }) else {
            unreachable!()
        };
        map
    }

    #[test]
    fn substitutes_flat_and_dotted_names() {
        let out = TemplateRenderer
            .render("cd {{ workingDir }} && echo {{flow.namespace}} {{ count }}", &vars())
            .unwrap();
        assert_eq!(out, "cd /tmp/w && echo company.team 3");
    }

    #[test]
    fn indexes_into_arrays() {
        let out = TemplateRenderer.render("{{ flow.labels.1 }}", &vars()).unwrap();
        assert_eq!(out, "b");
    }

    #[test]
    fn plain_text_is_untouched() {
        let out = TemplateRenderer.render("echo 'no vars here' }}", &vars()).unwrap();
        assert_eq!(out, "echo 'no vars here' }}");
    }

    #[test]
    fn undefined_variable_fails() {
        let err = TemplateRenderer.render("{{ missing }}", &vars()).unwrap_err();
        assert!(matches!(err, RenderError::UndefinedVariable { ref name, .. } if name == "missing"));
    }

    #[test]
    fn unclosed_expression_fails() {
        let err = TemplateRenderer.render("echo {{ workingDir", &vars()).unwrap_err();
        assert!(matches!(err, RenderError::Unclosed { .. }));
    }

    #[test]
    fn render_map_renders_keys_and_values() {
        let mut env = BTreeMap::new();
        env.insert("DIR_{{ count }}".to_string(), "{{ workingDir }}/out".to_string());
        let out = TemplateRenderer.render_map(&env, &vars()).unwrap();
        assert_eq!(out.get("DIR_3").map(String::as_str), Some("/tmp/w/out"));
    }
}
