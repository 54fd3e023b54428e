//! Text substitution for parameterized query templates.
//!
//! An action is `{{ .path }}`: a dotted path into the template data, or
//! `{{ . }}` for the data itself. Strings are inserted raw so templates can
//! place them inside their own quotes; every other value is inserted as
//! compact JSON.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::{FunctionError, FunctionResult};

static ACTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\{(.*?)\}\}").unwrap());

/// Render `template` against `data`.
pub fn render(template: &str, data: &Value) -> FunctionResult<String> {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;

    for caps in ACTION.captures_iter(template) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        push_literal(&mut out, &template[last..whole.start()])?;
        let value = resolve(inner.as_str().trim(), data)?;
        write_value(&mut out, value)?;
        last = whole.end();
    }
    push_literal(&mut out, &template[last..])?;

    Ok(out)
}

fn push_literal(out: &mut String, text: &str) -> FunctionResult<()> {
    if text.contains("{{") {
        return Err(FunctionError::Template("unterminated action `{{`".to_string()));
    }
    out.push_str(text);
    Ok(())
}

fn resolve<'a>(action: &str, data: &'a Value) -> FunctionResult<&'a Value> {
    let path = action.strip_prefix('.').ok_or_else(|| {
        FunctionError::Template(format!("unsupported action `{}`", action))
    })?;
    if path.is_empty() {
        return Ok(data);
    }

    let mut current = data;
    for segment in path.split('.') {
        let next = match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };
        current = next.ok_or_else(|| {
            FunctionError::Template(format!("no value for `.{}`", path))
        })?;
    }
    Ok(current)
}

fn write_value(out: &mut String, value: &Value) -> FunctionResult<()> {
    match value {
        Value::String(s) => out.push_str(s),
        other => out.push_str(&serde_json::to_string(other)?),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_paths() {
        let data = json!({"user": {"name": "alice", "age": 30}, "tags": ["a", "b"]});
        let rendered = render(
            r#"[{"$match": {"name": "{{ .user.name }}", "age": {{.user.age}}}}, {"tag": "{{ .tags.1 }}"}]"#,
            &data,
        )
        .unwrap();
        assert_eq!(
            rendered,
            r#"[{"$match": {"name": "alice", "age": 30}}, {"tag": "b"}]"#
        );
    }

    #[test]
    fn test_render_whole_value_as_json() {
        let data = json!({"dept": "eng"});
        assert_eq!(
            render(r#"[{"$match": {{ . }}}]"#, &data).unwrap(),
            r#"[{"$match": {"dept":"eng"}}]"#
        );
    }

    #[test]
    fn test_render_without_actions() {
        assert_eq!(render("[]", &Value::Null).unwrap(), "[]");
    }

    #[test]
    fn test_render_errors() {
        let data = json!({"a": 1});
        assert!(matches!(
            render("{{ .missing }}", &data),
            Err(FunctionError::Template(msg)) if msg.contains(".missing")
        ));
        assert!(matches!(
            render("{{ a }}", &data),
            Err(FunctionError::Template(_))
        ));
        assert!(matches!(
            render("[{{ .a }", &data),
            Err(FunctionError::Template(_))
        ));
    }
}
