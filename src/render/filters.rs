//! Template helpers: label-selector generation and block-YAML embedding.
//!
//! Every helper is a pure function of its arguments — the tera registrations
//! below are thin adapters over the plain functions so the behavior is
//! testable without an engine.
//!
//! The embed idiom used throughout generated templates is
//! `| to_nice_yaml | indent(width=N)`: serialize a previously rendered
//! fragment as block YAML, then indent its continuation lines so the splice
//! stays valid YAML at the insertion column.

use std::collections::HashMap;

use tera::{Tera, Value};

/// Query-language dialect for label selector clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Prometheus,
    Influx,
}

impl Dialect {
    /// Resolve a dialect from a datasource or dialect name.
    ///
    /// Matching is substring-based so datasource names like `influxdb` or
    /// `prometheus-prod` resolve without extra configuration.
    pub fn for_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        if lower.contains("influx") {
            Some(Dialect::Influx)
        } else if lower.contains("prom") {
            Some(Dialect::Prometheus)
        } else {
            None
        }
    }
}

/// Build a label-selector clause for the given dialect.
///
/// Prometheus yields a brace selector with regex matches, empty braces for
/// an empty label list:
///
/// ```text
/// {host=~"$host",env=~"$env"}     {}
/// ```
///
/// Influx yields an `AND`-joined WHERE-style clause, the empty string for an
/// empty label list:
///
/// ```text
/// host = '${host}' AND env = '${env}'
/// ```
pub fn label_selector(dialect: Dialect, labels: &[String]) -> String {
    match dialect {
        Dialect::Prometheus => {
            let clauses: Vec<String> =
                labels.iter().map(|l| format!("{l}=~\"${l}\"")).collect();
            format!("{{{}}}", clauses.join(","))
        }
        Dialect::Influx => {
            let clauses: Vec<String> =
                labels.iter().map(|l| format!("{l} = '${{{l}}}'")).collect();
            clauses.join(" AND ")
        }
    }
}

/// Serialize a value as block YAML.
pub fn to_block_yaml(value: &Value) -> Result<String, serde_yaml::Error> {
    serde_yaml::to_string(value)
}

/// Indent each line of `text` by `width` spaces.
///
/// The first line is skipped unless `first` is set, and blank lines are
/// skipped unless `blank` is set — matching what an embed at a list-item
/// column needs. A trailing newline is preserved.
pub fn indent_block(text: &str, width: usize, first: bool, blank: bool) -> String {
    let pad = " ".repeat(width);
    text.split('\n')
        .enumerate()
        .map(|(i, line)| {
            let skip = (i == 0 && !first) || (line.is_empty() && !blank);
            if skip { line.to_string() } else { format!("{pad}{line}") }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Register the dashforge helpers on a tera instance.
pub fn register(tera: &mut Tera) {
    tera.register_filter("to_nice_yaml", to_nice_yaml_filter);
    tera.register_filter("indent", indent_filter);
    tera.register_function("label_selector", label_selector_fn);
}

fn to_nice_yaml_filter(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    let yaml = to_block_yaml(value)
        .map_err(|e| tera::Error::msg(format!("to_nice_yaml failed: {e}")))?;
    Ok(Value::String(yaml))
}

fn indent_filter(value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
    let text = value
        .as_str()
        .ok_or_else(|| tera::Error::msg("indent filter requires a string value"))?;
    let width = args
        .get("width")
        .and_then(Value::as_u64)
        .ok_or_else(|| tera::Error::msg("indent filter requires a numeric `width` argument"))?;
    let first = args.get("first").and_then(Value::as_bool).unwrap_or(false);
    let blank = args.get("blank").and_then(Value::as_bool).unwrap_or(false);
    Ok(Value::String(indent_block(text, width as usize, first, blank)))
}

fn label_selector_fn(args: &HashMap<String, Value>) -> tera::Result<Value> {
    let dialect_name = args
        .get("dialect")
        .and_then(Value::as_str)
        .ok_or_else(|| tera::Error::msg("label_selector requires a string `dialect` argument"))?;
    let dialect = Dialect::for_name(dialect_name).ok_or_else(|| {
        tera::Error::msg(format!(
            "label_selector: unknown dialect '{dialect_name}' (expected a prometheus or influx name)"
        ))
    })?;
    let labels: Vec<String> = match args.get("labels") {
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| {
                v.as_str().map(str::to_string).ok_or_else(|| {
                    tera::Error::msg("label_selector: `labels` must be an array of strings")
                })
            })
            .collect::<tera::Result<_>>()?,
        Some(_) => {
            return Err(tera::Error::msg(
                "label_selector: `labels` must be an array of strings",
            ));
        }
        None => {
            return Err(tera::Error::msg(
                "label_selector requires a `labels` argument (pass labels=labels)",
            ));
        }
    };
    Ok(Value::String(label_selector(dialect, &labels)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn prometheus_selector_keeps_label_order() {
        let got = label_selector(Dialect::Prometheus, &labels(&["host", "env"]));
        assert_eq!(got, r#"{host=~"$host",env=~"$env"}"#);
    }

    #[test]
    fn prometheus_selector_empty_labels() {
        assert_eq!(label_selector(Dialect::Prometheus, &[]), "{}");
    }

    #[test]
    fn influx_selector_joins_with_and() {
        let got = label_selector(Dialect::Influx, &labels(&["host", "env"]));
        assert_eq!(got, "host = '${host}' AND env = '${env}'");
    }

    #[test]
    fn influx_selector_empty_labels() {
        assert_eq!(label_selector(Dialect::Influx, &[]), "");
    }

    #[test]
    fn dialect_resolution_from_datasource_names() {
        assert_eq!(Dialect::for_name("prometheus"), Some(Dialect::Prometheus));
        assert_eq!(Dialect::for_name("prometheus-prod"), Some(Dialect::Prometheus));
        assert_eq!(Dialect::for_name("influxdb"), Some(Dialect::Influx));
        assert_eq!(Dialect::for_name("graphite"), None);
    }

    #[test]
    fn indent_block_skips_first_and_blank_lines() {
        let text = "expr: up\nrefId: A\n";
        assert_eq!(indent_block(text, 2, false, false), "expr: up\n  refId: A\n");
    }

    #[test]
    fn indent_block_first_line_opt_in() {
        assert_eq!(indent_block("a\nb", 2, true, false), "  a\n  b");
    }

    #[test]
    fn embed_composition_stays_valid_yaml() {
        // what a generated panel template does with a rendered target
        let target = serde_json::json!({"expr": "up", "refId": "A"});
        let yaml = to_block_yaml(&target).unwrap();
        let spliced = format!("targets:\n- {}", indent_block(&yaml, 2, false, false));
        let parsed: serde_yaml::Value = serde_yaml::from_str(&spliced).unwrap();
        assert_eq!(parsed["targets"][0]["refId"], serde_yaml::Value::from("A"));
    }

    #[test]
    fn selector_function_requires_known_dialect() {
        let mut args = HashMap::new();
        args.insert("dialect".to_string(), Value::String("graphite".to_string()));
        args.insert("labels".to_string(), Value::Array(vec![]));
        assert!(label_selector_fn(&args).is_err());
    }
}
