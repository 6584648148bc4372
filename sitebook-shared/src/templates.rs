/// Message template variables
///
/// Templates mark placeholders as `{{ name }}`. Names use letters, digits,
/// `_` and `.`; whitespace inside the braces is optional.
///
/// # Example
///
/// ```
/// use std::collections::HashMap;
/// use sitebook_shared::templates::{extract_variables, substitute_variables};
///
/// let template = "Hi {{client.name}}, invoice {{ invoice_number }} is due.";
/// assert_eq!(extract_variables(template), vec!["client.name", "invoice_number"]);
///
/// let vars = HashMap::from([("client.name".to_string(), "Maya".to_string())]);
/// assert_eq!(
///     substitute_variables(template, &vars),
///     "Hi Maya, invoice {{ invoice_number }} is due."
/// );
/// ```

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

static VARIABLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z0-9_.]+)\s*\}\}").expect("valid template variable regex")
});

/// Unique variable names in order of first appearance
pub fn extract_variables(template: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    VARIABLE_RE
        .captures_iter(template)
        .filter_map(|caps| {
            let name = caps[1].to_string();
            seen.insert(name.clone()).then_some(name)
        })
        .collect()
}

/// Replaces every token whose name is in `vars`
///
/// Unknown tokens stay as written. Values are inserted literally and are not
/// scanned for further tokens.
pub fn substitute_variables(template: &str, vars: &HashMap<String, String>) -> String {
    VARIABLE_RE
        .replace_all(template, |caps: &Captures<'_>| match vars.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// A rendered template plus the variables nobody supplied
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedTemplate {
    pub subject: String,
    pub body: String,
    pub missing_variables: Vec<String>,
}

/// Renders a subject/body pair and reports unfilled variables
pub fn render(subject: &str, body: &str, vars: &HashMap<String, String>) -> RenderedTemplate {
    let mut missing: Vec<String> = Vec::new();
    for name in extract_variables(subject)
        .into_iter()
        .chain(extract_variables(body))
    {
        if !vars.contains_key(&name) && !missing.contains(&name) {
            missing.push(name);
        }
    }

    RenderedTemplate {
        subject: substitute_variables(subject, vars),
        body: substitute_variables(body, vars),
        missing_variables: missing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_extract_unique_in_order() {
        let template = "{{b}} {{ a }} {{b}} {{c.d}} {{  a}}";
        assert_eq!(extract_variables(template), vec!["b", "a", "c.d"]);
    }

    #[test]
    fn test_extract_ignores_malformed_tokens() {
        assert!(extract_variables("{{}} {{ two words }} {single} {{bad-name}}").is_empty());
    }

    #[test]
    fn test_substitute_leaves_unknown_tokens() {
        let out = substitute_variables("{{ a }} and {{b}}", &vars(&[("a", "1")]));
        assert_eq!(out, "1 and {{b}}");
    }

    #[test]
    fn test_values_are_not_rescanned() {
        let out = substitute_variables("{{a}}", &vars(&[("a", "{{b}}"), ("b", "nope")]));
        assert_eq!(out, "{{b}}");
    }

    #[test]
    fn test_substitution_idempotent_once_keys_consumed() {
        let template = "Dear {{name}}, RFI {{rfi}} needs {{unknown}}";
        let v = vars(&[("name", "Lee"), ("rfi", "RFI-00012")]);
        let once = substitute_variables(&template, &v);
        assert_eq!(substitute_variables(&once, &v), once);
    }

    #[test]
    fn test_substituting_all_extracted_removes_tokens() {
        let template = "{{ project }}: {{phase}} starts {{date}}; ask {{ project }} lead";
        let v: HashMap<String, String> = extract_variables(template)
            .into_iter()
            .map(|name| (name.clone(), format!("<{name}>")))
            .collect();

        let out = substitute_variables(template, &v);
        assert!(!out.contains("{{"));
        assert!(extract_variables(&out).is_empty());
        assert_eq!(out, "<project>: <phase> starts <date>; ask <project> lead");
    }

    #[test]
    fn test_render_reports_missing() {
        let rendered = render(
            "Invoice {{number}}",
            "Hello {{name}}, total {{total}}. Ref {{number}}",
            &vars(&[("number", "INV-00007")]),
        );

        assert_eq!(rendered.subject, "Invoice INV-00007");
        assert_eq!(rendered.missing_variables, vec!["name", "total"]);
    }
}
