//! List-query composition: text search, field filters and hook fragments.

use crate::config::ControllerOptions;
use crate::query::filter::{merge, normalize_query, Filter, FilterValue, Pattern, AND_GROUP, OR_GROUP};
use crate::store::parse_id;
use serde_json::Value;
use std::collections::HashMap;

const REGEX_METACHARACTERS: &[char] = &['.', '*', '+', '?', '^', '$', '{', '}', '(', ')', '|', '[', ']', '\\'];

/// Escape regex metacharacters so `term` matches literally.
pub fn escape_regex(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if REGEX_METACHARACTERS.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// One equality condition per eligible field present in `query`, in the order
/// of `filter_field_names`. Values that parse as a storage id become ids.
pub fn prepare_filter(query: &HashMap<String, String>, filter_field_names: &[String]) -> Vec<Filter> {
    filter_field_names
        .iter()
        .filter_map(|field| {
            let raw = query.get(field)?;
            let value = match parse_id(raw) {
                Some(id) => FilterValue::Id(id),
                None => FilterValue::Scalar(Value::String(raw.clone())),
            };
            Some(Filter::condition(field.clone(), value))
        })
        .collect()
}

/// Case-insensitive literal-substring condition per search field.
pub fn search_group(term: &str, search_field_names: &[String]) -> Vec<Filter> {
    let source = escape_regex(term);
    search_field_names
        .iter()
        .map(|field| {
            Filter::condition(
                field.clone(),
                FilterValue::Regex(Pattern {
                    source: source.clone(),
                    case_insensitive: true,
                }),
            )
        })
        .collect()
}

/// Build the list filter: search terms OR-ed, field filters AND-ed, the hook
/// fragment merged in, empty groups dropped.
pub fn compose_list_filter(
    term: &str,
    query: &HashMap<String, String>,
    options: &ControllerOptions,
    extra: Filter,
) -> Filter {
    let composed = Filter::new()
        .with(OR_GROUP, FilterValue::Group(search_group(term, &options.field_names_search)))
        .with(
            AND_GROUP,
            FilterValue::Group(prepare_filter(query, &options.field_names_search_filter)),
        );
    normalize_query(merge(composed, extra))
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::RegexBuilder;
    use serde_json::json;
    use uuid::Uuid;

    fn options(search: &[&str], filter: &[&str]) -> ControllerOptions {
        ControllerOptions {
            field_names: vec!["title".into()],
            field_names_search: search.iter().map(|s| s.to_string()).collect(),
            field_names_search_filter: filter.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn escapes_every_metacharacter() {
        assert_eq!(escape_regex(r"a.b*c"), r"a\.b\*c");
        assert_eq!(escape_regex(r"(x|y)[z]{1}+?^$\"), r"\(x\|y\)\[z\]\{1\}\+\?\^\$\\");
        assert_eq!(escape_regex("plain-text_1"), "plain-text_1");
    }

    #[test]
    fn escaped_term_matches_literally() {
        let group = search_group("a.b*c", &["title".to_string()]);
        let Some(FilterValue::Regex(pattern)) = group[0].get("title") else {
            panic!("expected regex");
        };
        let re = RegexBuilder::new(&pattern.source)
            .case_insensitive(pattern.case_insensitive)
            .build()
            .unwrap();
        assert!(re.is_match("see A.B*C here"));
        assert!(!re.is_match("axbbbc"));
    }

    #[test]
    fn prepare_filter_follows_field_order() {
        let q = query(&[("status", "open"), ("kind", "bug"), ("ignored", "x")]);
        let conditions = prepare_filter(&q, &["kind".to_string(), "missing".to_string(), "status".to_string()]);
        assert_eq!(
            conditions,
            vec![
                Filter::condition("kind", FilterValue::Scalar(json!("bug"))),
                Filter::condition("status", FilterValue::Scalar(json!("open"))),
            ]
        );
    }

    #[test]
    fn prepare_filter_converts_ids() {
        let id = Uuid::new_v4();
        let q = query(&[("owner", &id.to_string())]);
        let conditions = prepare_filter(&q, &["owner".to_string()]);
        assert_eq!(conditions, vec![Filter::condition("owner", FilterValue::Id(id))]);
    }

    #[test]
    fn unsearchable_model_ignores_term() {
        let filter = compose_list_filter("anything", &HashMap::new(), &options(&[], &[]), Filter::new());
        assert!(filter.is_empty());
    }

    #[test]
    fn empty_term_keeps_match_all_group() {
        let filter = compose_list_filter("", &HashMap::new(), &options(&["title", "body"], &[]), Filter::new());
        assert_eq!(
            filter.to_json(),
            json!({"$or": [
                {"title": {"$regex": "", "$options": "i"}},
                {"body": {"$regex": "", "$options": "i"}}
            ]})
        );
    }

    #[test]
    fn hook_fragment_joins_field_filters() {
        let extra = Filter::from_json(&json!({"$and": [{"status": "active"}]})).unwrap();
        let filter = compose_list_filter("", &query(&[("kind", "post")]), &options(&[], &["kind"]), extra);
        assert_eq!(filter.to_json(), json!({"$and": [{"kind": "post"}, {"status": "active"}]}));
    }
}
