use crate::error::{Result, SheetError};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Task name to score, in insertion (or file) order.
pub type TaskMap = IndexMap<String, f64>;

/// Person name to their tasks, in insertion (or file) order.
pub type Record = IndexMap<String, TaskMap>;

/// The persisted document. The wrapper key is always `"name"`.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct Sheet {
    pub name: Record,
}

/// One person matched by [`Sheet::search`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub person: String,
    pub value: String,
}

impl Sheet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_score(&mut self, person: &str, task: &str, score: f64) {
        self.name
            .entry(person.to_string())
            .or_default()
            .insert(task.to_string(), score);
    }

    pub fn person(&self, name: &str) -> Result<&TaskMap> {
        self.name
            .get(name)
            .ok_or_else(|| SheetError::NotFound(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.name.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }

    /// Every person holding `key`, filtered by `value` unless it is empty.
    ///
    /// A numeric `value` is compared numerically against the stored score;
    /// anything else must equal the score's display form.
    pub fn search(&self, key: &str, value: &str) -> Vec<SearchHit> {
        let wanted = value.trim();
        let numeric = wanted.parse::<f64>().ok().filter(|n| n.is_finite());
        self.name
            .iter()
            .filter_map(|(person, tasks)| {
                let score = *tasks.get(key)?;
                let shown = format_score(score);
                let hit = wanted.is_empty()
                    || numeric.is_some_and(|n| scores_equal(n, score))
                    || shown == wanted;
                hit.then(|| SearchHit {
                    person: person.clone(),
                    value: shown,
                })
            })
            .collect()
    }
}

pub fn format_score(score: f64) -> String {
    format!("{score}")
}

fn scores_equal(a: f64, b: f64) -> bool {
    let scale = a.abs().max(b.abs()).max(1.0);
    (a - b).abs() <= f64::EPSILON * scale
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Sheet {
        let mut sheet = Sheet::new();
        sheet.upsert_score("Alice", "math", 92.5);
        sheet.upsert_score("Bob", "math", 70.0);
        sheet.upsert_score("Bob", "art", 88.0);
        sheet
    }

    #[test]
    fn upsert_creates_person() {
        let mut sheet = Sheet::new();
        sheet.upsert_score("Alice", "math", 92.5);
        let tasks = sheet.person("Alice").unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks["math"], 92.5);
    }

    #[test]
    fn upsert_overwrites_existing_task() {
        let mut sheet = sample();
        sheet.upsert_score("Bob", "math", 75.0);
        assert_eq!(sheet.person("Bob").unwrap()["math"], 75.0);
        assert_eq!(sheet.person("Bob").unwrap()["art"], 88.0);
    }

    #[test]
    fn upsert_is_idempotent() {
        let mut sheet = sample();
        sheet.upsert_score("Carol", "history", 61.0);
        let once = sheet.clone();
        sheet.upsert_score("Carol", "history", 61.0);
        assert_eq!(sheet, once);
    }

    #[test]
    fn missing_person_is_not_found() {
        let sheet = sample();
        let err = sheet.person("Zed").unwrap_err();
        assert!(matches!(err, SheetError::NotFound(ref n) if n == "Zed"));
        assert_eq!(sheet.name.len(), 2);
    }

    #[test]
    fn search_numeric_value() {
        let hits = sample().search("math", "92.5");
        assert_eq!(
            hits,
            vec![SearchHit {
                person: "Alice".into(),
                value: "92.5".into()
            }]
        );
    }

    #[test]
    fn search_integer_query_matches_float_score() {
        let hits = sample().search("math", "70.0");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].person, "Bob");
        assert_eq!(hits[0].value, "70");
    }

    #[test]
    fn search_empty_value_matches_presence() {
        let hits = sample().search("math", "");
        let people: Vec<_> = hits.iter().map(|h| h.person.as_str()).collect();
        assert_eq!(people, vec!["Alice", "Bob"]);

        let hits = sample().search("art", "");
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn search_unknown_key_is_empty() {
        assert!(sample().search("physics", "10").is_empty());
        assert!(sample().search("physics", "").is_empty());
    }

    #[test]
    fn search_non_numeric_value_never_matches_scores() {
        assert!(sample().search("math", "true").is_empty());
    }

    #[test]
    fn search_ignores_non_finite_queries() {
        let sheet = sample();
        for query in ["inf", "-inf", "infinity", "NaN", "1e999", "-1e999"] {
            assert!(
                sheet.search("math", query).is_empty(),
                "{query} should match nothing"
            );
        }
    }

    #[test]
    fn search_trims_query_whitespace() {
        let hits = sample().search("math", "  92.5 ");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].person, "Alice");
        assert_eq!(sample().search("math", "   ").len(), 2);
    }

    #[test]
    fn search_accepts_other_numeric_spellings() {
        let hits = sample().search("math", "9.25e1");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].person, "Alice");
        assert_eq!(sample().search("math", "+70").len(), 1);
    }

    #[test]
    fn names_keep_insertion_order() {
        let mut sheet = Sheet::new();
        sheet.upsert_score("Zoe", "math", 1.0);
        sheet.upsert_score("Adam", "math", 2.0);
        sheet.upsert_score("Zoe", "art", 3.0);
        assert_eq!(sheet.names().collect::<Vec<_>>(), vec!["Zoe", "Adam"]);
        let tasks: Vec<_> = sheet.person("Zoe").unwrap().keys().collect();
        assert_eq!(tasks, vec!["math", "art"]);
    }

    #[test]
    fn deserializing_keeps_file_order() {
        let sheet: Sheet =
            serde_json::from_str(r#"{"name": {"Zoe": {"b": 1, "a": 2}, "Adam": {}}}"#).unwrap();
        assert_eq!(sheet.names().collect::<Vec<_>>(), vec!["Zoe", "Adam"]);
        let tasks: Vec<_> = sheet.person("Zoe").unwrap().keys().collect();
        assert_eq!(tasks, vec!["b", "a"]);
    }

    #[test]
    fn serializes_under_name_key() {
        let mut sheet = Sheet::new();
        sheet.upsert_score("Alice", "math", 92.5);
        let json = serde_json::to_value(&sheet).unwrap();
        assert_eq!(json, serde_json::json!({"name": {"Alice": {"math": 92.5}}}));
    }
}
