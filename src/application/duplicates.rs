use crate::domain::entities::writer::NewWriter;
use std::collections::HashSet;

/// Names that occur more than once, each listed once, in the order their
/// first repeat appears. Comparison is exact.
pub fn find_duplicate_names(records: &[NewWriter]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    let mut duplicates = Vec::new();
    for record in records {
        let name = record.full_name.as_str();
        if !seen.insert(name) && reported.insert(name) {
            duplicates.push(name.to_string());
        }
    }
    duplicates
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(name: &str) -> NewWriter {
        NewWriter {
            full_name: name.into(),
            notable_works: vec![],
            description: "A writer".into(),
        }
    }

    #[test]
    fn test_reports_each_duplicate_once_in_first_repeat_order() {
        let records: Vec<NewWriter> = ["Poe", "Austen", "Austen", "Poe", "Austen", "Woolf"]
            .iter()
            .map(|n| named(n))
            .collect();
        assert_eq!(find_duplicate_names(&records), vec!["Austen", "Poe"]);
    }

    #[test]
    fn test_no_duplicates() {
        let records = vec![named("Poe"), named("poe")];
        assert!(find_duplicate_names(&records).is_empty());
        assert!(find_duplicate_names(&[]).is_empty());
    }
}
