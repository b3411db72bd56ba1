use crate::domain::entities::writer::NewWriter;
use crate::domain::error::DomainError;
use std::path::Path;

/// Read a JSON array of `{full_name, notable_works, description}` records.
pub fn load_dataset(path: impl AsRef<Path>) -> Result<Vec<NewWriter>, DomainError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .map_err(|e| DomainError::Parse(format!("Cannot read {}: {e}", path.display())))?;
    parse_dataset(&raw)
}

pub fn parse_dataset(raw: &str) -> Result<Vec<NewWriter>, DomainError> {
    serde_json::from_str(raw).map_err(|e| DomainError::Parse(format!("Invalid dataset: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dataset() {
        let raw = r#"[
            {"full_name": "Mary Shelley", "notable_works": ["Frankenstein"], "description": "English novelist"},
            {"full_name": "Homer", "description": "Ancient Greek poet"}
        ]"#;
        let records = parse_dataset(raw).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].notable_works, vec!["Frankenstein"]);
        assert!(records[1].notable_works.is_empty());
    }

    #[test]
    fn test_missing_description_is_a_parse_error() {
        let err = parse_dataset(r#"[{"full_name": "Nobody"}]"#).unwrap_err();
        assert!(matches!(err, DomainError::Parse(_)));
    }

    #[test]
    fn test_bundled_dataset_loads() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/data/writers.json");
        let records = load_dataset(path).unwrap();
        assert!(records.len() >= 5);
        assert!(records.iter().all(|r| r.validate().is_ok()));
    }
}
