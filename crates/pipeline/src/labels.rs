//! Class labels, their dense codes and display styles

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Bijection between class names and dense codes `0..K`.
///
/// Codes are positions in the name list, so they are contiguous from zero
/// by construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct ClassLabelMap {
    names: Vec<String>,
}

impl ClassLabelMap {
    /// Map names to codes in order. Rejects an empty list and duplicates.
    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Err(PipelineError::InvalidParameter {
                name: "labels",
                value: "[]".into(),
                reason: "at least one class is required".into(),
            });
        }
        for (i, n) in names.iter().enumerate() {
            if names[..i].contains(n) {
                return Err(PipelineError::InvalidParameter {
                    name: "labels",
                    value: n.clone(),
                    reason: "duplicate class name".into(),
                });
            }
        }
        Ok(Self { names })
    }

    pub fn code(&self, label: &str) -> Option<u32> {
        let label = label.trim();
        self.names.iter().position(|n| n == label).map(|i| i as u32)
    }

    /// Code for `label`, or a [`PipelineError::LabelMapping`] naming the source.
    pub fn resolve(&self, label: &str, source_name: &str) -> Result<u32> {
        self.code(label).ok_or_else(|| PipelineError::LabelMapping {
            source_name: source_name.to_string(),
            label: label.to_string(),
        })
    }

    pub fn label(&self, code: u32) -> Option<&str> {
        self.names.get(code as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// `(code, name)` pairs in code order
    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.names.iter().enumerate().map(|(i, n)| (i as u32, n.as_str()))
    }

    /// Display style for `code`; unknown codes get the fallback style.
    pub fn style(&self, code: u32) -> ClassStyle {
        ClassStyle::for_code(code)
    }
}

impl Default for ClassLabelMap {
    fn default() -> Self {
        Self {
            names: ["hoop", "mulch", "other", "green house"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl TryFrom<Vec<String>> for ClassLabelMap {
    type Error = PipelineError;

    fn try_from(names: Vec<String>) -> Result<Self> {
        Self::new(names)
    }
}

impl From<ClassLabelMap> for Vec<String> {
    fn from(map: ClassLabelMap) -> Self {
        map.names
    }
}

/// Fill colour, outline colour and marker size for one class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassStyle {
    pub fill: &'static str,
    /// Hex RGB without `#`
    pub outline: &'static str,
    pub point_size: u32,
}

const PALETTE: [&str; 4] = ["red", "green", "blue", "yellow"];
const OUTLINE: &str = "1e90ff";

impl ClassStyle {
    pub fn for_code(code: u32) -> Self {
        Self {
            fill: PALETTE.get(code as usize).copied().unwrap_or("grey"),
            outline: OUTLINE,
            point_size: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_codes() {
        let map = ClassLabelMap::default();
        assert_eq!(map.code("hoop"), Some(0));
        assert_eq!(map.code("mulch"), Some(1));
        assert_eq!(map.code("other"), Some(2));
        assert_eq!(map.code("green house"), Some(3));
        assert_eq!(map.label(2), Some("other"));
        assert_eq!(map.len(), 4);
    }

    #[test]
    fn test_unknown_label_is_mapping_error() {
        let map = ClassLabelMap::default();
        let err = map.resolve("orchard", "Watsonville").unwrap_err();
        assert!(matches!(err, PipelineError::LabelMapping { ref label, .. } if label == "orchard"));
    }

    #[test]
    fn test_surrounding_whitespace_ignored() {
        assert_eq!(ClassLabelMap::default().code(" mulch "), Some(1));
    }

    #[test]
    fn test_duplicates_rejected() {
        assert!(ClassLabelMap::new(["a", "b", "a"]).is_err());
        assert!(ClassLabelMap::new(Vec::<String>::new()).is_err());
    }

    #[test]
    fn test_styles() {
        let map = ClassLabelMap::default();
        assert_eq!(map.style(0).fill, "red");
        assert_eq!(map.style(3).fill, "yellow");
        assert_eq!(map.style(9).fill, "grey");
        assert_eq!(map.style(1).outline, "1e90ff");
    }
}
