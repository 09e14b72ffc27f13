//! Per-cell transforms applied during whole-file replay.

use regex::{NoExpand, Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum MacroOp {
    /// Literal substring replace. An empty `find` changes nothing.
    Replace { find: String, replace: String },
    Uppercase,
    Lowercase,
    Trim,
    Prefix { text: String },
    Suffix { text: String },
}

impl MacroOp {
    pub fn apply(&self, value: &str) -> String {
        match self {
            Self::Replace { find, .. } if find.is_empty() => value.to_string(),
            Self::Replace { find, replace } => value.replace(find.as_str(), replace),
            Self::Uppercase => value.to_uppercase(),
            Self::Lowercase => value.to_lowercase(),
            Self::Trim => value.trim().to_string(),
            Self::Prefix { text } => format!("{text}{value}"),
            Self::Suffix { text } => format!("{value}{text}"),
        }
    }
}

/// One macro aimed at one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacroSpec {
    #[serde(flatten)]
    pub op: MacroOp,
    pub column: usize,
}

impl MacroSpec {
    /// Apply to `row` in place. Returns true when the cell changed.
    /// Short rows are padded only if the cell actually changes.
    pub fn apply_to_row(&self, row: &mut Vec<String>) -> bool {
        let current = row.get(self.column).map(String::as_str).unwrap_or("");
        let next = self.op.apply(current);
        if next == current {
            return false;
        }
        if row.len() <= self.column {
            row.resize(self.column + 1, String::new());
        }
        row[self.column] = next;
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FindReplaceSpec {
    pub find: String,
    pub replace: String,
    /// Restrict to one column; `None` means every column.
    #[serde(default)]
    pub column: Option<usize>,
    #[serde(default)]
    pub regex: bool,
    #[serde(default)]
    pub match_case: bool,
}

/// A compiled [`FindReplaceSpec`].
#[derive(Debug, Clone)]
pub struct FindReplacer {
    pattern: Option<Regex>,
    replace: String,
    literal: bool,
    column: Option<usize>,
}

impl FindReplacer {
    pub fn new(spec: &FindReplaceSpec) -> Result<Self, regex::Error> {
        let pattern = if spec.find.is_empty() {
            None
        } else {
            let source = if spec.regex {
                spec.find.clone()
            } else {
                regex::escape(&spec.find)
            };
            Some(
                RegexBuilder::new(&source)
                    .case_insensitive(!spec.match_case)
                    .build()?,
            )
        };
        Ok(Self {
            pattern,
            replace: spec.replace.clone(),
            literal: !spec.regex,
            column: spec.column,
        })
    }

    /// Replacement for one value, or `None` if it is unchanged.
    pub fn replace_value(&self, value: &str) -> Option<String> {
        let pattern = self.pattern.as_ref()?;
        let next = if self.literal {
            pattern.replace_all(value, NoExpand(&self.replace))
        } else {
            pattern.replace_all(value, self.replace.as_str())
        };
        (next != value).then(|| next.into_owned())
    }

    /// Apply to every targeted cell of `row`. Returns the number changed.
    /// Cells past the end of the row are never created.
    pub fn apply_to_row(&self, row: &mut [String]) -> usize {
        let mut applied = 0;
        for (col, cell) in row.iter_mut().enumerate() {
            if self.column.is_some_and(|c| c != col) {
                continue;
            }
            if let Some(next) = self.replace_value(cell) {
                *cell = next;
                applied += 1;
            }
        }
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_macro_ops() {
        assert_eq!(MacroOp::Uppercase.apply("abc"), "ABC");
        assert_eq!(MacroOp::Lowercase.apply("AbC"), "abc");
        assert_eq!(MacroOp::Trim.apply("  x "), "x");
        assert_eq!(MacroOp::Prefix { text: "#".into() }.apply("1"), "#1");
        assert_eq!(MacroOp::Suffix { text: "!".into() }.apply("hi"), "hi!");
        let replace = MacroOp::Replace { find: "a".into(), replace: "o".into() };
        assert_eq!(replace.apply("banana"), "bonono");
        let empty = MacroOp::Replace { find: String::new(), replace: "o".into() };
        assert_eq!(empty.apply("banana"), "banana");
    }

    #[test]
    fn test_macro_pads_only_on_change() {
        let spec = MacroSpec { op: MacroOp::Uppercase, column: 3 };
        let mut short = row(&["a"]);
        assert!(!spec.apply_to_row(&mut short));
        assert_eq!(short.len(), 1);

        let spec = MacroSpec { op: MacroOp::Prefix { text: "p".into() }, column: 2 };
        assert!(spec.apply_to_row(&mut short));
        assert_eq!(short, row(&["a", "", "p"]));
    }

    #[test]
    fn test_macro_spec_json_shape() {
        let spec: MacroSpec =
            serde_json::from_str(r#"{"op":"replace","find":"x","replace":"y","column":2}"#).unwrap();
        assert_eq!(spec.column, 2);
        assert_eq!(spec.op, MacroOp::Replace { find: "x".into(), replace: "y".into() });
        let spec: MacroSpec = serde_json::from_str(r#"{"op":"trim","column":0}"#).unwrap();
        assert_eq!(spec.op, MacroOp::Trim);
    }

    #[test]
    fn test_literal_find_is_case_insensitive_by_default() {
        let spec = FindReplaceSpec { find: "a.b".into(), replace: "$0".into(), ..Default::default() };
        let replacer = FindReplacer::new(&spec).unwrap();
        assert_eq!(replacer.replace_value("A.B axb").as_deref(), Some("$0 axb"));
    }

    #[test]
    fn test_match_case() {
        let spec = FindReplaceSpec { find: "A".into(), replace: "z".into(), match_case: true, ..Default::default() };
        let replacer = FindReplacer::new(&spec).unwrap();
        assert_eq!(replacer.replace_value("aA").as_deref(), Some("az"));
        assert_eq!(replacer.replace_value("aa"), None);
    }

    #[test]
    fn test_regex_with_groups() {
        let spec = FindReplaceSpec {
            find: r"(\d+)-(\d+)".into(),
            replace: "$2-$1".into(),
            regex: true,
            ..Default::default()
        };
        let replacer = FindReplacer::new(&spec).unwrap();
        assert_eq!(replacer.replace_value("12-34").as_deref(), Some("34-12"));
    }

    #[test]
    fn test_invalid_regex_rejected() {
        let spec = FindReplaceSpec { find: "(".into(), regex: true, ..Default::default() };
        assert!(FindReplacer::new(&spec).is_err());
    }

    #[test]
    fn test_row_column_restriction_and_count() {
        let spec = FindReplaceSpec { find: "x".into(), replace: "y".into(), column: Some(1), ..Default::default() };
        let replacer = FindReplacer::new(&spec).unwrap();
        let mut cells = row(&["x", "xx", "x"]);
        assert_eq!(replacer.apply_to_row(&mut cells), 1);
        assert_eq!(cells, row(&["x", "yy", "x"]));

        let all = FindReplacer::new(&FindReplaceSpec { column: None, ..spec }).unwrap();
        assert_eq!(all.apply_to_row(&mut cells), 2);
    }

    #[test]
    fn test_empty_find_is_noop() {
        let replacer = FindReplacer::new(&FindReplaceSpec::default()).unwrap();
        let mut cells = row(&["a"]);
        assert_eq!(replacer.apply_to_row(&mut cells), 0);
    }
}
