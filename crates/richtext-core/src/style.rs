//! Style record canonicalization.
//!
//! Raw style declarations arrive with inconsistent casing, units, and key
//! order (hand-typed markup, clipboard payloads from other editors). This
//! module folds them into a single canonical form so that two visually
//! identical styles always compare equal:
//!
//! - property names are lowercased and folded through an alias table
//! - numeric lengths are converted to the pixel unit
//! - keys are held in a sorted map, so insertion order never matters
//!
//! Canonicalization is pure; nothing here touches the node tree.

use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

/// Pixel sizes for the legacy seven-step font size ladder (`size="1"`..`"7"`).
pub const FONT_SIZE_STEPS: [u32; 7] = [10, 13, 16, 18, 24, 32, 48];

/// Ladder index used to resolve relative legacy sizes (`+1`, `-2`).
const FONT_SIZE_DEFAULT_STEP: i32 = 3;

/// Properties the paste sanitizer lets through. Everything else a foreign
/// document declares is dropped on arrival.
pub(crate) const SANITIZE_KEEP: &[&str] = &[
    "font-weight",
    "font-style",
    "text-decoration-line",
    "color",
    "background-color",
    "font-family",
    "font-size",
    "text-align",
    "padding-left",
    "text-indent",
];

/// A canonical mapping of style property name to normalized value.
///
/// Two records are equal iff their canonical forms match, irrespective of
/// the order properties were declared in:
///
/// ```rust
/// use richtext_core::StyleRecord;
///
/// let a = StyleRecord::parse("Font-Weight: bold; color: #FF0000");
/// let b = StyleRecord::parse("color:#ff0000;font-weight:bold;");
/// assert_eq!(a, b);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleRecord {
    props: BTreeMap<String, String>,
}

impl StyleRecord {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a raw declaration string (`"key: value; key: value"`).
    ///
    /// Declarations that cannot be interpreted are kept with their raw
    /// (trimmed, lowercased) value rather than rejected; a missing or
    /// malformed declaration never produces an error, only an empty record.
    pub fn parse(declarations: &str) -> Self {
        let mut record = Self::new();
        for decl in declarations.split(';') {
            let Some((name, value)) = decl.split_once(':') else {
                continue;
            };
            record.set(name, value);
        }
        record
    }

    /// Insert a property, canonicalizing both name and value. Setting an
    /// empty value removes the property.
    pub fn set(&mut self, name: &str, value: &str) {
        let name = canonical_name(name);
        if name.is_empty() {
            return;
        }
        let value = canonical_value(&name, value);
        if value.is_empty() {
            self.props.remove(&name);
        } else {
            self.props.insert(name, value);
        }
    }

    /// Look up a canonical property value.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.props.get(&canonical_name(name)).map(String::as_str)
    }

    /// Remove a property.
    pub fn remove(&mut self, name: &str) {
        self.props.remove(&canonical_name(name));
    }

    /// True when the record carries no properties.
    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }

    /// Number of properties in the record.
    pub fn len(&self) -> usize {
        self.props.len()
    }

    /// Iterate properties in canonical (sorted) order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.props.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Merge `other` into `self`. Existing properties win; `other` only
    /// fills gaps. Decoration-line tokens are unioned rather than replaced,
    /// so an underline and a strike-through coexist on one record.
    pub fn merge_defaults(&mut self, other: &StyleRecord) {
        for (name, value) in &other.props {
            if name == "text-decoration-line" {
                let merged = match self.props.get(name) {
                    Some(existing) => merge_decoration_tokens(existing, value),
                    None => value.clone(),
                };
                self.props.insert(name.clone(), merged);
            } else {
                self.props.entry(name.clone()).or_insert_with(|| value.clone());
            }
        }
    }

    /// Add a decoration-line token (`underline`, `line-through`) to the
    /// record, preserving tokens already present.
    pub fn add_decoration(&mut self, token: &str) {
        let merged = match self.props.get("text-decoration-line") {
            Some(existing) => merge_decoration_tokens(existing, token),
            None => token.to_string(),
        };
        self.props.insert("text-decoration-line".to_string(), merged);
    }

    /// True when the decoration-line property contains `token`.
    pub fn has_decoration(&self, token: &str) -> bool {
        self.props
            .get("text-decoration-line")
            .is_some_and(|v| v.split_whitespace().any(|t| t == token))
    }

    /// Drop every property not in the sanitizer keep-list.
    pub(crate) fn retain_sanitized(&mut self) {
        self.props
            .retain(|name, _| SANITIZE_KEEP.contains(&name.as_str()));
    }

    /// Render the record as a declaration string in canonical key order.
    /// Empty records render as an empty string.
    pub fn to_declarations(&self) -> String {
        let mut out = String::new();
        for (name, value) in &self.props {
            if !out.is_empty() {
                out.push_str("; ");
            }
            out.push_str(name);
            out.push_str(": ");
            out.push_str(value);
        }
        out
    }
}

impl fmt::Display for StyleRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_declarations())
    }
}

/// Compare two raw declaration strings by canonical form only.
pub fn styles_equal(a: &str, b: &str) -> bool {
    StyleRecord::parse(a) == StyleRecord::parse(b)
}

/// Resolve a legacy `size` attribute (`"1"`..`"7"`, `"+2"`, `"-1"`) to a
/// pixel font size via the seven-step ladder. Out-of-range values clamp.
pub fn legacy_font_size(size: &str) -> Option<u32> {
    let size = size.trim();
    if size.is_empty() {
        return None;
    }
    let step = if let Some(rel) = size.strip_prefix('+') {
        FONT_SIZE_DEFAULT_STEP + rel.trim().parse::<i32>().ok()?
    } else if size.starts_with('-') {
        FONT_SIZE_DEFAULT_STEP + size.parse::<i32>().ok()?
    } else {
        size.parse::<i32>().ok()?
    };
    let step = step.clamp(1, 7) as usize;
    Some(FONT_SIZE_STEPS[step - 1])
}

fn canonical_name(name: &str) -> String {
    let name = name.trim().to_ascii_lowercase();
    // Alias folding: the longhand decoration property and its shorthand both
    // normalize to the -line form the rest of the engine keys on.
    match name.as_str() {
        "text-decoration" => "text-decoration-line".to_string(),
        "background" => "background-color".to_string(),
        _ => name,
    }
}

fn canonical_value(name: &str, value: &str) -> String {
    let value = value.trim();
    // Font family keeps its case (it names a real font); everything else is
    // case-insensitive in the source format.
    let mut value = if name == "font-family" {
        collapse_whitespace(value)
    } else {
        collapse_whitespace(&value.to_ascii_lowercase())
    };
    if let Some(px) = convert_length_px(&value) {
        value = px;
    }
    if name == "text-decoration-line" {
        value = merge_decoration_tokens(&value, "");
    }
    value
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Sorted, de-duplicated union of decoration tokens from both inputs.
fn merge_decoration_tokens(a: &str, b: &str) -> String {
    let mut tokens: Vec<&str> = a.split_whitespace().chain(b.split_whitespace()).collect();
    tokens.sort_unstable();
    tokens.dedup();
    tokens.join(" ")
}

fn length_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(-?[0-9]+(?:\.[0-9]+)?)(px|pt|in|cm)$").expect("valid length pattern")
    })
}

/// Convert a single length literal to canonical px. Returns `None` when the
/// value is not a plain length (keywords, colors, multi-part values pass
/// through untouched).
pub(crate) fn convert_length_px(value: &str) -> Option<String> {
    let caps = length_re().captures(value)?;
    let number: f64 = caps[1].parse().ok()?;
    let px = match &caps[2] {
        "px" => number,
        "pt" => number * 96.0 / 72.0,
        "in" => number * 96.0,
        "cm" => number * 96.0 / 2.54,
        _ => return None,
    };
    Some(format_px(px))
}

fn format_px(px: f64) -> String {
    let rounded = (px * 100.0).round() / 100.0;
    if rounded == rounded.trunc() {
        format!("{}px", rounded as i64)
    } else {
        format!("{rounded}px")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_order_independent() {
        let a = StyleRecord::parse("font-weight: bold; color: red");
        let b = StyleRecord::parse("color: red; font-weight: bold");
        assert_eq!(a, b);
    }

    #[test]
    fn test_casing_and_whitespace_fold() {
        let a = StyleRecord::parse("  Font-Weight :  BOLD ;");
        assert_eq!(a.get("font-weight"), Some("bold"));
    }

    #[test]
    fn test_length_units_convert_to_px() {
        let record = StyleRecord::parse("font-size: 12pt; padding-left: 1in; text-indent: 2.54cm");
        assert_eq!(record.get("font-size"), Some("16px"));
        assert_eq!(record.get("padding-left"), Some("96px"));
        assert_eq!(record.get("text-indent"), Some("96px"));
    }

    #[test]
    fn test_decoration_alias_and_token_union() {
        let mut record = StyleRecord::parse("text-decoration: underline");
        record.add_decoration("line-through");
        assert!(record.has_decoration("underline"));
        assert!(record.has_decoration("line-through"));
        assert_eq!(
            record.get("text-decoration-line"),
            Some("line-through underline")
        );
    }

    #[test]
    fn test_merge_defaults_does_not_override() {
        let mut record = StyleRecord::parse("color: red");
        record.merge_defaults(&StyleRecord::parse("color: blue; font-style: italic"));
        assert_eq!(record.get("color"), Some("red"));
        assert_eq!(record.get("font-style"), Some("italic"));
    }

    #[test]
    fn test_legacy_font_size_ladder() {
        assert_eq!(legacy_font_size("1"), Some(10));
        assert_eq!(legacy_font_size("3"), Some(16));
        assert_eq!(legacy_font_size("7"), Some(48));
        // Relative sizes resolve against the default step and clamp.
        assert_eq!(legacy_font_size("+2"), Some(24));
        assert_eq!(legacy_font_size("-1"), Some(13));
        assert_eq!(legacy_font_size("99"), Some(48));
        assert_eq!(legacy_font_size("goose"), None);
    }

    #[test]
    fn test_empty_value_removes_property() {
        let mut record = StyleRecord::parse("color: red");
        record.set("color", "");
        assert!(record.is_empty());
    }

    #[test]
    fn test_styles_equal_ignores_formatting() {
        assert!(styles_equal("color:RED", "color: red;"));
        assert!(!styles_equal("color:red", "color: blue"));
    }
}
