//! Vector template parsing
//!
//! Templates are a constrained, single-level vector document: a root element
//! with integer `width`/`height` attributes whose direct `path` children each
//! describe one fill. Fills take their color either from a literal `fill`
//! attribute or from a theme swatch named by a `fill` attribute in the theme
//! namespace ([`THEME_NS`]). Any other child element is ignored so the format
//! can grow without breaking old parsers.

use thiserror::Error;

use crate::palette::Swatch;

/// XML namespace marking theme-substituted fill attributes.
pub const THEME_NS: &str = "urn:themeblit:theme";

/// Winding rule for a fill, `nonzero` unless the template says otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillRule {
    #[default]
    NonZero,
    EvenOdd,
}

/// Where a fill's color comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum FillColor {
    /// Literal CSS color string, used verbatim
    Literal(String),
    /// Resolved through the active theme palette
    Palette(Swatch),
}

/// One fill operation: path geometry plus paint parameters.
///
/// The path data is opaque at this stage; it is interpreted by the
/// rasterizer, not validated here.
#[derive(Debug, Clone, PartialEq)]
pub struct FillCommand {
    pub path: String,
    pub fill_rule: FillRule,
    pub opacity: f32,
    pub color: FillColor,
}

/// A parsed template. Never mutated after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorTemplate {
    pub width: u32,
    pub height: u32,
    pub fills: Vec<FillCommand>,
}

/// Fatal template errors. Equivalent to "no theme override" for the image
/// that referenced the template; never fatal to the overall flow.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("template is not valid UTF-8")]
    Utf8,
    #[error("malformed template: {0}")]
    Xml(String),
    #[error("root element is missing attribute '{0}'")]
    MissingAttribute(&'static str),
    #[error("root attribute '{name}' is not an integer: '{value}'")]
    BadDimension { name: &'static str, value: String },
    #[error("path {index}: missing 'd' attribute")]
    MissingPathData { index: usize },
    #[error("path {index}: unparseable opacity '{value}'")]
    BadOpacity { index: usize, value: String },
    #[error("path {index}: unknown fill-rule '{value}'")]
    BadFillRule { index: usize, value: String },
    #[error("path {index}: unknown theme swatch '{value}'")]
    UnknownSwatch { index: usize, value: String },
    #[error("path {index}: no theme fill and no literal fill")]
    MissingFill { index: usize },
}

/// Parse result: the template plus non-fatal warnings.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTemplate {
    pub template: VectorTemplate,
    pub warnings: Vec<String>,
}

/// Parse raw template bytes.
///
/// Tolerated (warning only): a `viewBox` that does not exactly match
/// `"0 0 {width} {height}"`. Ignored: child elements that are not `path`.
/// Everything else that deviates from the format is a [`ParseError`].
pub fn parse_template(bytes: &[u8]) -> Result<ParsedTemplate, ParseError> {
    let text = std::str::from_utf8(bytes).map_err(|_| ParseError::Utf8)?;
    let doc = roxmltree::Document::parse(text).map_err(|e| ParseError::Xml(e.to_string()))?;
    let root = doc.root_element();

    let width = dimension(&root, "width")?;
    let height = dimension(&root, "height")?;

    let mut warnings = Vec::new();
    let expected_box = format!("0 0 {} {}", width, height);
    match root.attribute("viewBox") {
        Some(vb) if vb == expected_box => {}
        Some(vb) => warnings.push(format!("viewBox '{}' does not match '{}'", vb, expected_box)),
        None => warnings.push(format!("viewBox missing, expected '{}'", expected_box)),
    }

    let mut fills = Vec::new();
    // Single-level format: only direct children of the root are fills.
    for child in root.children().filter(|n| n.is_element()) {
        if child.tag_name().name() != "path" {
            continue;
        }
        let index = fills.len();

        let path = child
            .attribute("d")
            .ok_or(ParseError::MissingPathData { index })?
            .to_string();

        let opacity = match child.attribute("opacity") {
            None => 1.0,
            Some(raw) => match raw.trim().parse::<f32>() {
                Ok(v) if v.is_finite() => v.clamp(0.0, 1.0),
                _ => {
                    return Err(ParseError::BadOpacity {
                        index,
                        value: raw.to_string(),
                    })
                }
            },
        };

        let fill_rule = match child.attribute("fill-rule") {
            None => FillRule::NonZero,
            Some("nonzero") => FillRule::NonZero,
            Some("evenodd") => FillRule::EvenOdd,
            Some(other) => {
                return Err(ParseError::BadFillRule {
                    index,
                    value: other.to_string(),
                })
            }
        };

        // Theme-namespace fill wins over a literal fill when both appear.
        let color = match child.attribute((THEME_NS, "fill")) {
            Some(name) => {
                let swatch = name.parse::<Swatch>().map_err(|_| ParseError::UnknownSwatch {
                    index,
                    value: name.to_string(),
                })?;
                FillColor::Palette(swatch)
            }
            None => match child.attribute("fill") {
                Some(value) => FillColor::Literal(value.to_string()),
                None => return Err(ParseError::MissingFill { index }),
            },
        };

        fills.push(FillCommand {
            path,
            fill_rule,
            opacity,
            color,
        });
    }

    Ok(ParsedTemplate {
        template: VectorTemplate {
            width,
            height,
            fills,
        },
        warnings,
    })
}

fn dimension(root: &roxmltree::Node<'_, '_>, name: &'static str) -> Result<u32, ParseError> {
    let raw = root
        .attribute(name)
        .ok_or(ParseError::MissingAttribute(name))?;
    raw.trim().parse().map_err(|_| ParseError::BadDimension {
        name,
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const NS_DECL: &str = r#"xmlns:t="urn:themeblit:theme""#;

    fn parse_str(s: &str) -> Result<ParsedTemplate, ParseError> {
        parse_template(s.as_bytes())
    }

    #[test]
    fn test_minimal_template() {
        let parsed = parse_str(&format!(
            r#"<svg {NS_DECL} width="16" height="16" viewBox="0 0 16 16">
                 <path d="M0 0H16V16H0Z" t:fill="bg1"/>
               </svg>"#
        ))
        .unwrap();

        assert!(parsed.warnings.is_empty());
        let t = parsed.template;
        assert_eq!((t.width, t.height), (16, 16));
        assert_eq!(t.fills.len(), 1);
        assert_eq!(t.fills[0].path, "M0 0H16V16H0Z");
        assert_eq!(t.fills[0].fill_rule, FillRule::NonZero);
        assert_eq!(t.fills[0].opacity, 1.0);
        assert_eq!(t.fills[0].color, FillColor::Palette(Swatch::Bg1));
    }

    #[test]
    fn test_literal_fill_and_attributes() {
        let parsed = parse_str(
            r##"<svg width="8" height="8" viewBox="0 0 8 8">
                 <path d="M0 0H8V8H0Z" fill="#ABCDEF" opacity="0.5" fill-rule="evenodd"/>
               </svg>"##,
        )
        .unwrap();

        let fill = &parsed.template.fills[0];
        assert_eq!(fill.color, FillColor::Literal("#ABCDEF".to_string()));
        assert_eq!(fill.opacity, 0.5);
        assert_eq!(fill.fill_rule, FillRule::EvenOdd);
    }

    #[test]
    fn test_viewbox_mismatch_is_tolerated() {
        let parsed = parse_str(
            r#"<svg width="16" height="16" viewBox="0 0 32 32">
                 <path d="M0 0H16V16H0Z" fill="red"/>
               </svg>"#,
        )
        .unwrap();
        assert_eq!(parsed.warnings.len(), 1);
        assert!(parsed.warnings[0].contains("viewBox"));
        assert_eq!(parsed.template.fills.len(), 1);
    }

    #[test]
    fn test_missing_viewbox_warns() {
        let parsed = parse_str(
            r#"<svg width="4" height="4"><path d="M0 0H4V4H0Z" fill="red"/></svg>"#,
        )
        .unwrap();
        assert_eq!(parsed.warnings.len(), 1);
    }

    #[test]
    fn test_non_path_children_ignored() {
        let parsed = parse_str(&format!(
            r#"<svg {NS_DECL} width="4" height="4" viewBox="0 0 4 4">
                 <title>later format revision</title>
                 <rect x="0" y="0"/>
                 <path d="M0 0H4V4H0Z" t:fill="fg1"/>
               </svg>"#
        ))
        .unwrap();
        assert_eq!(parsed.template.fills.len(), 1);
    }

    #[test]
    fn test_malformed_document() {
        assert!(matches!(parse_str("<svg"), Err(ParseError::Xml(_))));
        assert_eq!(parse_template(&[0xFF, 0xFE, 0x00]), Err(ParseError::Utf8));
    }

    #[test]
    fn test_missing_dimensions() {
        assert_eq!(
            parse_str(r#"<svg height="16"/>"#),
            Err(ParseError::MissingAttribute("width"))
        );
        assert!(matches!(
            parse_str(r#"<svg width="16px" height="16"/>"#),
            Err(ParseError::BadDimension { name: "width", .. })
        ));
    }

    #[test]
    fn test_path_errors() {
        let missing_d = r#"<svg width="4" height="4"><path fill="red"/></svg>"#;
        assert_eq!(parse_str(missing_d), Err(ParseError::MissingPathData { index: 0 }));

        let bad_opacity =
            r#"<svg width="4" height="4"><path d="M0 0" fill="red" opacity="opaque"/></svg>"#;
        assert!(matches!(parse_str(bad_opacity), Err(ParseError::BadOpacity { index: 0, .. })));

        let bad_rule =
            r#"<svg width="4" height="4"><path d="M0 0" fill="red" fill-rule="winding"/></svg>"#;
        assert!(matches!(parse_str(bad_rule), Err(ParseError::BadFillRule { index: 0, .. })));

        let no_fill = r#"<svg width="4" height="4"><path d="M0 0"/></svg>"#;
        assert_eq!(parse_str(no_fill), Err(ParseError::MissingFill { index: 0 }));
    }

    #[test]
    fn test_unknown_swatch_rejected_at_parse_time() {
        let result = parse_str(&format!(
            r#"<svg {NS_DECL} width="4" height="4"><path d="M0 0" t:fill="bg9"/></svg>"#
        ));
        assert!(matches!(result, Err(ParseError::UnknownSwatch { index: 0, .. })));
    }
}
