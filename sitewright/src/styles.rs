//! Style overrides applied to editable elements.
//!
//! A [`Styles`] value carries CSS values (`1.5rem`, `#ff0000`). Applying it
//! writes an inline declaration for every present field and drops the
//! utility classes that would otherwise fight it: `text-lg` and friends for
//! font size, `text-red-500` and friends for color. Classes unrelated to the
//! dimension being set are left alone. An empty value clears the inline
//! declaration without touching classes.

use facet::Facet;
use indextree::NodeId;
use smallvec::SmallVec;

use crate::dom::Document;

/// Optional overrides for one editable element.
#[derive(Facet, Debug, Clone, Default, PartialEq, Eq)]
pub struct Styles {
    #[facet(default)]
    pub font_size: Option<String>,

    #[facet(default)]
    pub color: Option<String>,
}

impl Styles {
    pub fn font_size(value: impl Into<String>) -> Self {
        Self {
            font_size: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn color(value: impl Into<String>) -> Self {
        Self {
            color: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.font_size.is_none() && self.color.is_none()
    }

    /// Field-wise merge: fields set on `self` win over `previous`.
    pub fn merged_over(&self, previous: &Styles) -> Styles {
        Styles {
            font_size: self.font_size.clone().or_else(|| previous.font_size.clone()),
            color: self.color.clone().or_else(|| previous.color.clone()),
        }
    }

    fn entries(&self) -> impl Iterator<Item = (StyleDimension, &str)> {
        [
            (StyleDimension::FontSize, self.font_size.as_deref()),
            (StyleDimension::Color, self.color.as_deref()),
        ]
        .into_iter()
        .filter_map(|(dim, value)| Some((dim, value?)))
    }
}

/// A property an override can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleDimension {
    FontSize,
    Color,
}

const FONT_SIZES: &[&str] = &[
    "xs", "sm", "base", "lg", "xl", "2xl", "3xl", "4xl", "5xl", "6xl", "7xl", "8xl", "9xl",
];

const NAMED_COLORS: &[&str] = &["inherit", "current", "transparent", "black", "white"];

const PALETTE: &[&str] = &[
    "slate", "gray", "zinc", "neutral", "stone", "red", "orange", "amber", "yellow", "lime",
    "green", "emerald", "teal", "cyan", "sky", "blue", "indigo", "violet", "purple", "fuchsia",
    "pink", "rose",
];

impl StyleDimension {
    pub fn css_property(self) -> &'static str {
        match self {
            StyleDimension::FontSize => "font-size",
            StyleDimension::Color => "color",
        }
    }

    /// Whether a utility class sets this dimension.
    pub fn conflicts_with_class(self, class: &str) -> bool {
        let Some(rest) = utility_body(class).strip_prefix("text-") else {
            return false;
        };
        if let Some(arbitrary) = rest.strip_prefix('[') {
            let inner = arbitrary.split(']').next().unwrap_or_default();
            return classify_arbitrary(inner) == Some(self);
        }
        // `/7` is a line height on sizes and an opacity on colors
        let base = rest.split('/').next().unwrap_or_default();
        match self {
            StyleDimension::FontSize => FONT_SIZES.contains(&base),
            StyleDimension::Color => {
                NAMED_COLORS.contains(&base)
                    || base.rsplit_once('-').is_some_and(|(hue, shade)| {
                        PALETTE.contains(&hue)
                            && !shade.is_empty()
                            && shade.bytes().all(|b| b.is_ascii_digit())
                    })
            }
        }
    }
}

/// Strips variant prefixes (`md:`, `hover:`) and the important marker.
fn utility_body(class: &str) -> &str {
    let mut depth = 0usize;
    let mut start = 0usize;
    for (i, b) in class.bytes().enumerate() {
        match b {
            b'[' => depth += 1,
            b']' => depth = depth.saturating_sub(1),
            b':' if depth == 0 => start = i + 1,
            _ => {}
        }
    }
    let body = &class[start..];
    body.strip_prefix('!').unwrap_or(body)
}

fn classify_arbitrary(inner: &str) -> Option<StyleDimension> {
    if inner.starts_with("length:") {
        return Some(StyleDimension::FontSize);
    }
    if inner.starts_with("color:")
        || inner.starts_with('#')
        || ["rgb", "hsl", "oklch", "oklab", "lab(", "lch("]
            .iter()
            .any(|p| inner.starts_with(p))
    {
        return Some(StyleDimension::Color);
    }
    if inner.starts_with(|c: char| c.is_ascii_digit() || c == '.')
        || ["calc(", "clamp(", "min(", "max("]
            .iter()
            .any(|p| inner.starts_with(p))
    {
        return Some(StyleDimension::FontSize);
    }
    None
}

pub type Declarations = SmallVec<[(String, String); 4]>;

/// Split an inline style into `(property, value)` pairs. Semicolons inside
/// quotes or parentheses do not end a declaration.
pub fn parse_declarations(style: &str) -> Declarations {
    let mut out = Declarations::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0usize;

    let mut push = |chunk: &str| {
        if let Some((prop, value)) = chunk.split_once(':') {
            let prop = prop.trim();
            if !prop.is_empty() {
                out.push((prop.to_ascii_lowercase(), value.trim().to_owned()));
            }
        }
    };

    for (i, c) in style.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ';') if depth == 0 => {
                push(&style[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    push(&style[start..]);
    out
}

fn render_declarations(decls: &[(String, String)]) -> String {
    decls
        .iter()
        .map(|(prop, value)| format!("{prop}: {value}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Apply overrides to one element. Returns whether anything changed.
pub fn apply_styles(doc: &mut Document, id: NodeId, styles: &Styles) -> bool {
    let Some(elem) = doc.element(id) else {
        return false;
    };

    let mut classes: Vec<&str> = elem.classes().collect();
    let mut decls = parse_declarations(elem.attr("style").unwrap_or_default());
    let class_count = classes.len();
    let mut style_changed = false;

    for (dim, raw) in styles.entries() {
        // a value never spans declarations
        let value = raw.split(';').next().unwrap_or_default().trim();
        let property = dim.css_property();

        if value.is_empty() {
            let before = decls.len();
            decls.retain_mut(|(prop, _)| prop.as_str() != property);
            style_changed |= decls.len() != before;
            continue;
        }

        classes.retain(|class| !dim.conflicts_with_class(class));

        let mut seen = false;
        let before = decls.len();
        decls.retain_mut(|(prop, existing)| {
            if prop.as_str() != property {
                return true;
            }
            if seen {
                return false;
            }
            seen = true;
            if existing.as_str() != value {
                *existing = value.to_owned();
                style_changed = true;
            }
            true
        });
        style_changed |= decls.len() != before;
        if !seen {
            decls.push((property.to_owned(), value.to_owned()));
            style_changed = true;
        }
    }

    let class_changed = classes.len() != class_count;
    let class_value = classes.join(" ");
    let style_value = render_declarations(&decls);

    if class_changed {
        if class_value.is_empty() {
            doc.remove_attr(id, "class");
        } else {
            doc.set_attr(id, "class", &class_value);
        }
    }
    if style_changed {
        if style_value.is_empty() {
            doc.remove_attr(id, "style");
        } else {
            doc.set_attr(id, "style", &style_value);
        }
    }
    class_changed || style_changed
}
