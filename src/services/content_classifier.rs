//! Content classification for BMarks.
//!
//! Maps raw pasted/typed text to a bookmark variant (color, link, image,
//! text). Classification is a total, pure function: URL parse failures fold
//! into the text branch and nothing here performs I/O.

use url::Url;

use crate::types::group::palette_hash;

/// Image file extensions recognized when classifying a URL.
const IMAGE_EXTENSIONS: [&str; 7] = [".png", ".jpg", ".jpeg", ".gif", ".webp", ".svg", ".avif"];

/// Gradients assigned to text bookmarks, picked by the shared palette hash.
const TEXT_GRADIENTS: [&str; 4] = [
    "linear-gradient(135deg, #f6d365 0%, #fda085 100%)",
    "linear-gradient(135deg, #a18cd1 0%, #fbc2eb 100%)",
    "linear-gradient(135deg, #43cea2 0%, #185a9d 100%)",
    "linear-gradient(135deg, #ff6f91 0%, #ff9671 100%)",
];

/// Result of classifying raw bookmark content.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassifiedContent {
    /// A hex or functional CSS color.
    Color { value: String },
    /// A parseable URL. `hostname` has any leading `www.` stripped.
    Link { url: String, hostname: String },
    /// A URL whose path points at an image file.
    Image { url: String, hostname: String },
    /// Anything else, kept verbatim (trimmed).
    Text { content: String },
}

impl ClassifiedContent {
    pub fn kind(&self) -> &'static str {
        match self {
            ClassifiedContent::Color { .. } => "color",
            ClassifiedContent::Link { .. } => "link",
            ClassifiedContent::Image { .. } => "image",
            ClassifiedContent::Text { .. } => "text",
        }
    }
}

/// Classifies raw content into a bookmark variant.
///
/// Precedence: color notations first, then URL (with `https://` prefixed
/// when no scheme is present), then plain text. Never fails.
pub fn classify(raw: &str) -> ClassifiedContent {
    let trimmed = raw.trim();

    if let Some(hex) = parse_hex_color(trimmed) {
        return ClassifiedContent::Color { value: hex };
    }
    if is_functional_color(trimmed) {
        return ClassifiedContent::Color {
            value: trimmed.to_string(),
        };
    }

    match parse_as_url(trimmed) {
        Some((url, hostname)) => {
            if is_image_url(&url) {
                ClassifiedContent::Image { url, hostname }
            } else {
                ClassifiedContent::Link { url, hostname }
            }
        }
        None => ClassifiedContent::Text {
            content: trimmed.to_string(),
        },
    }
}

/// Parses `#abc` / `#aabbcc` style colors (the `#` is optional on input,
/// always present on output). Case-insensitive.
fn parse_hex_color(value: &str) -> Option<String> {
    let digits = value.strip_prefix('#').unwrap_or(value);
    if (digits.len() == 3 || digits.len() == 6)
        && digits.chars().all(|c| c.is_ascii_hexdigit())
    {
        if value.starts_with('#') {
            Some(value.to_string())
        } else {
            Some(format!("#{}", value))
        }
    } else {
        None
    }
}

/// Recognizes `rgb(...)`, `rgba(...)`, `hsl(...)` and `hsla(...)` with
/// three or four numeric components (optionally decimal or percent).
fn is_functional_color(value: &str) -> bool {
    let lower = value.to_ascii_lowercase();
    let rest = ["rgba(", "rgb(", "hsla(", "hsl("]
        .iter()
        .find_map(|prefix| lower.strip_prefix(prefix));
    let rest = match rest {
        Some(r) => r,
        None => return false,
    };
    let inner = match rest.strip_suffix(')') {
        Some(i) => i,
        None => return false,
    };
    let components: Vec<&str> = inner.split(',').collect();
    if components.len() != 3 && components.len() != 4 {
        return false;
    }
    components.iter().all(|c| is_color_component(c.trim()))
}

/// A color component: digits with at most one dot, optional trailing `%`.
fn is_color_component(component: &str) -> bool {
    let digits = component.strip_suffix('%').unwrap_or(component);
    !digits.is_empty()
        && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
        && digits.chars().filter(|&c| c == '.').count() <= 1
}

/// Attempts to parse the value as a URL, prefixing `https://` when no
/// http(s) scheme is present. Returns the normalized URL and the hostname
/// with any leading `www.` stripped.
fn parse_as_url(value: &str) -> Option<(String, String)> {
    if value.is_empty() {
        return None;
    }
    let normalized = if has_http_scheme(value) {
        value.to_string()
    } else {
        format!("https://{}", value)
    };
    let url = Url::parse(&normalized).ok()?;
    let host = url.host_str()?;
    Some((url.to_string(), prettify_hostname(host)))
}

fn has_http_scheme(value: &str) -> bool {
    let lower = value.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

fn is_image_url(url: &str) -> bool {
    let path = match Url::parse(url) {
        Ok(u) => u.path().to_ascii_lowercase(),
        Err(_) => return false,
    };
    IMAGE_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

/// Strips a leading `www.` from a hostname.
pub fn prettify_hostname(hostname: &str) -> String {
    hostname
        .strip_prefix("www.")
        .unwrap_or(hostname)
        .to_string()
}

/// Hostname of a URL (possibly schemeless), empty string on parse failure.
pub fn safe_hostname(value: &str) -> String {
    parse_as_url(value.trim())
        .map(|(_, host)| host)
        .unwrap_or_default()
}

/// Derives the conventional favicon location for a link.
pub fn resolve_favicon_url(link: &str) -> Option<String> {
    let (url, _) = parse_as_url(link.trim())?;
    let parsed = Url::parse(&url).ok()?;
    let origin = parsed.origin();
    if !matches!(origin, url::Origin::Tuple(..)) {
        return None;
    }
    Some(format!("{}/favicon.ico", origin.ascii_serialization()))
}

/// Deterministically picks an icon gradient for a text bookmark.
pub fn gradient_from_string(input: &str) -> &'static str {
    TEXT_GRADIENTS[palette_hash(input) % TEXT_GRADIENTS.len()]
}
