//! Allow-list HTML sanitization for user-authored rich text.
//!
//! Post bodies and comments are cleaned before they are stored: tags outside
//! the allow-list are stripped with their inner text kept, attributes are
//! filtered per tag, and `href`/`src` values must carry an allowed scheme.
//! `clean` is pure and idempotent, and malformed markup degrades to its
//! sanitized form instead of erroring.

use std::collections::{HashMap, HashSet};

use url::Url;

use crate::config::SanitizerConfig;

pub struct Sanitizer {
    allowed_tags: HashSet<String>,
    allowed_attributes: HashMap<String, Vec<String>>,
    allowed_schemes: Vec<String>,
}

enum Tag {
    Open {
        name: String,
        attrs: Vec<(String, Option<String>)>,
        self_closing: bool,
    },
    Close {
        name: String,
    },
    /// Comments and `<!...>`/`<?...>` declarations, dropped wholesale.
    Skip,
}

impl Sanitizer {
    pub fn new(config: &SanitizerConfig) -> Self {
        Self {
            allowed_tags: config
                .allowed_tags
                .iter()
                .map(|t| t.to_ascii_lowercase())
                .collect(),
            allowed_attributes: config
                .allowed_attributes
                .iter()
                .map(|(tag, attrs)| {
                    (
                        tag.to_ascii_lowercase(),
                        attrs.iter().map(|a| a.to_ascii_lowercase()).collect(),
                    )
                })
                .collect(),
            allowed_schemes: config
                .allowed_schemes
                .iter()
                .map(|s| s.to_ascii_lowercase())
                .collect(),
        }
    }

    /// Strip everything outside the allow-list. Inner text of disallowed
    /// tags is kept; a `<` that does not open a tag is escaped.
    pub fn clean(&self, input: &str) -> String {
        let mut out = String::with_capacity(input.len());
        let mut rest = input;

        while let Some(pos) = rest.find('<') {
            out.push_str(&rest[..pos]);
            rest = &rest[pos + 1..];

            match scan_tag(rest) {
                Some((consumed, tag)) => {
                    self.emit_tag(&mut out, tag);
                    rest = &rest[consumed..];
                }
                None => out.push_str("&lt;"),
            }
        }
        out.push_str(rest);
        out
    }

    fn emit_tag(&self, out: &mut String, tag: Tag) {
        match tag {
            Tag::Open {
                name,
                attrs,
                self_closing,
            } => {
                if !self.allowed_tags.contains(&name) {
                    return;
                }
                out.push('<');
                out.push_str(&name);
                for (attr, value) in attrs {
                    if !self.attr_allowed(&name, &attr, value.as_deref()) {
                        continue;
                    }
                    out.push(' ');
                    out.push_str(&attr);
                    if let Some(value) = value {
                        out.push_str("=\"");
                        out.push_str(&value.replace('"', "&quot;").replace('<', "&lt;"));
                        out.push('"');
                    }
                }
                if self_closing {
                    out.push('/');
                }
                out.push('>');
            }
            Tag::Close { name } => {
                if self.allowed_tags.contains(&name) {
                    out.push_str("</");
                    out.push_str(&name);
                    out.push('>');
                }
            }
            Tag::Skip => {}
        }
    }

    fn attr_allowed(&self, tag: &str, attr: &str, value: Option<&str>) -> bool {
        let listed = |key: &str| {
            self.allowed_attributes
                .get(key)
                .is_some_and(|attrs| attrs.iter().any(|a| a == attr))
        };
        if !listed(tag) && !listed("*") {
            return false;
        }
        // URL-bearing attributes also pass the scheme filter
        if attr == "href" || attr == "src" {
            return value.map_or(true, |v| self.url_allowed(v));
        }
        true
    }

    fn url_allowed(&self, value: &str) -> bool {
        // Browsers ignore embedded tab/newline when resolving a scheme
        let cleaned: String = value.chars().filter(|c| !c.is_ascii_control()).collect();
        let cleaned = cleaned.trim();

        match Url::parse(cleaned) {
            Ok(url) => self.allowed_schemes.iter().any(|s| s == url.scheme()),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                // Relative and scheme-relative URLs are fine, unless an
                // entity-encoded scheme separator hides before the path
                let head = cleaned.split(['/', '?', '#']).next().unwrap_or("");
                let head = head.to_ascii_lowercase();
                !head.contains("&#") && !head.contains("&colon")
            }
            Err(_) => false,
        }
    }
}

/// Scan a tag starting just after `<`. Returns the consumed byte count and
/// the parsed tag, or None when the text is not a tag at all.
fn scan_tag(rest: &str) -> Option<(usize, Tag)> {
    let bytes = rest.as_bytes();

    if rest.starts_with("!--") {
        // Comment: swallow through `-->`, or the remainder if unterminated
        return match rest.find("-->") {
            Some(end) => Some((end + 3, Tag::Skip)),
            None => Some((rest.len(), Tag::Skip)),
        };
    }
    if rest.starts_with('!') || rest.starts_with('?') {
        // Doctype/processing declarations
        return match rest.find('>') {
            Some(end) => Some((end + 1, Tag::Skip)),
            None => Some((rest.len(), Tag::Skip)),
        };
    }

    let (closing, mut i) = if bytes.first() == Some(&b'/') {
        (true, 1)
    } else {
        (false, 0)
    };

    if !bytes.get(i).is_some_and(u8::is_ascii_alphabetic) {
        return None;
    }

    let name_start = i;
    while bytes.get(i).is_some_and(u8::is_ascii_alphanumeric) {
        i += 1;
    }
    let name = rest[name_start..i].to_ascii_lowercase();

    if closing {
        // Anything between the name and `>` is discarded
        let end = rest[i..].find('>')?;
        return Some((i + end + 1, Tag::Close { name }));
    }

    let mut attrs = Vec::new();
    loop {
        while bytes.get(i).is_some_and(u8::is_ascii_whitespace) {
            i += 1;
        }
        match bytes.get(i) {
            None => return None, // unterminated tag: treat as text
            Some(&b'>') => {
                return Some((
                    i + 1,
                    Tag::Open {
                        name,
                        attrs,
                        self_closing: false,
                    },
                ));
            }
            Some(&b'/') if bytes.get(i + 1) == Some(&b'>') => {
                return Some((
                    i + 2,
                    Tag::Open {
                        name,
                        attrs,
                        self_closing: true,
                    },
                ));
            }
            Some(_) => {
                let attr_start = i;
                while bytes
                    .get(i)
                    .is_some_and(|&b| !b.is_ascii_whitespace() && !matches!(b, b'=' | b'>' | b'/'))
                {
                    i += 1;
                }
                if i == attr_start {
                    // Stray `/` or `=`: skip it
                    i += 1;
                    continue;
                }
                let attr = rest[attr_start..i].to_ascii_lowercase();

                while bytes.get(i).is_some_and(u8::is_ascii_whitespace) {
                    i += 1;
                }
                let value = if bytes.get(i) == Some(&b'=') {
                    i += 1;
                    while bytes.get(i).is_some_and(u8::is_ascii_whitespace) {
                        i += 1;
                    }
                    match bytes.get(i) {
                        Some(&quote) if quote == b'"' || quote == b'\'' => {
                            i += 1;
                            let value_start = i;
                            while bytes.get(i).is_some_and(|&b| b != quote) {
                                i += 1;
                            }
                            bytes.get(i)?; // unterminated quote: treat as text
                            let value = rest[value_start..i].to_string();
                            i += 1;
                            Some(value)
                        }
                        _ => {
                            let value_start = i;
                            while bytes
                                .get(i)
                                .is_some_and(|&b| !b.is_ascii_whitespace() && b != b'>')
                            {
                                i += 1;
                            }
                            Some(rest[value_start..i].to_string())
                        }
                    }
                } else {
                    None
                };
                attrs.push((attr, value));
            }
        }
    }
}
