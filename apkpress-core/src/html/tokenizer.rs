//! Byte-span tokenizer for HTML fragments.
//!
//! Every token carries the byte range it occupies in the source so callers can
//! splice the original text instead of re-serializing a tree.

use std::ops::Range;

use crate::error::HtmlError;

/// Elements whose content is raw text up to the matching end tag.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title", "iframe", "xmp"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Lower-cased attribute name.
    pub name: String,
    /// Entity-decoded value; `None` for bare attributes like `data-auto-link`.
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Text(Range<usize>),
    StartTag {
        name: String,
        attrs: Vec<Attribute>,
        self_closing: bool,
        span: Range<usize>,
    },
    EndTag {
        name: String,
        span: Range<usize>,
    },
    /// Comments, doctypes and processing instructions.
    Comment(Range<usize>),
}

pub fn tokenize(src: &str) -> Result<Vec<Token>, HtmlError> {
    let bytes = src.as_bytes();
    let len = bytes.len();
    let mut tokens = Vec::new();
    let mut pos = 0;
    let mut text_start = 0;

    while pos < len {
        if bytes[pos] != b'<' {
            pos += 1;
            continue;
        }

        let next = bytes.get(pos + 1).copied();
        let after = bytes.get(pos + 2).copied();

        if src[pos..].starts_with("<!--") {
            push_text(&mut tokens, text_start..pos);
            let body = pos + 4;
            let end = src[body..]
                .find("-->")
                .ok_or(HtmlError::UnterminatedComment(pos))?;
            let stop = body + end + 3;
            tokens.push(Token::Comment(pos..stop));
            pos = stop;
            text_start = pos;
        } else if matches!(next, Some(b'!') | Some(b'?')) {
            push_text(&mut tokens, text_start..pos);
            let end = src[pos..].find('>').ok_or(HtmlError::UnterminatedTag(pos))?;
            let stop = pos + end + 1;
            tokens.push(Token::Comment(pos..stop));
            pos = stop;
            text_start = pos;
        } else if next == Some(b'/') && after.is_some_and(|b| b.is_ascii_alphabetic()) {
            push_text(&mut tokens, text_start..pos);
            let name_start = pos + 2;
            let name_end = scan_name(bytes, name_start);
            let end = src[name_end..]
                .find('>')
                .ok_or(HtmlError::UnterminatedTag(pos))?;
            let stop = name_end + end + 1;
            tokens.push(Token::EndTag {
                name: src[name_start..name_end].to_ascii_lowercase(),
                span: pos..stop,
            });
            pos = stop;
            text_start = pos;
        } else if next.is_some_and(|b| b.is_ascii_alphabetic()) {
            push_text(&mut tokens, text_start..pos);
            let (token, stop) = parse_start_tag(src, pos)?;
            pos = stop;
            text_start = pos;

            let raw_name = match &token {
                Token::StartTag {
                    name,
                    self_closing: false,
                    ..
                } if RAW_TEXT_ELEMENTS.contains(&name.as_str()) => Some(name.clone()),
                _ => None,
            };
            tokens.push(token);

            if let Some(name) = raw_name {
                // Raw text runs to the closing tag, or to the end if there is none.
                let closing = format!("</{name}");
                let raw_end = src[pos..]
                    .to_ascii_lowercase()
                    .find(&closing)
                    .map(|i| pos + i)
                    .unwrap_or(len);
                push_text(&mut tokens, pos..raw_end);
                pos = raw_end;
                text_start = pos;
            }
        } else {
            // A bare `<` in prose, e.g. "a < b".
            pos += 1;
        }
    }

    push_text(&mut tokens, text_start..len);
    Ok(tokens)
}

fn push_text(tokens: &mut Vec<Token>, range: Range<usize>) {
    if !range.is_empty() {
        tokens.push(Token::Text(range));
    }
}

fn scan_name(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && !bytes[i].is_ascii_whitespace() && bytes[i] != b'/' && bytes[i] != b'>' {
        i += 1;
    }
    i
}

fn skip_whitespace(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

fn parse_start_tag(src: &str, start: usize) -> Result<(Token, usize), HtmlError> {
    let bytes = src.as_bytes();
    let len = bytes.len();
    let name_end = scan_name(bytes, start + 1);
    let name = src[start + 1..name_end].to_ascii_lowercase();

    let mut attrs = Vec::new();
    let mut self_closing = false;
    let mut i = name_end;

    loop {
        i = skip_whitespace(bytes, i);
        if i >= len {
            return Err(HtmlError::UnterminatedTag(start));
        }
        match bytes[i] {
            b'>' => {
                i += 1;
                break;
            }
            b'/' => {
                if bytes.get(i + 1) == Some(&b'>') {
                    self_closing = true;
                    i += 2;
                    break;
                }
                i += 1;
                continue;
            }
            _ => {}
        }

        let attr_start = i;
        while i < len
            && !bytes[i].is_ascii_whitespace()
            && bytes[i] != b'='
            && bytes[i] != b'>'
            && !(bytes[i] == b'/' && bytes.get(i + 1) == Some(&b'>'))
        {
            i += 1;
        }
        if i == attr_start {
            // Stray `=` with no name.
            i += 1;
            continue;
        }
        let attr_name = src[attr_start..i].to_ascii_lowercase();

        i = skip_whitespace(bytes, i);
        let mut value = None;
        if i < len && bytes[i] == b'=' {
            i = skip_whitespace(bytes, i + 1);
            if i >= len {
                return Err(HtmlError::UnterminatedTag(start));
            }
            let quote = bytes[i];
            if quote == b'"' || quote == b'\'' {
                let close = src[i + 1..]
                    .find(quote as char)
                    .ok_or(HtmlError::UnterminatedTag(start))?;
                value = Some(decode_entities(&src[i + 1..i + 1 + close]));
                i = i + 1 + close + 1;
            } else {
                let value_start = i;
                while i < len && !bytes[i].is_ascii_whitespace() && bytes[i] != b'>' {
                    i += 1;
                }
                value = Some(decode_entities(&src[value_start..i]));
            }
        }

        attrs.push(Attribute {
            name: attr_name,
            value,
        });
    }

    Ok((
        Token::StartTag {
            name,
            attrs,
            self_closing,
            span: start..i,
        },
        i,
    ))
}

/// Decode the character references that show up in attribute values.
pub fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let semi = match rest.find(';') {
            Some(i) if i <= 10 => i,
            _ => {
                out.push('&');
                rest = &rest[1..];
                continue;
            }
        };
        let entity = &rest[1..semi];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "nbsp" => Some('\u{a0}'),
            _ => entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                .and_then(char::from_u32),
        };
        match decoded {
            Some(c) => {
                out.push(c);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slice<'a>(src: &'a str, r: &Range<usize>) -> &'a str {
        &src[r.clone()]
    }

    #[test]
    fn test_tokenize_simple_paragraph() {
        let src = "<p>Use Fast VPN daily.</p>";
        let tokens = tokenize(src).unwrap();
        assert_eq!(tokens.len(), 3);
        match &tokens[1] {
            Token::Text(r) => assert_eq!(slice(src, r), "Use Fast VPN daily."),
            other => panic!("expected text, got {other:?}"),
        }
        assert!(matches!(&tokens[2], Token::EndTag { name, .. } if name == "p"));
    }

    #[test]
    fn test_quoted_attribute_may_contain_gt() {
        let src = r#"<a title="a > b" href='/post/x'>x</a>"#;
        let tokens = tokenize(src).unwrap();
        match &tokens[0] {
            Token::StartTag { name, attrs, span, .. } => {
                assert_eq!(name, "a");
                assert_eq!(attrs[0].value.as_deref(), Some("a > b"));
                assert_eq!(attrs[1].value.as_deref(), Some("/post/x"));
                assert_eq!(slice(src, span), r#"<a title="a > b" href='/post/x'>"#);
            }
            other => panic!("expected start tag, got {other:?}"),
        }
    }

    #[test]
    fn test_bare_and_unquoted_attributes() {
        let src = "<a href=/post/y data-auto-link>y</a>";
        let tokens = tokenize(src).unwrap();
        match &tokens[0] {
            Token::StartTag { attrs, .. } => {
                assert_eq!(attrs[0].value.as_deref(), Some("/post/y"));
                assert_eq!(attrs[1].name, "data-auto-link");
                assert_eq!(attrs[1].value, None);
            }
            other => panic!("expected start tag, got {other:?}"),
        }
    }

    #[test]
    fn test_script_body_is_raw_text() {
        let src = "<script>if (a<b) { x = '<p>'; }</script><p>after</p>";
        let tokens = tokenize(src).unwrap();
        assert!(matches!(&tokens[0], Token::StartTag { name, .. } if name == "script"));
        match &tokens[1] {
            Token::Text(r) => assert_eq!(slice(src, r), "if (a<b) { x = '<p>'; }"),
            other => panic!("expected raw text, got {other:?}"),
        }
        assert!(matches!(&tokens[2], Token::EndTag { name, .. } if name == "script"));
    }

    #[test]
    fn test_comments_and_doctype() {
        let src = "<!DOCTYPE html><!-- note <a> --><p>x</p>";
        let tokens = tokenize(src).unwrap();
        assert!(matches!(&tokens[0], Token::Comment(r) if slice(src, r) == "<!DOCTYPE html>"));
        assert!(matches!(&tokens[1], Token::Comment(r) if slice(src, r) == "<!-- note <a> -->"));
    }

    #[test]
    fn test_bare_less_than_is_text() {
        let src = "<p>1 < 2</p>";
        let tokens = tokenize(src).unwrap();
        assert!(matches!(&tokens[1], Token::Text(r) if slice(src, r) == "1 < 2"));
    }

    #[test]
    fn test_unterminated_constructs_error() {
        assert_eq!(tokenize("<p>ok</p><a href=\"/x"), Err(HtmlError::UnterminatedTag(9)));
        assert_eq!(tokenize("<p>x<!-- open"), Err(HtmlError::UnterminatedComment(4)));
        assert_eq!(tokenize("<p class"), Err(HtmlError::UnterminatedTag(0)));
    }

    #[test]
    fn test_multibyte_text_spans() {
        let src = "<p>Café – naïve</p>";
        let tokens = tokenize(src).unwrap();
        assert!(matches!(&tokens[1], Token::Text(r) if slice(src, r) == "Café – naïve"));
    }

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("/post/a?x=1&amp;y=2"), "/post/a?x=1&y=2");
        assert_eq!(decode_entities("&#47;post&#x2F;b"), "/post/b");
        assert_eq!(decode_entities("AT&T"), "AT&T");
        assert_eq!(decode_entities("&bogus;"), "&bogus;");
    }
}
