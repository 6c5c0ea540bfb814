use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Opening sentinel for a marker token.
///
/// Ordinary markdown delimiters are unsafe here because user prose may
/// legitimately contain brackets, so the protocol uses a deliberately baroque
/// sequence that cannot plausibly occur in normal text.
pub const MARKER_START: &str = "--[[--[[--[[#######-";

/// Closing sentinel for a marker token.
pub const MARKER_END: &str = "-#######]]--]]--]]--";

/// Full-line grammar for a marker token. The pattern is anchored at both ends:
/// a marker never matches mid-line or across lines.
static MARKER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^--\[\[--\[\[--\[\[#######-\[\[MAGIC:([^|\]]+)(?:\|(.*?))?\]\]-#######\]\]--\]\]--\]\]--$")
        .expect("marker grammar is a valid regex")
});

/// Errors produced by the marker protocol.
#[derive(Debug, Error, PartialEq)]
pub enum MarkerError {
    /// The label would be ambiguous inside the token grammar.
    #[error("command label {0:?} may not contain '|' or ']'")]
    InvalidLabel(String),
}

/// The decoded payload of one marker line: a command label plus its ordered
/// `(name, value)` argument pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerToken {
    pub label: String,
    pub args: Vec<(String, String)>,
}

/// Serialize a command into its canonical one-line token.
///
/// Argument values escape literal newlines as the two-character sequence
/// `\n`; keys and labels are emitted verbatim. `;` and `=` inside values are
/// intentionally not escaped (see crate docs), so round-tripping is only
/// guaranteed for values free of raw `;` and keys free of `=`.
pub fn serialize_token(label: &str, args: &[(String, String)]) -> Result<String, MarkerError> {
    if label.contains('|') || label.contains(']') {
        return Err(MarkerError::InvalidLabel(label.to_string()));
    }

    let payload = if args.is_empty() {
        format!("MAGIC:{label}")
    } else {
        let joined = args
            .iter()
            .map(|(key, value)| format!("{key}={}", value.replace('\n', "\\n")))
            .collect::<Vec<_>>()
            .join(";");
        format!("MAGIC:{label}|{joined}")
    };

    Ok(format!("{MARKER_START}[[{payload}]]{MARKER_END}"))
}

/// Test one line of text against the marker grammar.
///
/// The line is trimmed first; on a full-line match the decoded token is
/// returned with escaped newlines restored. Anything else is ordinary prose
/// and yields `None`. A line that merely resembles a marker is never an
/// error, so user text is never destroyed by a near-miss.
pub fn parse_token(line: &str) -> Option<MarkerToken> {
    let caps = MARKER_RE.captures(line.trim())?;

    let label = caps[1].to_string();
    let mut args = Vec::new();

    if let Some(raw_args) = caps.get(2) {
        for pair in raw_args.as_str().split(';') {
            // Pairs without '=' are silently dropped, matching the fail-open
            // posture of the rest of the protocol.
            let Some(eq) = pair.find('=') else { continue };
            let key = pair[..eq].trim().to_string();
            let value = pair[eq + 1..].replace("\\n", "\n");
            args.push((key, value));
        }
    }

    Some(MarkerToken { label, args })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn serializes_bare_label() {
        let token = serialize_token("PageBreak", &[]).unwrap();
        assert_eq!(
            token,
            "--[[--[[--[[#######-[[MAGIC:PageBreak]]-#######]]--]]--]]--"
        );
    }

    #[test]
    fn serializes_label_with_args() {
        let token = serialize_token("Figure", &pairs(&[("path", "img.png"), ("caption", "A cat")]))
            .unwrap();
        assert_eq!(
            token,
            "--[[--[[--[[#######-[[MAGIC:Figure|path=img.png;caption=A cat]]-#######]]--]]--]]--"
        );
    }

    #[rstest]
    #[case("Bad|Label")]
    #[case("Bad]Label")]
    fn rejects_ambiguous_labels(#[case] label: &str) {
        assert_eq!(
            serialize_token(label, &[]),
            Err(MarkerError::InvalidLabel(label.to_string()))
        );
    }

    #[test]
    fn parses_bare_label() {
        let token =
            parse_token("--[[--[[--[[#######-[[MAGIC:PageBreak]]-#######]]--]]--]]--").unwrap();
        assert_eq!(token.label, "PageBreak");
        assert!(token.args.is_empty());
    }

    #[test]
    fn parses_args_and_restores_newlines() {
        let token = parse_token(
            "--[[--[[--[[#######-[[MAGIC:Quote|text=line1\\nline2;author=me]]-#######]]--]]--]]--",
        )
        .unwrap();
        assert_eq!(token.label, "Quote");
        assert_eq!(token.args, pairs(&[("text", "line1\nline2"), ("author", "me")]));
    }

    #[test]
    fn parse_trims_surrounding_whitespace() {
        let line = "   --[[--[[--[[#######-[[MAGIC:PageBreak]]-#######]]--]]--]]--  ";
        assert!(parse_token(line).is_some());
    }

    #[rstest]
    #[case("just some prose")]
    #[case("--[[--[[--[[#######-[[MAGIC:X]]-#######]]--]]--]]-- trailing prose")]
    #[case("prefix --[[--[[--[[#######-[[MAGIC:X]]-#######]]--]]--]]--")]
    #[case("--[[--[[--[[#######-[[MAGIC:]]-#######]]--]]--]]--")]
    #[case("--[[--[[#######-[[MAGIC:Short]]-#######]]--]]--")]
    fn rejects_non_markers(#[case] line: &str) {
        assert_eq!(parse_token(line), None);
    }

    #[test]
    fn pairs_without_equals_are_dropped() {
        let token = parse_token(
            "--[[--[[--[[#######-[[MAGIC:Figure|path=a.png;garbage;caption=ok]]-#######]]--]]--]]--",
        )
        .unwrap();
        assert_eq!(token.args, pairs(&[("path", "a.png"), ("caption", "ok")]));
    }

    #[rstest]
    #[case("Figure", &[("path", "img.png"), ("caption", "A cat")])]
    #[case("Quote", &[("text", "line1\nline2")])]
    #[case("PageBreak", &[])]
    #[case("Heading", &[("title", "spaced out value")])]
    fn round_trips(#[case] label: &str, #[case] raw: &[(&str, &str)]) {
        let args = pairs(raw);
        let line = serialize_token(label, &args).unwrap();
        let token = parse_token(&line).unwrap();
        assert_eq!(token.label, label);
        assert_eq!(token.args, args);
    }
}
