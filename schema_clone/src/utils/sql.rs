//! SQL text utilities
//!
//! Identifier quoting, whitespace/comment normalization for structural comparison,
//! and the statement shape checks used when validating generated scripts.

use once_cell::sync::Lazy;
use regex::Regex;

/// Reserved words that always need quoting when used as identifiers
const RESERVED_KEYWORDS: &[&str] = &[
    "all", "analyse", "analyze", "and", "any", "array", "as", "asc", "asymmetric", "both",
    "case", "cast", "check", "collate", "column", "constraint", "create", "current_date",
    "current_role", "current_time", "current_timestamp", "current_user", "default",
    "deferrable", "desc", "distinct", "do", "else", "end", "except", "false", "fetch", "for",
    "foreign", "from", "grant", "group", "having", "in", "initially", "intersect", "into",
    "lateral", "leading", "limit", "localtime", "localtimestamp", "not", "null", "offset",
    "on", "only", "or", "order", "placing", "primary", "references", "returning", "select",
    "session_user", "some", "symmetric", "table", "then", "to", "trailing", "true", "union",
    "unique", "user", "using", "variadic", "when", "where", "window", "with",
];

static STATEMENT_START: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(CREATE|ALTER|DROP|INSERT|UPDATE|DELETE)\b").expect("static regex")
});

/// Quote an identifier if Postgres would not accept it bare
pub fn quote_ident(identifier: &str) -> String {
    let mut chars = identifier.chars();
    let plain = matches!(chars.next(), Some('a'..='z' | '_'))
        && chars.all(|c| matches!(c, 'a'..='z' | '0'..='9' | '_'));

    if plain && !RESERVED_KEYWORDS.contains(&identifier) {
        identifier.to_string()
    } else {
        format!("\"{}\"", identifier.replace('"', "\"\""))
    }
}

/// Quote `schema.name` with each part quoted as needed
pub fn quote_qualified(schema: &str, name: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(name))
}

/// Quote a string literal
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Normalize SQL text for structural comparison.
///
/// Runs of whitespace collapse to a single space and the result is trimmed. When
/// `strip_comments` is set, `--` and `/* */` comments are removed. Quoted strings,
/// quoted identifiers and dollar-quoted bodies are kept verbatim.
pub fn normalize_sql(text: &str, strip_comments: bool) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    let mut i = 0;

    while i < bytes.len() {
        let rest = &text[i..];

        if let Some((len, _)) = quoted_span(text, i) {
            push_separated(&mut out, &mut pending_space, &rest[..len]);
            i += len;
            continue;
        }

        let comment_len = if rest.starts_with("--") {
            Some(rest.find('\n').unwrap_or(rest.len()))
        } else if rest.starts_with("/*") {
            Some(rest[2..].find("*/").map_or(rest.len(), |end| end + 4))
        } else {
            None
        };
        if let Some(len) = comment_len {
            if strip_comments {
                pending_space = true;
            } else {
                let comment = rest[..len].split_whitespace().collect::<Vec<_>>().join(" ");
                push_separated(&mut out, &mut pending_space, &comment);
            }
            i += len;
            continue;
        }

        let Some(ch) = rest.chars().next() else {
            break;
        };
        if ch.is_whitespace() {
            pending_space = true;
        } else {
            let mut buf = [0u8; 4];
            push_separated(&mut out, &mut pending_space, ch.encode_utf8(&mut buf));
        }
        i += ch.len_utf8();
    }

    out
}

fn push_separated(out: &mut String, pending_space: &mut bool, piece: &str) {
    if *pending_space && !out.is_empty() {
        out.push(' ');
    }
    *pending_space = false;
    out.push_str(piece);
}

/// Quoted span starting at `pos`: its length and whether it is terminated.
///
/// Covers `'...'`, `"..."` and dollar-quoted bodies. An unterminated span runs to the
/// end of the text.
fn quoted_span(sql: &str, pos: usize) -> Option<(usize, bool)> {
    let bytes = sql.as_bytes();
    if let Some(len) = dollar_tag_len(bytes, pos) {
        let tag = &sql[pos..pos + len];
        return Some(match sql[pos + len..].find(tag) {
            Some(close) => (len + close + len, true),
            None => (sql.len() - pos, false),
        });
    }
    match bytes.get(pos) {
        Some(&quote @ (b'\'' | b'"')) => Some(
            match bytes[pos + 1..].iter().position(|&c| c == quote) {
                Some(close) => (close + 2, true),
                None => (sql.len() - pos, false),
            },
        ),
        _ => None,
    }
}

/// Length of a dollar-quote tag (`$$` or `$name$`) starting at `pos`, if any
fn dollar_tag_len(bytes: &[u8], pos: usize) -> Option<usize> {
    if bytes.get(pos) != Some(&b'$') {
        return None;
    }
    if bytes.get(pos + 1).is_some_and(u8::is_ascii_digit) {
        return None;
    }
    let mut end = pos + 1;
    while let Some(&c) = bytes.get(end) {
        if c == b'$' {
            return Some(end - pos + 1);
        }
        if !(c.is_ascii_alphanumeric() || c == b'_') {
            return None;
        }
        end += 1;
    }
    None
}

/// Net count of parentheses outside quoted strings and dollar-quoted bodies
fn paren_balance(sql: &str) -> i64 {
    let bytes = sql.as_bytes();
    let mut depth: i64 = 0;
    let mut i = 0;

    while i < bytes.len() {
        if let Some((len, closed)) = quoted_span(sql, i) {
            if !closed {
                return depth + 1;
            }
            i += len;
            continue;
        }
        match bytes[i] {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth < 0 {
                    return depth;
                }
            }
            _ => {}
        }
        i += 1;
    }

    depth
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("users", "users")]
    #[case("audit_log_2024", "audit_log_2024")]
    #[case("user", "\"user\"")]
    #[case("LoftOwners", "\"LoftOwners\"")]
    #[case("weird\"name", "\"weird\"\"name\"")]
    #[case("2fa_codes", "\"2fa_codes\"")]
    fn quotes_only_when_needed(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(quote_ident(input), expected);
    }

    #[test]
    fn normalize_collapses_whitespace() {
        assert_eq!(
            normalize_sql("  BEGIN\n   RETURN   NEW;\nEND; ", false),
            "BEGIN RETURN NEW; END;"
        );
    }

    #[test]
    fn normalize_strips_comments_on_request() {
        let body = "BEGIN -- keep the audit row\n RETURN NEW; /* done */ END;";
        assert_eq!(normalize_sql(body, true), "BEGIN RETURN NEW; END;");
        assert_ne!(normalize_sql(body, false), normalize_sql(body, true));
    }

    #[rstest]
    #[case("'A--north'", "'A--south'")]
    #[case("'a  b'", "'a b'")]
    #[case("'/* x */ y'", "' y'")]
    #[case("$$ select  1 $$", "$$ select 1 $$")]
    #[case("\"Order  Items\"", "\"Order Items\"")]
    fn quoted_text_is_kept_verbatim(#[case] a: &str, #[case] b: &str) {
        assert_ne!(normalize_sql(a, true), normalize_sql(b, true));
    }

    #[test]
    fn comments_outside_literals_are_still_stripped() {
        assert_eq!(
            normalize_sql("note = 'a -- b'  -- trailing\n AND  x", true),
            "note = 'a -- b' AND x"
        );
        assert_eq!(
            normalize_sql("BEGIN RAISE NOTICE $msg$ a  b $msg$; /* c */ END;", true),
            "BEGIN RAISE NOTICE $msg$ a  b $msg$; END;"
        );
    }

    #[test]
    fn positional_parameters_are_not_dollar_quotes() {
        assert_eq!(normalize_sql("$1  +  $2", false), "$1 + $2");
    }

    #[test]
    fn strips_leading_comment_lines() {
        let sql = "-- Create table public.users\n-- second\nCREATE TABLE users ();";
        assert_eq!(strip_leading_comments(sql), "CREATE TABLE users ();");
    }

    #[rstest]
    #[case("CREATE TABLE users (id uuid);", true)]
    #[case("-- note\nDROP TABLE IF EXISTS users;", true)]
    #[case("COMMENT ON TABLE users IS 'x';", false)]
    #[case("CREATE TABLE users (id uuid)", false)]
    #[case("CREATE TABLE users (id uuid;", false)]
    #[case("CREATE FUNCTION f() RETURNS int LANGUAGE sql AS $$ select (1 $$;", true)]
    #[case("CREATE POLICY p ON t USING (note = ')');", true)]
    #[case("CREATE FUNCTION f() RETURNS int LANGUAGE sql AS $fn$ select ($$ $fn$;", true)]
    #[case("CREATE POLICY p ON t USING (note = 'open;", false)]
    fn checks_statement_shape(#[case] sql: &str, #[case] valid: bool) {
        assert_eq!(check_statement(sql).is_none(), valid, "{}", sql);
    }
}
