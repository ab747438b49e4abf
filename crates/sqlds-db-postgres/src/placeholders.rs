//! Placeholder rewriting.
//!
//! Statements are built with `?` placeholders. PostgreSQL wants `$1`, `$2`, ...
//! so every `?` outside string literals, quoted identifiers and comments is
//! replaced by its ordinal.

#[derive(Clone, Copy, PartialEq, Eq)]
enum State {
    Code,
    Literal,
    Identifier,
    LineComment,
    BlockComment,
}

/// Rewrites `?` placeholders to `$n`.
pub fn renumber_placeholders(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut state = State::Code;
    let mut n = 0usize;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match state {
            State::Code => match c {
                '?' => {
                    n += 1;
                    out.push('$');
                    out.push_str(&n.to_string());
                    continue;
                }
                '\'' => state = State::Literal,
                '"' => state = State::Identifier,
                '-' if chars.peek() == Some(&'-') => state = State::LineComment,
                '/' if chars.peek() == Some(&'*') => {
                    out.push(c);
                    if let Some(star) = chars.next() {
                        out.push(star);
                    }
                    state = State::BlockComment;
                    continue;
                }
                _ => {}
            },
            // Doubled quotes close and reopen, which leaves the state unchanged.
            State::Literal if c == '\'' => state = State::Code,
            State::Identifier if c == '"' => state = State::Code,
            State::LineComment if c == '\n' => state = State::Code,
            State::BlockComment if c == '*' && chars.peek() == Some(&'/') => {
                out.push(c);
                if let Some(slash) = chars.next() {
                    out.push(slash);
                }
                state = State::Code;
                continue;
            }
            _ => {}
        }
        out.push(c);
    }

    out
}
