//! Ant-style path patterns
//!
//! - `?` matches one character
//! - `*` matches zero or more characters within a segment
//! - `**` matches zero or more whole segments
//! - `{name}` matches like `*`
//!
//! Patterns are compiled once into segment tokens.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Char(char),
    AnyChar,
    AnyRun,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    AnyDepth,
    Glob(Vec<Token>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AntPattern {
    source: String,
    absolute: bool,
    trailing_slash: bool,
    segments: Vec<Segment>,
}

impl AntPattern {
    pub fn new(source: &str) -> Self {
        let segments = source
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| match s {
                "**" => Segment::AnyDepth,
                glob => Segment::Glob(tokenize(glob)),
            })
            .collect();

        Self {
            source: source.to_string(),
            absolute: source.starts_with('/'),
            trailing_slash: source.len() > 1 && source.ends_with('/'),
            segments,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// `path` is expected to be decoded and free of a query string
    pub fn matches(&self, path: &str) -> bool {
        if self.absolute != path.starts_with('/') {
            return false;
        }

        let ends_any_depth = matches!(self.segments.last(), Some(Segment::AnyDepth));
        let path_trailing = path.len() > 1 && path.ends_with('/');
        if !ends_any_depth && self.trailing_slash != path_trailing {
            return false;
        }

        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        self.match_segments(&parts)
    }

    // Greedy wildcard walk with single-point backtracking, `**` playing the
    // role of the star and each glob segment consuming exactly one part.
    fn match_segments(&self, parts: &[&str]) -> bool {
        let pattern = &self.segments;
        let (mut p, mut s) = (0, 0);
        let mut backtrack: Option<(usize, usize)> = None;

        while s < parts.len() {
            match pattern.get(p) {
                Some(Segment::AnyDepth) => {
                    backtrack = Some((p, s));
                    p += 1;
                },
                Some(Segment::Glob(tokens)) if glob_matches(tokens, parts[s]) => {
                    p += 1;
                    s += 1;
                },
                _ => match backtrack {
                    Some((star_p, star_s)) => {
                        p = star_p + 1;
                        s = star_s + 1;
                        backtrack = Some((star_p, star_s + 1));
                    },
                    None => return false,
                },
            }
        }

        pattern[p..].iter().all(|segment| *segment == Segment::AnyDepth)
    }
}

impl fmt::Display for AntPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn tokenize(glob: &str) -> Vec<Token> {
    let chars: Vec<char> = glob.chars().collect();
    let mut tokens = Vec::with_capacity(chars.len());
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '?' => tokens.push(Token::AnyChar),
            '*' => push_any_run(&mut tokens),
            '{' => match chars[i..].iter().position(|c| *c == '}') {
                Some(close) => {
                    push_any_run(&mut tokens);
                    i += close;
                },
                // unbalanced brace is taken literally
                None => tokens.push(Token::Char('{')),
            },
            other => tokens.push(Token::Char(other)),
        }
        i += 1;
    }
    tokens
}

fn push_any_run(tokens: &mut Vec<Token>) {
    if tokens.last() != Some(&Token::AnyRun) {
        tokens.push(Token::AnyRun);
    }
}

fn glob_matches(tokens: &[Token], text: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let (mut t, mut s) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while s < text.len() {
        match tokens.get(t) {
            Some(Token::AnyRun) => {
                backtrack = Some((t, s));
                t += 1;
            },
            Some(Token::AnyChar) => {
                t += 1;
                s += 1;
            },
            Some(Token::Char(c)) if *c == text[s] => {
                t += 1;
                s += 1;
            },
            _ => match backtrack {
                Some((star_t, star_s)) => {
                    t = star_t + 1;
                    s = star_s + 1;
                    backtrack = Some((star_t, star_s + 1));
                },
                None => return false,
            },
        }
    }

    tokens[t..].iter().all(|token| *token == Token::AnyRun)
}
