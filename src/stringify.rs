use crate::{Dictionary, Entry, EntryValue, Keyword, Token};

/// Width keywords are padded to before their value.
const KEYWORD_WIDTH: usize = 16;
const INDENT: &str = "    ";

fn indent(level: usize, output: &mut String) {
    for _ in 0..level {
        output.push_str(INDENT);
    }
}

/// Write a quoted string. Backslashes are only doubled where the parser
/// would otherwise read them as an escape.
fn quoted_string(s: &str, output: &mut String) {
    output.push('"');
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => output.push_str(r#"\""#),
            '\\' => match chars.peek() {
                Some('"') | Some('\\') | None => output.push_str(r"\\"),
                Some(_) => output.push('\\'),
            },
            c => output.push(c),
        }
    }
    output.push('"');
}

pub fn token(token: &Token, output: &mut String) {
    match token {
        Token::Word(w) => output.push_str(w),
        Token::String(s) => quoted_string(s, output),
        Token::Label(n) => output.push_str(n.text()),
        Token::Scalar(x) => output.push_str(x.text()),
        Token::Punctuation(c) => output.push(*c),
        Token::Variable(name) => {
            output.push('$');
            output.push_str(name);
        }
        Token::Verbatim(text) => {
            output.push_str("#{");
            output.push_str(text);
            output.push_str("#}");
        }
    }
}

/// Write tokens separated by single spaces, without padding inside brackets.
pub fn stream(tokens: &[Token], output: &mut String) {
    let mut previous: Option<&Token> = None;
    for t in tokens {
        let opens = matches!(previous, Some(Token::Punctuation('(')) | Some(Token::Punctuation('[')));
        let closes = matches!(t, Token::Punctuation(')') | Token::Punctuation(']'));
        if previous.is_some() && !opens && !closes {
            output.push(' ');
        }
        token(t, output);
        previous = Some(t);
    }
}

pub fn keyword(keyword: &Keyword, output: &mut String) {
    match keyword {
        Keyword::Word(w) => output.push_str(w),
        Keyword::Pattern(p) => quoted_string(p.as_str(), output),
    }
}

/// Write an entry on its own line(s) at the given indentation level.
pub fn entry(entry: &Entry, level: usize, output: &mut String) {
    indent(level, output);
    let start = output.len();
    keyword(entry.keyword(), output);
    match entry.value() {
        EntryValue::Stream(tokens) => {
            let written = output[start..].chars().count();
            let padding = KEYWORD_WIDTH.saturating_sub(written).max(1);
            output.extend(std::iter::repeat(' ').take(padding));
            stream(tokens, output);
            output.push_str(";\n");
        }
        EntryValue::Dict(dict) => {
            output.push('\n');
            dictionary(dict, level, output);
            output.push('\n');
        }
    }
}

/// Write a dictionary as a brace-delimited block. The closing brace is not
/// followed by a newline.
pub fn dictionary(dict: &Dictionary, level: usize, output: &mut String) {
    indent(level, output);
    output.push_str("{\n");
    for e in dict.entries() {
        entry(e, level + 1, output);
    }
    indent(level, output);
    output.push('}');
}
