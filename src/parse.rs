use crate::{Keyword, Number, ReadError, Token};
use nom::{
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::char,
    combinator::{cut, map, opt},
    error::{context, ErrorKind, ParseError, VerboseError, VerboseErrorKind},
    multi::many0,
    sequence::{delimited, preceded},
    Err, IResult,
};
use tracing::trace;

type Res<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

/// One statement of a dictionary body, before directives and variables are resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    /// `keyword value;` or `keyword { ... }`.
    Entry(Keyword, RawValue),
    /// `#include`, `#inputMode` and friends.
    Directive(Directive),
    /// `$name;`, pulling the entries of another dictionary into this one.
    Macro(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Stream(Vec<Token>),
    Dict(Vec<Item>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    Include { path: String, optional: bool },
    InputMode(String),
    Remove(Vec<Keyword>),
}

fn fail<'a, T>(input: &'a str, message: &'static str) -> Res<'a, T> {
    Err(Err::Failure(VerboseError {
        errors: vec![(input, VerboseErrorKind::Context(message))],
    }))
}

fn error<'a, T>(input: &'a str, kind: ErrorKind) -> Res<'a, T> {
    Err(Err::Error(VerboseError::from_error_kind(input, kind)))
}

/// Take and discard whitespace, `// line` comments and `/* block */` comments.
fn skip_whitespace(mut input: &str) -> Res<()> {
    loop {
        input = input.trim_start();
        if let Some(rest) = input.strip_prefix("//") {
            input = rest.find('\n').map_or("", |end| &rest[end..]);
        } else if let Some(rest) = input.strip_prefix("/*") {
            match rest.find("*/") {
                Some(end) => input = &rest[end + 2..],
                None => return fail(input, "unterminated block comment"),
            }
        } else {
            return Ok((input, ()));
        }
    }
}

/// Characters that may appear inside a word.
fn is_word_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '"' | '\'' | '/' | ';' | '{' | '}')
}

fn is_punctuation(c: char) -> bool {
    matches!(c, '(' | ')' | '[' | ']' | ':' | ',' | '=' | '+' | '-' | '*' | '/')
}

/// Read a bare word. Parentheses nest inside a word, so `div(phi,U)` is one
/// word, while an unmatched `)` ends it.
fn word(input: &str) -> Res<String> {
    match input.chars().next() {
        Some(c) if is_word_char(c) && !is_punctuation(c) && c != '$' && c != '#' => {}
        _ => return error(input, ErrorKind::AlphaNumeric),
    }

    let mut depth = 0usize;
    let mut end = input.len();
    for (index, c) in input.char_indices() {
        if !is_word_char(c) {
            end = index;
            break;
        }
        match c {
            '(' => depth += 1,
            ')' if depth == 0 => {
                end = index;
                break;
            }
            ')' => depth -= 1,
            _ => {}
        }
    }
    Ok((&input[end..], input[..end].to_string()))
}

/// Read a double-quoted string.
///
/// `\"` and `\\` are unescaped, any other backslash sequence is kept as written.
fn quoted_string(input: &str) -> Res<String> {
    let (body, _) = char('"')(input)?;
    let mut result = String::new();
    let mut chars = body.char_indices();
    while let Some((index, c)) = chars.next() {
        match c {
            '"' => return Ok((&body[index + 1..], result)),
            '\\' => match chars.next() {
                Some((_, '"')) => result.push('"'),
                Some((_, '\\')) => result.push('\\'),
                Some((_, other)) => {
                    result.push('\\');
                    result.push(other);
                }
                None => break,
            },
            c => result.push(c),
        }
    }
    fail(input, "unterminated string")
}

/// Read a `#{ ... #}` verbatim block.
fn verbatim(input: &str) -> Res<String> {
    let (body, _) = tag("#{")(input)?;
    match body.find("#}") {
        Some(end) => Ok((&body[end + 2..], body[..end].to_string())),
        None => fail(input, "unterminated verbatim block"),
    }
}

fn variable_name(input: &str) -> Res<&str> {
    take_while1(|c: char| c.is_alphanumeric() || c == '_' || c == '.')(input)
}

/// Read a `$name` or `$a.b` variable reference.
fn variable(input: &str) -> Res<String> {
    map(preceded(char('$'), cut(variable_name)), String::from)(input)
}

/// Read an integer or floating point number.
///
/// Numbers must be followed by a delimiter, so `2nd` is left for the word
/// parser.
fn number(input: &str) -> Res<Token> {
    let bytes = input.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end += 1;
    }
    let digits = |from: usize| {
        bytes[from..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count()
    };

    let integer_digits = digits(end);
    end += integer_digits;
    let mut is_scalar = false;
    let mut mantissa_digits = integer_digits;
    if bytes.get(end) == Some(&b'.') {
        let fraction_digits = digits(end + 1);
        end += 1 + fraction_digits;
        mantissa_digits += fraction_digits;
        is_scalar = true;
    }
    if mantissa_digits == 0 {
        return error(input, ErrorKind::Digit);
    }
    if matches!(bytes.get(end), Some(b'e') | Some(b'E')) {
        let mut exponent = end + 1;
        if matches!(bytes.get(exponent), Some(b'+') | Some(b'-')) {
            exponent += 1;
        }
        let exponent_digits = digits(exponent);
        if exponent_digits > 0 {
            end = exponent + exponent_digits;
            is_scalar = true;
        }
    }

    let (text, rest) = input.split_at(end);
    match rest.chars().next() {
        Some(c) if is_word_char(c) && !matches!(c, '(' | ')' | '[' | ']' | ',' | ':') => {
            return error(input, ErrorKind::Digit)
        }
        _ => {}
    }

    if !is_scalar {
        if let Ok(label) = text.parse::<i64>() {
            return Ok((rest, Token::Label(Number::new(label, text))));
        }
    }
    match text.parse::<f64>() {
        Ok(scalar) => Ok((rest, Token::Scalar(Number::new(scalar, text)))),
        Err(_) => error(input, ErrorKind::Float),
    }
}

fn punctuation(input: &str) -> Res<Token> {
    match input.chars().next() {
        Some(c) if is_punctuation(c) => Ok((&input[c.len_utf8()..], Token::Punctuation(c))),
        _ => error(input, ErrorKind::OneOf),
    }
}

/// Read a single token of a stream entry.
fn token(input: &str) -> Res<Token> {
    alt((
        map(verbatim, Token::Verbatim),
        map(quoted_string, Token::String),
        map(variable, Token::Variable),
        number,
        map(word, Token::Word),
        punctuation,
    ))(input)
}

/// Read the tokens of a stream entry, up to and including the terminating `;`.
fn stream(input: &str) -> Res<Vec<Token>> {
    let (input, tokens) = many0(preceded(skip_whitespace, token))(input)?;
    let (input, _) = skip_whitespace(input)?;
    let (input, _) = context("expected ';' at the end of the entry", char(';'))(input)?;
    Ok((input, tokens))
}

/// Read an entry keyword. Quoted keywords are regular expressions.
fn keyword(input: &str) -> Res<Keyword> {
    alt((
        map(quoted_string, |pattern| Keyword::pattern(&pattern)),
        map(word, Keyword::Word),
    ))(input)
}

/// Read a brace-delimited sub-dictionary, including an optional trailing `;`.
fn sub_dict(input: &str) -> Res<Vec<Item>> {
    let (input, items) = preceded(char('{'), cut(dict_body))(input)?;
    let (input, _) = skip_whitespace(input)?;
    let (input, _) = context("expected '}' to close the dictionary", cut(char('}')))(input)?;
    let (input, _) = opt(preceded(skip_whitespace, char(';')))(input)?;
    Ok((input, items))
}

fn entry(input: &str) -> Res<Item> {
    let (input, keyword) = keyword(input)?;
    trace!(keyword = keyword.as_str(), "entry");
    let (input, _) = skip_whitespace(input)?;
    let (input, value) = cut(alt((
        map(sub_dict, RawValue::Dict),
        map(stream, RawValue::Stream),
    )))(input)?;
    Ok((input, Item::Entry(keyword, value)))
}

/// Read the argument of `#remove`: a single keyword or a parenthesised list.
fn remove_list(input: &str) -> Res<Vec<Keyword>> {
    alt((
        delimited(
            char('('),
            many0(preceded(skip_whitespace, keyword)),
            preceded(skip_whitespace, char(')')),
        ),
        map(keyword, |keyword| vec![keyword]),
    ))(input)
}

fn include_path(input: &str) -> Res<String> {
    alt((quoted_string, word))(input)
}

fn directive(input: &str) -> Res<Item> {
    let (rest, name) = preceded(char('#'), word)(input)?;
    let (rest, _) = skip_whitespace(rest)?;
    let (rest, directive) = match name.as_str() {
        "include" => map(cut(include_path), |path| Directive::Include {
            path,
            optional: false,
        })(rest)?,
        "includeIfPresent" => map(cut(include_path), |path| Directive::Include {
            path,
            optional: true,
        })(rest)?,
        "inputMode" => map(cut(word), Directive::InputMode)(rest)?,
        "remove" => map(cut(remove_list), Directive::Remove)(rest)?,
        _ => return fail(input, "unsupported directive"),
    };
    let (rest, _) = opt(preceded(skip_whitespace, char(';')))(rest)?;
    Ok((rest, Item::Directive(directive)))
}

fn macro_entry(input: &str) -> Res<Item> {
    let (input, name) = variable(input)?;
    let (input, _) = opt(preceded(skip_whitespace, char(';')))(input)?;
    Ok((input, Item::Macro(name)))
}

fn item(input: &str) -> Res<Item> {
    preceded(skip_whitespace, alt((directive, macro_entry, entry)))(input)
}

/// Read entries until something that does not start an entry.
fn dict_body(input: &str) -> Res<Vec<Item>> {
    many0(item)(input)
}

/// Read a whole file. The body may be wrapped in one pair of braces, which is
/// how a printed sub-dictionary looks.
fn file(input: &str) -> Res<Vec<Item>> {
    let (input, _) = skip_whitespace(input)?;
    if input.starts_with('{') {
        let (input, items) = sub_dict(input)?;
        let (input, _) = skip_whitespace(input)?;
        return Ok((input, items));
    }
    let (input, items) = dict_body(input)?;
    let (input, _) = skip_whitespace(input)?;
    Ok((input, items))
}

/// Position of `rest` within `full`, as 1-based line and column.
fn line_column(full: &str, rest: &str) -> (usize, usize) {
    let offset = full.len() - rest.len();
    let consumed = &full[..offset];
    let line = consumed.matches('\n').count() + 1;
    let column = consumed
        .rfind('\n')
        .map_or(consumed, |newline| &consumed[newline + 1..])
        .chars()
        .count()
        + 1;
    (line, column)
}

fn syntax_error(full: &str, rest: &str, name: &str, message: String) -> ReadError {
    let (line, column) = line_column(full, rest);
    ReadError::Syntax {
        name: if name.is_empty() {
            "<stdin>".to_string()
        } else {
            name.to_string()
        },
        line,
        column,
        message,
    }
}

fn describe(error: &VerboseError<&str>) -> String {
    error
        .errors
        .iter()
        .find_map(|(_, kind)| match kind {
            VerboseErrorKind::Context(message) => Some(message.to_string()),
            _ => None,
        })
        .unwrap_or_else(|| match error.errors.first() {
            Some((_, VerboseErrorKind::Char(c))) => format!("expected '{}'", c),
            Some((_, VerboseErrorKind::Nom(kind))) => kind.description().to_lowercase(),
            _ => "invalid syntax".to_string(),
        })
}

/// Parse dictionary text into items. `name` only appears in error messages.
pub fn items(input: &str, name: &str) -> Result<Vec<Item>, ReadError> {
    match file(input) {
        Ok(("", items)) => Ok(items),
        Ok((rest, _)) => Err(syntax_error(
            input,
            rest,
            name,
            "expected a keyword, directive or $macro".to_string(),
        )),
        Err(Err::Error(e)) | Err(Err::Failure(e)) => {
            let rest = e.errors.first().map_or(input, |(rest, _)| *rest);
            Err(syntax_error(input, rest, name, describe(&e)))
        }
        Err(Err::Incomplete(_)) => Err(syntax_error(
            input,
            "",
            name,
            "unexpected end of input".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn w(s: &str) -> Token {
        Token::Word(s.to_string())
    }

    #[test]
    fn skip_whitespace_test() {
        let (rest, _) = skip_whitespace("  // comment\n /* block\n */ key").unwrap();
        assert_eq!(rest, "key");
        let (rest, _) = skip_whitespace("// only a comment").unwrap();
        assert_eq!(rest, "");
        assert!(skip_whitespace("/* open").is_err());
    }

    #[test]
    fn word_test() {
        let (rest, res) = word("div(phi,U) Gauss").unwrap();
        assert_eq!(res, "div(phi,U)");
        assert_eq!(rest, " Gauss");
        let (rest, res) = word("uniform)").unwrap();
        assert_eq!(res, "uniform");
        assert_eq!(rest, ")");
        let (rest, res) = word("List<scalar>;").unwrap();
        assert_eq!(res, "List<scalar>");
        assert_eq!(rest, ";");
        assert!(word("(0 0 0)").is_err());
        assert!(word("$var").is_err());
    }

    #[test]
    fn quoted_string_test() {
        let (_, res) = quoted_string(r#""(U|k|epsilon)""#).unwrap();
        assert_eq!(res, "(U|k|epsilon)");
        let (_, res) = quoted_string(r#""say \"hi\"""#).unwrap();
        assert_eq!(res, r#"say "hi""#);
        let (_, res) = quoted_string(r#""C:\\dir\n""#).unwrap();
        assert_eq!(res, r"C:\dir\n", "unknown escapes are kept");
        assert!(quoted_string(r#""open"#).is_err());
    }

    #[test]
    fn number_test() {
        let (_, res) = number("5;").unwrap();
        assert_eq!(res, Token::Label(Number::new(5, "5")));
        let (_, res) = number("-12)").unwrap();
        assert_eq!(res, Token::Label(Number::new(-12, "-12")));
        let (_, res) = number("0.50 ").unwrap();
        assert_eq!(res, Token::Scalar(Number::new(0.5, "0.50")));
        let (_, res) = number("1e-05;").unwrap();
        assert_eq!(res, Token::Scalar(Number::new(1e-5, "1e-05")));
        let (_, res) = number("2.").unwrap();
        assert_eq!(res, Token::Scalar(Number::new(2.0, "2.")));
        let (_, res) = number("12345678901234567890;").unwrap();
        assert_eq!(
            res,
            Token::Scalar(Number::new(12345678901234567890.0, "12345678901234567890")),
            "labels that overflow become scalars"
        );
        let (_, res) = number("1e400;").unwrap();
        assert_eq!(res, Token::Scalar(Number::new(f64::INFINITY, "1e400")));
        assert!(number("2nd").is_err());
        assert!(number("-").is_err());
        assert!(number(".").is_err());
    }

    #[test]
    fn token_test() {
        let (_, res) = token("#{ int x = 1; #}").unwrap();
        assert_eq!(res, Token::Verbatim(" int x = 1; ".to_string()));
        let (_, res) = token("$nu;").unwrap();
        assert_eq!(res, Token::Variable("nu".to_string()));
        let (_, res) = token("$inlet.value;").unwrap();
        assert_eq!(res, Token::Variable("inlet.value".to_string()));
        let (_, res) = token("(0 0 0)").unwrap();
        assert_eq!(res, Token::Punctuation('('));
        let (_, res) = token("-x").unwrap();
        assert_eq!(res, Token::Punctuation('-'));
        let (_, res) = token("2nd").unwrap();
        assert_eq!(res, w("2nd"));
    }

    #[test]
    fn stream_test() {
        let (rest, res) = stream(" uniform (0 0 0); next").unwrap();
        assert_eq!(
            res,
            vec![
                w("uniform"),
                Token::Punctuation('('),
                Token::Label(Number::new(0, "0")),
                Token::Label(Number::new(0, "0")),
                Token::Label(Number::new(0, "0")),
                Token::Punctuation(')'),
            ]
        );
        assert_eq!(rest, " next");
        let (_, res) = stream(" ;").unwrap();
        assert!(res.is_empty());
    }

    #[test]
    fn entry_test() {
        let (_, res) = entry("nu [0 2 -1 0 0 0 0] 1e-05;").unwrap();
        match res {
            Item::Entry(Keyword::Word(name), RawValue::Stream(tokens)) => {
                assert_eq!(name, "nu");
                assert_eq!(tokens.len(), 10);
                assert_eq!(tokens[9], Token::Scalar(Number::new(1e-5, "1e-05")));
            }
            other => panic!("unexpected {:?}", other),
        }

        let (_, res) = entry("\"(U|k)\" { solver smoothSolver; }").unwrap();
        assert_eq!(
            res,
            Item::Entry(
                Keyword::pattern("(U|k)"),
                RawValue::Dict(vec![Item::Entry(
                    Keyword::Word("solver".to_string()),
                    RawValue::Stream(vec![w("smoothSolver")])
                )])
            )
        );
        assert!(matches!(entry("missing semicolon }"), Err(Err::Failure(_))));
    }

    #[test]
    fn directive_test() {
        let (_, res) = directive("#include \"initialConditions\"").unwrap();
        assert_eq!(
            res,
            Item::Directive(Directive::Include {
                path: "initialConditions".to_string(),
                optional: false
            })
        );
        let (_, res) = directive("#includeIfPresent \"extra\"").unwrap();
        assert_eq!(
            res,
            Item::Directive(Directive::Include {
                path: "extra".to_string(),
                optional: true
            })
        );
        let (_, res) = directive("#inputMode overwrite").unwrap();
        assert_eq!(res, Item::Directive(Directive::InputMode("overwrite".to_string())));
        let (_, res) = directive("#remove (a \"b.*\")").unwrap();
        assert_eq!(
            res,
            Item::Directive(Directive::Remove(vec![
                Keyword::Word("a".to_string()),
                Keyword::pattern("b.*")
            ]))
        );
        assert!(matches!(directive("#calc \"1+1\";"), Err(Err::Failure(_))));
    }

    #[test]
    fn items_test() {
        let res = items("a { b { c 5; } }", "").unwrap();
        assert_eq!(res.len(), 1);
        let res = items("$defaults; x 1;", "").unwrap();
        assert_eq!(res[0], Item::Macro("defaults".to_string()));
        let res = items("{\n    c               5;\n}\n", "").unwrap();
        assert_eq!(
            res,
            vec![Item::Entry(
                Keyword::Word("c".to_string()),
                RawValue::Stream(vec![Token::Label(Number::new(5, "5"))])
            )]
        );
        assert_eq!(items("", "").unwrap(), vec![]);
    }

    #[test]
    fn syntax_error_position_test() {
        match items("a 1;\nb { c 2;\n", "case/dict") {
            Err(ReadError::Syntax {
                name,
                line,
                message,
                ..
            }) => {
                assert_eq!(name, "case/dict");
                assert_eq!(line, 3);
                assert_eq!(message, "expected '}' to close the dictionary");
            }
            other => panic!("unexpected {:?}", other),
        }
        match items("a 1;\n  ;", "") {
            Err(ReadError::Syntax { line, column, .. }) => {
                assert_eq!((line, column), (2, 3));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
