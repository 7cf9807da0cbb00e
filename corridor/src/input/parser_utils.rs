use std::fmt::Debug;
use std::iter::Peekable;

#[derive(Debug, Fail)]
pub enum LexerError {
    #[fail(display = "unexpected character {:?} on line {}", c, line)]
    UnexpectedChar { line: usize, c: String },
    #[fail(display = "malformed number {:?} on line {}", text, line)]
    BadNumber { line: usize, text: String },
}

#[derive(Debug, Clone, Fail)]
pub enum ParseError {
    #[fail(display = "unexpected token at {}: {}", _0, _1)]
    UnexpectedToken(usize, String),
    #[fail(display = "unexpected end of input")]
    UnexpectedEOF,
    #[fail(display = "no alternative matched: {:?}", _0)]
    Many(Vec<ParseError>),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    BraceOpen,
    BraceClose,
    ListOpen,
    ListClose,
    ListSep,
    ParensOpen,
    ParensClose,
    Number(f64),
    Identifier(String),
    EOF,
}

pub fn alt<T>(i: &mut usize,
              tokens: &[Token],
              alts: &[&dyn Fn(&mut usize, &[Token]) -> Result<T, ParseError>])
              -> Result<T, ParseError> {
    let start = *i;
    let mut errs = Vec::new();
    for alt in alts {
        *i = start;
        match alt(i, tokens) {
            Ok(x) => return Ok(x),
            Err(y) => errs.push(y),
        }
    }
    Err(ParseError::Many(errs))
}

pub fn must_match(i: &mut usize, tokens: &[Token], tok: Token) -> Result<(), ParseError> {
    if matches(i, tokens, tok) {
        Ok(())
    } else {
        Err(ParseError::UnexpectedToken(*i, format!("{:?}", tokens[*i])))
    }
}

pub fn matches(i: &mut usize, tokens: &[Token], tok: Token) -> bool {
    let r = tokens[*i] == tok;
    if r {
        *i += 1;
    }
    r
}

pub fn list<F, O>(i: &mut usize, t: &[Token], f: F) -> Result<Vec<O>, ParseError>
    where F: Fn(&mut usize, &[Token]) -> Result<O, ParseError>
{
    must_match(i, t, Token::ListOpen)?;
    let mut v = Vec::new();
    if matches(i, t, Token::ListClose) {
        return Ok(v);
    }
    loop {
        v.push(f(i, t)?);
        if !matches(i, t, Token::ListSep) {
            break;
        }
    }
    must_match(i, t, Token::ListClose)?;
    Ok(v)
}

pub fn symbol(i: &mut usize, t: &[Token], s: &str) -> Result<(), ParseError> {
    if identifier(i, t)? != s {
        Err(ParseError::UnexpectedToken(*i, format!("{:?}", s)))
    } else {
        Ok(())
    }
}

pub fn identifier(i: &mut usize, tokens: &[Token]) -> Result<String, ParseError> {
    let r = match tokens[*i] {
        Token::Identifier(ref s) => s.clone(),
        Token::EOF => return Err(ParseError::UnexpectedEOF),
        ref x => return Err(ParseError::UnexpectedToken(*i, format!("{:?}", x))),
    };
    *i += 1;
    Ok(r)
}

pub fn number(i: &mut usize, tokens: &[Token]) -> Result<f64, ParseError> {
    let r = match tokens[*i] {
        Token::Number(x) => x,
        Token::EOF => return Err(ParseError::UnexpectedEOF),
        ref x => return Err(ParseError::UnexpectedToken(*i, format!("{:?}", x))),
    };
    *i += 1;
    Ok(r)
}

/// `(a, b)`
pub fn number_pair(i: &mut usize, t: &[Token]) -> Result<(f64, f64), ParseError> {
    must_match(i, t, Token::ParensOpen)?;
    let a = number(i, t)?;
    must_match(i, t, Token::ListSep)?;
    let b = number(i, t)?;
    must_match(i, t, Token::ParensClose)?;
    Ok((a, b))
}

fn consume_while<F>(it: &mut Peekable<&mut dyn Iterator<Item = char>>, x: F) -> String
    where F: Fn(char) -> bool
{
    let mut v = String::new();
    while let Some(&ch) = it.peek() {
        if x(ch) {
            it.next();
            v.push(ch);
        } else {
            break;
        }
    }
    v
}

pub fn lexer(x: &mut dyn Iterator<Item = char>) -> Result<Vec<Token>, LexerError> {
    let mut tokens = Vec::new();
    let mut input = x.peekable();
    let mut line = 1;
    while let Some(&ch) = input.peek() {
        match ch {
            x if x.is_numeric() => {
                let num = consume_while(&mut input, |a| {
                    a.is_numeric() || a == '-' || a == 'e' || a == 'E' || a == '.'
                });
                match num.parse::<f64>() {
                    Ok(n) => tokens.push(Token::Number(n)),
                    Err(_) => return Err(LexerError::BadNumber { line, text: num }),
                }
            }
            x if x.is_alphabetic() || x == '_' => {
                let s = consume_while(&mut input, |a| a == '_' || a.is_alphanumeric());
                tokens.push(Token::Identifier(s));
            }
            '#' => {
                consume_while(&mut input, |a| a != '\n');
            }
            '[' => {
                input.next();
                tokens.push(Token::ListOpen);
            }
            ']' => {
                input.next();
                tokens.push(Token::ListClose);
            }
            ',' => {
                input.next();
                tokens.push(Token::ListSep);
            }
            '(' => {
                input.next();
                tokens.push(Token::ParensOpen);
            }
            ')' => {
                input.next();
                tokens.push(Token::ParensClose);
            }
            '{' => {
                input.next();
                tokens.push(Token::BraceOpen);
            }
            '}' => {
                input.next();
                tokens.push(Token::BraceClose);
            }
            ' ' | '\r' | '\t' => {
                input.next();
            }
            '\n' => {
                input.next();
                line += 1;
            }
            c => {
                return Err(LexerError::UnexpectedChar {
                    line,
                    c: c.to_string(),
                });
            }
        }
    }
    tokens.push(Token::EOF);
    Ok(tokens)
}

#[test]
fn test_lexer() {
    let toks = lexer(&mut "route [A, S_1] # comment\n(600, 80.5)".chars()).unwrap();
    assert_eq!(toks,
               vec![Token::Identifier("route".to_string()),
                    Token::ListOpen,
                    Token::Identifier("A".to_string()),
                    Token::ListSep,
                    Token::Identifier("S_1".to_string()),
                    Token::ListClose,
                    Token::ParensOpen,
                    Token::Number(600.0),
                    Token::ListSep,
                    Token::Number(80.5),
                    Token::ParensClose,
                    Token::EOF]);
}

#[test]
fn test_lexer_errors() {
    match lexer(&mut "a\nb ; c".chars()) {
        Err(LexerError::UnexpectedChar { line, .. }) => assert_eq!(line, 2),
        x => panic!("unexpected {:?}", x),
    }
    match lexer(&mut "1.2.3".chars()) {
        Err(LexerError::BadNumber { .. }) => {}
        x => panic!("unexpected {:?}", x),
    }
}

#[test]
fn test_list_and_pairs() {
    let toks = lexer(&mut "[(1, 2), (3, 4)]".chars()).unwrap();
    let mut i = 0;
    let pairs = list(&mut i, &toks, number_pair).unwrap();
    assert_eq!(pairs, vec![(1.0, 2.0), (3.0, 4.0)]);
    assert_eq!(toks[i], Token::EOF);
}
