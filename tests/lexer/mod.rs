// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use anyhow::{bail, Result};
use procvar::unstable::*;

fn source(text: &str) -> Result<Source> {
    Ok(Source::from_contents("case".to_string(), text.to_string())?)
}

/// Tokens of a single expression body, i.e. the text between `${` and `}`.
fn get_tokens(source: &Source) -> Result<Vec<Token>> {
    let mut tokens = vec![];
    let mut lex = Lexer::new(source);
    loop {
        let tok = lex.next_token()?;
        tokens.push(tok.clone());
        if tok.0 == TokenKind::Eof {
            break;
        }
    }
    Ok(tokens)
}

fn check_loc(tok: &Token) -> Result<()> {
    let msg = tok.1.message("", "");
    let lines: Vec<&str> = msg.split('\n').collect();
    let source_line = lines[3];
    let caret_line = lines[4];
    let Some(caret) = caret_line.find('^') else {
        bail!("could not find caret for {tok:?} {msg}");
    };
    // Source and caret lines share the `N | ` gutter.
    let at = source_line.get(caret..).unwrap_or("");
    if !at.starts_with(tok.1.text()) {
        bail!("location mismatch for {tok:?}\n{msg}");
    }
    Ok(())
}

#[test]
fn symbols_and_words() -> Result<()> {
    let source = source("a.b >= 10 && !empty c['k'] ? x : y")?;
    let tokens = get_tokens(&source)?;
    let texts: Vec<&str> = tokens.iter().map(|t| t.1.text()).collect();
    assert_eq!(
        texts,
        ["a", ".", "b", ">=", "10", "&&", "!", "empty", "c", "[", "k", "]", "?", "x", ":", "y", ""]
    );
    assert_eq!(tokens[10].0, TokenKind::String);
    for tok in &tokens {
        check_loc(tok)?;
    }
    Ok(())
}

#[test]
fn numbers() -> Result<()> {
    let source = source("1 2.5 3e2 4.5E-1")?;
    let tokens = get_tokens(&source)?;
    assert!(tokens[..4].iter().all(|t| t.0 == TokenKind::Number));
    assert_eq!(tokens[3].1.text(), "4.5E-1");

    let bad = self::source("12ab")?;
    assert!(get_tokens(&bad).is_err());
    Ok(())
}

#[test]
fn strings_keep_escapes_in_span() -> Result<()> {
    let source = source(r#"'it\'s' "say \"hi\"""#)?;
    let tokens = get_tokens(&source)?;
    assert_eq!(tokens[0].1.text(), r"it\'s");
    assert_eq!(unescape_string(tokens[0].1.text()), "it's");
    assert_eq!(unescape_string(tokens[1].1.text()), r#"say "hi""#);

    let unterminated = self::source("'abc")?;
    let err = get_tokens(&unterminated).unwrap_err();
    assert!(err.to_string().contains("unmatched '"), "{err}");
    Ok(())
}

#[test]
fn text_mode() -> Result<()> {
    let source = source(r"Hello \${name} ${name}!")?;
    let mut lex = Lexer::new(&source);

    let text = lex.next_text()?;
    assert_eq!(text.0, TokenKind::Text);
    assert_eq!(unescape_text(text.1.text()), "Hello ${name} ");

    let open = lex.next_text()?;
    assert_eq!((open.0, open.1.text()), (TokenKind::Open, "${"));
    assert_eq!(lex.next_token()?.1.text(), "name");
    assert_eq!(lex.next_token()?.1.text(), "}");

    let rest = lex.next_text()?;
    assert_eq!(rest.1.text(), "!");
    assert_eq!(lex.next_text()?.0, TokenKind::Eof);
    Ok(())
}

#[test]
fn invalid_character() -> Result<()> {
    let source = source("a ~ b")?;
    match get_tokens(&source) {
        Err(e) => {
            let msg = e.to_string();
            assert!(msg.contains("invalid character"), "{msg}");
            assert!(msg.contains("case:1:3"), "{msg}");
        }
        Ok(tokens) => bail!("expected an error, got {tokens:?}"),
    }
    Ok(())
}

#[test]
fn multi_line_locations() -> Result<()> {
    let source = source("a +\n  b")?;
    let tokens = get_tokens(&source)?;
    assert_eq!((tokens[2].1.line, tokens[2].1.col), (2, 3));
    for tok in &tokens[..3] {
        check_loc(tok)?;
    }
    Ok(())
}
