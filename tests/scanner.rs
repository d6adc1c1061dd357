#[cfg(test)]
mod scanner_tests {
    use cybro::error::CybroError;
    use cybro::scanner::*;
    use cybro::token::*;
    use pretty_assertions::assert_eq;

    fn assert_token_sequence(source: &str, expected: &[(TokenType, &str)]) {
        let scanner = Scanner::new(source.as_bytes());
        let tokens: Vec<_> = scanner.filter_map(Result::ok).collect();

        assert_eq!(tokens.len(), expected.len());

        for (actual, (expected_type, expected_lexeme)) in tokens.iter().zip(expected.iter()) {
            assert_eq!(actual.token_type, *expected_type);
            assert_eq!(actual.lexeme, *expected_lexeme);
        }
    }

    #[test]
    fn test_scanner_01_symbols() {
        assert_token_sequence(
            "({*.,+*})",
            &[
                (TokenType::LEFT_PAREN, "("),
                (TokenType::LEFT_BRACE, "{"),
                (TokenType::STAR, "*"),
                (TokenType::DOT, "."),
                (TokenType::COMMA, ","),
                (TokenType::PLUS, "+"),
                (TokenType::STAR, "*"),
                (TokenType::RIGHT_BRACE, "}"),
                (TokenType::RIGHT_PAREN, ")"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_02_two_char_operators() {
        assert_token_sequence(
            "! != = == < <= > >= ~ ~~",
            &[
                (TokenType::BANG, "!"),
                (TokenType::BANG_EQUAL, "!="),
                (TokenType::EQUAL, "="),
                (TokenType::EQUAL_EQUAL, "=="),
                (TokenType::LESS, "<"),
                (TokenType::LESS_EQUAL, "<="),
                (TokenType::GREATER, ">"),
                (TokenType::GREATER_EQUAL, ">="),
                (TokenType::MIN, "~"),
                (TokenType::MAX, "~~"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_03_keywords_and_identifiers() {
        assert_token_sequence(
            "let x = nyl; var breakfast; break",
            &[
                (TokenType::LET, "let"),
                (TokenType::IDENTIFIER, "x"),
                (TokenType::EQUAL, "="),
                (TokenType::NIL, "nyl"),
                (TokenType::SEMICOLON, ";"),
                (TokenType::VAR, "var"),
                (TokenType::IDENTIFIER, "breakfast"),
                (TokenType::SEMICOLON, ";"),
                (TokenType::BREAK, "break"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_04_comments_are_skipped() {
        let source = "a // line comment\n/* block\ncomment */ b";
        let tokens: Vec<Token> = Scanner::new(source.as_bytes())
            .filter_map(Result::ok)
            .collect();

        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[0].lexeme, "a");
        assert_eq!(tokens[0].line, 1);
        assert_eq!(tokens[1].lexeme, "b");
        assert_eq!(tokens[1].line, 3);
    }

    #[test]
    fn test_scanner_05_literals() {
        let (tokens, errors) = scan("\"hi\nthere\" 12 3.5");

        assert!(errors.is_empty());
        assert_eq!(tokens[0].token_type, TokenType::STRING(String::new()));
        assert_eq!(tokens[0].to_string(), "STRING \"hi\nthere\" hi\nthere");
        assert_eq!(tokens[1].to_string(), "NUMBER 12 12.0");
        assert_eq!(tokens[1].line, 2);
        assert_eq!(tokens[2].to_string(), "NUMBER 3.5 3.5");
    }

    #[test]
    fn test_scanner_05_unterminated_block_comment_runs_to_eof() {
        let (tokens, errors) = scan("a /* never closed\n");

        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
        assert_eq!(
            tokens.iter().map(|t| t.token_type.name()).collect::<Vec<_>>(),
            vec!["IDENTIFIER", "EOF"]
        );
        assert_eq!(tokens[0].lexeme, "a");
        assert_eq!(tokens[1].line, 2);
    }

    #[test]
    fn test_scanner_06_unterminated_string() {
        let (tokens, errors) = scan("print \"oops");

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message(), "Unterminated string.");
        assert_eq!(tokens.last().map(|t| t.token_type.clone()), Some(TokenType::EOF));
    }

    #[test]
    fn test_unexpected_chars_token_sequence() {
        let source = ",.$(#";
        let scanner = Scanner::new(source.as_bytes());

        // Collect all results (both tokens and errors)
        let results: Vec<_> = scanner.collect();

        // We expect this sequence:
        // 0: COMMA ','
        // 1: DOT '.'
        // 2: Error for '$'
        // 3: LEFT_PAREN '('
        // 4: Error for '#'
        // 5: EOF
        assert_eq!(results.len(), 6, "Expected 6 items in result");

        assert_token_matches(&results[0], TokenType::COMMA, ",");
        assert_token_matches(&results[1], TokenType::DOT, ".");
        assert_token_matches(&results[3], TokenType::LEFT_PAREN, "(");
        assert_token_matches(&results[5], TokenType::EOF, "");

        let error_count = results.iter().filter(|r| r.is_err()).count();
        assert_eq!(error_count, 2, "Expected 2 error messages");

        for err in results.iter().filter_map(|r| r.as_ref().err()) {
            assert!(
                err.message().contains("Unexpected character"),
                "Error message should contain 'Unexpected character', got: {}",
                err
            );
            assert_eq!(err.line(), Some(1));
        }

        fn assert_token_matches(
            result: &Result<Token, CybroError>,
            expected_type: TokenType,
            expected_lexeme: &str,
        ) {
            match result {
                Ok(token) => {
                    assert_eq!(
                        token.token_type, expected_type,
                        "Expected token type {:?}, got {:?}",
                        expected_type, token.token_type
                    );
                    assert_eq!(
                        token.lexeme, expected_lexeme,
                        "Expected lexeme '{}', got '{}'",
                        expected_lexeme, token.lexeme
                    );
                }
                Err(e) => panic!("Expected token but got error: {}", e),
            }
        }
    }
}
