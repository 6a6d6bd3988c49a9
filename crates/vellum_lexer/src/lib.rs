pub mod error;
pub mod lexer;
pub mod token;

pub use error::{LexError, LexResult};
pub use lexer::Lexer;
pub use token::{lookup_keyword, Span, Token, TokenKind};

pub fn tokenize(source: &str) -> (Vec<Token>, Vec<LexError>) {
    let mut lexer = Lexer::new(source);
    let tokens = lexer.tokenize();
    (tokens, lexer.errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let (tokens, errors) = tokenize(src);
        assert!(errors.is_empty(), "Unexpected errors: {:?}", errors);
        tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_empty_source() {
        let (tokens, errors) = tokenize("");
        assert!(errors.is_empty());
        assert_eq!(tokens[0].kind, TokenKind::Eof);
    }

    #[test]
    fn test_integer_literal() {
        let k = kinds("5 10 12345");
        assert_eq!(k[0], TokenKind::IntLiteral(5));
        assert_eq!(k[1], TokenKind::IntLiteral(10));
        assert_eq!(k[2], TokenKind::IntLiteral(12345));
    }

    #[test]
    fn test_string_literal() {
        let (tokens, errors) = tokenize(r#""hello world""#);
        assert!(errors.is_empty());
        assert_eq!(tokens[0].kind, TokenKind::StringLiteral("hello world".to_string()));
    }

    #[test]
    fn test_bool_literal() {
        let k = kinds("true false");
        assert_eq!(k[0], TokenKind::BoolLiteral(true));
        assert_eq!(k[1], TokenKind::BoolLiteral(false));
    }

    #[test]
    fn test_keywords() {
        let k = kinds("let fn if else return");
        assert_eq!(k[0], TokenKind::Let);
        assert_eq!(k[1], TokenKind::Fn);
        assert_eq!(k[2], TokenKind::If);
        assert_eq!(k[3], TokenKind::Else);
        assert_eq!(k[4], TokenKind::Return);
    }

    #[test]
    fn test_operators() {
        let k = kinds("+ - * / ! < > == != =");
        assert_eq!(k[0], TokenKind::Plus);
        assert_eq!(k[1], TokenKind::Minus);
        assert_eq!(k[2], TokenKind::Star);
        assert_eq!(k[3], TokenKind::Slash);
        assert_eq!(k[4], TokenKind::Bang);
        assert_eq!(k[5], TokenKind::Lt);
        assert_eq!(k[6], TokenKind::Gt);
        assert_eq!(k[7], TokenKind::EqualEqual);
        assert_eq!(k[8], TokenKind::BangEqual);
        assert_eq!(k[9], TokenKind::Assign);
    }

    #[test]
    fn test_delimiters() {
        let k = kinds("(){}[],;:");
        assert_eq!(k[0], TokenKind::LParen);
        assert_eq!(k[1], TokenKind::RParen);
        assert_eq!(k[2], TokenKind::LBrace);
        assert_eq!(k[3], TokenKind::RBrace);
        assert_eq!(k[4], TokenKind::LBracket);
        assert_eq!(k[5], TokenKind::RBracket);
        assert_eq!(k[6], TokenKind::Comma);
        assert_eq!(k[7], TokenKind::Semicolon);
        assert_eq!(k[8], TokenKind::Colon);
    }

    #[test]
    fn test_identifiers() {
        let k = kinds("foo bar_baz _private");
        assert_eq!(k[0], TokenKind::Identifier("foo".to_string()));
        assert_eq!(k[1], TokenKind::Identifier("bar_baz".to_string()));
        assert_eq!(k[2], TokenKind::Identifier("_private".to_string()));
    }

    #[test]
    fn test_escape_sequences() {
        let (tokens, errors) = tokenize(r#""\n\t\\""#);
        assert!(errors.is_empty());
        assert_eq!(tokens[0].kind, TokenKind::StringLiteral("\n\t\\".to_string()));
    }

    #[test]
    fn test_unterminated_string_error() {
        let (_tokens, errors) = tokenize("\"hello");
        assert!(!errors.is_empty());
        assert!(matches!(errors[0], LexError::UnterminatedString { .. }));
    }

    #[test]
    fn test_unexpected_character_error() {
        let (_tokens, errors) = tokenize("let x = @");
        assert!(!errors.is_empty());
        assert!(matches!(errors[0], LexError::UnexpectedCharacter { ch: '@', .. }));
    }

    #[test]
    fn test_let_statement() {
        let k = kinds("let five = 5;");
        assert_eq!(
            k,
            vec![
                TokenKind::Let,
                TokenKind::Identifier("five".to_string()),
                TokenKind::Assign,
                TokenKind::IntLiteral(5),
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_function_literal() {
        let k = kinds("let add = fn(x, y) { x + y; };");
        assert_eq!(k[0], TokenKind::Let);
        assert_eq!(k[3], TokenKind::Fn);
        assert_eq!(k[4], TokenKind::LParen);
    }

    #[test]
    fn test_array_and_index() {
        let k = kinds("[1, 2, 3][1]");
        assert_eq!(k[0], TokenKind::LBracket);
        assert_eq!(k[1], TokenKind::IntLiteral(1));
        assert_eq!(k[9], TokenKind::IntLiteral(1));
    }

    #[test]
    fn test_hash_literal() {
        let k = kinds("{1: 2, 3: 4}");
        assert_eq!(k[0], TokenKind::LBrace);
        assert_eq!(k[1], TokenKind::IntLiteral(1));
        assert_eq!(k[2], TokenKind::Colon);
        assert_eq!(k[3], TokenKind::IntLiteral(2));
    }
}
