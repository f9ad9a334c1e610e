//! Recursive-descent parser turning a token stream into a [`SourceFile`].
//!
//! The parser does not recover: the first grammar error ends parsing of the file.

use std::path::Path;

use crate::ast::{
    FieldDeclaration, ModelDeclaration, NamespaceStatement, OptionEntry, OptionValue,
    ServiceDeclaration, SourceFile, Statement, TagFieldDeclaration, TypeExpression,
};
use crate::error::{Diagnostic, Span};
use crate::lexer::{self, Token, TokenKind};

const NAMESPACE_KEYWORD: &str = "namespace";
const MESSAGE_KEYWORD: &str = "message";
const TAG_KEYWORD: &str = "tag";
const SERVICE_KEYWORD: &str = "service";
const TEMPLATE_KEYWORD: &str = "template";

type ParseResult<T> = Result<T, Diagnostic>;

/// Tokenizes and parses one file. Lexer errors are all reported; grammar errors stop at the first.
pub fn parse_source(path: &Path, source: &str) -> Result<SourceFile, Vec<Diagnostic>> {
    let tokens = lexer::tokenize(path, source)?;
    let mut parser = Parser {
        file: path,
        tokens: &tokens,
        position: 0,
    };
    let statements = parser.parse_file().map_err(|error| vec![error])?;
    Ok(SourceFile {
        path: path.to_path_buf(),
        statements,
    })
}

struct Parser<'a> {
    file: &'a Path,
    tokens: &'a [Token],
    position: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> &'a Token {
        // the lexer always terminates the stream with EndOfFile
        &self.tokens[self.position.min(self.tokens.len() - 1)]
    }

    fn peek_nth(&self, n: usize) -> &'a Token {
        &self.tokens[(self.position + n).min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> &'a Token {
        let token = self.peek();
        if token.kind != TokenKind::EndOfFile {
            self.position += 1;
        }
        token
    }

    fn at(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        matches!(&self.peek().kind, TokenKind::Identifier(name) if name == keyword)
    }

    fn error(&self, span: Span, message: impl Into<String>) -> Diagnostic {
        Diagnostic {
            file: self.file.to_path_buf(),
            span,
            message: message.into(),
        }
    }

    fn unexpected(&self, expected: &str) -> Diagnostic {
        let token = self.peek();
        self.error(
            token.span,
            format!("expected {expected}, found {}", token.kind),
        )
    }

    fn expect(&mut self, kind: TokenKind) -> ParseResult<Span> {
        if self.at(&kind) {
            Ok(self.advance().span)
        } else {
            Err(self.unexpected(&kind.to_string()))
        }
    }

    fn expect_identifier(&mut self, what: &str) -> ParseResult<(String, Span)> {
        match &self.peek().kind {
            TokenKind::Identifier(name) => {
                let span = self.advance().span;
                Ok((name.clone(), span))
            }
            _ => Err(self.unexpected(what)),
        }
    }

    fn expect_integer(&mut self, what: &str) -> ParseResult<u32> {
        match self.peek().kind {
            TokenKind::Integer(value) => {
                let span = self.advance().span;
                u32::try_from(value)
                    .map_err(|_| self.error(span, format!("{what} {value} does not fit 32 bits")))
            }
            _ => Err(self.unexpected(what)),
        }
    }

    fn parse_file(&mut self) -> ParseResult<Vec<Statement>> {
        let mut statements = Vec::new();
        let mut seen_global_namespace = false;

        while !self.at(&TokenKind::EndOfFile) {
            let statement = self.parse_statement(true)?;
            if let Statement::Namespace(namespace) = &statement {
                if namespace.body.is_none() {
                    if seen_global_namespace {
                        return Err(self.error(
                            namespace.span,
                            "only one global namespace statement is allowed per file",
                        ));
                    }
                    if !statements.is_empty() {
                        return Err(self.error(
                            namespace.span,
                            "the global namespace statement must be the first statement",
                        ));
                    }
                    seen_global_namespace = true;
                }
            }
            statements.push(statement);
        }

        Ok(statements)
    }

    fn parse_statement(&mut self, top_level: bool) -> ParseResult<Statement> {
        if self.at_keyword(NAMESPACE_KEYWORD) {
            self.parse_namespace(top_level).map(Statement::Namespace)
        } else if self.at_keyword(MESSAGE_KEYWORD) {
            self.parse_message().map(Statement::Message)
        } else if self.at_keyword(TAG_KEYWORD) {
            self.parse_tag().map(Statement::Tag)
        } else if self.at_keyword(SERVICE_KEYWORD) {
            self.parse_service().map(Statement::Service)
        } else {
            Err(self.unexpected("'namespace', 'message', 'tag' or 'service'"))
        }
    }

    fn parse_namespace(&mut self, top_level: bool) -> ParseResult<NamespaceStatement> {
        let span = self.advance().span;
        let name = self.parse_qualified_name("namespace name")?;

        if self.at(&TokenKind::Semicolon) {
            self.advance();
            if !top_level {
                return Err(self.error(
                    span,
                    "a global namespace statement cannot appear inside a namespace block",
                ));
            }
            return Ok(NamespaceStatement {
                name,
                body: None,
                span,
            });
        }

        self.expect(TokenKind::LeftBrace)?;
        let mut body = Vec::new();
        while !self.at(&TokenKind::RightBrace) {
            if self.at(&TokenKind::EndOfFile) {
                return Err(self.unexpected("'}'"));
            }
            body.push(self.parse_statement(false)?);
        }
        self.advance();

        Ok(NamespaceStatement {
            name,
            body: Some(body),
            span,
        })
    }

    fn parse_template_params(&mut self) -> ParseResult<Vec<String>> {
        let is_template =
            self.at_keyword(TEMPLATE_KEYWORD) && self.peek_nth(1).kind == TokenKind::LeftAngle;
        if !is_template {
            return Ok(Vec::new());
        }
        self.advance();
        self.advance();

        let mut params: Vec<String> = Vec::new();
        loop {
            let (param, span) = self.expect_identifier("template parameter name")?;
            if params.contains(&param) {
                return Err(self.error(span, format!("duplicate template parameter {param:?}")));
            }
            params.push(param);
            if self.at(&TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        self.expect(TokenKind::RightAngle)?;
        Ok(params)
    }

    fn parse_model_body<F>(
        &mut self,
        mut parse_field: impl FnMut(&mut Self) -> ParseResult<F>,
    ) -> ParseResult<ModelDeclaration<F>> {
        let span = self.advance().span;
        let template_params = self.parse_template_params()?;
        let (name, _) = self.expect_identifier("declaration name")?;
        self.expect(TokenKind::LeftBrace)?;

        let mut fields = Vec::new();
        let mut options = Vec::new();
        loop {
            match self.peek().kind {
                TokenKind::RightBrace => {
                    self.advance();
                    break;
                }
                TokenKind::At => options.push(self.parse_option()?),
                TokenKind::EndOfFile => return Err(self.unexpected("'}'")),
                _ => fields.push(parse_field(self)?),
            }
        }

        Ok(ModelDeclaration {
            name,
            template_params,
            fields,
            options,
            span,
        })
    }

    fn parse_message(&mut self) -> ParseResult<ModelDeclaration<FieldDeclaration>> {
        self.parse_model_body(Self::parse_field)
    }

    fn parse_tag(&mut self) -> ParseResult<ModelDeclaration<TagFieldDeclaration>> {
        self.parse_model_body(Self::parse_tag_field)
    }

    fn parse_field(&mut self) -> ParseResult<FieldDeclaration> {
        let span = self.peek().span;
        let type_ = self.parse_type()?;
        let (name, _) = self.expect_identifier("field name")?;
        self.expect(TokenKind::Equals)?;
        let id = self.expect_integer("field id")?;
        self.expect(TokenKind::Semicolon)?;
        Ok(FieldDeclaration {
            type_,
            name,
            id,
            span,
        })
    }

    fn parse_tag_field(&mut self) -> ParseResult<TagFieldDeclaration> {
        let (name, span) = self.expect_identifier("tag field name")?;
        let payload = if self.at(&TokenKind::LeftParen) {
            self.advance();
            let payload = self.parse_type()?;
            self.expect(TokenKind::RightParen)?;
            Some(payload)
        } else {
            None
        };
        self.expect(TokenKind::Equals)?;
        let value = self.expect_integer("tag value")?;
        self.expect(TokenKind::Semicolon)?;
        Ok(TagFieldDeclaration {
            name,
            payload,
            value,
            span,
        })
    }

    fn parse_service(&mut self) -> ParseResult<ServiceDeclaration> {
        let span = self.advance().span;
        let (name, _) = self.expect_identifier("service name")?;
        self.expect(TokenKind::LeftBrace)?;

        let mut options = Vec::new();
        while !self.at(&TokenKind::RightBrace) {
            if !self.at(&TokenKind::At) {
                return Err(self.unexpected("'@' option or '}'"));
            }
            options.push(self.parse_option()?);
        }
        self.advance();

        Ok(ServiceDeclaration {
            name,
            options,
            span,
        })
    }

    fn parse_option(&mut self) -> ParseResult<OptionEntry> {
        let span = self.expect(TokenKind::At)?;
        let (key, _) = self.expect_identifier("option name")?;
        self.expect(TokenKind::Equals)?;

        let value = match self.peek().kind {
            TokenKind::Integer(_) => OptionValue::Integer(self.expect_integer("option value")?),
            TokenKind::LeftBracket => {
                self.advance();
                let mut values = vec![self.expect_integer("option value")?];
                while self.at(&TokenKind::Comma) {
                    self.advance();
                    values.push(self.expect_integer("option value")?);
                }
                self.expect(TokenKind::RightBracket)?;
                OptionValue::IntegerList(values)
            }
            TokenKind::Identifier(_) => OptionValue::Type(self.parse_type()?),
            _ => return Err(self.unexpected("integer, integer list or type")),
        };
        self.expect(TokenKind::Semicolon)?;

        Ok(OptionEntry { key, value, span })
    }

    fn parse_qualified_name(&mut self, what: &str) -> ParseResult<String> {
        let (mut name, _) = self.expect_identifier(what)?;
        while self.at(&TokenKind::Dot) {
            self.advance();
            let (segment, _) = self.expect_identifier(what)?;
            name.push('.');
            name.push_str(&segment);
        }
        Ok(name)
    }

    fn parse_type(&mut self) -> ParseResult<TypeExpression> {
        let span = self.peek().span;
        let name = self.parse_qualified_name("type name")?;

        let mut args = Vec::new();
        if self.at(&TokenKind::LeftAngle) {
            self.advance();
            args.push(self.parse_type()?);
            while self.at(&TokenKind::Comma) {
                self.advance();
                args.push(self.parse_type()?);
            }
            self.expect(TokenKind::RightAngle)?;
        }

        Ok(TypeExpression { name, args, span })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> SourceFile {
        parse_source(Path::new("test.ks"), source).unwrap()
    }

    fn parse_err(source: &str) -> Vec<Diagnostic> {
        parse_source(Path::new("test.ks"), source).unwrap_err()
    }

    #[test]
    fn parses_message_with_generic_fields() {
        let file = parse(
            "namespace acme;\n\
             message Account {\n\
                 string name = 1;\n\
                 map<string, array<int>> scores = 2;\n\
                 @used_ids = [3, 4];\n\
             }",
        );
        assert_eq!(file.statements.len(), 2);
        let Statement::Message(message) = &file.statements[1] else {
            panic!("expected message");
        };
        assert_eq!(message.name, "Account");
        assert!(!message.is_template());
        assert_eq!(message.fields.len(), 2);
        assert_eq!(message.fields[1].type_.name, "map");
        assert_eq!(message.fields[1].type_.args[1].name, "array");
        assert_eq!(message.fields[1].type_.args[1].args[0].name, "int");
        assert_eq!(message.fields[1].id, 2);
        assert_eq!(
            message.options[0].value,
            OptionValue::IntegerList(vec![3, 4])
        );
    }

    #[test]
    fn parses_templates_and_tags() {
        let file = parse(
            "message template<K, V> Entry { K key = 1; V value = 2; }\n\
             tag template<T> Result { Unknown = 0; Ok(T) = 1; Failed(shared.Error) = 2; }",
        );
        let Statement::Message(entry) = &file.statements[0] else {
            panic!("expected message");
        };
        assert_eq!(entry.template_params, vec!["K", "V"]);
        let Statement::Tag(result) = &file.statements[1] else {
            panic!("expected tag");
        };
        assert_eq!(result.template_params, vec!["T"]);
        assert_eq!(result.fields[0].payload, None);
        assert_eq!(result.fields[2].payload.as_ref().unwrap().name, "shared.Error");
        assert_eq!(result.fields[2].value, 2);
    }

    #[test]
    fn parses_service_options() {
        let file = parse("service Lookup { @input = Request; @output = Box<int>; @id = 7; }");
        let Statement::Service(service) = &file.statements[0] else {
            panic!("expected service");
        };
        assert_eq!(service.options.len(), 3);
        assert!(matches!(&service.options[1].value, OptionValue::Type(t) if t.args.len() == 1));
        assert_eq!(service.options[2].value, OptionValue::Integer(7));
    }

    #[test]
    fn parses_nested_namespace_blocks() {
        let file = parse("namespace a { namespace b.c { message M {} } message N {} }");
        let Statement::Namespace(outer) = &file.statements[0] else {
            panic!("expected namespace");
        };
        let body = outer.body.as_ref().unwrap();
        assert_eq!(body.len(), 2);
        assert!(matches!(&body[0], Statement::Namespace(inner) if inner.name == "b.c"));
    }

    #[test]
    fn global_namespace_must_come_first() {
        let errors = parse_err("message A {}\nnamespace acme;");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("first statement"));
        assert_eq!(errors[0].span, Span { line: 2, column: 1 });
    }

    #[test]
    fn only_one_global_namespace() {
        let errors = parse_err("namespace a;\nnamespace b;");
        assert!(errors[0].message.contains("only one global namespace"));
    }

    #[test]
    fn global_namespace_not_allowed_in_block() {
        let errors = parse_err("namespace a { namespace b; }");
        assert!(errors[0].message.contains("inside a namespace block"));
    }

    #[test]
    fn reports_first_grammar_error_with_position() {
        let errors = parse_err("message A {\n  int32 x = ;\n}");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].span, Span { line: 2, column: 13 });
        assert_eq!(errors[0].message, "expected field id, found ';'");
    }

    #[test]
    fn rejects_unterminated_body() {
        let errors = parse_err("tag T { A = 0;");
        assert!(errors[0].message.contains("found end of file"));
    }

    #[test]
    fn rejects_duplicate_template_parameters() {
        let errors = parse_err("message template<T, T> Pair {}");
        assert!(errors[0].message.contains("duplicate template parameter"));
    }
}
