use crate::error::{GraphError, Result};
use crate::query::ast::{AstKind, AstNode, TAG_BOOL, TAG_INT, TAG_STRING};
use crate::query::lexer::{Token, TokenKind};

/// Recursive-descent parser over the token stream.
///
/// Grammar, roughly:
///
/// ```text
/// query    = { clause } EOF
/// clause   = CREATE patterns | MATCH patterns | WHERE expr
///          | SET assign {, assign} | DELETE ident {, ident}
///          | RETURN ident {, ident}
/// pattern  = "(" node ")" [ "-" relationship "(" node ")" ]
/// node     = [ident] [":" label] [ "{" props "}" ]
/// relationship = "[" [ident] [":" type] [ "{" props "}" ] "]" "->"
/// ```
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    pub fn parse(mut self) -> Result<AstNode> {
        if self.tokens.is_empty() || self.peek().kind == TokenKind::Eof {
            return Err(GraphError::Parse("empty query".into()));
        }
        let query = self.query()?;
        if self.peek().kind != TokenKind::Eof {
            return Err(self.unexpected());
        }
        Ok(query)
    }

    fn query(&mut self) -> Result<AstNode> {
        let mut query = AstNode::new(AstKind::Query);
        while self.peek().kind != TokenKind::Eof {
            let clause = match self.peek_keyword().as_deref() {
                Some("CREATE") => self.create_clause()?,
                Some("MATCH") => self.match_clause()?,
                Some("WHERE") => self.where_clause()?,
                Some("SET") => self.set_clause()?,
                Some("DELETE") => self.delete_clause()?,
                Some("RETURN") => self.return_clause()?,
                _ => return Err(self.unexpected()),
            };
            query.push(clause);
        }
        Ok(query)
    }

    fn create_clause(&mut self) -> Result<AstNode> {
        self.expect_keyword("CREATE")?;
        let mut clause = AstNode::new(AstKind::Create);
        loop {
            clause.push(self.pattern()?);
            if !self.accept_symbol(",") {
                break;
            }
        }
        Ok(clause)
    }

    fn match_clause(&mut self) -> Result<AstNode> {
        self.expect_keyword("MATCH")?;
        let mut clause = AstNode::new(AstKind::Match);
        loop {
            clause.push(self.pattern()?);
            if !self.accept_symbol(",") {
                break;
            }
        }
        Ok(clause)
    }

    fn where_clause(&mut self) -> Result<AstNode> {
        self.expect_keyword("WHERE")?;
        let mut clause = AstNode::new(AstKind::Where);
        clause.push(self.expression()?);
        Ok(clause)
    }

    fn set_clause(&mut self) -> Result<AstNode> {
        self.expect_keyword("SET")?;
        let mut clause = AstNode::new(AstKind::Set);
        loop {
            clause.push(self.property_assignment()?);
            if !self.accept_symbol(",") {
                break;
            }
        }
        Ok(clause)
    }

    fn delete_clause(&mut self) -> Result<AstNode> {
        self.expect_keyword("DELETE")?;
        let mut clause = AstNode::new(AstKind::Delete);
        loop {
            let name = self.expect_identifier()?;
            clause.push(AstNode::with_value(AstKind::Identifier, name));
            if !self.accept_symbol(",") {
                break;
            }
        }
        Ok(clause)
    }

    fn return_clause(&mut self) -> Result<AstNode> {
        self.expect_keyword("RETURN")?;
        let mut clause = AstNode::new(AstKind::Return);
        loop {
            let name = self.expect_identifier()?;
            clause.push(AstNode::with_value(AstKind::Identifier, name));
            if !self.accept_symbol(",") {
                break;
            }
        }
        Ok(clause)
    }

    fn pattern(&mut self) -> Result<AstNode> {
        let mut pattern = AstNode::new(AstKind::Pattern);
        self.expect_symbol("(")?;
        pattern.push(self.node()?);
        self.expect_symbol(")")?;

        if self.accept_symbol("-") {
            pattern.push(self.relationship()?);
            self.expect_symbol("(")?;
            pattern.push(self.node()?);
            self.expect_symbol(")")?;
        }
        Ok(pattern)
    }

    fn node(&mut self) -> Result<AstNode> {
        let mut node = AstNode::new(AstKind::Node);
        if let Some(name) = self.accept_identifier() {
            node.value = name;
        }
        if self.accept_symbol(":") {
            let label = self.expect_identifier()?;
            node.push(AstNode::with_value(AstKind::Label, label));
        }
        if self.accept_symbol("{") {
            self.property_list(&mut node)?;
            self.expect_symbol("}")?;
        }
        Ok(node)
    }

    fn relationship(&mut self) -> Result<AstNode> {
        let mut rel = AstNode::new(AstKind::Relationship);
        self.expect_symbol("[")?;
        if let Some(name) = self.accept_identifier() {
            rel.value = name;
        }
        if self.accept_symbol(":") {
            let type_name = self.expect_identifier()?;
            rel.push(AstNode::with_value(AstKind::Type, type_name));
        }
        if self.accept_symbol("{") {
            self.property_list(&mut rel)?;
            self.expect_symbol("}")?;
        }
        self.expect_symbol("]")?;
        self.expect_symbol("->")?;
        Ok(rel)
    }

    fn property_list(&mut self, parent: &mut AstNode) -> Result<()> {
        loop {
            parent.push(self.property()?);
            if !self.accept_symbol(",") {
                break;
            }
        }
        Ok(())
    }

    /// `key: literal` — two children: key identifier and literal.
    fn property(&mut self) -> Result<AstNode> {
        let key = self.expect_identifier()?;
        self.expect_symbol(":")?;
        let literal = self.literal()?;

        let mut property = AstNode::new(AstKind::Property);
        property.push(AstNode::with_value(AstKind::Identifier, key));
        property.push(literal);
        Ok(property)
    }

    /// `var.key = literal` — three children: variable, key, literal.
    fn property_assignment(&mut self) -> Result<AstNode> {
        let (var, key, literal) = self.dotted_equality()?;
        let mut property = AstNode::new(AstKind::Property);
        property.push(AstNode::with_value(AstKind::Identifier, var));
        property.push(AstNode::with_value(AstKind::Identifier, key));
        property.push(literal);
        Ok(property)
    }

    fn expression(&mut self) -> Result<AstNode> {
        let (var, key, literal) = self.dotted_equality()?;
        let mut expression = AstNode::new(AstKind::Expression);
        expression.push(AstNode::with_value(AstKind::Identifier, var));
        expression.push(AstNode::with_value(AstKind::Identifier, key));
        expression.push(literal);
        Ok(expression)
    }

    fn dotted_equality(&mut self) -> Result<(String, String, AstNode)> {
        let var = self.expect_identifier()?;
        self.expect_symbol(".")?;
        let key = self.expect_identifier()?;
        self.expect_symbol("=")?;
        let literal = self.literal()?;
        Ok((var, key, literal))
    }

    /// A literal carries one child holding its type tag.
    fn literal(&mut self) -> Result<AstNode> {
        let token = self.peek().clone();
        let tag = match token.kind {
            TokenKind::String => TAG_STRING,
            TokenKind::Number => TAG_INT,
            TokenKind::Identifier if token.value.eq_ignore_ascii_case("true") => TAG_BOOL,
            TokenKind::Identifier if token.value.eq_ignore_ascii_case("false") => TAG_BOOL,
            _ => return Err(self.unexpected()),
        };
        self.pos += 1;

        let mut literal = AstNode::with_value(AstKind::Literal, token.value);
        literal.push(AstNode::with_value(AstKind::Literal, tag));
        Ok(literal)
    }

    fn peek(&self) -> &Token {
        // The token stream always ends with Eof, so pos stays in range.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_keyword(&self) -> Option<String> {
        let token = self.peek();
        (token.kind == TokenKind::Keyword).then(|| token.value.to_ascii_uppercase())
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<()> {
        let token = self.peek();
        if token.kind == TokenKind::Keyword && token.value.eq_ignore_ascii_case(keyword) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn expect_symbol(&mut self, symbol: &str) -> Result<()> {
        if !self.accept_symbol(symbol) {
            return Err(self.unexpected());
        }
        Ok(())
    }

    fn accept_symbol(&mut self, symbol: &str) -> bool {
        let token = self.peek();
        if token.kind == TokenKind::Symbol && token.value == symbol {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_identifier(&mut self) -> Result<String> {
        self.accept_identifier().ok_or_else(|| self.unexpected())
    }

    fn accept_identifier(&mut self) -> Option<String> {
        let token = self.peek();
        if token.kind == TokenKind::Identifier {
            let value = token.value.clone();
            self.pos += 1;
            Some(value)
        } else {
            None
        }
    }

    fn unexpected(&self) -> GraphError {
        let token = self.peek();
        let shown = match token.kind {
            TokenKind::Eof => "EOF",
            _ => token.value.as_str(),
        };
        GraphError::Parse(format!("unexpected token {shown} at position {}", self.pos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::lexer::tokenize;

    fn parse(input: &str) -> Result<AstNode> {
        Parser::new(tokenize(input)?).parse()
    }

    #[test]
    fn empty_query_is_a_parse_error() {
        assert!(matches!(parse(""), Err(GraphError::Parse(_))));
    }

    #[test]
    fn create_single_node_shape() {
        let query = parse("CREATE (a:Person {name: \"Alice\", age: 30})").expect("parse");
        assert_eq!(query.kind, AstKind::Query);
        assert_eq!(query.children.len(), 1);

        let create = &query.children[0];
        assert_eq!(create.kind, AstKind::Create);
        let pattern = &create.children[0];
        assert_eq!(pattern.kind, AstKind::Pattern);
        assert_eq!(pattern.children.len(), 1);

        let node = &pattern.children[0];
        assert_eq!(node.kind, AstKind::Node);
        assert_eq!(node.value, "a");
        assert_eq!(
            node.child_of_kind(AstKind::Label).map(|l| l.value.as_str()),
            Some("Person")
        );

        let props: Vec<_> = node
            .children
            .iter()
            .filter(|c| c.kind == AstKind::Property)
            .collect();
        assert_eq!(props.len(), 2);
        assert_eq!(props[0].children.len(), 2);
        assert_eq!(props[0].children[0].value, "name");
        assert_eq!(props[0].children[1].value, "Alice");
        assert_eq!(props[0].children[1].children[0].value, TAG_STRING);
        assert_eq!(props[1].children[1].children[0].value, TAG_INT);
    }

    #[test]
    fn relationship_pattern_shape() {
        let query =
            parse("CREATE (a:Person)-[r:KNOWS {since: 2020}]->(b:Person)").expect("parse");
        let pattern = &query.children[0].children[0];
        assert_eq!(pattern.children.len(), 3);
        assert_eq!(pattern.children[0].kind, AstKind::Node);
        assert_eq!(pattern.children[1].kind, AstKind::Relationship);
        assert_eq!(pattern.children[2].kind, AstKind::Node);

        let rel = &pattern.children[1];
        assert_eq!(rel.value, "r");
        assert_eq!(
            rel.child_of_kind(AstKind::Type).map(|t| t.value.as_str()),
            Some("KNOWS")
        );
    }

    #[test]
    fn where_expression_has_three_children() {
        let query = parse("MATCH (n:Person) WHERE n.age = 30").expect("parse");
        let expr = &query.children[1].children[0];
        assert_eq!(expr.kind, AstKind::Expression);
        assert_eq!(expr.children.len(), 3);
        assert_eq!(expr.children[0].value, "n");
        assert_eq!(expr.children[1].value, "age");
        assert_eq!(expr.children[2].children[0].value, TAG_INT);
    }

    #[test]
    fn set_assignment_has_three_children() {
        let query = parse("MATCH (n:Person) SET n.age = 31, n.name = \"Bob\"").expect("parse");
        let set = &query.children[1];
        assert_eq!(set.kind, AstKind::Set);
        assert_eq!(set.children.len(), 2);
        assert_eq!(set.children[0].children.len(), 3);
    }

    #[test]
    fn boolean_literals_accept_any_case() {
        for input in ["SET n.a = true", "SET n.a = TRUE", "SET n.a = False"] {
            let query = parse(&format!("MATCH (n:X) {input}")).expect("parse");
            let literal = &query.children[1].children[0].children[2];
            assert_eq!(literal.children[0].value, TAG_BOOL);
        }
    }

    #[test]
    fn delete_and_return_collect_identifiers() {
        let query = parse("MATCH (n:X) DELETE n, m RETURN n").expect("parse");
        let delete = &query.children[1];
        assert_eq!(delete.children.len(), 2);
        assert_eq!(delete.children[0].value, "n");
        assert_eq!(delete.children[1].value, "m");
        let ret = &query.children[2];
        assert_eq!(ret.children[0].value, "n");
    }

    #[test]
    fn error_reports_token_and_position() {
        let err = parse("MATCH n:Person)").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("unexpected token"), "{message}");
        assert!(message.contains("position"), "{message}");
    }

    #[test]
    fn missing_arrow_after_relationship_fails() {
        assert!(parse("CREATE (a)-[r:KNOWS](b)").is_err());
    }

    #[test]
    fn non_literal_property_value_fails() {
        assert!(parse("CREATE (a {name: bob})").is_err());
    }

    #[test]
    fn trailing_tokens_after_query_fail() {
        assert!(parse("MATCH (n:X) RETURN n )").is_err());
    }

    #[test]
    fn anonymous_nodes_parse() {
        let query = parse("MATCH ()-[r:KNOWS]->() RETURN r").expect("parse");
        let pattern = &query.children[0].children[0];
        assert_eq!(pattern.children[0].value, "");
        assert_eq!(pattern.children[2].value, "");
    }
}
