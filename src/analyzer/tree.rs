//! Block-structured view of Python source.
//!
//! Statements are logical lines; bracketed regions become nested groups and
//! indented suites hang under the header line that opened them. This is just
//! enough structure to find imports, calls, string literals and class
//! headers, and to reject source Python itself would refuse to compile.

use crate::analyzer::lexer::{SyntaxError, Token, TokenKind, tokenize};

const KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "case", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global", "if",
    "import", "in", "is", "lambda", "match", "nonlocal", "not", "or", "pass", "raise", "return",
    "try", "type", "while", "with", "yield",
];

const COMPOUND: &[&str] = &[
    "if", "elif", "else", "while", "for", "try", "except", "finally", "with", "def", "class",
    "async", "match", "case",
];

/// Headers that must carry a colon on the same logical line.
const NEEDS_COLON: &[&str] = &[
    "if", "elif", "else", "while", "for", "try", "except", "finally", "with", "def", "class",
];

#[must_use]
pub fn is_keyword(name: &str) -> bool {
    KEYWORDS.contains(&name)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Leaf(Token),
    Group(Group),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub open: char,
    pub line: usize,
    pub children: Vec<Node>,
}

impl Node {
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Leaf(token) => token.name(),
            Self::Group(_) => None,
        }
    }

    #[must_use]
    pub fn is_op(&self, op: &str) -> bool {
        matches!(self, Self::Leaf(token) if token.is_op(op))
    }

    #[must_use]
    pub fn group(&self, open: char) -> Option<&Group> {
        match self {
            Self::Group(group) if group.open == open => Some(group),
            _ => None,
        }
    }

    #[must_use]
    pub const fn line(&self) -> usize {
        match self {
            Self::Leaf(token) => token.line,
            Self::Group(group) => group.line,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub line: usize,
    pub nodes: Vec<Node>,
    /// Indented suite, for header lines ending in `:`.
    pub body: Vec<Statement>,
}

impl Statement {
    #[must_use]
    pub fn keyword(&self) -> Option<&str> {
        self.nodes.first().and_then(Node::name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Module {
    pub body: Vec<Statement>,
}

impl Module {
    /// Depth-first walk over every statement, suites included.
    pub fn walk(&self) -> impl Iterator<Item = &Statement> {
        let mut stack: Vec<&Statement> = self.body.iter().rev().collect();
        std::iter::from_fn(move || {
            let next = stack.pop()?;
            stack.extend(next.body.iter().rev());
            Some(next)
        })
    }
}

/// Parse `source` into a [`Module`].
pub fn parse(source: &str) -> Result<Module, SyntaxError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser { tokens, pos: 0 };
    let body = parser.block(true)?;
    Ok(Module { body })
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn block(&mut self, top_level: bool) -> Result<Vec<Statement>, SyntaxError> {
        let mut statements = Vec::new();
        while let Some(token) = self.tokens.get(self.pos) {
            match token.kind {
                TokenKind::Dedent => {
                    self.pos += 1;
                    if top_level {
                        continue;
                    }
                    break;
                }
                TokenKind::Indent => {
                    return Err(SyntaxError::new("unexpected indent", token.line));
                }
                TokenKind::Newline => self.pos += 1,
                _ => statements.push(self.statement()?),
            }
        }
        Ok(statements)
    }

    fn statement(&mut self) -> Result<Statement, SyntaxError> {
        let line = self.tokens[self.pos].line;
        let mut tokens = Vec::new();
        while let Some(token) = self.tokens.get(self.pos) {
            self.pos += 1;
            if token.kind == TokenKind::Newline {
                break;
            }
            tokens.push(token.clone());
        }

        let mut iter = tokens.into_iter();
        let nodes = group(&mut iter, None)?;
        check_line(&nodes, line)?;

        let mut body = Vec::new();
        if nodes.last().is_some_and(|n| n.is_op(":")) {
            let next = self.tokens.get(self.pos);
            if !next.is_some_and(|t| t.kind == TokenKind::Indent) {
                let at = next.map_or(line + 1, |t| t.line);
                return Err(SyntaxError::new("expected an indented block", at));
            }
            self.pos += 1;
            body = self.block(false)?;
        }

        Ok(Statement { line, nodes, body })
    }
}

fn group(
    tokens: &mut impl Iterator<Item = Token>,
    open: Option<char>,
) -> Result<Vec<Node>, SyntaxError> {
    let mut nodes = Vec::new();
    while let Some(token) = tokens.next() {
        match token.kind {
            TokenKind::Open(c) => {
                let children = group(tokens, Some(c))?;
                nodes.push(Node::Group(Group {
                    open: c,
                    line: token.line,
                    children,
                }));
            }
            TokenKind::Close(_) if open.is_some() => return Ok(nodes),
            TokenKind::Close(c) => {
                return Err(SyntaxError::new(format!("unmatched '{c}'"), token.line));
            }
            _ => nodes.push(Node::Leaf(token)),
        }
    }
    match open {
        Some(c) => Err(SyntaxError::new(format!("'{c}' was never closed"), 0)),
        None => Ok(nodes),
    }
}

/// Value-like node: a non-keyword name, a literal or a bracketed group.
pub(crate) fn is_atom(node: &Node) -> bool {
    match node {
        Node::Group(_) => true,
        Node::Leaf(token) => match &token.kind {
            TokenKind::Name(name) => !is_keyword(name),
            TokenKind::Number(_) | TokenKind::Str(_) => true,
            _ => false,
        },
    }
}

fn is_str(node: &Node) -> bool {
    matches!(node, Node::Leaf(Token { kind: TokenKind::Str(_), .. }))
}

fn check_adjacency(nodes: &[Node]) -> Result<(), SyntaxError> {
    for pair in nodes.windows(2) {
        let (left, right) = (&pair[0], &pair[1]);
        // A group directly after a value is a call or subscript.
        let trailer = matches!(right, Node::Group(g) if g.open != '{');
        if is_atom(left) && is_atom(right) && !trailer && !(is_str(left) && is_str(right)) {
            return Err(SyntaxError::new("invalid syntax", right.line()));
        }
    }
    for node in nodes {
        if let Node::Group(group) = node {
            check_adjacency(&group.children)?;
        }
    }
    Ok(())
}

fn leaf_op(node: &Node) -> Option<&str> {
    match node {
        Node::Leaf(Token {
            kind: TokenKind::Op(op),
            ..
        }) => Some(op),
        _ => None,
    }
}

fn check_line(nodes: &[Node], line: usize) -> Result<(), SyntaxError> {
    let Some(first) = nodes.first() else {
        return Ok(());
    };

    if leaf_op(first).is_some_and(|op| !matches!(op, "@" | "-" | "+" | "~" | "*" | "...")) {
        return Err(SyntaxError::new("invalid syntax", line));
    }

    if let Some(last) = nodes.last() {
        if leaf_op(last).is_some_and(|op| !matches!(op, ":" | "," | ";" | "...")) {
            return Err(SyntaxError::new("invalid syntax", last.line()));
        }
    }

    let keyword = first.name().unwrap_or_default();
    let ends_with_colon = nodes.last().is_some_and(|n| n.is_op(":"));
    if ends_with_colon && !first.is_op("@") && !COMPOUND.contains(&keyword) {
        return Err(SyntaxError::new("invalid syntax", line));
    }
    if NEEDS_COLON.contains(&keyword) && !nodes.iter().any(|n| n.is_op(":")) {
        return Err(SyntaxError::new("expected ':'", line));
    }

    check_adjacency(nodes)
}

/// Name of the first class whose bases include `base`, searching nested suites too.
#[must_use]
pub fn find_subclass(module: &Module, base: &str) -> Option<String> {
    module.walk().find_map(|stmt| {
        if stmt.keyword() != Some("class") {
            return None;
        }
        let name = stmt.nodes.get(1)?.name()?;
        let bases = stmt.nodes.get(2)?.group('(')?;
        contains_name(&bases.children, base).then(|| name.to_string())
    })
}

fn contains_name(nodes: &[Node], wanted: &str) -> bool {
    nodes.iter().any(|node| match node {
        Node::Leaf(token) => token.name() == Some(wanted),
        Node::Group(group) => contains_name(&group.children, wanted),
    })
}
