//! Forbidden-construct scan over generated skill source.

use std::fmt;

use serde::Serialize;

use crate::analyzer::lexer::{StrLit, TokenKind};
use crate::analyzer::policy::SafetyPolicy;
use crate::analyzer::tree::{self, Node, Statement, is_atom, is_keyword};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SafetyIssue {
    ForbiddenImport { module: String, line: usize },
    ForbiddenImportFrom { module: String, line: usize },
    ForbiddenCall { name: String, line: usize },
    SuspiciousString { line: usize },
    SyntaxError { message: String },
    Unreadable { message: String },
}

impl fmt::Display for SafetyIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ForbiddenImport { module, line } => {
                write!(f, "Forbidden import: '{module}' (line {line})")
            }
            Self::ForbiddenImportFrom { module, line } => {
                write!(f, "Forbidden import from: '{module}' (line {line})")
            }
            Self::ForbiddenCall { name, line } => {
                write!(f, "Forbidden builtin call: '{name}' (line {line})")
            }
            Self::SuspiciousString { line } => write!(
                f,
                "Suspicious string containing code execution pattern (line {line})"
            ),
            Self::SyntaxError { message } => {
                write!(f, "Syntax error in generated code: {message}")
            }
            Self::Unreadable { message } => {
                write!(f, "Cannot read implementation file: {message}")
            }
        }
    }
}

/// Scan `source` without running it. An empty result means nothing was found.
#[must_use]
pub fn scan(source: &str, policy: &SafetyPolicy) -> Vec<SafetyIssue> {
    let module = match tree::parse(source) {
        Ok(module) => module,
        Err(err) => {
            return vec![SafetyIssue::SyntaxError {
                message: err.to_string(),
            }];
        }
    };

    let mut issues = Vec::new();
    for statement in module.walk() {
        scan_statement(statement, policy, &mut issues);
    }
    issues
}

fn scan_statement(statement: &Statement, policy: &SafetyPolicy, issues: &mut Vec<SafetyIssue>) {
    scan_imports(&statement.nodes, policy, issues);
    scan_expressions(&statement.nodes, policy, issues);
}

/// Dotted name starting at `nodes[start]`, with the index just past it.
fn dotted_name(nodes: &[Node], start: usize) -> (String, usize) {
    let mut name = String::new();
    let mut i = start;
    while let Some(part) = nodes.get(i).and_then(Node::name).filter(|n| !is_keyword(n)) {
        name.push_str(part);
        i += 1;
        let continues = nodes.get(i + 1).and_then(Node::name).is_some();
        if continues && nodes.get(i).is_some_and(|n| n.is_op(".")) {
            name.push('.');
            i += 1;
        } else {
            break;
        }
    }
    (name, i)
}

fn scan_imports(nodes: &[Node], policy: &SafetyPolicy, issues: &mut Vec<SafetyIssue>) {
    let mut i = 0;
    // Only positions that begin a simple statement can start an import.
    let mut statement_start = true;
    while i < nodes.len() {
        let node = &nodes[i];
        if node.is_op(";") || node.is_op(":") {
            statement_start = true;
            i += 1;
            continue;
        }
        if !statement_start {
            i += 1;
            continue;
        }
        statement_start = false;

        match node.name() {
            Some("import") => {
                let line = node.line();
                i += 1;
                loop {
                    let (module, next) = dotted_name(nodes, i);
                    if module.is_empty() {
                        break;
                    }
                    i = next;
                    if policy.forbids_module(&module) {
                        issues.push(SafetyIssue::ForbiddenImport { module, line });
                    }
                    if nodes.get(i).and_then(Node::name) == Some("as") {
                        i += 2;
                    }
                    if nodes.get(i).is_some_and(|n| n.is_op(",")) {
                        i += 1;
                    } else {
                        break;
                    }
                }
            }
            Some("from") => {
                let line = node.line();
                i += 1;
                while nodes.get(i).is_some_and(|n| n.is_op(".") || n.is_op("...")) {
                    i += 1;
                }
                let (module, next) = dotted_name(nodes, i);
                i = next;
                let is_import = nodes.get(i).and_then(Node::name) == Some("import");
                if is_import && !module.is_empty() && policy.forbids_module(&module) {
                    issues.push(SafetyIssue::ForbiddenImportFrom { module, line });
                }
            }
            _ => i += 1,
        }
    }
}

fn scan_expressions(nodes: &[Node], policy: &SafetyPolicy, issues: &mut Vec<SafetyIssue>) {
    for (i, node) in nodes.iter().enumerate() {
        let called = nodes.get(i + 1).and_then(|n| n.group('(')).is_some();
        match node {
            Node::Leaf(token) => {
                if let TokenKind::Str(lit) = &token.kind {
                    scan_string(lit, token.line, policy, issues);
                }
                let Some(name) = token.name() else {
                    continue;
                };
                let defined = i
                    .checked_sub(1)
                    .and_then(|p| nodes[p].name())
                    .is_some_and(|prev| prev == "def" || prev == "class");
                if called && !defined && !is_keyword(name) && policy.forbids_call(name) {
                    issues.push(SafetyIssue::ForbiddenCall {
                        name: name.to_string(),
                        line: token.line,
                    });
                }
            }
            Node::Group(group) => {
                // `(open)(path)` calls `open`; `f(open)(path)` calls whatever f returns.
                let trailer = i.checked_sub(1).is_some_and(|p| is_atom(&nodes[p]));
                if called && !trailer {
                    if let Some((name, line)) = parenthesized_name(node) {
                        if policy.forbids_call(name) {
                            issues.push(SafetyIssue::ForbiddenCall {
                                name: name.to_string(),
                                line,
                            });
                        }
                    }
                }
                scan_expressions(&group.children, policy, issues);
            }
        }
    }
}

/// The bare name inside `(name)`, `((name))` and so on.
fn parenthesized_name(node: &Node) -> Option<(&str, usize)> {
    let group = node.group('(')?;
    match group.children.as_slice() {
        [Node::Leaf(token)] => token
            .name()
            .filter(|name| !is_keyword(name))
            .map(|name| (name, token.line)),
        [inner @ Node::Group(_)] => parenthesized_name(inner),
        _ => None,
    }
}

fn scan_string(lit: &StrLit, line: usize, policy: &SafetyPolicy, issues: &mut Vec<SafetyIssue>) {
    if lit.is_bytes() {
        return;
    }
    if !lit.is_format() {
        if policy.suspicious(&lit.value()) {
            issues.push(SafetyIssue::SuspiciousString { line });
        }
        return;
    }

    let parts = FormatParts::split(&lit.raw);
    let text = StrLit {
        prefix: lit.prefix.replace('f', ""),
        raw: parts.literal,
    };
    if policy.suspicious(&text.value()) {
        issues.push(SafetyIssue::SuspiciousString { line });
    }
    for (newlines, expr) in parts.fields {
        let Ok(module) = tree::parse(&format!("{expr}\n")) else {
            continue;
        };
        let mut found = Vec::new();
        for statement in module.walk() {
            scan_expressions(&statement.nodes, policy, &mut found);
        }
        issues.extend(found.into_iter().map(|issue| issue.at_line(line + newlines)));
    }
}

impl SafetyIssue {
    fn at_line(self, line: usize) -> Self {
        match self {
            Self::ForbiddenImport { module, .. } => Self::ForbiddenImport { module, line },
            Self::ForbiddenImportFrom { module, .. } => Self::ForbiddenImportFrom { module, line },
            Self::ForbiddenCall { name, .. } => Self::ForbiddenCall { name, line },
            Self::SuspiciousString { .. } => Self::SuspiciousString { line },
            other => other,
        }
    }
}

/// An f-string body split into its literal text and its `{...}` expressions.
/// Each expression carries the number of newlines that precede it.
#[derive(Debug, Default, PartialEq, Eq)]
struct FormatParts {
    literal: String,
    fields: Vec<(usize, String)>,
}

impl FormatParts {
    fn split(raw: &str) -> Self {
        let chars: Vec<char> = raw.chars().collect();
        let mut parts = Self::default();
        let mut i = 0;
        while i < chars.len() {
            match (chars[i], chars.get(i + 1)) {
                ('{', Some('{')) | ('}', Some('}')) => {
                    parts.literal.push(chars[i]);
                    i += 2;
                }
                ('{', _) => i = parts.field(&chars, i + 1),
                (c, _) => {
                    parts.literal.push(c);
                    i += 1;
                }
            }
        }
        parts
    }

    /// Consume the field starting at `start` and return the index past its
    /// closing brace. Fields nested in the format spec are collected too.
    fn field(&mut self, chars: &[char], start: usize) -> usize {
        let mut depth = 0usize;
        let mut quote: Option<char> = None;
        let mut in_expression = true;
        let mut j = start;
        while j < chars.len() {
            let c = chars[j];
            if !in_expression {
                match c {
                    '{' => j = self.field(chars, j + 1),
                    '}' => return j + 1,
                    _ => j += 1,
                }
                continue;
            }
            if let Some(q) = quote {
                if c == q {
                    quote = None;
                }
                j += 1;
                continue;
            }
            let ends = match c {
                '!' => depth == 0 && chars.get(j + 1) != Some(&'='),
                ':' | '}' => depth == 0,
                _ => false,
            };
            if ends {
                self.push_expression(chars, start, j);
                in_expression = false;
                if c == '}' {
                    return j + 1;
                }
                j += 1;
                continue;
            }
            match c {
                '\'' | '"' => quote = Some(c),
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' => depth = depth.saturating_sub(1),
                _ => {}
            }
            j += 1;
        }
        if in_expression {
            self.push_expression(chars, start, chars.len());
        }
        chars.len()
    }

    fn push_expression(&mut self, chars: &[char], start: usize, end: usize) {
        let newlines = chars[..start].iter().filter(|c| **c == '\n').count();
        let text: String = chars[start..end]
            .iter()
            .map(|c| if *c == '\n' { ' ' } else { *c })
            .collect();
        let text = text.trim();
        // `{value=}` prints the expression text before the value.
        let text = text
            .strip_suffix('=')
            .filter(|t| !t.ends_with(['=', '!', '<', '>']))
            .unwrap_or(text)
            .trim_end();
        if !text.is_empty() {
            self.fields.push((newlines, text.to_string()));
        }
    }
}
