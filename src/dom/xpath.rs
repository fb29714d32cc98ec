//! XPath subset for the in-memory document
//!
//! Location paths (absolute, relative, `//`, `|` unions) over element nodes with
//! the child, descendant(-or-self), parent, self, ancestor(-or-self) and
//! sibling axes. Predicates: `[n]`, `[last()]`, `[@a]`, `[@a='v']`,
//! `[text()='v']`, `[.='v']`, `contains(...)`, `starts-with(...)`, `not(...)`,
//! combined with `and` / `or`. Results are a snapshot in document order.

use crate::dom::document::TreeView;
use crate::dom::element::NodeId;
use crate::error::{DomesticatedError, Result};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq)]
pub struct XPath {
    paths: Vec<LocationPath>,
}

#[derive(Debug, Clone, PartialEq)]
struct LocationPath {
    absolute: bool,
    steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq)]
struct Step {
    axis: Axis,
    test: NodeTest,
    predicates: Vec<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Axis {
    Child,
    Descendant,
    DescendantOrSelf,
    Parent,
    SelfAxis,
    Ancestor,
    AncestorOrSelf,
    FollowingSibling,
    PrecedingSibling,
}

#[derive(Debug, Clone, PartialEq)]
enum NodeTest {
    /// `node()`
    Any,
    /// `*`
    AnyElement,
    Name(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Or(Vec<Expr>),
    And(Vec<Expr>),
    Not(Box<Expr>),
    Position(usize),
    Last,
    Exists(Operand),
    Equals { operand: Operand, value: String, negate: bool },
    Contains(Operand, String),
    StartsWith(Operand, String),
}

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Attribute(String),
    Text,
    StringValue,
}

/// A node in XPath's data model; the document node sits above the root element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum XNode {
    Document,
    Element(NodeId),
}

impl Axis {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "child" => Axis::Child,
            "descendant" => Axis::Descendant,
            "descendant-or-self" => Axis::DescendantOrSelf,
            "parent" => Axis::Parent,
            "self" => Axis::SelfAxis,
            "ancestor" => Axis::Ancestor,
            "ancestor-or-self" => Axis::AncestorOrSelf,
            "following-sibling" => Axis::FollowingSibling,
            "preceding-sibling" => Axis::PrecedingSibling,
            _ => return None,
        })
    }
}

impl Step {
    fn descendant_or_self() -> Self {
        Self {
            axis: Axis::DescendantOrSelf,
            test: NodeTest::Any,
            predicates: Vec::new(),
        }
    }
}

impl XPath {
    pub fn parse(expression: &str) -> Result<Self> {
        let mut parser = Parser::new(expression);
        let mut paths = vec![parser.parse_path()?];
        loop {
            parser.skip_whitespace();
            match parser.peek() {
                None => break,
                Some('|') => {
                    parser.pos += 1;
                    parser.skip_whitespace();
                    paths.push(parser.parse_path()?);
                }
                Some(c) => return Err(parser.error(format!("unexpected '{}'", c))),
            }
        }
        Ok(Self { paths })
    }

    /// Evaluate against `context` (the document node when `None`)
    pub(crate) fn evaluate<T: TreeView + ?Sized>(&self, tree: &T, context: Option<NodeId>) -> Vec<NodeId> {
        let order: HashMap<NodeId, usize> = tree
            .subtree(tree.root())
            .into_iter()
            .enumerate()
            .map(|(i, n)| (n, i))
            .collect();
        let start = context.map_or(XNode::Document, XNode::Element);

        let mut seen = HashSet::new();
        let mut result: Vec<NodeId> = self
            .paths
            .iter()
            .flat_map(|path| path.evaluate(tree, start, &order))
            .filter_map(|node| match node {
                XNode::Element(id) => Some(id),
                XNode::Document => None,
            })
            .filter(|id| seen.insert(*id))
            .collect();
        result.sort_by_key(|id| order.get(id).copied().unwrap_or(usize::MAX));
        result
    }
}

impl LocationPath {
    fn evaluate<T: TreeView + ?Sized>(&self, tree: &T, context: XNode, order: &HashMap<NodeId, usize>) -> Vec<XNode> {
        let mut current = vec![if self.absolute { XNode::Document } else { context }];

        for step in &self.steps {
            let mut next = Vec::new();
            let mut seen = HashSet::new();
            for node in &current {
                let mut candidates: Vec<XNode> = axis_nodes(tree, *node, step.axis)
                    .into_iter()
                    .filter(|candidate| step.test.matches(tree, *candidate))
                    .collect();
                for predicate in &step.predicates {
                    let size = candidates.len();
                    candidates = candidates
                        .into_iter()
                        .enumerate()
                        .filter(|(i, candidate)| predicate.evaluate(tree, *candidate, i + 1, size))
                        .map(|(_, candidate)| candidate)
                        .collect();
                }
                next.extend(candidates.into_iter().filter(|c| seen.insert(*c)));
            }
            next.sort_by_key(|node| document_position(*node, order));
            current = next;
        }
        current
    }
}

fn document_position(node: XNode, order: &HashMap<NodeId, usize>) -> usize {
    match node {
        XNode::Document => 0,
        XNode::Element(id) => order.get(&id).map_or(usize::MAX, |p| p + 1),
    }
}

fn children<T: TreeView + ?Sized>(tree: &T, node: XNode) -> Vec<XNode> {
    match node {
        XNode::Document => vec![XNode::Element(tree.root())],
        XNode::Element(id) => tree.children_of(id).iter().copied().map(XNode::Element).collect(),
    }
}

fn parent<T: TreeView + ?Sized>(tree: &T, node: XNode) -> Option<XNode> {
    match node {
        XNode::Document => None,
        XNode::Element(id) if id == tree.root() => Some(XNode::Document),
        XNode::Element(id) => tree.parent_of(id).map(XNode::Element),
    }
}

/// Nodes along `axis`, in axis order (reverse axes list the nearest node first)
fn axis_nodes<T: TreeView + ?Sized>(tree: &T, node: XNode, axis: Axis) -> Vec<XNode> {
    match axis {
        Axis::Child => children(tree, node),
        Axis::Descendant | Axis::DescendantOrSelf => {
            let mut out = Vec::new();
            if axis == Axis::DescendantOrSelf {
                out.push(node);
            }
            let mut stack: Vec<XNode> = children(tree, node).into_iter().rev().collect();
            while let Some(current) = stack.pop() {
                out.push(current);
                stack.extend(children(tree, current).into_iter().rev());
            }
            out
        }
        Axis::Parent => parent(tree, node).into_iter().collect(),
        Axis::SelfAxis => vec![node],
        Axis::Ancestor | Axis::AncestorOrSelf => {
            let mut out = Vec::new();
            if axis == Axis::AncestorOrSelf {
                out.push(node);
            }
            let mut current = parent(tree, node);
            while let Some(ancestor) = current {
                out.push(ancestor);
                current = parent(tree, ancestor);
            }
            out
        }
        Axis::FollowingSibling | Axis::PrecedingSibling => {
            let Some(parent) = parent(tree, node) else {
                return Vec::new();
            };
            let siblings = children(tree, parent);
            let Some(index) = siblings.iter().position(|s| *s == node) else {
                return Vec::new();
            };
            if axis == Axis::FollowingSibling {
                siblings[index + 1..].to_vec()
            } else {
                siblings[..index].iter().rev().copied().collect()
            }
        }
    }
}

impl NodeTest {
    fn matches<T: TreeView + ?Sized>(&self, tree: &T, node: XNode) -> bool {
        match (self, node) {
            (NodeTest::Any, _) => true,
            (NodeTest::AnyElement | NodeTest::Name(_), XNode::Document) => false,
            (NodeTest::AnyElement, XNode::Element(_)) => true,
            (NodeTest::Name(name), XNode::Element(id)) => tree.tag(id).eq_ignore_ascii_case(name),
        }
    }
}

impl Expr {
    fn evaluate<T: TreeView + ?Sized>(&self, tree: &T, node: XNode, position: usize, size: usize) -> bool {
        match self {
            Expr::Or(terms) => terms.iter().any(|t| t.evaluate(tree, node, position, size)),
            Expr::And(terms) => terms.iter().all(|t| t.evaluate(tree, node, position, size)),
            Expr::Not(inner) => !inner.evaluate(tree, node, position, size),
            Expr::Position(n) => position == *n,
            Expr::Last => position == size,
            Expr::Exists(operand) => match operand {
                Operand::Attribute(_) => operand.value(tree, node).is_some(),
                Operand::Text => operand.value(tree, node).is_some_and(|t| !t.is_empty()),
                Operand::StringValue => true,
            },
            Expr::Equals { operand, value, negate } => operand
                .value(tree, node)
                .is_some_and(|actual| (actual == *value) != *negate),
            Expr::Contains(operand, needle) => operand
                .value(tree, node)
                .is_some_and(|actual| actual.contains(needle.as_str())),
            Expr::StartsWith(operand, prefix) => operand
                .value(tree, node)
                .is_some_and(|actual| actual.starts_with(prefix.as_str())),
        }
    }
}

impl Operand {
    fn value<T: TreeView + ?Sized>(&self, tree: &T, node: XNode) -> Option<String> {
        let XNode::Element(id) = node else {
            return match self {
                Operand::StringValue => Some(tree.text_content(tree.root())),
                _ => None,
            };
        };
        match self {
            Operand::Attribute(name) => tree.attr(id, name).map(str::to_string),
            Operand::Text => tree.own_text(id).map(str::to_string),
            Operand::StringValue => Some(tree.text_content(id)),
        }
    }
}

struct Parser<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn error(&self, reason: impl Into<String>) -> DomesticatedError {
        DomesticatedError::invalid_selector(self.source, reason)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn starts_with(&self, token: &str) -> bool {
        token.chars().enumerate().all(|(i, c)| self.peek_at(i) == Some(c))
    }

    fn expect(&mut self, expected: char) -> Result<()> {
        self.skip_whitespace();
        match self.peek() {
            Some(c) if c == expected => {
                self.pos += 1;
                Ok(())
            }
            Some(c) => Err(self.error(format!("expected '{}' but found '{}'", expected, c))),
            None => Err(self.error(format!("expected '{}' but reached the end", expected))),
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn parse_path(&mut self) -> Result<LocationPath> {
        let mut steps = Vec::new();
        let absolute = self.peek() == Some('/');

        if self.starts_with("//") {
            self.pos += 2;
            steps.push(Step::descendant_or_self());
        } else if absolute {
            self.pos += 1;
            self.skip_whitespace();
            if matches!(self.peek(), None | Some('|')) {
                return Ok(LocationPath { absolute, steps });
            }
        }

        loop {
            steps.push(self.parse_step()?);
            self.skip_whitespace();
            if self.starts_with("//") {
                self.pos += 2;
                steps.push(Step::descendant_or_self());
            } else if self.peek() == Some('/') {
                self.pos += 1;
            } else {
                break;
            }
        }

        Ok(LocationPath { absolute, steps })
    }

    fn parse_step(&mut self) -> Result<Step> {
        self.skip_whitespace();
        if self.starts_with("..") {
            self.pos += 2;
            return Ok(Step {
                axis: Axis::Parent,
                test: NodeTest::Any,
                predicates: Vec::new(),
            });
        }
        if self.peek() == Some('.') {
            self.pos += 1;
            return Ok(Step {
                axis: Axis::SelfAxis,
                test: NodeTest::Any,
                predicates: Vec::new(),
            });
        }
        if self.peek() == Some('@') {
            return Err(self.error("attribute steps do not select elements"));
        }

        let mut axis = Axis::Child;
        let test = if self.peek() == Some('*') {
            self.pos += 1;
            NodeTest::AnyElement
        } else {
            let mut name = self.parse_name()?;
            if self.starts_with("::") {
                self.pos += 2;
                axis = Axis::from_name(&name)
                    .ok_or_else(|| self.error(format!("unsupported axis '{}'", name)))?;
                if self.peek() == Some('*') {
                    self.pos += 1;
                    name = String::new();
                } else {
                    name = self.parse_name()?;
                }
            }
            match name.as_str() {
                "" => NodeTest::AnyElement,
                "node" if self.starts_with("()") => {
                    self.pos += 2;
                    NodeTest::Any
                }
                "text" | "comment" if self.starts_with("()") => {
                    return Err(self.error(format!("{}() steps do not select elements", name)));
                }
                _ => NodeTest::Name(name.to_ascii_lowercase()),
            }
        };

        let mut predicates = Vec::new();
        loop {
            self.skip_whitespace();
            if self.peek() != Some('[') {
                break;
            }
            self.pos += 1;
            predicates.push(self.parse_or()?);
            self.expect(']')?;
        }

        Ok(Step { axis, test, predicates })
    }

    fn parse_name(&mut self) -> Result<String> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || matches!(c, '-' | '_') || (c == '.' && self.pos > start))
        {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(match self.peek() {
                Some(c) => self.error(format!("expected a name but found '{}'", c)),
                None => self.error("expected a name but reached the end"),
            });
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn parse_keyword(&mut self, keyword: &str) -> bool {
        self.skip_whitespace();
        let boundary = self
            .peek_at(keyword.chars().count())
            .is_none_or(|c| c.is_whitespace() || matches!(c, '(' | '[' | ']' | '@' | '\'' | '"'));
        if self.starts_with(keyword) && boundary {
            self.pos += keyword.chars().count();
            true
        } else {
            false
        }
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut terms = vec![self.parse_and()?];
        while self.parse_keyword("or") {
            terms.push(self.parse_and()?);
        }
        Ok(if terms.len() == 1 { terms.remove(0) } else { Expr::Or(terms) })
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut terms = vec![self.parse_term()?];
        while self.parse_keyword("and") {
            terms.push(self.parse_term()?);
        }
        Ok(if terms.len() == 1 { terms.remove(0) } else { Expr::And(terms) })
    }

    fn parse_term(&mut self) -> Result<Expr> {
        self.skip_whitespace();
        match self.peek() {
            Some('(') => {
                self.pos += 1;
                let inner = self.parse_or()?;
                self.expect(')')?;
                return Ok(inner);
            }
            Some(c) if c.is_ascii_digit() => {
                let start = self.pos;
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.pos += 1;
                }
                let digits: String = self.chars[start..self.pos].iter().collect();
                let position = digits
                    .parse::<usize>()
                    .map_err(|_| self.error("position out of range"))?;
                return Ok(Expr::Position(position));
            }
            _ => {}
        }

        for function in ["not", "contains", "starts-with", "last"] {
            let checkpoint = self.pos;
            if self.parse_keyword(function) && self.peek() == Some('(') {
                self.pos += 1;
                return match function {
                    "not" => {
                        let inner = self.parse_or()?;
                        self.expect(')')?;
                        Ok(Expr::Not(Box::new(inner)))
                    }
                    "last" => {
                        self.expect(')')?;
                        Ok(Expr::Last)
                    }
                    _ => {
                        let operand = self.parse_operand()?;
                        self.expect(',')?;
                        let literal = self.parse_literal()?;
                        self.expect(')')?;
                        Ok(if function == "contains" {
                            Expr::Contains(operand, literal)
                        } else {
                            Expr::StartsWith(operand, literal)
                        })
                    }
                };
            }
            self.pos = checkpoint;
        }

        let operand = self.parse_operand()?;
        self.skip_whitespace();
        let negate = if self.starts_with("!=") {
            self.pos += 2;
            true
        } else if self.peek() == Some('=') {
            self.pos += 1;
            false
        } else {
            return Ok(Expr::Exists(operand));
        };
        let value = self.parse_literal()?;
        Ok(Expr::Equals { operand, value, negate })
    }

    fn parse_operand(&mut self) -> Result<Operand> {
        self.skip_whitespace();
        if self.peek() == Some('@') {
            self.pos += 1;
            return Ok(Operand::Attribute(self.parse_name()?.to_ascii_lowercase()));
        }
        if self.starts_with("text()") {
            self.pos += "text()".len();
            return Ok(Operand::Text);
        }
        if self.peek() == Some('.') && self.peek_at(1) != Some('.') {
            self.pos += 1;
            return Ok(Operand::StringValue);
        }
        Err(match self.peek() {
            Some(c) => self.error(format!("unsupported expression at '{}'", c)),
            None => self.error("unterminated predicate"),
        })
    }

    fn parse_literal(&mut self) -> Result<String> {
        self.skip_whitespace();
        match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.pos += 1;
                let start = self.pos;
                while self.peek().is_some_and(|c| c != quote) {
                    self.pos += 1;
                }
                if self.peek().is_none() {
                    return Err(self.error("unterminated string literal"));
                }
                let literal = self.chars[start..self.pos].iter().collect();
                self.pos += 1;
                Ok(literal)
            }
            _ => Err(self.error("expected a string literal")),
        }
    }
}
