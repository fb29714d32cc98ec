//! CSS selector subset for the in-memory document
//!
//! Supported: type and universal selectors, `#id`, `.class`, attribute
//! selectors (`[a]`, `[a=v]`, `[a~=v]`, `[a^=v]`, `[a$=v]`, `[a*=v]`),
//! `:first-child`, `:last-child`, `:nth-child(n)`, `:not(...)`, the descendant
//! and `>` combinators and `,` lists.

use crate::dom::document::TreeView;
use crate::dom::element::NodeId;
use crate::error::{DomesticatedError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct SelectorList {
    selectors: Vec<ComplexSelector>,
}

/// Compounds joined by combinators; each part carries the combinator that links it to the previous part
#[derive(Debug, Clone, PartialEq)]
struct ComplexSelector {
    parts: Vec<(Combinator, CompoundSelector)>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct CompoundSelector {
    tag: Option<String>,
    conditions: Vec<Condition>,
}

#[derive(Debug, Clone, PartialEq)]
enum Condition {
    Id(String),
    Class(String),
    Attribute { name: String, matcher: Option<(AttrOp, String)> },
    FirstChild,
    LastChild,
    NthChild(usize),
    Not(Vec<CompoundSelector>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum AttrOp {
    Equals,
    Includes,
    Prefix,
    Suffix,
    Contains,
}

impl SelectorList {
    pub fn parse(selector: &str) -> Result<Self> {
        let mut parser = Parser::new(selector);
        let list = parser.parse_list()?;
        Ok(list)
    }

    pub(crate) fn matches<T: TreeView + ?Sized>(&self, tree: &T, node: NodeId) -> bool {
        self.selectors.iter().any(|s| s.matches(tree, node))
    }
}

impl ComplexSelector {
    fn matches<T: TreeView + ?Sized>(&self, tree: &T, node: NodeId) -> bool {
        self.matches_from(tree, node, self.parts.len() - 1)
    }

    fn matches_from<T: TreeView + ?Sized>(&self, tree: &T, node: NodeId, index: usize) -> bool {
        let (combinator, compound) = &self.parts[index];
        if !compound.matches(tree, node) {
            return false;
        }
        if index == 0 {
            return true;
        }
        match combinator {
            Combinator::Child => tree
                .parent_of(node)
                .is_some_and(|parent| self.matches_from(tree, parent, index - 1)),
            Combinator::Descendant => {
                let mut ancestor = tree.parent_of(node);
                while let Some(candidate) = ancestor {
                    if self.matches_from(tree, candidate, index - 1) {
                        return true;
                    }
                    ancestor = tree.parent_of(candidate);
                }
                false
            }
        }
    }
}

impl CompoundSelector {
    fn matches<T: TreeView + ?Sized>(&self, tree: &T, node: NodeId) -> bool {
        if let Some(tag) = &self.tag {
            if !tree.tag(node).eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        self.conditions.iter().all(|c| c.matches(tree, node))
    }
}

impl Condition {
    fn matches<T: TreeView + ?Sized>(&self, tree: &T, node: NodeId) -> bool {
        match self {
            Condition::Id(id) => tree.attr(node, "id") == Some(id.as_str()),
            Condition::Class(class) => tree
                .attr(node, "class")
                .is_some_and(|classes| classes.split_whitespace().any(|c| c == class)),
            Condition::Attribute { name, matcher } => match (tree.attr(node, name), matcher) {
                (None, _) => false,
                (Some(_), None) => true,
                (Some(value), Some((op, expected))) => match op {
                    AttrOp::Equals => value == expected,
                    AttrOp::Includes => value.split_whitespace().any(|v| v == expected),
                    AttrOp::Prefix => !expected.is_empty() && value.starts_with(expected.as_str()),
                    AttrOp::Suffix => !expected.is_empty() && value.ends_with(expected.as_str()),
                    AttrOp::Contains => !expected.is_empty() && value.contains(expected.as_str()),
                },
            },
            Condition::FirstChild => sibling_position(tree, node) == 1,
            Condition::LastChild => {
                let count = sibling_count(tree, node);
                sibling_position(tree, node) == count
            }
            Condition::NthChild(n) => sibling_position(tree, node) == *n,
            Condition::Not(compounds) => !compounds.iter().any(|c| c.matches(tree, node)),
        }
    }
}

/// 1-based position among the parent's children
fn sibling_position<T: TreeView + ?Sized>(tree: &T, node: NodeId) -> usize {
    match tree.parent_of(node) {
        Some(parent) => tree
            .children_of(parent)
            .iter()
            .position(|c| *c == node)
            .map_or(0, |p| p + 1),
        None => 1,
    }
}

fn sibling_count<T: TreeView + ?Sized>(tree: &T, node: NodeId) -> usize {
    tree.parent_of(node)
        .map_or(1, |parent| tree.children_of(parent).len())
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

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn expect(&mut self, expected: char) -> Result<()> {
        match self.bump() {
            Some(c) if c == expected => Ok(()),
            Some(c) => Err(self.error(format!("expected '{}' but found '{}'", expected, c))),
            None => Err(self.error(format!("expected '{}' but reached the end", expected))),
        }
    }

    /// Skip whitespace, reporting whether any was skipped
    fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn parse_list(&mut self) -> Result<SelectorList> {
        let mut selectors = Vec::new();
        loop {
            self.skip_whitespace();
            selectors.push(self.parse_complex()?);
            self.skip_whitespace();
            match self.bump() {
                None => break,
                Some(',') => continue,
                Some(c) => return Err(self.error(format!("unexpected '{}'", c))),
            }
        }
        Ok(SelectorList { selectors })
    }

    fn parse_complex(&mut self) -> Result<ComplexSelector> {
        let mut parts = vec![(Combinator::Descendant, self.parse_compound()?)];
        loop {
            let had_whitespace = self.skip_whitespace();
            match self.peek() {
                None | Some(',') => break,
                Some('>') => {
                    self.pos += 1;
                    self.skip_whitespace();
                    parts.push((Combinator::Child, self.parse_compound()?));
                }
                Some('+') | Some('~') => return Err(self.error("sibling combinators are not supported")),
                Some(_) if had_whitespace => parts.push((Combinator::Descendant, self.parse_compound()?)),
                Some(c) => return Err(self.error(format!("unexpected '{}'", c))),
            }
        }
        Ok(ComplexSelector { parts })
    }

    fn parse_compound(&mut self) -> Result<CompoundSelector> {
        let mut compound = CompoundSelector::default();
        let mut universal = false;

        match self.peek() {
            Some('*') => {
                self.pos += 1;
                universal = true;
            }
            Some(c) if is_ident_char(c) => compound.tag = Some(self.parse_ident()?.to_ascii_lowercase()),
            _ => {}
        }

        loop {
            match self.peek() {
                Some('#') => {
                    self.pos += 1;
                    compound.conditions.push(Condition::Id(self.parse_ident()?));
                }
                Some('.') => {
                    self.pos += 1;
                    compound.conditions.push(Condition::Class(self.parse_ident()?));
                }
                Some('[') => {
                    self.pos += 1;
                    compound.conditions.push(self.parse_attribute()?);
                }
                Some(':') => {
                    self.pos += 1;
                    compound.conditions.push(self.parse_pseudo()?);
                }
                _ => break,
            }
        }

        if compound.tag.is_none() && compound.conditions.is_empty() && !universal {
            return Err(match self.peek() {
                Some(c) => self.error(format!("expected a selector but found '{}'", c)),
                None => self.error("expected a selector but reached the end"),
            });
        }
        Ok(compound)
    }

    fn parse_ident(&mut self) -> Result<String> {
        let start = self.pos;
        while self.peek().is_some_and(is_ident_char) {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.error("expected an identifier"));
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn parse_attribute(&mut self) -> Result<Condition> {
        self.skip_whitespace();
        let name = self.parse_ident()?.to_ascii_lowercase();
        self.skip_whitespace();

        let op = match self.bump() {
            Some(']') => return Ok(Condition::Attribute { name, matcher: None }),
            Some('=') => AttrOp::Equals,
            Some(prefix @ ('~' | '^' | '$' | '*')) => {
                self.expect('=')?;
                match prefix {
                    '~' => AttrOp::Includes,
                    '^' => AttrOp::Prefix,
                    '$' => AttrOp::Suffix,
                    _ => AttrOp::Contains,
                }
            }
            Some(c) => return Err(self.error(format!("unexpected '{}' in attribute selector", c))),
            None => return Err(self.error("unterminated attribute selector")),
        };

        self.skip_whitespace();
        let value = match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.pos += 1;
                let start = self.pos;
                while self.peek().is_some_and(|c| c != quote) {
                    self.pos += 1;
                }
                let value: String = self.chars[start..self.pos].iter().collect();
                self.expect(quote)?;
                value
            }
            _ => self.parse_ident()?,
        };
        self.skip_whitespace();
        self.expect(']')?;

        Ok(Condition::Attribute {
            name,
            matcher: Some((op, value)),
        })
    }

    fn parse_pseudo(&mut self) -> Result<Condition> {
        if self.peek() == Some(':') {
            return Err(self.error("pseudo-elements are not supported"));
        }
        let name = self.parse_ident()?.to_ascii_lowercase();
        match name.as_str() {
            "first-child" => Ok(Condition::FirstChild),
            "last-child" => Ok(Condition::LastChild),
            "nth-child" => {
                self.expect('(')?;
                self.skip_whitespace();
                let start = self.pos;
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.pos += 1;
                }
                let digits: String = self.chars[start..self.pos].iter().collect();
                let n = digits
                    .parse::<usize>()
                    .map_err(|_| self.error("nth-child expects a positive integer"))?;
                self.skip_whitespace();
                self.expect(')')?;
                Ok(Condition::NthChild(n))
            }
            "not" => {
                self.expect('(')?;
                let mut compounds = Vec::new();
                loop {
                    self.skip_whitespace();
                    compounds.push(self.parse_compound()?);
                    self.skip_whitespace();
                    match self.bump() {
                        Some(',') => continue,
                        Some(')') => break,
                        Some(c) => return Err(self.error(format!("unexpected '{}' in :not()", c))),
                        None => return Err(self.error("unterminated :not()")),
                    }
                }
                Ok(Condition::Not(compounds))
            }
            other => Err(self.error(format!("unsupported pseudo-class ':{}'", other))),
        }
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_' || !c.is_ascii()
}
