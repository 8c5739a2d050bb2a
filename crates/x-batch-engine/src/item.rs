//! Result item model shared by engines and processors
//!
//! An engine reports the outcome of an evaluation as a [`Sequence`] of
//! [`Item`]s. Serializing those items into output text is the processor's
//! job, so engines never own an output buffer.

use crate::error::{Error, Result};
use std::fmt;

/// Type of XML node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Document node
    Document,
    /// Element node
    Element,
    /// Attribute node
    Attribute,
    /// Text node
    Text,
    /// Comment node
    Comment,
    /// Processing instruction node
    ProcessingInstruction,
    /// Namespace node
    Namespace,
}

/// A node selected or constructed by an expression.
///
/// `markup` is the node serialized as XML without a declaration (for
/// example `<name xmlns="ns1">john</name>`); `string_value` is its XPath
/// string value.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub markup: String,
    pub string_value: String,
}

impl Node {
    pub fn new(kind: NodeKind, markup: impl Into<String>, string_value: impl Into<String>) -> Self {
        Self {
            kind,
            markup: markup.into(),
            string_value: string_value.into(),
        }
    }

    /// Element node helper
    pub fn element(markup: impl Into<String>, string_value: impl Into<String>) -> Self {
        Self::new(NodeKind::Element, markup, string_value)
    }

    /// Text node helper; markup and string value coincide
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        Self::new(NodeKind::Text, value.clone(), value)
    }
}

/// An atomic value
#[derive(Debug, Clone, PartialEq)]
pub enum Atomic {
    String(String),
    Untyped(String),
    Boolean(bool),
    Integer(i64),
    /// Decimal kept in its lexical form
    Decimal(String),
    Double(f64),
    /// Any other typed value, e.g. `xs:date`
    Other { type_name: String, lexical: String },
}

impl Atomic {
    /// Canonical lexical representation
    pub fn lexical(&self) -> String {
        match self {
            Atomic::String(s) | Atomic::Untyped(s) | Atomic::Decimal(s) => s.clone(),
            Atomic::Boolean(b) => b.to_string(),
            Atomic::Integer(i) => i.to_string(),
            Atomic::Double(d) => double_lexical(*d),
            Atomic::Other { lexical, .. } => lexical.clone(),
        }
    }
}

fn double_lexical(d: f64) -> String {
    if d.is_nan() {
        return "NaN".to_string();
    }
    if d.is_infinite() {
        return if d > 0.0 { "INF" } else { "-INF" }.to_string();
    }
    if d == 0.0 {
        return if d.is_sign_negative() { "-0" } else { "0" }.to_string();
    }
    let magnitude = d.abs();
    if (1e-6..1e6).contains(&magnitude) {
        return d.to_string();
    }
    let formatted = format!("{:E}", d);
    match formatted.split_once('E') {
        Some((mantissa, exponent)) if !mantissa.contains('.') => {
            format!("{}.0E{}", mantissa, exponent)
        }
        _ => formatted,
    }
}

/// A single item of a result sequence
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Node(Node),
    Atomic(Atomic),
}

impl Item {
    /// XPath string value of the item
    pub fn string_value(&self) -> String {
        match self {
            Item::Node(node) => node.string_value.clone(),
            Item::Atomic(atomic) => atomic.lexical(),
        }
    }
}

impl From<Node> for Item {
    fn from(node: Node) -> Self {
        Item::Node(node)
    }
}

impl From<Atomic> for Item {
    fn from(atomic: Atomic) -> Self {
        Item::Atomic(atomic)
    }
}

/// An ordered result sequence
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sequence {
    items: Vec<Item>,
}

impl Sequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Singleton `xs:boolean` sequence
    pub fn from_bool(value: bool) -> Self {
        Self::from(vec![Item::Atomic(Atomic::Boolean(value))])
    }

    pub fn push(&mut self, item: impl Into<Item>) {
        self.items.push(item.into());
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Item> {
        self.items.iter()
    }

    /// Effective boolean value as defined by XPath 2.0 and later.
    ///
    /// Empty is false; a sequence whose first item is a node is true; a
    /// singleton boolean, string, untypedAtomic or numeric converts by
    /// value. Anything else is a type error (FORG0006).
    pub fn effective_boolean_value(&self) -> Result<bool> {
        let first = match self.items.first() {
            None => return Ok(false),
            Some(Item::Node(_)) => return Ok(true),
            Some(Item::Atomic(atomic)) => atomic,
        };
        if self.items.len() > 1 {
            return Err(Error::TypeConversion(
                "FORG0006: effective boolean value not defined for a sequence of two or more atomic values"
                    .to_string(),
            ));
        }
        match first {
            Atomic::Boolean(b) => Ok(*b),
            Atomic::String(s) | Atomic::Untyped(s) => Ok(!s.is_empty()),
            Atomic::Integer(i) => Ok(*i != 0),
            Atomic::Double(d) => Ok(*d != 0.0 && !d.is_nan()),
            Atomic::Decimal(s) => Ok(s
                .trim()
                .parse::<f64>()
                .map(|d| d != 0.0)
                .unwrap_or(false)),
            Atomic::Other { type_name, .. } => Err(Error::TypeConversion(format!(
                "FORG0006: effective boolean value not defined for {}",
                type_name
            ))),
        }
    }
}

impl From<Vec<Item>> for Sequence {
    fn from(items: Vec<Item>) -> Self {
        Self { items }
    }
}

impl FromIterator<Item> for Sequence {
    fn from_iter<T: IntoIterator<Item = Item>>(iter: T) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Sequence {
    type Item = Item;
    type IntoIter = std::vec::IntoIter<Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a Sequence {
    type Item = &'a Item;
    type IntoIter = std::slice::Iter<'a, Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.items.iter().map(Item::string_value).collect();
        write!(f, "{}", parts.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ebv_of_empty_sequence_is_false() {
        assert!(!Sequence::empty().effective_boolean_value().unwrap());
    }

    #[test]
    fn ebv_of_node_sequence_is_true() {
        let seq: Sequence = vec![
            Item::Node(Node::element("<a/>", "")),
            Item::Atomic(Atomic::Integer(0)),
        ]
        .into();
        assert!(seq.effective_boolean_value().unwrap());
    }

    #[test]
    fn ebv_of_singleton_atomics() {
        let cases = [
            (Atomic::Boolean(false), false),
            (Atomic::String(String::new()), false),
            (Atomic::Untyped("x".into()), true),
            (Atomic::Integer(0), false),
            (Atomic::Double(f64::NAN), false),
            (Atomic::Double(0.5), true),
            (Atomic::Decimal("0.00".into()), false),
        ];
        for (atomic, expected) in cases {
            let seq = Sequence::from(vec![Item::Atomic(atomic.clone())]);
            assert_eq!(seq.effective_boolean_value().unwrap(), expected, "{:?}", atomic);
        }
    }

    #[test]
    fn ebv_of_multiple_atomics_is_an_error() {
        let seq = Sequence::from(vec![
            Item::Atomic(Atomic::Integer(1)),
            Item::Atomic(Atomic::Integer(2)),
        ]);
        assert!(matches!(
            seq.effective_boolean_value(),
            Err(Error::TypeConversion(_))
        ));
    }

    #[test]
    fn double_lexical_forms() {
        assert_eq!(Atomic::Double(3.0).lexical(), "3");
        assert_eq!(Atomic::Double(0.25).lexical(), "0.25");
        assert_eq!(Atomic::Double(1e20).lexical(), "1.0E20");
        assert_eq!(Atomic::Double(f64::NEG_INFINITY).lexical(), "-INF");
    }
}
