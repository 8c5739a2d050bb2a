//! Conversion of xee results into the x-batch item model

use x_batch_engine::error::{Error, Result};
use x_batch_engine::{Atomic, Item, Node, NodeKind, Sequence};
use xot::{ValueType, Xot};

/// Convert every item of a result sequence
pub fn sequence(xot: &Xot, sequence: &xee_xpath::Sequence) -> Result<Sequence> {
    let mut converted = Sequence::new();
    for item in sequence.iter() {
        converted.push(self::item(xot, &item)?);
    }
    Ok(converted)
}

pub fn item(xot: &Xot, item: &xee_xpath::Item) -> Result<Item> {
    match item {
        xee_xpath::Item::Node(node) => Ok(Item::Node(self::node(xot, *node)?)),
        xee_xpath::Item::Atomic(atomic) => {
            let lexical = item
                .string_value(xot)
                .map_err(|e| Error::TypeConversion(e.to_string()))?;
            Ok(Item::Atomic(self::atomic(atomic, lexical)))
        }
        xee_xpath::Item::Function(_) => Err(Error::TypeConversion(
            "function items cannot be serialized".to_string(),
        )),
    }
}

/// Node with its XML markup and string value.
///
/// Attribute and namespace nodes have no standalone markup; their string
/// value stands in.
pub fn node(xot: &Xot, node: xot::Node) -> Result<Node> {
    let string_value = xot.string_value(node);
    let kind = match xot.value_type(node) {
        ValueType::Document => NodeKind::Document,
        ValueType::Element => NodeKind::Element,
        ValueType::Text => NodeKind::Text,
        ValueType::ProcessingInstruction => NodeKind::ProcessingInstruction,
        ValueType::Comment => NodeKind::Comment,
        ValueType::Attribute => NodeKind::Attribute,
        ValueType::Namespace => NodeKind::Namespace,
    };
    let markup = match kind {
        NodeKind::Attribute | NodeKind::Namespace => string_value.clone(),
        _ => xot
            .to_string(node)
            .map_err(|e| Error::evaluation(format!("cannot serialize node: {}", e)))?,
    };
    Ok(Node::new(kind, markup, string_value))
}

fn atomic(atomic: &xee_xpath::Atomic, lexical: String) -> Atomic {
    use xee_xpath::Atomic as Xee;

    let other = |type_name: &str, lexical: String| Atomic::Other {
        type_name: type_name.to_string(),
        lexical,
    };
    match atomic {
        Xee::Boolean(value) => Atomic::Boolean(*value),
        Xee::String(..) => Atomic::String(lexical),
        Xee::Untyped(_) => Atomic::Untyped(lexical),
        // beyond i64 the lexical form is kept
        Xee::Integer(..) => match lexical.parse::<i64>() {
            Ok(value) => Atomic::Integer(value),
            Err(_) => other("xs:integer", lexical),
        },
        Xee::Decimal(_) => Atomic::Decimal(lexical),
        Xee::Double(value) => Atomic::Double(value.0),
        Xee::Float(_) => other("xs:float", lexical),
        Xee::Date(_) => other("xs:date", lexical),
        Xee::DateTime(_) => other("xs:dateTime", lexical),
        Xee::DateTimeStamp(_) => other("xs:dateTimeStamp", lexical),
        Xee::Time(_) => other("xs:time", lexical),
        Xee::Duration(_) => other("xs:duration", lexical),
        Xee::YearMonthDuration(_) => other("xs:yearMonthDuration", lexical),
        Xee::DayTimeDuration(_) => other("xs:dayTimeDuration", lexical),
        Xee::QName(_) => other("xs:QName", lexical),
        _ => other("xs:anyAtomicType", lexical),
    }
}
