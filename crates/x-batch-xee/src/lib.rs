//! xee engine adapter for x-batch processors
//!
//! Wraps the xee XPath 3.1 engine behind the
//! [`ExpressionEngine`](x_batch_engine::ExpressionEngine) interface. Only
//! XPath is compiled; XQuery and XSLT are reported as unsupported.

pub mod convert;
pub mod xpath;

pub use xpath::{XeeEngine, XeeExpression};
