//! Typed visitor over the canonical tree

use crate::ast::{BasicCall, Call, Hint, Identifier, Join, Literal, NodeKind, Select, SqlNode};

/// One handler per node variant
///
/// Traversal order is up to the implementor: handlers decide which children
/// to visit by calling `accept` on them.
pub trait SqlVisitor {
    type Output;

    fn visit_identifier(&mut self, node: &SqlNode, identifier: &Identifier) -> Self::Output;

    fn visit_literal(&mut self, node: &SqlNode, literal: &Literal) -> Self::Output;

    fn visit_call(&mut self, node: &SqlNode, call: &Call) -> Self::Output;

    fn visit_select(&mut self, node: &SqlNode, select: &Select) -> Self::Output;

    fn visit_join(&mut self, node: &SqlNode, join: &Join) -> Self::Output;

    fn visit_basic_call(&mut self, node: &SqlNode, basic: &BasicCall) -> Self::Output;

    fn visit_node_list(&mut self, node: &SqlNode, items: &[SqlNode]) -> Self::Output;

    fn visit_hint(&mut self, node: &SqlNode, hint: &Hint) -> Self::Output;
}

impl SqlNode {
    /// Dispatch to the visitor handler for this node's variant
    pub fn accept<V: SqlVisitor + ?Sized>(&self, visitor: &mut V) -> V::Output {
        match &self.kind {
            NodeKind::Identifier(identifier) => visitor.visit_identifier(self, identifier),
            NodeKind::Literal(literal) => visitor.visit_literal(self, literal),
            NodeKind::Call(call) => visitor.visit_call(self, call),
            NodeKind::Select(select) => visitor.visit_select(self, select),
            NodeKind::Join(join) => visitor.visit_join(self, join),
            NodeKind::BasicCall(basic) => visitor.visit_basic_call(self, basic),
            NodeKind::NodeList(items) => visitor.visit_node_list(self, items),
            NodeKind::Hint(hint) => visitor.visit_hint(self, hint),
        }
    }
}
