//! Untyped formula syntax tree produced by the tokenizer

/// Formula AST node with its source span (character offsets, end exclusive)
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AstNode {
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub kind: AstKind,
    pub start: usize,
    pub end: usize,
    /// Set in tolerant mode when this node had to be patched up
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "is_false"))]
    pub invalid: bool,
    /// The node was written inside parentheses
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "is_false"))]
    pub use_brackets: bool,
    /// Levels in the subtree rooted here, 1 for a leaf
    #[cfg_attr(feature = "serde", serde(skip, default = "leaf_height"))]
    pub height: usize,
}

#[cfg(feature = "serde")]
fn leaf_height() -> usize {
    1
}

#[cfg(feature = "serde")]
fn is_false(flag: &bool) -> bool {
    !*flag
}

/// Node kinds. Operators are kept as their source symbols; the transformer
/// resolves them against the operator table.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "lowercase"))]
pub enum AstKind {
    Number {
        value: f64,
        text: String,
    },
    /// String literal; `value` is the escaped source without quotes
    String {
        value: String,
    },
    Identifier {
        name: String,
    },
    #[cfg_attr(feature = "serde", serde(rename = "unaryop"))]
    UnaryOp {
        operator: String,
        operand: Box<AstNode>,
        /// Unit operators such as `%` follow their operand
        postfix: bool,
    },
    #[cfg_attr(feature = "serde", serde(rename = "binaryop"))]
    BinaryOp {
        operator: String,
        left: Box<AstNode>,
        right: Box<AstNode>,
    },
    /// `?(condition, onTrue, onFalse)`
    Condition {
        params: Vec<AstNode>,
    },
    List {
        params: Vec<AstNode>,
    },
    Function {
        name: String,
        params: Vec<AstNode>,
    },
    Undef,
}

impl AstKind {
    fn child_height(&self) -> usize {
        match self {
            AstKind::UnaryOp { operand, .. } => operand.height,
            AstKind::BinaryOp { left, right, .. } => left.height.max(right.height),
            AstKind::Condition { params }
            | AstKind::List { params }
            | AstKind::Function { params, .. } => {
                params.iter().map(|param| param.height).max().unwrap_or(0)
            }
            _ => 0,
        }
    }
}

impl AstNode {
    pub fn new(kind: AstKind, start: usize, end: usize) -> Self {
        let height = 1 + kind.child_height();
        Self {
            kind,
            start,
            end,
            invalid: false,
            use_brackets: false,
            height,
        }
    }

    /// Placeholder for a missing expression at `index`
    pub fn undef(index: usize) -> Self {
        Self::new(AstKind::Undef, index, index)
    }

    pub fn invalid(mut self) -> Self {
        self.invalid = true;
        self
    }

    pub fn is_undef(&self) -> bool {
        matches!(self.kind, AstKind::Undef)
    }

    /// Short name of the node kind
    pub fn type_name(&self) -> &'static str {
        match self.kind {
            AstKind::Number { .. } => "number",
            AstKind::String { .. } => "string",
            AstKind::Identifier { .. } => "identifier",
            AstKind::UnaryOp { .. } => "unaryop",
            AstKind::BinaryOp { .. } => "binaryop",
            AstKind::Condition { .. } => "condition",
            AstKind::List { .. } => "list",
            AstKind::Function { .. } => "function",
            AstKind::Undef => "undef",
        }
    }

    /// Direct children in source order
    pub fn children(&self) -> Vec<&AstNode> {
        match &self.kind {
            AstKind::UnaryOp { operand, .. } => vec![&**operand],
            AstKind::BinaryOp { left, right, .. } => vec![&**left, &**right],
            AstKind::Condition { params }
            | AstKind::List { params }
            | AstKind::Function { params, .. } => params.iter().collect(),
            _ => Vec::new(),
        }
    }

    /// True if this node or any descendant is invalid
    pub fn has_invalid(&self) -> bool {
        self.invalid || self.children().into_iter().any(AstNode::has_invalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_search() {
        let leaf = AstNode::undef(3).invalid();
        let node = AstNode::new(
            AstKind::Function {
                name: "SUM".into(),
                params: vec![AstNode::new(
                    AstKind::Number {
                        value: 1.0,
                        text: "1".into(),
                    },
                    4,
                    5,
                ), leaf],
            },
            0,
            6,
        );
        assert!(node.has_invalid());
        assert!(!node.invalid);
        assert_eq!(node.children().len(), 2);
        assert_eq!(node.type_name(), "function");
        assert_eq!(node.height, 2);
    }

    #[test]
    fn test_height_follows_deepest_child() {
        let one = || AstNode::new(AstKind::Identifier { name: "A1".into() }, 0, 2);
        let add = |left: AstNode, right: AstNode| {
            AstNode::new(
                AstKind::BinaryOp {
                    operator: "+".into(),
                    left: Box::new(left),
                    right: Box::new(right),
                },
                0,
                0,
            )
        };
        let chain = add(add(add(one(), one()), one()), one());
        assert_eq!(chain.height, 4);
        let negated = AstNode::new(
            AstKind::UnaryOp {
                operator: "-".into(),
                operand: Box::new(chain),
                postfix: false,
            },
            0,
            0,
        );
        assert_eq!(negated.height, 5);
        assert_eq!(AstNode::undef(0).height, 1);
    }
}
