//! Flattened expression trees.
//!
//! A gene is its nodes in pre-order: every operator is followed by the complete
//! subtrees of its arguments, left to right. Nothing in the sequence marks where
//! a subtree ends; every traversal recovers the shape from each node's arity.
//!
//! Traversals run on a [`Cursor`] created for that traversal alone, so a gene
//! carries no traversal state and can be validated and evaluated from several
//! threads at once. Derived forms are computed on first use and memoized; the
//! node sequence itself never changes (`replace` and `next_sibling` build new genes).

use crate::domain::dimension::Dimension;
use crate::domain::environment::Environment;
use crate::domain::error::{AlphaError, ValidationError};
use crate::domain::frame::Frame;
use crate::domain::node::{Checked, Node};
use crate::domain::operators::Args;
use chrono::NaiveDate;
use quick_xml::escape::escape;
use sha2::{Digest, Sha256};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::OnceLock;
use tracing::debug;

/// Read position in a node sequence.
#[derive(Debug, Clone)]
pub struct Cursor<'g> {
    nodes: &'g [Node],
    position: usize,
}

impl<'g> Cursor<'g> {
    pub fn new(nodes: &'g [Node], position: usize) -> Self {
        Self { nodes, position }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Return the node under the cursor and step past it.
    pub fn next_node(&mut self) -> Option<&'g Node> {
        let node = self.nodes.get(self.position)?;
        self.position += 1;
        Some(node)
    }
}

#[derive(Clone)]
pub struct Gene {
    nodes: Vec<Node>,
    string: OnceLock<String>,
    xml: OnceLock<String>,
    depth: OnceLock<usize>,
    hashcode: OnceLock<String>,
    checked: OnceLock<Result<Dimension, ValidationError>>,
}

impl Gene {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self {
            nodes,
            string: OnceLock::new(),
            xml: OnceLock::new(),
            depth: OnceLock::new(),
            hashcode: OnceLock::new(),
            checked: OnceLock::new(),
        }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, position: usize) -> Option<&Node> {
        self.nodes.get(position)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// A fresh cursor at the root.
    pub fn cursor(&self) -> Cursor<'_> {
        Cursor::new(&self.nodes, 0)
    }

    /// `name(arg, arg, ...)` with leaves rendered as their token.
    pub fn as_str(&self) -> &str {
        self.string.get_or_init(|| {
            let mut out = String::new();
            render(&mut self.cursor(), &mut out);
            out
        })
    }

    pub fn to_xml_string(&self) -> &str {
        self.xml.get_or_init(|| {
            let mut out = String::new();
            render_xml(&mut self.cursor(), &mut out);
            out
        })
    }

    /// Leaves have depth 1.
    pub fn depth(&self) -> usize {
        *self.depth.get_or_init(|| depth(&mut self.cursor()))
    }

    /// Hex SHA-256 digest of the canonical string, usable as a lookup key.
    pub fn hashcode(&self) -> &str {
        self.hashcode
            .get_or_init(|| hex::encode(Sha256::digest(self.as_str().as_bytes())))
    }

    fn checked(&self) -> &Result<Dimension, ValidationError> {
        self.checked.get_or_init(|| {
            let mut cursor = self.cursor();
            let outcome = check(&mut cursor).and_then(|root| {
                let rest = self.nodes.len() - cursor.position();
                if rest > 0 {
                    Err(ValidationError::Trailing { count: rest })
                } else {
                    Ok(root.dimension)
                }
            });
            if let Err(err) = &outcome {
                debug!(gene = %self.as_str(), error = %err, "gene failed validation");
            }
            outcome
        })
    }

    /// Type-check the gene. Failure is an ordinary outcome, not a fault.
    pub fn validate(&self) -> bool {
        self.checked().is_ok()
    }

    /// Dimension of the root expression, when the gene is valid.
    pub fn dimension(&self) -> Option<&Dimension> {
        self.checked().as_ref().ok()
    }

    pub fn validation_error(&self) -> Option<&ValidationError> {
        self.checked().as_ref().err()
    }

    /// Exclusive end of the subtree rooted at `position`.
    pub fn subtree_end(&self, position: usize) -> Result<usize, ValidationError> {
        let mut side = Cursor::new(&self.nodes, position);
        skip(&mut side)?;
        Ok(side.position())
    }

    /// The subtree rooted at `position` as a gene of its own.
    pub fn next_sibling(&self, position: usize) -> Result<Gene, AlphaError> {
        let end = self.subtree_end(position)?;
        Ok(Gene::new(self.nodes[position..end].to_vec()))
    }

    pub fn copy(&self) -> Result<Gene, AlphaError> {
        self.next_sibling(0)
    }

    /// Substitute `other` for the subtree rooted at `position`.
    ///
    /// The result is not re-validated; call `validate` on it.
    pub fn replace(&self, position: usize, other: &Gene) -> Result<Gene, AlphaError> {
        let end = self.subtree_end(position)?;
        let mut nodes = Vec::with_capacity(self.nodes.len() - (end - position) + other.len());
        nodes.extend_from_slice(&self.nodes[..position]);
        nodes.extend_from_slice(&other.nodes);
        nodes.extend_from_slice(&self.nodes[end..]);
        Ok(Gene::new(nodes))
    }

    /// Evaluate the gene over the inclusive window `[date1, date2]`.
    ///
    /// Range faults from the environment propagate unchanged. The gene is not
    /// type-checked here; callers gate on `validate` first.
    pub fn eval(
        &self,
        env: &Environment,
        date1: NaiveDate,
        date2: NaiveDate,
    ) -> Result<Frame, AlphaError> {
        let end = self.subtree_end(0)?;
        if end != self.nodes.len() {
            return Err(ValidationError::Trailing {
                count: self.nodes.len() - end,
            }
            .into());
        }
        debug!(gene = %self.as_str(), %date1, %date2, "evaluating gene");
        self.value_at(env, 0, date1, date2)
    }

    /// Evaluate the subtree rooted at `position`.
    pub fn value_at(
        &self,
        env: &Environment,
        position: usize,
        date1: NaiveDate,
        date2: NaiveDate,
    ) -> Result<Frame, AlphaError> {
        let node = self
            .nodes
            .get(position)
            .ok_or(ValidationError::Truncated { position })?;

        match node {
            Node::Constant(value) => {
                let value = *value.numer() as f64 / *value.denom() as f64;
                env.constant_frame(value, date1, date2)
            }
            Node::Data { name, .. } => env.get_frame(name, date1, date2),
            Node::Operator(op) => {
                let mut children = Vec::with_capacity(op.arity());
                let mut next = position + 1;
                for _ in 0..op.arity() {
                    children.push(next);
                    next = self.subtree_end(next)?;
                }
                let args = Args::new(op.name(), env, self, children);
                op.kernel().eval(&args, date1, date2)
            }
        }
    }
}

fn render(cursor: &mut Cursor<'_>, out: &mut String) {
    let Some(node) = cursor.next_node() else {
        return;
    };
    out.push_str(&node.token());
    if node.arity() > 0 {
        out.push('(');
        for i in 0..node.arity() {
            if i > 0 {
                out.push_str(", ");
            }
            render(cursor, out);
        }
        out.push(')');
    }
}

fn render_xml(cursor: &mut Cursor<'_>, out: &mut String) {
    let Some(node) = cursor.next_node() else {
        return;
    };
    let token = node.token();
    let value = escape(token.as_str());
    if node.arity() == 0 {
        out.push_str(&format!("<{} value=\"{}\"/>", node.tag(), value));
    } else {
        out.push_str(&format!("<{} value=\"{}\">", node.tag(), value));
        for _ in 0..node.arity() {
            render_xml(cursor, out);
        }
        out.push_str(&format!("</{}>", node.tag()));
    }
}

fn depth(cursor: &mut Cursor<'_>) -> usize {
    let Some(node) = cursor.next_node() else {
        return 0;
    };
    1 + (0..node.arity()).map(|_| depth(cursor)).max().unwrap_or(0)
}

fn skip(cursor: &mut Cursor<'_>) -> Result<(), ValidationError> {
    let position = cursor.position();
    let node = cursor
        .next_node()
        .ok_or(ValidationError::Truncated { position })?;
    for _ in 0..node.arity() {
        skip(cursor)?;
    }
    Ok(())
}

fn check<'g>(cursor: &mut Cursor<'g>) -> Result<Checked<'g>, ValidationError> {
    let position = cursor.position();
    let node = cursor
        .next_node()
        .ok_or(ValidationError::Truncated { position })?;

    let dimension = match node {
        Node::Constant(_) => Dimension::dimensionless(),
        Node::Data { dimension, .. } => dimension.clone(),
        Node::Operator(op) => {
            let mut children = Vec::with_capacity(op.arity());
            for _ in 0..op.arity() {
                children.push(check(cursor)?);
            }
            op.check(&children)?
        }
    };
    Ok(Checked { node, dimension })
}

impl fmt::Display for Gene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for Gene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Gene").field(&self.as_str()).finish()
    }
}

impl PartialEq for Gene {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for Gene {}

impl Hash for Gene {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}
