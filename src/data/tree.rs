//! Minimal Newick phylogeny: parse, list tips, prune, write.
//!
//! The tree is carried alongside the count data so that it can be handed to
//! phylogenetic distance routines with exactly the retained taxa as tips.
//! Pruning follows the usual drop-tip convention: childless internal nodes are
//! removed and single-child internal nodes are collapsed, summing branch lengths.

use crate::error::{PrepError, Result};
use petgraph::graph::{Graph, NodeIndex};
use petgraph::visit::{Dfs, EdgeRef};
use petgraph::Direction;
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;

/// A rooted phylogenetic tree.
///
/// Nodes carry optional labels and edges run parent to child, weighted with the
/// child's branch length. Children keep their Newick order.
#[derive(Debug, Clone)]
pub struct PhyloTree {
    graph: Graph<Option<String>, Option<f64>>,
    root: NodeIndex,
    root_length: Option<f64>,
}

impl PhyloTree {
    /// Read a Newick file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        text.parse()
    }

    /// Children of `node` with their branch lengths, left to right.
    fn children(&self, node: NodeIndex) -> Vec<(NodeIndex, Option<f64>)> {
        // Graph yields edges newest first
        let mut children: Vec<(NodeIndex, Option<f64>)> = self
            .graph
            .edges_directed(node, Direction::Outgoing)
            .map(|edge| (edge.target(), *edge.weight()))
            .collect();
        children.reverse();
        children
    }

    fn is_tip(&self, node: NodeIndex) -> bool {
        self.graph
            .neighbors_directed(node, Direction::Outgoing)
            .next()
            .is_none()
    }

    /// Tip labels in left-to-right order.
    pub fn tip_labels(&self) -> Vec<&str> {
        let mut tips = Vec::new();
        let mut dfs = Dfs::new(&self.graph, self.root);
        while let Some(node) = dfs.next(&self.graph) {
            if self.is_tip(node) {
                if let Some(label) = &self.graph[node] {
                    tips.push(label.as_str());
                }
            }
        }
        tips
    }

    pub fn n_tips(&self) -> usize {
        self.tip_labels().len()
    }

    /// Keep only tips whose label is in `keep`; `None` if no tip survives.
    pub fn prune(&self, keep: &HashSet<&str>) -> Option<Self> {
        let mut graph = Graph::new();
        // A collapsed root must not inherit a child's branch length.
        let (root, _) = self.prune_node(self.root, self.root_length, keep, &mut graph)?;
        Some(Self {
            graph,
            root,
            root_length: self.root_length,
        })
    }

    /// Copy the kept part of the subtree under `node` into `out`.
    ///
    /// Returns the new node and the length of the branch above it, which grows
    /// when unary nodes are collapsed.
    fn prune_node(
        &self,
        node: NodeIndex,
        length: Option<f64>,
        keep: &HashSet<&str>,
        out: &mut Graph<Option<String>, Option<f64>>,
    ) -> Option<(NodeIndex, Option<f64>)> {
        if self.is_tip(node) {
            let label = self.graph[node].as_deref()?;
            if !keep.contains(label) {
                return None;
            }
            return Some((out.add_node(Some(label.to_string())), length));
        }

        let children: Vec<(NodeIndex, Option<f64>)> = self
            .children(node)
            .into_iter()
            .filter_map(|(child, child_length)| self.prune_node(child, child_length, keep, out))
            .collect();

        match children.as_slice() {
            [] => None,
            [(only, only_length)] => {
                let merged = match (length, *only_length) {
                    (None, None) => None,
                    (a, b) => Some(a.unwrap_or(0.0) + b.unwrap_or(0.0)),
                };
                Some((*only, merged))
            }
            _ => {
                let parent = out.add_node(self.graph[node].clone());
                for &(child, child_length) in &children {
                    out.add_edge(parent, child, child_length);
                }
                Some((parent, length))
            }
        }
    }

    /// Serialize to a Newick string terminated by `;`.
    pub fn to_newick(&self) -> String {
        let mut out = String::new();
        self.write_node(self.root, self.root_length, &mut out);
        out.push(';');
        out
    }

    fn write_node(&self, node: NodeIndex, length: Option<f64>, out: &mut String) {
        let children = self.children(node);
        if !children.is_empty() {
            out.push('(');
            for (i, &(child, child_length)) in children.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                self.write_node(child, child_length, out);
            }
            out.push(')');
        }
        if let Some(label) = &self.graph[node] {
            out.push_str(&quote_label(label));
        }
        if let Some(length) = length {
            out.push_str(&format!(":{}", length));
        }
    }

    /// Write the tree to a file.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_newick() + "\n")?;
        Ok(())
    }
}

impl PartialEq for PhyloTree {
    fn eq(&self, other: &Self) -> bool {
        self.to_newick() == other.to_newick()
    }
}

impl FromStr for PhyloTree {
    type Err = PrepError;

    fn from_str(s: &str) -> Result<Self> {
        let mut parser = Parser {
            chars: s.chars().collect(),
            pos: 0,
            graph: Graph::new(),
        };
        let (root, root_length) = parser.subtree()?;
        parser.skip_ignorable();
        match parser.peek() {
            Some(';') => parser.pos += 1,
            None => {}
            Some(c) => {
                return Err(PrepError::TreeParse(format!(
                    "unexpected '{}' at position {}",
                    c, parser.pos
                )))
            }
        }
        parser.skip_ignorable();
        if parser.pos < parser.chars.len() {
            return Err(PrepError::TreeParse(
                "trailing content after ';'".to_string(),
            ));
        }
        Ok(PhyloTree {
            graph: parser.graph,
            root,
            root_length,
        })
    }
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
    graph: Graph<Option<String>, Option<f64>>,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    /// Skip whitespace and `[...]` comments.
    fn skip_ignorable(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.pos += 1;
            } else if c == '[' {
                while let Some(c) = self.peek() {
                    self.pos += 1;
                    if c == ']' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    /// Parse one subtree; returns its node and the length of the branch above it.
    fn subtree(&mut self) -> Result<(NodeIndex, Option<f64>)> {
        self.skip_ignorable();
        let mut children = Vec::new();
        if self.peek() == Some('(') {
            self.pos += 1;
            loop {
                children.push(self.subtree()?);
                self.skip_ignorable();
                match self.peek() {
                    Some(',') => self.pos += 1,
                    Some(')') => {
                        self.pos += 1;
                        break;
                    }
                    other => {
                        return Err(PrepError::TreeParse(format!(
                            "expected ',' or ')' at position {}, found {:?}",
                            self.pos, other
                        )))
                    }
                }
            }
        }

        let label = self.label()?;
        self.skip_ignorable();
        let length = if self.peek() == Some(':') {
            self.pos += 1;
            Some(self.length()?)
        } else {
            None
        };

        if children.is_empty() && label.is_none() {
            return Err(PrepError::TreeParse(format!(
                "unlabelled tip at position {}",
                self.pos
            )));
        }

        let node = self.graph.add_node(label);
        for (child, child_length) in children {
            self.graph.add_edge(node, child, child_length);
        }
        Ok((node, length))
    }

    fn label(&mut self) -> Result<Option<String>> {
        self.skip_ignorable();
        if self.peek() == Some('\'') {
            self.pos += 1;
            let mut label = String::new();
            loop {
                match self.peek() {
                    Some('\'') if self.chars.get(self.pos + 1) == Some(&'\'') => {
                        label.push('\'');
                        self.pos += 2;
                    }
                    Some('\'') => {
                        self.pos += 1;
                        return Ok(Some(label));
                    }
                    Some(c) => {
                        label.push(c);
                        self.pos += 1;
                    }
                    None => return Err(PrepError::TreeParse("unterminated quoted label".to_string())),
                }
            }
        }

        let start = self.pos;
        while let Some(c) = self.peek() {
            if "(),:;[".contains(c) || c.is_whitespace() {
                break;
            }
            self.pos += 1;
        }
        if self.pos == start {
            return Ok(None);
        }
        Ok(Some(self.chars[start..self.pos].iter().collect()))
    }

    fn length(&mut self) -> Result<f64> {
        self.skip_ignorable();
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || "+-.eE".contains(c) {
                self.pos += 1;
            } else {
                break;
            }
        }
        let raw: String = self.chars[start..self.pos].iter().collect();
        raw.parse::<f64>()
            .map_err(|_| PrepError::TreeParse(format!("invalid branch length '{}'", raw)))
    }
}

/// Quote a label when it contains Newick punctuation or whitespace.
fn quote_label(label: &str) -> String {
    if label
        .chars()
        .any(|c| "(),:;[]'".contains(c) || c.is_whitespace())
    {
        format!("'{}'", label.replace('\'', "''"))
    } else {
        label.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tips() {
        let tree: PhyloTree = "((A:0.1,B:0.2)n1:0.3,(C:0.4,D:0.5):0.6);".parse().unwrap();
        assert_eq!(tree.tip_labels(), vec!["A", "B", "C", "D"]);
        assert_eq!(tree.n_tips(), 4);
    }

    #[test]
    fn test_parse_quoted_and_comments() {
        let tree: PhyloTree = "('a b':1,[note]'it''s':2);".parse().unwrap();
        assert_eq!(tree.tip_labels(), vec!["a b", "it's"]);
        assert_eq!(tree.to_newick(), "('a b':1,'it''s':2);");
    }

    #[test]
    fn test_parse_errors() {
        assert!("((A,B);".parse::<PhyloTree>().is_err());
        assert!("(A:x,B);".parse::<PhyloTree>().is_err());
        assert!("(A,);".parse::<PhyloTree>().is_err());
        assert!("(A,B); junk".parse::<PhyloTree>().is_err());
    }

    #[test]
    fn test_roundtrip() {
        let nwk = "((A:0.1,B:0.2)n1:0.3,C:0.4);";
        let tree: PhyloTree = nwk.parse().unwrap();
        assert_eq!(tree.to_newick(), nwk);
    }

    #[test]
    fn test_prune_collapses_unary_nodes() {
        let tree: PhyloTree = "((A:0.1,B:0.2)n1:0.3,(C:0.4,D:0.5):0.6);".parse().unwrap();
        let keep: HashSet<&str> = ["A", "C", "D"].into_iter().collect();
        let pruned = tree.prune(&keep).unwrap();

        assert_eq!(pruned.tip_labels(), vec!["A", "C", "D"]);
        // A inherits the n1 branch: 0.1 + 0.3
        let nwk = pruned.to_newick();
        assert!(nwk.starts_with("(A:0.4"), "{}", nwk);
    }

    #[test]
    fn test_prune_keeps_root_length_and_order() {
        let tree: PhyloTree = "((A:1,B:2):3,(C:4,(D:5,E:6):7):8)root:0.5;".parse().unwrap();
        let keep: HashSet<&str> = ["B", "E", "C"].into_iter().collect();
        let pruned = tree.prune(&keep).unwrap();

        assert_eq!(pruned.tip_labels(), vec!["B", "C", "E"]);
        assert_eq!(pruned.to_newick(), "(B:5,(C:4,E:13):8)root:0.5;");
        // Pruning again with the same tips changes nothing
        assert_eq!(pruned.prune(&keep).unwrap(), pruned);
    }

    #[test]
    fn test_prune_collapsed_root_keeps_own_length() {
        let tree: PhyloTree = "((A:1,B:2):3,C:4):9;".parse().unwrap();
        let keep: HashSet<&str> = ["A", "B"].into_iter().collect();
        let pruned = tree.prune(&keep).unwrap();
        assert_eq!(pruned.to_newick(), "(A:1,B:2):9;");
    }

    #[test]
    fn test_prune_to_nothing() {
        let tree: PhyloTree = "(A,B);".parse().unwrap();
        assert!(tree.prune(&HashSet::new()).is_none());
    }
}
