//! Serialises an AST back to the textual grammar the server's reader
//! consumes. Nothing here goes through tag readers: tags are written as
//! `#tag child` and leaves as their source text.

use crate::ast::Node;

pub fn write(node: &Node) -> String {
    let mut out = String::new();
    write_into(node, &mut out);
    out
}

pub fn write_into(node: &Node, out: &mut String) {
    match node {
        Node::Leaf { text, .. } => out.push_str(text),
        Node::Collection {
            kind,
            children,
            preserve_whitespace,
        } => {
            let (open, close) = kind.delimiters();
            out.push_str(open);
            for (i, child) in children.iter().enumerate() {
                if i > 0 && !preserve_whitespace {
                    out.push(' ');
                }
                write_into(child, out);
            }
            out.push_str(close);
        }
        Node::Tag { tag, child } => {
            out.push('#');
            out.push_str(tag);
            out.push(' ');
            write_into(child, out);
        }
    }
}
