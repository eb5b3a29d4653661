//! Roving Index Tracker — next/previous eligible position in a node list.
//!
//! Positions are signed on input so callers can scan from "before the
//! first" (-1) or "after the last" (`len`). `None` stands for -1 on output.

use crate::context::Document;
use crate::visibility;

/// First index strictly after `from` for which `eligible` holds.
pub fn scan_forward(len: usize, from: isize, mut eligible: impl FnMut(usize) -> bool) -> Option<usize> {
    let start = from.saturating_add(1).max(0) as usize;
    (start..len).find(|&i| eligible(i))
}

/// Last index strictly before `from` for which `eligible` holds.
pub fn scan_backward(len: usize, from: isize, mut eligible: impl FnMut(usize) -> bool) -> Option<usize> {
    if from <= 0 {
        return None;
    }
    let end = (from as usize).min(len);
    (0..end).rev().find(|&i| eligible(i))
}

/// Next visible entry of `list` after `from`.
pub(crate) fn next_visible(doc: &mut Document, list: &[u32], from: isize) -> Option<usize> {
    scan_forward(list.len(), from, |i| visibility::is_visible(doc, list[i]))
}

/// Previous visible entry of `list` before `from`.
pub(crate) fn previous_visible(doc: &mut Document, list: &[u32], from: isize) -> Option<usize> {
    scan_backward(list.len(), from, |i| visibility::is_visible(doc, list[i]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MockBackend;
    use crate::tree;
    use crate::types::NodeKind;

    fn masks() -> Vec<Vec<bool>> {
        // Every visibility pattern up to five entries.
        let mut all = vec![Vec::new()];
        for len in 1..=5usize {
            for bits in 0..(1u32 << len) {
                all.push((0..len).map(|i| bits & (1 << i) != 0).collect());
            }
        }
        all
    }

    #[test]
    fn test_forward_never_returns_at_or_before_from() {
        for mask in masks() {
            let len = mask.len() as isize;
            for from in -1..=len {
                match scan_forward(mask.len(), from, |i| mask[i]) {
                    Some(i) => {
                        assert!(i as isize > from);
                        assert!(mask[i]);
                        assert!((from + 1..i as isize).all(|j| !mask[j as usize]));
                    }
                    None => {
                        let start = (from + 1).max(0) as usize;
                        assert!(mask.iter().skip(start).all(|v| !v));
                    }
                }
            }
        }
    }

    #[test]
    fn test_backward_never_returns_at_or_after_from() {
        for mask in masks() {
            let len = mask.len() as isize;
            for from in -1..=len {
                match scan_backward(mask.len(), from, |i| mask[i]) {
                    Some(i) => {
                        assert!((i as isize) < from);
                        assert!(mask[i]);
                    }
                    None => {
                        let end = from.clamp(0, len) as usize;
                        assert!(mask[..end].iter().all(|v| !v));
                    }
                }
            }
        }
    }

    #[test]
    fn test_empty_list() {
        assert_eq!(scan_forward(0, -1, |_| true), None);
        assert_eq!(scan_backward(0, 0, |_| true), None);
    }

    #[test]
    fn test_boundary_positions() {
        assert_eq!(scan_forward(3, -1, |_| true), Some(0));
        assert_eq!(scan_forward(3, 3, |_| true), None);
        assert_eq!(scan_backward(3, 3, |_| true), Some(2));
        assert_eq!(scan_backward(3, -1, |_| true), None);
        assert_eq!(scan_backward(3, 10, |_| true), Some(2));
    }

    #[test]
    fn test_skips_hidden_nodes() {
        let mut doc = Document::new(Box::new(MockBackend::new(1280.0, 800.0)));
        let root = tree::create_node(&mut doc, NodeKind::MainNav).unwrap();
        doc.root = Some(root);
        let mut list = Vec::new();
        for _ in 0..4 {
            let h = tree::create_node(&mut doc, NodeKind::NavLink).unwrap();
            tree::append_child(&mut doc, root, h).unwrap();
            list.push(h);
        }
        doc.nodes.get_mut(&list[1]).unwrap().display_none = true;
        doc.nodes.get_mut(&list[2]).unwrap().visibility_hidden = true;

        assert_eq!(next_visible(&mut doc, &list, 0), Some(3));
        assert_eq!(previous_visible(&mut doc, &list, 3), Some(0));
        assert_eq!(next_visible(&mut doc, &list, 3), None);
    }
}
