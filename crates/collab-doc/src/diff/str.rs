//! String diff by longest-common-subsequence reconciliation.
//!
//! Turns a whole-text replacement into an ordered list of insert/delete runs.
//! Applying the runs in order to the old text yields exactly the new text, and
//! the total number of edited characters is minimal (`|a| + |b| - 2·LCS`).
//!
//! All positions and lengths are in Unicode scalar values (Rust `char`s).
//! Every run index refers to the text as it exists when that run is applied,
//! i.e. after all preceding runs.
//!
//! Cost is O(n·m) time and memory in the length of the differing middle
//! section; the common prefix and suffix are stripped first.

// ── Types ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEditKind {
    Insert,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    pub kind: TextEditKind,
    pub index: usize,
    pub text: String,
}

impl TextEdit {
    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

// ── Public API ────────────────────────────────────────────────────────────

/// Compute the edit runs that transform `src` into `dst`.
pub fn diff(src: &str, dst: &str) -> Vec<TextEdit> {
    let a: Vec<char> = src.chars().collect();
    let b: Vec<char> = dst.chars().collect();
    let prefix = common_prefix(&a, &b);
    let suffix = common_suffix(&a[prefix..], &b[prefix..]);
    let a_mid = &a[prefix..a.len() - suffix];
    let b_mid = &b[prefix..b.len() - suffix];

    let mut edits = correct_offsets(merge_runs(lcs_ops(a_mid, b_mid)));
    for edit in &mut edits {
        edit.index += prefix;
    }
    edits
}

/// Apply `edits` in order to `src`.
///
/// Runs whose index lies past the end are clamped to the end; a delete run
/// removes at most the characters that exist.
pub fn apply_edits(src: &str, edits: &[TextEdit]) -> String {
    let mut chars: Vec<char> = src.chars().collect();
    for edit in edits {
        let at = edit.index.min(chars.len());
        match edit.kind {
            TextEditKind::Insert => {
                chars.splice(at..at, edit.text.chars());
            }
            TextEditKind::Delete => {
                let end = (at + edit.len()).min(chars.len());
                chars.drain(at..end);
            }
        }
    }
    chars.into_iter().collect()
}

// ── Internals ─────────────────────────────────────────────────────────────

fn common_prefix(a: &[char], b: &[char]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

fn common_suffix(a: &[char], b: &[char]) -> usize {
    a.iter()
        .rev()
        .zip(b.iter().rev())
        .take_while(|(x, y)| x == y)
        .count()
}

/// Row-major `(|a|+1) × (|b|+1)` LCS length table.
fn lcs_table(a: &[char], b: &[char]) -> Vec<u32> {
    let width = b.len() + 1;
    let mut table = vec![0u32; (a.len() + 1) * width];
    for i in 1..=a.len() {
        for j in 1..=b.len() {
            table[i * width + j] = if a[i - 1] == b[j - 1] {
                table[(i - 1) * width + j - 1] + 1
            } else {
                table[(i - 1) * width + j].max(table[i * width + j - 1])
            };
        }
    }
    table
}

/// Single-character ops in forward order. Insert positions index into `b`,
/// delete positions index into `a`.
fn lcs_ops(a: &[char], b: &[char]) -> Vec<(TextEditKind, usize, char)> {
    let table = lcs_table(a, b);
    let width = b.len() + 1;
    let (mut i, mut j) = (a.len(), b.len());
    let mut ops = Vec::with_capacity(a.len() + b.len());
    while i > 0 || j > 0 {
        if i > 0 && j > 0 && a[i - 1] == b[j - 1] {
            i -= 1;
            j -= 1;
        } else if i > 0 && (j == 0 || table[i * width + j - 1] < table[(i - 1) * width + j]) {
            ops.push((TextEditKind::Delete, i - 1, a[i - 1]));
            i -= 1;
        } else {
            ops.push((TextEditKind::Insert, j - 1, b[j - 1]));
            j -= 1;
        }
    }
    ops.reverse();
    ops
}

struct Run {
    kind: TextEditKind,
    index: usize,
    len: usize,
    text: String,
}

fn merge_runs(ops: Vec<(TextEditKind, usize, char)>) -> Vec<Run> {
    let mut runs: Vec<Run> = Vec::new();
    for (kind, index, ch) in ops {
        match runs.last_mut() {
            Some(run) if run.kind == kind && run.index + run.len == index => {
                run.text.push(ch);
                run.len += 1;
            }
            _ => runs.push(Run {
                kind,
                index,
                len: 1,
                text: ch.to_string(),
            }),
        }
    }
    runs
}

/// Re-expresses delete indices against the text at application time: every
/// earlier insert run pushes them right, every earlier delete run pulls them
/// left. Insert indices already point into the destination text.
fn correct_offsets(runs: Vec<Run>) -> Vec<TextEdit> {
    let mut offset: isize = 0;
    runs.into_iter()
        .map(|run| {
            let index = match run.kind {
                TextEditKind::Insert => {
                    offset += run.len as isize;
                    run.index
                }
                TextEditKind::Delete => {
                    let index = (run.index as isize + offset) as usize;
                    offset -= run.len as isize;
                    index
                }
            };
            TextEdit {
                kind: run.kind,
                index,
                text: run.text,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lcs_len(a: &str, b: &str) -> usize {
        let a: Vec<char> = a.chars().collect();
        let b: Vec<char> = b.chars().collect();
        *lcs_table(&a, &b).last().unwrap() as usize
    }

    fn edited_chars(edits: &[TextEdit]) -> usize {
        edits.iter().map(TextEdit::len).sum()
    }

    fn check(src: &str, dst: &str) -> Vec<TextEdit> {
        let edits = diff(src, dst);
        assert_eq!(apply_edits(src, &edits), dst, "{src:?} -> {dst:?}: {edits:?}");
        let src_len = src.chars().count();
        let dst_len = dst.chars().count();
        assert_eq!(edited_chars(&edits), src_len + dst_len - 2 * lcs_len(src, dst));
        edits
    }

    #[test]
    fn equal_strings_produce_nothing() {
        assert!(check("hello", "hello").is_empty());
        assert!(check("", "").is_empty());
    }

    #[test]
    fn empty_source_is_one_insert() {
        let edits = check("", "hello");
        assert_eq!(
            edits,
            vec![TextEdit {
                kind: TextEditKind::Insert,
                index: 0,
                text: "hello".into()
            }]
        );
    }

    #[test]
    fn empty_destination_is_one_delete() {
        let edits = check("hello", "");
        assert_eq!(
            edits,
            vec![TextEdit {
                kind: TextEditKind::Delete,
                index: 0,
                text: "hello".into()
            }]
        );
    }

    #[test]
    fn middle_insert_keeps_prefix_offset() {
        let edits = check("ac", "abc");
        assert_eq!(
            edits,
            vec![TextEdit {
                kind: TextEditKind::Insert,
                index: 1,
                text: "b".into()
            }]
        );
    }

    #[test]
    fn delete_after_insert_is_offset_corrected() {
        // 'x' is inserted before the deleted 'b', so the delete must land one
        // position further right than its index in the source.
        let edits = check("abc", "xac");
        assert_eq!(edits.len(), 2);
        assert_eq!(edits[0].kind, TextEditKind::Insert);
        assert_eq!(edits[0].index, 0);
        assert_eq!(edits[1].kind, TextEditKind::Delete);
        assert_eq!(edits[1].index, 2);
    }

    #[test]
    fn replacement_words() {
        check("the quick brown fox", "the slow green fox");
        check("kitten", "sitting");
        check("abcabba", "cbabac");
    }

    #[test]
    fn unicode_positions_are_chars() {
        let edits = check("héllo wörld", "héllo, wörld!");
        assert!(edits.iter().all(|e| e.kind == TextEditKind::Insert));
        check("日本語", "日本");
    }

    #[test]
    fn adjacent_single_chars_merge_into_runs() {
        let edits = check("aXYZb", "ab");
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].text, "XYZ");
        assert_eq!(edits[0].index, 1);
    }
}
