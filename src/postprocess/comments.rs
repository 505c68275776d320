//! Re-inject comment blocks from the pre-merge inventory.
//!
//! A block is a run of comment lines (blank lines between and after them
//! included). Its anchor is the first non-blank, non-comment line that follows
//! it in the baseline; the block goes back directly above that line.

#[derive(Debug, Clone, PartialEq, Eq)]
struct CommentBlock {
    lines: Vec<String>,
    anchor: Option<String>,
}

impl CommentBlock {
    fn comment_lines(&self) -> impl DoubleEndedIterator<Item = &str> {
        self.lines.iter().map(String::as_str).filter(|l| is_comment(l))
    }

    fn label(&self) -> String {
        self.comment_lines().next().unwrap_or_default().trim().to_string()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reinjection {
    pub text: String,
    pub inserted: usize,
    pub already_present: usize,
    /// Anchor (or first comment line, when the block has no anchor) of every
    /// block that was dropped.
    pub missed: Vec<String>,
}

fn is_comment(line: &str) -> bool {
    line.trim_start().starts_with('#')
}

fn canonical(line: &str) -> String {
    line.trim_end().replace(" = ", "=")
}

fn comment_blocks(baseline: &str) -> Vec<CommentBlock> {
    let lines: Vec<&str> = baseline.lines().collect();
    let mut blocks = Vec::new();
    let mut idx = 0;

    while idx < lines.len() {
        if !is_comment(lines[idx]) {
            idx += 1;
            continue;
        }
        let start = idx;
        while idx < lines.len() && (is_comment(lines[idx]) || lines[idx].trim().is_empty()) {
            idx += 1;
        }
        blocks.push(CommentBlock {
            lines: lines[start..idx].iter().map(|l| l.to_string()).collect(),
            anchor: lines.get(idx).map(|l| canonical(l)),
        });
    }

    blocks
}

fn find_anchor(lines: &[String], anchor: &str, from: usize) -> Option<usize> {
    let from = from.min(lines.len());
    lines[from..]
        .iter()
        .position(|l| canonical(l) == anchor)
        .map(|pos| pos + from)
        .or_else(|| lines[..from].iter().position(|l| canonical(l) == anchor))
}

/// Start of the block's comments when the non-blank lines right above `at`
/// already are those comments.
fn present_block_start(lines: &[String], at: usize, block: &CommentBlock) -> Option<usize> {
    let mut above = lines[..at].iter().enumerate().rev().filter(|(_, l)| !l.trim().is_empty());
    let mut start = at;
    for comment in block.comment_lines().rev() {
        let (idx, line) = above.next()?;
        if line.trim_end() != comment.trim_end() {
            return None;
        }
        start = idx;
    }
    Some(start)
}

pub fn reinject_comments(text: &str, baseline: &str) -> Reinjection {
    let mut lines: Vec<String> = text.lines().map(str::to_string).collect();
    let mut result = Reinjection::default();
    let mut cursor = 0;

    for block in comment_blocks(baseline) {
        let Some(anchor) = block.anchor.as_deref() else {
            tracing::debug!("Comment block '{}' has no following line.", block.label());
            result.missed.push(block.label());
            continue;
        };
        let Some(at) = find_anchor(&lines, anchor, cursor) else {
            tracing::debug!("Anchor line '{anchor}' for comment block '{}' not found.", block.label());
            result.missed.push(anchor.to_string());
            continue;
        };

        if let Some(start) = present_block_start(&lines, at, &block) {
            // Blank lines inside the block follow the baseline.
            lines.splice(start..at, block.lines.iter().cloned());
            result.already_present += 1;
            cursor = start + block.lines.len() + 1;
            continue;
        }

        let count = block.lines.len();
        lines.splice(at..at, block.lines.iter().cloned());
        result.inserted += 1;
        cursor = at + count + 1;
    }

    let mut out = lines.join("\n");
    if text.ends_with('\n') {
        out.push('\n');
    }
    result.text = out;
    result
}
