use chrono::{DateTime, Utc};

/// One saved revision of the sermon text. Display-only; the list it lives
/// in owns identity and order.
#[derive(Debug, Clone)]
pub struct SermonVersion {
    pub id: u64,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub change_description: Option<String>,
}

/// Saved revisions, newest first. Plain list operations only: no merging,
/// no conflict handling, no storage.
#[derive(Debug, Default)]
pub struct VersionList {
    versions: Vec<SermonVersion>,
    next_id: u64,
}

impl VersionList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the given content as the newest version.
    pub fn record(&mut self, content: &str, change_description: Option<String>) -> u64 {
        self.next_id += 1;
        self.versions.insert(
            0,
            SermonVersion {
                id: self.next_id,
                content: content.to_string(),
                created_at: Utc::now(),
                change_description,
            },
        );
        self.next_id
    }

    /// Display label for the version at `index`: the newest entry in a
    /// list of n shows "vn", the oldest shows "v1".
    pub fn label(&self, index: usize) -> String {
        format!("v{}", self.versions.len().saturating_sub(index))
    }

    pub fn get(&self, index: usize) -> Option<&SermonVersion> {
        self.versions.get(index)
    }

    pub fn remove(&mut self, index: usize) -> Option<SermonVersion> {
        if index < self.versions.len() {
            Some(self.versions.remove(index))
        } else {
            None
        }
    }

    pub fn versions(&self) -> &[SermonVersion] {
        &self.versions
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

pub const DEFAULT_TAG_SUGGESTIONS: &[&str] = &[
    "faith",
    "grace",
    "hope",
    "love",
    "salvation",
    "prayer",
    "discipleship",
    "forgiveness",
];

/// The sermon's tags: lowercase, trimmed, unique within this list only.
#[derive(Debug, Default)]
pub struct TagSet {
    tags: Vec<String>,
}

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tag. Whitespace is trimmed and the tag lowercased; empty input
    /// and duplicates leave the list unchanged and return false.
    pub fn add(&mut self, raw: &str) -> bool {
        let tag = raw.trim().to_lowercase();
        if tag.is_empty() || self.tags.contains(&tag) {
            return false;
        }
        self.tags.push(tag);
        true
    }

    /// Remove a tag. Removing one that is not present is a no-op.
    pub fn remove(&mut self, raw: &str) -> bool {
        let tag = raw.trim().to_lowercase();
        let before = self.tags.len();
        self.tags.retain(|t| *t != tag);
        self.tags.len() != before
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// The suggestion pool minus tags already present.
    pub fn suggestions<'a>(&self, pool: &'a [String]) -> Vec<&'a str> {
        pool.iter()
            .map(|s| s.as_str())
            .filter(|s| !self.tags.iter().any(|t| t == s))
            .collect()
    }
}

fn byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// The in-memory sermon text: a line buffer with a character cursor.
/// Persistence is someone else's job; saving hands the joined content out
/// unmodified.
#[derive(Debug)]
pub struct EditorBuffer {
    lines: Vec<String>,
    cursor_row: usize,
    cursor_col: usize,
    dirty: bool,
}

impl Default for EditorBuffer {
    fn default() -> Self {
        Self {
            lines: vec![String::new()],
            cursor_row: 0,
            cursor_col: 0,
            dirty: false,
        }
    }
}

impl EditorBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content(&self) -> String {
        self.lines.join("\n")
    }

    /// Replace the buffer with externally supplied content. Last write
    /// wins; the cursor moves to the end and the buffer is considered
    /// clean.
    pub fn set_content(&mut self, content: &str) {
        self.lines = if content.is_empty() {
            vec![String::new()]
        } else {
            content.split('\n').map(|l| l.to_string()).collect()
        };
        self.cursor_row = self.lines.len() - 1;
        self.cursor_col = self.lines[self.cursor_row].chars().count();
        self.dirty = false;
    }

    /// Append a block of text (an insight, a quotation) after the current
    /// content, separated by a blank line.
    pub fn append_block(&mut self, block: &str) {
        if self.lines.len() == 1 && self.lines[0].is_empty() {
            self.lines.clear();
        } else {
            self.lines.push(String::new());
        }
        for line in block.lines() {
            self.lines.push(line.to_string());
        }
        if self.lines.is_empty() {
            self.lines.push(String::new());
        }
        self.cursor_row = self.lines.len() - 1;
        self.cursor_col = self.lines[self.cursor_row].chars().count();
        self.dirty = true;
    }

    pub fn insert_char(&mut self, c: char) {
        let line = &mut self.lines[self.cursor_row];
        let pos = byte_index(line, self.cursor_col);
        line.insert(pos, c);
        self.cursor_col += 1;
        self.dirty = true;
    }

    pub fn insert_newline(&mut self) {
        let line = &mut self.lines[self.cursor_row];
        let pos = byte_index(line, self.cursor_col);
        let rest = line.split_off(pos);
        self.lines.insert(self.cursor_row + 1, rest);
        self.cursor_row += 1;
        self.cursor_col = 0;
        self.dirty = true;
    }

    pub fn backspace(&mut self) {
        if self.cursor_col > 0 {
            self.cursor_col -= 1;
            let line = &mut self.lines[self.cursor_row];
            let pos = byte_index(line, self.cursor_col);
            line.remove(pos);
            self.dirty = true;
        } else if self.cursor_row > 0 {
            let removed = self.lines.remove(self.cursor_row);
            self.cursor_row -= 1;
            self.cursor_col = self.lines[self.cursor_row].chars().count();
            self.lines[self.cursor_row].push_str(&removed);
            self.dirty = true;
        }
    }

    pub fn delete(&mut self) {
        let line_chars = self.lines[self.cursor_row].chars().count();
        if self.cursor_col < line_chars {
            let line = &mut self.lines[self.cursor_row];
            let pos = byte_index(line, self.cursor_col);
            line.remove(pos);
            self.dirty = true;
        } else if self.cursor_row + 1 < self.lines.len() {
            let next = self.lines.remove(self.cursor_row + 1);
            self.lines[self.cursor_row].push_str(&next);
            self.dirty = true;
        }
    }

    pub fn move_left(&mut self) {
        if self.cursor_col > 0 {
            self.cursor_col -= 1;
        } else if self.cursor_row > 0 {
            self.cursor_row -= 1;
            self.cursor_col = self.lines[self.cursor_row].chars().count();
        }
    }

    pub fn move_right(&mut self) {
        let line_chars = self.lines[self.cursor_row].chars().count();
        if self.cursor_col < line_chars {
            self.cursor_col += 1;
        } else if self.cursor_row + 1 < self.lines.len() {
            self.cursor_row += 1;
            self.cursor_col = 0;
        }
    }

    pub fn move_up(&mut self) {
        if self.cursor_row > 0 {
            self.cursor_row -= 1;
            self.clamp_col();
        }
    }

    pub fn move_down(&mut self) {
        if self.cursor_row + 1 < self.lines.len() {
            self.cursor_row += 1;
            self.clamp_col();
        }
    }

    pub fn move_line_start(&mut self) {
        self.cursor_col = 0;
    }

    pub fn move_line_end(&mut self) {
        self.cursor_col = self.lines[self.cursor_row].chars().count();
    }

    fn clamp_col(&mut self) {
        let line_chars = self.lines[self.cursor_row].chars().count();
        self.cursor_col = self.cursor_col.min(line_chars);
    }

    pub fn cursor(&self) -> (usize, usize) {
        (self.cursor_row, self.cursor_col)
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn word_count(&self) -> usize {
        self.lines
            .iter()
            .map(|l| l.split_whitespace().count())
            .sum()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_saved(&mut self) {
        self.dirty = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_add_normalizes() {
        let mut tags = TagSet::new();
        assert!(tags.add("  Grace "));
        assert_eq!(tags.tags(), ["grace"]);
    }

    #[test]
    fn test_tag_duplicate_leaves_list_unchanged() {
        let mut tags = TagSet::new();
        tags.add("grace");
        assert!(!tags.add("GRACE"));
        assert!(!tags.add(" grace "));
        assert_eq!(tags.tags(), ["grace"]);
    }

    #[test]
    fn test_tag_empty_rejected() {
        let mut tags = TagSet::new();
        assert!(!tags.add("   "));
        assert!(tags.tags().is_empty());
    }

    #[test]
    fn test_tag_remove_absent_is_noop() {
        let mut tags = TagSet::new();
        tags.add("hope");
        assert!(!tags.remove("faith"));
        assert_eq!(tags.tags(), ["hope"]);
        assert!(tags.remove("Hope"));
        assert!(tags.tags().is_empty());
    }

    #[test]
    fn test_suggestions_exclude_present_tags() {
        let mut tags = TagSet::new();
        tags.add("faith");
        let pool: Vec<String> = vec!["faith".to_string(), "grace".to_string()];
        assert_eq!(tags.suggestions(&pool), ["grace"]);
    }

    #[test]
    fn test_versions_are_newest_first_and_labelled_descending() {
        let mut versions = VersionList::new();
        versions.record("first draft", None);
        versions.record("second draft", Some("tightened intro".to_string()));
        versions.record("third draft", None);
        assert_eq!(versions.len(), 3);
        assert_eq!(versions.get(0).map(|v| v.content.as_str()), Some("third draft"));
        assert_eq!(versions.label(0), "v3");
        assert_eq!(versions.label(2), "v1");
    }

    #[test]
    fn test_version_remove_out_of_range() {
        let mut versions = VersionList::new();
        versions.record("only", None);
        assert!(versions.remove(5).is_none());
        assert_eq!(versions.remove(0).map(|v| v.content), Some("only".to_string()));
        assert!(versions.is_empty());
    }

    #[test]
    fn test_version_ids_survive_deletion() {
        let mut versions = VersionList::new();
        let first = versions.record("a", None);
        versions.remove(0);
        let second = versions.record("b", None);
        assert_ne!(first, second);
    }

    #[test]
    fn test_editor_insert_and_content() {
        let mut buffer = EditorBuffer::new();
        for c in "amen".chars() {
            buffer.insert_char(c);
        }
        buffer.insert_newline();
        buffer.insert_char('x');
        assert_eq!(buffer.content(), "amen\nx");
        assert!(buffer.is_dirty());
    }

    #[test]
    fn test_editor_backspace_joins_lines() {
        let mut buffer = EditorBuffer::new();
        buffer.set_content("one\ntwo");
        buffer.cursor_row = 1;
        buffer.cursor_col = 0;
        buffer.backspace();
        assert_eq!(buffer.content(), "onetwo");
    }

    #[test]
    fn test_editor_set_content_is_clean_sync() {
        let mut buffer = EditorBuffer::new();
        buffer.insert_char('x');
        buffer.set_content("restored text");
        assert_eq!(buffer.content(), "restored text");
        assert!(!buffer.is_dirty());
        assert_eq!(buffer.cursor(), (0, 13));
    }

    #[test]
    fn test_editor_append_block_separates_with_blank_line() {
        let mut buffer = EditorBuffer::new();
        buffer.set_content("notes so far");
        buffer.append_block("## Context\ndetail");
        assert_eq!(buffer.content(), "notes so far\n\n## Context\ndetail");
    }

    #[test]
    fn test_editor_append_block_into_empty_buffer() {
        let mut buffer = EditorBuffer::new();
        buffer.append_block("opening");
        assert_eq!(buffer.content(), "opening");
    }

    #[test]
    fn test_editor_word_count() {
        let mut buffer = EditorBuffer::new();
        buffer.set_content("in the beginning\nwas the Word");
        assert_eq!(buffer.word_count(), 6);
    }

    #[test]
    fn test_editor_unicode_cursor_ops() {
        let mut buffer = EditorBuffer::new();
        for c in "ἀγάπη".chars() {
            buffer.insert_char(c);
        }
        buffer.backspace();
        assert_eq!(buffer.content(), "ἀγάπ");
    }
}
