//! Find / replace over plain text.
//!
//! All functions are pure: they take the document text and a [`SearchQuery`]
//! and return positions or new text. Offsets are byte offsets that always land
//! on char boundaries; stepping "one position" means stepping one char.

use super::text_ops::floor_char_boundary;

/// Upper bound on spans returned by [`match_spans`].
pub const MAX_HIGHLIGHTS: usize = 1000;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    pub pattern: String,
    pub case_sensitive: bool,
    pub whole_word: bool,
}

impl SearchQuery {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            case_sensitive: false,
            whole_word: false,
        }
    }

    pub fn case_sensitive(mut self, yes: bool) -> Self {
        self.case_sensitive = yes;
        self
    }

    pub fn whole_word(mut self, yes: bool) -> Self {
        self.whole_word = yes;
        self
    }
}

/// A match as a byte range `[start, start + len)` of the searched text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchSpan {
    pub start: usize,
    pub len: usize,
}

impl MatchSpan {
    pub fn end(&self) -> usize {
        self.start + self.len
    }
}

/// A span to paint, flagged when it coincides with the current selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Highlight {
    pub span: MatchSpan,
    pub current: bool,
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn chars_equal(a: char, b: char, case_sensitive: bool) -> bool {
    a == b || (!case_sensitive && a.to_lowercase().eq(b.to_lowercase()))
}

/// Byte length of the text matched by the pattern at `start`, ignoring word boundaries.
fn match_len_at(text: &str, start: usize, query: &SearchQuery) -> Option<usize> {
    let mut hay = text[start..].char_indices();
    for p in query.pattern.chars() {
        let (_, h) = hay.next()?;
        if !chars_equal(p, h, query.case_sensitive) {
            return None;
        }
    }
    Some(hay.next().map_or(text.len() - start, |(i, _)| i))
}

fn is_whole_word(text: &str, span: MatchSpan) -> bool {
    let left_ok = text[..span.start]
        .chars()
        .next_back()
        .is_none_or(|c| !is_word_char(c));
    let right_ok = text[span.end()..]
        .chars()
        .next()
        .is_none_or(|c| !is_word_char(c));
    left_ok && right_ok
}

fn match_at(text: &str, start: usize, query: &SearchQuery) -> Option<MatchSpan> {
    let len = match_len_at(text, start, query)?;
    let span = MatchSpan { start, len };
    if query.whole_word && !is_whole_word(text, span) {
        return None;
    }
    Some(span)
}

/// First valid match whose start is at or after `from`.
fn find_forward(text: &str, query: &SearchQuery, from: usize) -> Option<MatchSpan> {
    if query.pattern.is_empty() || from > text.len() {
        return None;
    }
    let from = floor_char_boundary(text, from);
    text[from..]
        .char_indices()
        .find_map(|(i, _)| match_at(text, from + i, query))
}

/// Last valid match lying entirely within `text[..end_limit]`.
fn find_backward(text: &str, query: &SearchQuery, end_limit: usize) -> Option<MatchSpan> {
    if query.pattern.is_empty() {
        return None;
    }
    let limit = floor_char_boundary(text, end_limit);
    text[..limit]
        .char_indices()
        .rev()
        .find_map(|(i, _)| match_at(text, i, query).filter(|m| m.end() <= limit))
}

/// Offset of the char after the one at `pos`.
fn step_forward(text: &str, pos: usize) -> usize {
    let pos = floor_char_boundary(text, pos);
    match text[pos..].chars().next() {
        Some(c) => pos + c.len_utf8(),
        None => pos + 1,
    }
}

/// Next match strictly after `from`, wrapping to the start of the text.
pub fn find_next_match(text: &str, query: &SearchQuery, from: usize) -> Option<MatchSpan> {
    if query.pattern.is_empty() {
        return None;
    }
    if let Some(m) = find_forward(text, query, step_forward(text, from)) {
        return Some(m);
    }
    if from > 0 {
        return find_forward(text, query, 0).filter(|m| m.start <= from);
    }
    None
}

pub fn find_next(text: &str, query: &SearchQuery, from: usize) -> Option<usize> {
    find_next_match(text, query, from).map(|m| m.start)
}

/// Previous match ending at or before `from`, wrapping to the last match.
///
/// A match the caret sits inside (or at the start of) is not "previous", so
/// from offset 0 the search always wraps.
pub fn find_previous_match(text: &str, query: &SearchQuery, from: usize) -> Option<MatchSpan> {
    if query.pattern.is_empty() {
        return None;
    }
    find_backward(text, query, from).or_else(|| find_backward(text, query, text.len()))
}

pub fn find_previous(text: &str, query: &SearchQuery, from: usize) -> Option<usize> {
    find_previous_match(text, query, from).map(|m| m.start)
}

/// Replace the first match at or after `from` (no wraparound).
///
/// Returns the new text and a caret placed right after the inserted text.
pub fn replace_one(
    text: &str,
    query: &SearchQuery,
    replacement: &str,
    from: usize,
) -> Option<(String, usize)> {
    let m = find_forward(text, query, from)?;
    let mut result = String::with_capacity(text.len() - m.len + replacement.len());
    result.push_str(&text[..m.start]);
    result.push_str(replacement);
    result.push_str(&text[m.end()..]);
    Some((result, m.start + replacement.len()))
}

/// Replace every non-overlapping match, scanning left to right.
///
/// Returns (new_text, count_of_replacements). Matches are taken from the
/// input text, so a replacement containing the pattern is not matched again.
pub fn replace_all(text: &str, query: &SearchQuery, replacement: &str) -> (String, usize) {
    if query.pattern.is_empty() {
        return (text.to_string(), 0);
    }

    let mut result = String::with_capacity(text.len());
    let mut count = 0;
    let mut copied = 0;

    while let Some(m) = find_forward(text, query, copied) {
        result.push_str(&text[copied..m.start]);
        result.push_str(replacement);
        copied = m.end();
        count += 1;
    }
    result.push_str(&text[copied..]);

    (result, count)
}

/// All non-overlapping matches, left to right, capped at [`MAX_HIGHLIGHTS`].
pub fn match_spans(text: &str, query: &SearchQuery) -> Vec<MatchSpan> {
    let mut spans = Vec::new();
    let mut pos = 0;
    while spans.len() < MAX_HIGHLIGHTS {
        let Some(m) = find_forward(text, query, pos) else {
            break;
        };
        pos = m.end();
        spans.push(m);
    }
    spans
}

/// Match spans for painting, with the one equal to `selection` marked current.
pub fn highlights(text: &str, query: &SearchQuery, selection: Option<MatchSpan>) -> Vec<Highlight> {
    match_spans(text, query)
        .into_iter()
        .map(|span| Highlight {
            span,
            current: selection == Some(span),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(pattern: &str) -> SearchQuery {
        SearchQuery::new(pattern)
    }

    #[test]
    fn test_find_next_skips_current_position() {
        let text = "cat dog cat mouse cat";
        assert_eq!(find_next(text, &q("cat"), 0), Some(8));
        assert_eq!(find_next(text, &q("cat"), 8), Some(18));
    }

    #[test]
    fn test_find_next_wraps_around() {
        let text = "cat dog cat mouse cat";
        assert_eq!(find_next(text, &q("cat"), 18), Some(0));
    }

    #[test]
    fn test_find_next_no_wrap_from_zero() {
        // The only match sits at the caret; wrapping is not attempted from 0
        assert_eq!(find_next("cat", &q("cat"), 0), None);
    }

    #[test]
    fn test_find_next_case_rules() {
        let text = "Hello world, hello Rust";
        assert_eq!(find_next(text, &q("HELLO"), 0), Some(13));
        assert_eq!(find_next(text, &q("Hello").case_sensitive(true), 0), None);
        assert_eq!(find_next(text, &q("Hello").case_sensitive(true), 5), Some(0));
    }

    #[test]
    fn test_find_next_whole_word() {
        let text = "concatenate cat scatter";
        let query = q("cat").whole_word(true);
        assert_eq!(find_next(text, &query, 0), Some(12));
        assert_eq!(find_next(text, &query, 12), Some(12));
        assert_eq!(match_spans(text, &query), vec![MatchSpan { start: 12, len: 3 }]);
    }

    #[test]
    fn test_whole_word_underscore_and_digits_are_word_chars() {
        let query = q("id").whole_word(true);
        assert_eq!(find_next("my_id id2 (id)", &query, 0), Some(11));
    }

    #[test]
    fn test_find_previous_simple() {
        let text = "cat dog cat mouse cat";
        assert_eq!(find_previous(text, &q("cat"), 18), Some(8));
        assert_eq!(find_previous(text, &q("cat"), 8), Some(0));
    }

    #[test]
    fn test_find_previous_wraps_to_end() {
        let text = "cat dog cat mouse cat";
        assert_eq!(find_previous(text, &q("cat"), 0), Some(18));
        assert_eq!(find_previous(text, &q("dog"), 2), Some(4));
    }

    #[test]
    fn test_find_previous_skips_match_under_caret() {
        let text = "cat dog cat mouse cat";
        // Caret inside the first match: nothing lies wholly before it
        assert_eq!(find_previous(text, &q("cat"), 2), Some(18));
        assert_eq!(find_previous(text, &q("cat"), 3), Some(0));
        assert_eq!(find_previous("cat", &q("cat"), 0), Some(0));
    }

    #[test]
    fn test_repeated_find_previous_cycles() {
        let text = "cat dog cat mouse cat";
        let query = q("cat");
        let mut caret = 0;
        let mut seen = Vec::new();
        for _ in 0..4 {
            caret = find_previous(text, &query, caret).unwrap();
            seen.push(caret);
        }
        assert_eq!(seen, vec![18, 8, 0, 18]);
    }

    #[test]
    fn test_next_then_previous_returns_to_start() {
        let text = "alpha beta alpha gamma alpha";
        let query = q("alpha");
        let mut caret = 0;
        let mut visited = 0;
        loop {
            let next = find_next(text, &query, caret).unwrap();
            if next <= caret {
                break;
            }
            assert_eq!(find_previous(text, &query, next), Some(caret));
            caret = next;
            visited += 1;
        }
        assert_eq!(visited, 2);
    }

    #[test]
    fn test_find_empty_pattern() {
        assert_eq!(find_next("hello", &q(""), 0), None);
        assert_eq!(find_previous("hello", &q(""), 3), None);
    }

    #[test]
    fn test_find_unicode_offsets() {
        let text = "Hello 世界 world 世界";
        assert_eq!(find_next(text, &q("世界"), 0), Some(6));
        assert_eq!(find_next(text, &q("世界"), 6), Some(19));
        assert_eq!(find_previous(text, &q("世界"), 19), Some(6));
    }

    #[test]
    fn test_find_from_mid_char_offset() {
        let text = "世x世";
        // Offset 1 is inside the first char and steps to the 'x'
        assert_eq!(find_next(text, &q("世"), 1), Some(4));
    }

    #[test]
    fn test_replace_one_at_or_after_caret() {
        let text = "cat dog cat";
        let (new_text, caret) = replace_one(text, &q("cat"), "lion", 0).unwrap();
        assert_eq!(new_text, "lion dog cat");
        assert_eq!(caret, 4);
        let (new_text, caret) = replace_one(&new_text, &q("cat"), "lion", caret).unwrap();
        assert_eq!(new_text, "lion dog lion");
        assert_eq!(caret, 13);
    }

    #[test]
    fn test_replace_one_does_not_wrap() {
        assert_eq!(replace_one("cat dog", &q("cat"), "x", 1), None);
    }

    #[test]
    fn test_replace_all_simple() {
        let (result, count) = replace_all("cat cat cat", &q("cat"), "dog");
        assert_eq!(result, "dog dog dog");
        assert_eq!(count, 3);
    }

    #[test]
    fn test_replace_all_case_sensitive() {
        let (result, count) = replace_all("Cat cat CAT", &q("cat").case_sensitive(true), "dog");
        assert_eq!(result, "Cat dog CAT");
        assert_eq!(count, 1);
    }

    #[test]
    fn test_replace_all_case_insensitive() {
        let (result, count) = replace_all("Cat cat CAT", &q("cat"), "dog");
        assert_eq!(result, "dog dog dog");
        assert_eq!(count, 3);
    }

    #[test]
    fn test_replace_all_whole_word() {
        let (result, count) = replace_all("cat concatenate cat", &q("cat").whole_word(true), "dog");
        assert_eq!(result, "dog concatenate dog");
        assert_eq!(count, 2);
    }

    #[test]
    fn test_replace_all_replacement_contains_pattern() {
        let (result, count) = replace_all("a a", &q("a"), "aa");
        assert_eq!(result, "aa aa");
        assert_eq!(count, 2);
    }

    #[test]
    fn test_replace_all_adjacent_matches() {
        let (result, count) = replace_all("catcatcat!", &q("cat"), "-");
        assert_eq!(result, "---!");
        assert_eq!(count, 3);

        let (result, count) = replace_all("ab 世界ab", &q("AB"), "世");
        assert_eq!(result, "世 世界世");
        assert_eq!(count, 2);
    }

    #[test]
    fn test_replace_all_empty_pattern_is_noop() {
        let (result, count) = replace_all("hello world", &q(""), "X");
        assert_eq!(result, "hello world");
        assert_eq!(count, 0);
    }

    #[test]
    fn test_replace_all_empty_replacement() {
        let (result, count) = replace_all("hello world hello", &q("hello"), "");
        assert_eq!(result, " world ");
        assert_eq!(count, 2);
    }

    #[test]
    fn test_replace_all_saturates() {
        let (once, count) = replace_all("one two one two", &q("one"), "three");
        assert_eq!(count, 2);
        let (twice, count) = replace_all(&once, &q("one"), "three");
        assert_eq!(count, 0);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_match_spans_non_overlapping() {
        let spans = match_spans("aaaa", &q("aa"));
        assert_eq!(
            spans,
            vec![MatchSpan { start: 0, len: 2 }, MatchSpan { start: 2, len: 2 }]
        );
    }

    #[test]
    fn test_match_spans_capped() {
        let text = "x".repeat(MAX_HIGHLIGHTS + 50);
        assert_eq!(match_spans(&text, &q("x")).len(), MAX_HIGHLIGHTS);
    }

    #[test]
    fn test_highlights_mark_current_selection() {
        let text = "cat dog cat";
        let selection = Some(MatchSpan { start: 8, len: 3 });
        let hl = highlights(text, &q("cat"), selection);
        assert_eq!(hl.len(), 2);
        assert!(!hl[0].current);
        assert!(hl[1].current);
    }
}
