//! Sentence Splitter (spec component B). Segments assistant text into
//! speech-sized chunks, aware of decimals and a handful of dotted
//! abbreviations so `3.14` and `U.S.A.` don't fracture mid-utterance.

/// Segments shorter than this (in chars) are merged into a neighbor.
pub const MIN_SEGMENT_LEN: usize = 5;

const ABBREVIATIONS: &[&str] = &["Dr", "Mr", "Mrs", "Ms", "Prof", "Jr", "Sr", "St"];

fn is_full_width_terminator(c: char) -> bool {
    matches!(c, '。' | '！' | '？')
}

/// Byte offsets (exclusive-end) of every unsuppressed sentence terminator in `text`.
fn find_split_points(text: &str) -> Vec<usize> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut points = Vec::new();

    for (i, &(byte_idx, c)) in chars.iter().enumerate() {
        let end = byte_idx + c.len_utf8();
        if is_full_width_terminator(c) {
            points.push(end);
            continue;
        }
        match c {
            '!' | '?' => points.push(end),
            '.' => {
                let prev = if i > 0 { Some(chars[i - 1].1) } else { None };
                let next = if i + 1 < chars.len() { Some(chars[i + 1].1) } else { None };

                if let (Some(p), Some(n)) = (prev, next) {
                    if p.is_ascii_digit() && n.is_ascii_digit() {
                        continue; // decimal: 3.14
                    }
                }

                if is_suppressed_abbreviation(&chars, i) {
                    continue;
                }

                points.push(end);
            }
            _ => {}
        }
    }

    points
}

/// True when the `.` at `chars[dot_idx]` closes a dotted abbreviation: a
/// single capital letter (`U.`, `S.`, `A.`) or a known title (`Dr.`).
fn is_suppressed_abbreviation(chars: &[(usize, char)], dot_idx: usize) -> bool {
    let mut start = dot_idx;
    while start > 0 && chars[start - 1].1.is_alphabetic() {
        start -= 1;
    }
    if start == dot_idx {
        return false;
    }
    let token: String = chars[start..dot_idx].iter().map(|&(_, c)| c).collect();

    if token.chars().count() == 1 && token.chars().next().unwrap().is_ascii_uppercase() {
        return true;
    }
    ABBREVIATIONS.contains(&token.as_str())
}

/// Merge any segment shorter than [`MIN_SEGMENT_LEN`] into a neighbor,
/// preferring the previous segment, falling back to the next.
fn merge_short_segments(segments: Vec<String>) -> Vec<String> {
    let mut merged: Vec<String> = Vec::new();
    for seg in segments {
        if seg.chars().count() < MIN_SEGMENT_LEN && !merged.is_empty() {
            merged.last_mut().unwrap().push_str(&seg);
        } else {
            merged.push(seg);
        }
    }
    if merged.len() >= 2 && merged[0].chars().count() < MIN_SEGMENT_LEN {
        let first = merged.remove(0);
        merged[0] = format!("{first}{}", merged[0]);
    }
    merged
}

/// Split `text` into ordered, non-empty speech segments.
pub fn split_sentences(text: &str) -> Vec<String> {
    let points = find_split_points(text);
    let mut segments = Vec::new();
    let mut start = 0;
    for end in points {
        let raw = text[start..end].trim();
        if !raw.is_empty() {
            segments.push(raw.to_string());
        }
        start = end;
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        segments.push(tail.to_string());
    }
    merge_short_segments(segments)
}

/// Extract the longest complete-sentence prefix of a streaming buffer.
/// Returns `(complete, rest)` — `rest` stays buffered for the next chunk.
pub fn extract_complete_sentence_prefix(buffer: &str) -> (String, String) {
    let points = find_split_points(buffer);
    match points.last() {
        Some(&end) => (buffer[..end].to_string(), buffer[end..].to_string()),
        None => (String::new(), buffer.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_does_not_split() {
        assert_eq!(split_sentences("3.14 is pi."), vec!["3.14 is pi."]);
    }

    #[test]
    fn dotted_abbreviation_chain_does_not_split() {
        assert_eq!(split_sentences("U.S.A. today."), vec!["U.S.A. today."]);
    }

    #[test]
    fn named_abbreviation_does_not_split() {
        assert_eq!(split_sentences("Dr. Smith called."), vec!["Dr. Smith called."]);
    }

    #[test]
    fn short_leading_segment_merges_forward() {
        assert_eq!(split_sentences("123. next."), vec!["123.next."]);
    }

    #[test]
    fn multiple_sentences_split_on_terminators() {
        assert_eq!(
            split_sentences("こんにちは。よろしくね。"),
            vec!["こんにちは。", "よろしくね。"]
        );
    }

    #[test]
    fn ascii_bang_and_question_always_split() {
        assert_eq!(
            split_sentences("Wait! Really? Yes indeed."),
            vec!["Wait!", "Really?", "Yes indeed."]
        );
    }

    #[test]
    fn extract_prefix_keeps_incomplete_tail_buffered() {
        let (complete, rest) = extract_complete_sentence_prefix("こんにちは。よろしく");
        assert_eq!(complete, "こんにちは。");
        assert_eq!(rest, "よろしく");
    }

    #[test]
    fn extract_prefix_returns_empty_when_no_terminator() {
        let (complete, rest) = extract_complete_sentence_prefix("まだ途中");
        assert_eq!(complete, "");
        assert_eq!(rest, "まだ途中");
    }
}
