//! Sentence-bounded text chunking for synthesis.

/// Split `text` into chunks of at most `max_chars` characters.
///
/// Sentences (ended by `.`, `!`, `?` before whitespace, or by a newline) are
/// packed together while they fit. A sentence longer than the limit is split
/// between words, and a single word longer than the limit is cut. Runs of
/// whitespace collapse to one space.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut units = Vec::new();
    for sentence in sentences(text) {
        let words: Vec<&str> = sentence
            .split_whitespace()
            .flat_map(|word| hard_split(word, max_chars))
            .collect();
        units.extend(pack(words, max_chars));
    }
    pack(units.iter().map(String::as_str), max_chars)
}

fn sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        let boundary = match c {
            '\n' => true,
            '.' | '!' | '?' => chars.peek().map_or(true, |&(_, next)| next.is_whitespace()),
            _ => false,
        };
        if boundary {
            let end = i + c.len_utf8();
            push_trimmed(&mut out, &text[start..end]);
            start = end;
        }
    }
    push_trimmed(&mut out, &text[start..]);
    out
}

fn push_trimmed<'a>(out: &mut Vec<&'a str>, s: &'a str) {
    let s = s.trim();
    if !s.is_empty() {
        out.push(s);
    }
}

fn hard_split(word: &str, max_chars: usize) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut rest = word;
    while rest.chars().count() > max_chars {
        let cut = rest
            .char_indices()
            .nth(max_chars)
            .map_or(rest.len(), |(i, _)| i);
        let (head, tail) = rest.split_at(cut);
        parts.push(head);
        rest = tail;
    }
    if !rest.is_empty() {
        parts.push(rest);
    }
    parts
}

/// Greedily join items with single spaces without exceeding `max_chars`.
fn pack<'a>(items: impl IntoIterator<Item = &'a str>, max_chars: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut len = 0usize;
    for item in items {
        let n = item.chars().count();
        if len > 0 && len + 1 + n > max_chars {
            out.push(std::mem::take(&mut current));
            len = 0;
        }
        if len > 0 {
            current.push(' ');
            len += 1;
        }
        current.push_str(item);
        len += n;
    }
    if len > 0 {
        out.push(current);
    }
    out
}
