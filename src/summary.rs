//! Extractive summarization and version-delta description.
//!
//! Both functions are pure: identical input always yields identical output,
//! which keeps the summarizer and the version manager testable without any
//! store or clock in the loop.
//!
//! The summarizer is deliberately simple. It picks the first paragraph and
//! a strided sample of the remaining substantial paragraphs until a
//! character budget is reached. Budgets are expressed in tokens using the
//! same chars-per-token approximation the rest of the pipeline uses.

/// Approximate chars-per-token ratio.
pub const CHARS_PER_TOKEN: usize = 4;

/// Paragraphs at or below this length are skipped during selection.
const MIN_PARAGRAPH_CHARS: usize = 20;

/// Produce an extractive summary of `text` within `max_tokens`.
///
/// Splits on line boundaries into trimmed, non-empty paragraphs. Three or
/// fewer paragraphs are returned as the raw text truncated to the budget;
/// longer inputs keep the first paragraph and then walk the rest in strides
/// of `max(1, n / 4)`, keeping substantial paragraphs until the budget is
/// reached. A truncated accumulation is marked with a trailing `...`.
///
/// Empty input returns empty output.
pub fn summarize_extractive(text: &str, max_tokens: usize) -> String {
    if text.is_empty() {
        return String::new();
    }

    let budget = max_tokens * CHARS_PER_TOKEN;

    let paragraphs: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    // Too little structure to select from — return the raw text, capped.
    if paragraphs.len() <= 3 {
        return truncate_chars(text, budget);
    }

    let mut picked: Vec<&str> = vec![paragraphs[0]];
    let stride = (paragraphs.len() / 4).max(1);

    let mut i = stride;
    while i < paragraphs.len() {
        if char_len(paragraphs[i]) > MIN_PARAGRAPH_CHARS {
            picked.push(paragraphs[i]);
        }

        if joined_len(&picked) >= budget {
            break;
        }
        i += stride;
    }

    let assembled = picked.join("\n");
    if char_len(&assembled) > budget {
        let mut out = truncate_chars(&assembled, budget.saturating_sub(3));
        out.push_str("...");
        out
    } else {
        assembled
    }
}

/// Describe the difference between two versions of a document.
///
/// A length-based summary, not a content diff: it reports how many
/// characters were added or removed, or that the length is unchanged.
/// Total — never fails, for any pair of inputs.
pub fn describe_delta(old: &str, new: &str) -> String {
    let old_len = char_len(old);
    let new_len = char_len(new);

    if old_len > new_len {
        format!(
            "Change: removed {} characters. New version is shorter.",
            old_len - new_len
        )
    } else if new_len > old_len {
        format!(
            "Change: added {} characters. New version is longer.",
            new_len - old_len
        )
    } else {
        "Change: modified, no length change.".to_string()
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Length of `parts` once joined with single newlines.
fn joined_len(parts: &[&str]) -> usize {
    let chars: usize = parts.iter().map(|p| char_len(p)).sum();
    chars + parts.len().saturating_sub(1)
}

/// Truncate to at most `max_chars` Unicode scalars, on a char boundary.
fn truncate_chars(s: &str, max_chars: usize) -> String {
    if char_len(s) <= max_chars {
        s.to_string()
    } else {
        s.chars().take(max_chars).collect()
    }
}
