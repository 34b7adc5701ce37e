//! Mapping generated text onto a dataset's candidate labels.
//!
//! Generative models answer classification prompts in free text ("Positiv.",
//! "the answer is b"). When the backend reports per-token log-probabilities we
//! read the label off the most likely token that starts a candidate label;
//! otherwise we fall back to the label closest to the text by edit distance.

use crate::model::GeneratedOutput;

/// Pick the candidate label the output most likely means.
///
/// Returns the output text unchanged when there are no candidate labels.
pub fn extract_label(output: &GeneratedOutput, labels: &[String]) -> String {
    if labels.is_empty() {
        return output.sequence.trim().to_string();
    }

    if let Some(label) = output
        .scores
        .as_deref()
        .and_then(|scores| label_from_scores(scores, labels))
    {
        return label;
    }

    closest_label(&output.sequence, labels)
}

/// Label whose prefix is the most likely token at the first position that has one.
fn label_from_scores(scores: &[Vec<(String, f64)>], labels: &[String]) -> Option<String> {
    let normalized_labels: Vec<String> = labels.iter().map(|l| normalize(l)).collect();

    for alternatives in scores {
        let mut best: Option<(usize, f64)> = None;
        for (token, logprob) in alternatives {
            let token = normalize(token);
            if token.is_empty() {
                continue;
            }
            let Some(label_idx) = normalized_labels
                .iter()
                .position(|label| label.starts_with(&token))
            else {
                continue;
            };
            match best {
                Some((_, best_logprob)) if best_logprob >= *logprob => {}
                _ => best = Some((label_idx, *logprob)),
            }
        }
        if let Some((label_idx, _)) = best {
            return Some(labels[label_idx].clone());
        }
    }
    None
}

/// Label with the smallest edit distance to `text`; ties go to the earliest label.
pub fn closest_label(text: &str, labels: &[String]) -> String {
    let text = normalize(text);
    let mut best_idx = 0;
    let mut best_distance = usize::MAX;
    for (idx, label) in labels.iter().enumerate() {
        let distance = levenshtein(&text, &normalize(label));
        if distance < best_distance {
            best_idx = idx;
            best_distance = distance;
        }
    }
    labels.get(best_idx).cloned().unwrap_or_default()
}

fn normalize(text: &str) -> String {
    text.trim()
        .trim_matches(|c: char| c.is_ascii_punctuation())
        .trim()
        .to_lowercase()
}

/// Character-level Levenshtein distance
pub fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b_chars.len()).collect();
    let mut current = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != *cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b_chars.len()]
}
