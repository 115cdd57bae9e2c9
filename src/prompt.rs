// Prompt template for instruction-tuned T5 checkpoints.

pub fn build_prompt(text: &str) -> String {
    format!("Summarize the following dialogue:\n\n{}\n\nSummary:", text)
}

/// Clamp encoded prompt ids to `max_len`, keeping a trailing EOS if the
/// encoding had one.
pub fn truncate_ids(ids: &[u32], max_len: usize, eos: u32) -> Vec<u32> {
    if ids.len() <= max_len {
        return ids.to_vec();
    }
    if ids.last() == Some(&eos) && max_len > 0 {
        let mut out = ids[..max_len - 1].to_vec();
        out.push(eos);
        out
    } else {
        ids[..max_len].to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_text_in_template() {
        let prompt = build_prompt("A: hi\nB: hello");
        assert!(prompt.starts_with("Summarize the following dialogue:\n\n"));
        assert!(prompt.contains("A: hi\nB: hello"));
        assert!(prompt.ends_with("\n\nSummary:"));
    }

    #[test]
    fn short_input_untouched() {
        assert_eq!(truncate_ids(&[5, 6, 1], 8, 1), vec![5, 6, 1]);
    }

    #[test]
    fn truncation_keeps_eos() {
        assert_eq!(truncate_ids(&[5, 6, 7, 8, 1], 3, 1), vec![5, 6, 1]);
    }

    #[test]
    fn truncation_without_eos() {
        assert_eq!(truncate_ids(&[5, 6, 7, 8], 2, 1), vec![5, 6]);
    }
}
