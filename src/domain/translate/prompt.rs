//! User-message assembly for the translation call

use super::state::GapRecord;

/// Concatenate the content, optional context and gap hints into one prompt
pub fn build_translate_prompt(content: &str, context: Option<&str>, gaps: &[GapRecord]) -> String {
    let mut prompt = format!("Translate the following content:\n\n{}", content);

    if let Some(context) = context.filter(|c| !c.is_empty()) {
        prompt.push_str("\n\nAdditional context:\n");
        prompt.push_str(context);
    }

    if !gaps.is_empty() {
        prompt.push_str(
            "\n\nNote: the input may be missing the following information, \
             fill it in or flag it where appropriate:\n",
        );
        let bullets: Vec<String> = gaps
            .iter()
            .map(|gap| format!("- {}", gap.description))
            .collect();
        prompt.push_str(&bullets.join("\n"));
    }

    prompt
}
