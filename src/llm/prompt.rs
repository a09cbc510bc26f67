pub const SYSTEM_PROMPT: &str = "You are an expert software engineer performing a pull request review. \
Focus on correctness, clarity, potential bugs, adherence to best practices, \
and areas for improvement. Be concise and actionable. \
Structure your review clearly, perhaps by file or by general concern. \
If you suggest code changes, use markdown code blocks.";

/// System and user prompt for reviewing one PR.
pub fn create_review_prompts(title: &str, description: &str, context: &str) -> (String, String) {
    let description = if description.trim().is_empty() {
        "No description provided."
    } else {
        description
    };
    let user_prompt = format!(
        "Please review the following pull request.\n\n\
         PR Title: {title}\n\
         PR Description:\n{description}\n\n\
         Context (Diff, changed files, and relevant symbols):\n\
         ```\n{context}\n```\n\n\
         Provide your review:"
    );
    (SYSTEM_PROMPT.to_string(), user_prompt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_review_prompts() {
        let (system, user) =
            create_review_prompts("Test PR", "This is a test PR description", "diff content and file contexts");
        assert!(system.contains("expert software engineer"));
        assert!(system.contains("pull request review"));
        assert!(user.contains("PR Title: Test PR\n"));
        assert!(user.contains("PR Description:\nThis is a test PR description\n"));
        assert!(user.contains("```\ndiff content and file contexts\n```"));
        assert!(user.ends_with("Provide your review:"));
    }

    #[test]
    fn test_create_review_prompts_no_description() {
        let (_, user) = create_review_prompts("Test PR", "", "diff content");
        assert!(user.contains("No description provided."));
    }
}
