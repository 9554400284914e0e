//! Prompt templates for the rewrite and answer steps.
//!
//! Whitespace is part of the template and is kept exactly.

const STANDALONE_TEMPLATE: &str =
    "\n    For following user question convert it into a standalone question\n    {userQuestion}\n  ";

const ANSWER_TEMPLATE: &str = "\n    Answer the below question using the context.\n    Strictly use the context and answer in crisp and point to point.\n    <context>\n    {context}\n    </context>\n\n    question: {userQuestion}\n";

/// Prompt asking the model to turn `question` into a standalone question.
pub fn standalone_prompt(question: &str) -> String {
    STANDALONE_TEMPLATE.replace("{userQuestion}", question)
}

/// Prompt asking the model to answer `question` strictly from `context`.
pub fn answer_prompt(context: &str, question: &str) -> String {
    // Substitute the question first so braces inside the context survive.
    ANSWER_TEMPLATE
        .replace("{userQuestion}", question)
        .replacen("{context}", context, 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standalone_prompt_exact() {
        assert_eq!(
            standalone_prompt("what does the cat drink?"),
            "\n    For following user question convert it into a standalone question\n    what does the cat drink?\n  "
        );
    }

    #[test]
    fn test_answer_prompt_exact() {
        assert_eq!(
            answer_prompt("Cat drinks milk", "what does the cat drink?"),
            "\n    Answer the below question using the context.\n    Strictly use the context and answer in crisp and point to point.\n    <context>\n    Cat drinks milk\n    </context>\n\n    question: what does the cat drink?\n"
        );
    }

    #[test]
    fn test_context_placeholders_are_not_expanded() {
        let prompt = answer_prompt("literal {userQuestion}", "q");
        assert!(prompt.contains("<context>\n    literal {userQuestion}\n"));
        assert!(prompt.contains("question: q\n"));
    }
}
