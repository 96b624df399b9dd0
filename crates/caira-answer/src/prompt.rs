//! System and user prompts for incident resolution.

use std::fmt;
use std::str::FromStr;

use crate::llm::{ChatMessage, Role};

/// Standard system prompt: strict grounding plus a fixed response layout.
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are C-AIRA (Context-Aware Incident Response Assistant), an expert IT support assistant specializing in enterprise incident resolution.

STRICT OPERATIONAL RULES:
1. Base ALL answers ONLY on the provided context documents
2. If the context doesn't contain relevant information, clearly state: \"I don't have enough information in the knowledge base to answer this question.\"
3. Never speculate, assume, or add information not present in the context
4. Provide clear, step-by-step remediation instructions when available
5. Always cite the source document for each recommendation
6. Use professional, clear language appropriate for IT professionals

RESPONSE FORMAT:
When providing incident resolution guidance, structure your response as follows:

1. **Incident Summary**: Brief description of the issue based on the query
2. **Root Cause** (if available in context): Explain what's causing the problem
3. **Resolution Steps**: Numbered, actionable steps to resolve the issue
4. **Additional Notes**: Any warnings, prerequisites, or follow-up actions
5. **Sources**: List all source documents referenced

TONE AND STYLE:
- Professional and concise
- Action-oriented
- Technically accurate
- Empathetic to the urgency of incidents
- Clear and unambiguous

Remember: Accuracy is more important than completeness. If you're unsure, say so.";

/// Short system prompt for quick answers.
pub const CONCISE_SYSTEM_PROMPT: &str = "\
You are C-AIRA, an IT incident response assistant. Provide concise, actionable solutions based strictly on the provided context. If information is not in the context, say so. Always cite sources.";

/// Long-form system prompt with root cause and prevention sections.
pub const DETAILED_SYSTEM_PROMPT: &str = "\
You are C-AIRA (Context-Aware Incident Response Assistant), a senior-level IT support specialist with expertise in troubleshooting complex enterprise systems.

Your role is to help IT teams resolve operational incidents by:
- Analyzing incident descriptions and log data
- Identifying root causes from historical patterns
- Providing detailed, step-by-step resolution procedures
- Recommending preventive measures

CRITICAL CONSTRAINTS:
- Only use information from the provided context documents
- Never hallucinate or invent solutions
- If context is insufficient, explicitly request more information
- Cite specific source documents for every recommendation
- Prioritize safety and data integrity in all guidance

RESPONSE STRUCTURE:
1. Incident Classification
2. Root Cause Analysis
3. Immediate Actions (if urgent)
4. Detailed Resolution Steps
5. Verification Procedures
6. Prevention Recommendations
7. Source References

Maintain a professional, calm tone even for critical incidents.";

/// Which system prompt to use.
///
/// # Examples
///
/// ```
/// use caira_answer::prompt::PromptVariant;
///
/// let variant: PromptVariant = "concise".parse().unwrap();
/// assert_eq!(variant, PromptVariant::Concise);
/// assert!(variant.system_prompt().contains("concise, actionable"));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PromptVariant {
    /// Structured incident response.
    #[default]
    Default,
    /// One-paragraph answers.
    Concise,
    /// Full root-cause write-up.
    Detailed,
}

impl PromptVariant {
    /// The system prompt text for this variant.
    pub fn system_prompt(self) -> &'static str {
        match self {
            PromptVariant::Default => DEFAULT_SYSTEM_PROMPT,
            PromptVariant::Concise => CONCISE_SYSTEM_PROMPT,
            PromptVariant::Detailed => DETAILED_SYSTEM_PROMPT,
        }
    }
}

impl fmt::Display for PromptVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromptVariant::Default => write!(f, "default"),
            PromptVariant::Concise => write!(f, "concise"),
            PromptVariant::Detailed => write!(f, "detailed"),
        }
    }
}

impl FromStr for PromptVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "default" => Ok(PromptVariant::Default),
            "concise" => Ok(PromptVariant::Concise),
            "detailed" => Ok(PromptVariant::Detailed),
            other => Err(format!(
                "unknown prompt variant: {other} (expected default, concise or detailed)"
            )),
        }
    }
}

/// Fill the user prompt template with retrieved context and the query.
pub fn user_prompt(query: &str, context: &str) -> String {
    format!(
        "Context Information:\n{context}\n\n\
         User Query:\n{query}\n\n\
         Please provide a detailed incident resolution response based ONLY on the context \
         information above. Follow the response format specified in your system instructions."
    )
}

/// System and user messages for one grounded question.
///
/// # Examples
///
/// ```
/// use caira_answer::llm::Role;
/// use caira_answer::prompt::{build_messages, PromptVariant};
///
/// let messages = build_messages("db timeouts", "[Document 1] ...", PromptVariant::Default);
/// assert_eq!(messages.len(), 2);
/// assert_eq!(messages[0].role, Role::System);
/// assert!(messages[1].content.contains("db timeouts"));
/// ```
pub fn build_messages(query: &str, context: &str, variant: PromptVariant) -> Vec<ChatMessage> {
    vec![
        ChatMessage {
            role: Role::System,
            content: variant.system_prompt().to_string(),
        },
        ChatMessage {
            role: Role::User,
            content: user_prompt(query, context),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_prompt_places_context_before_query() {
        let prompt = user_prompt("Why is checkout failing?", "cert expired on ingress");
        let ctx = prompt.find("cert expired on ingress").unwrap();
        let query = prompt.find("Why is checkout failing?").unwrap();
        assert!(prompt.starts_with("Context Information:\n"));
        assert!(ctx < query);
        assert!(prompt.contains("\n\nUser Query:\n"));
        assert!(prompt.ends_with("specified in your system instructions."));
    }

    #[test]
    fn variants_select_distinct_prompts() {
        let prompts = [
            PromptVariant::Default.system_prompt(),
            PromptVariant::Concise.system_prompt(),
            PromptVariant::Detailed.system_prompt(),
        ];
        assert!(prompts[0].contains("STRICT OPERATIONAL RULES"));
        assert!(prompts[2].contains("RESPONSE STRUCTURE"));
        assert_ne!(prompts[0], prompts[1]);
        assert_ne!(prompts[1], prompts[2]);
    }

    #[test]
    fn variant_parses_and_displays() {
        for v in [
            PromptVariant::Default,
            PromptVariant::Concise,
            PromptVariant::Detailed,
        ] {
            assert_eq!(v.to_string().parse::<PromptVariant>().unwrap(), v);
        }
        assert_eq!("DETAILED".parse::<PromptVariant>().unwrap(), PromptVariant::Detailed);
        assert!("verbose".parse::<PromptVariant>().is_err());
    }

    #[test]
    fn messages_use_selected_variant() {
        let messages = build_messages("q", "c", PromptVariant::Concise);
        assert_eq!(messages[0].content, CONCISE_SYSTEM_PROMPT);
        assert_eq!(messages[1].role, Role::User);
    }
}
