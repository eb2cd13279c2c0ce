//! Prompt construction for the medical assistant

/// Structured answer layout the model is asked to fill in
pub const MEDICAL_QA_TEMPLATE: &str = r#"🏥 **Brief Answer:**
{Short summary of the condition or topic — 2–3 clear, concise sentences summarizing what it is and why it's important. Tailor based on user query.}

📋 **Key Points:**

• **Definition & How It Starts:**  
  {Explain what it is, how it originates, and basic mechanisms involved. Use layman-friendly terms.}

• **Types or Variants (if applicable):**  
  - {Type 1}: {Short description}  
  - {Type 2}: {Short description}  
  - {Any less common variants}

• **Symptoms or Signs:**  
  - {Symptom 1}  
  - {Symptom 2}  
  - {Symptom 3}  
  - {Clarify if symptoms are early/late or variable}

• **Risk Factors or Causes:**  
  - *Uncontrollable*: {E.g., age, genetics}  
  - *Lifestyle-related*: {E.g., diet, smoking, alcohol}  
  - *Environmental or hormonal triggers* (if relevant)

• **Diagnosis & Detection:**  
  - {Common tests or procedures}  
  - {Any recommended age or risk-based screening}  
  - {Mention if diagnosis is clinical vs imaging vs lab-based}

• **Treatment Options (if applicable):**  
  - *Local Treatments*: {e.g., surgery, radiation}  
  - *Systemic Treatments*: {e.g., medication, therapy}  
  - *Depends on*: {e.g., stage, subtype, health status}

⚠️ **Important Notes:**
• {When to see a doctor — red flags, worsening symptoms, family history}  
• {Preventive tips or early action recommendations if relevant}

🔍 **Sources:**
{e.g., Mayo Clinic, WHO, CDC, NHS, peer-reviewed studies, etc. — keep it short but credible}"#;

const DETAIL_KEYWORDS: &[&str] = &[
    "detail",
    "explain",
    "elaborate",
    "comprehensive",
    "thorough",
    "in-depth",
];
const LIST_KEYWORDS: &[&str] = &[
    "list",
    "what are",
    "types of",
    "kinds of",
    "ways to",
    "steps",
    "methods",
];
const DEFINITION_KEYWORDS: &[&str] = &[
    "what is",
    "what are",
    "define",
    "meaning of",
    "tell me about",
];
const COMPARE_KEYWORDS: &[&str] = &["compare", "difference", "versus", "vs", "better"];

/// What kind of answer a question is asking for
///
/// Detection is case-insensitive substring matching, so several flags can
/// be set at once; `style_instruction` resolves them by priority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryProfile {
    pub detailed: bool,
    pub list: bool,
    pub what_is: bool,
    pub compare: bool,
}

impl QueryProfile {
    pub fn analyze(query: &str) -> Self {
        let query = query.to_lowercase();
        let any = |keywords: &[&str]| keywords.iter().any(|k| query.contains(k));

        Self {
            detailed: any(DETAIL_KEYWORDS),
            list: any(LIST_KEYWORDS),
            what_is: any(DEFINITION_KEYWORDS),
            compare: any(COMPARE_KEYWORDS),
        }
    }

    /// Extra guidance for the model; empty when nothing matched
    pub fn style_instruction(&self) -> &'static str {
        if self.detailed {
            "Provide a detailed, comprehensive response with thorough explanations."
        } else if self.list {
            "Structure your response as a clear, organized list with bullet points where appropriate."
        } else if self.what_is {
            "Focus on providing a clear, concise definition and basic explanation first, then add details."
        } else if self.compare {
            "Structure your response to clearly compare and contrast the relevant aspects."
        } else {
            ""
        }
    }
}

/// Prompt for a question asked within a conversation
pub fn build_chat_prompt(context: &str, question: &str, profile: &QueryProfile) -> String {
    format!(
        "You are a medical AI assistant. Consider this conversation context and answer the latest question:

Previous conversation:
{context}

Latest question: {question}

{style}

Provide your response in the following format, filling in all sections appropriately:
{template}

Remember to:
- Keep the Brief Answer section concise but informative
- Use bullet points and lists where appropriate
- Highlight important warnings or considerations
- Include relevant medical terms with their explanations
- Structure the information in an easy-to-read format",
        context = context,
        question = question,
        style = profile.style_instruction(),
        template = MEDICAL_QA_TEMPLATE,
    )
}

/// Prompt for a standalone question with no conversation
pub fn build_general_prompt(question: &str) -> String {
    format!(
        "You are a medical AI assistant. Answer the following medical question:
{question}

Provide your response in the following format, filling in all sections:
{template}",
        question = question,
        template = MEDICAL_QA_TEMPLATE,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analyze_flags() {
        let profile = QueryProfile::analyze("Can you EXPLAIN what is asthma?");
        assert!(profile.detailed);
        assert!(profile.what_is);
        assert!(!profile.list);

        let profile = QueryProfile::analyze("Ibuprofen vs paracetamol");
        assert!(profile.compare);
        assert!(!profile.detailed);

        assert_eq!(QueryProfile::analyze("fever"), QueryProfile::default());
    }

    #[test]
    fn test_style_priority() {
        // "what are" sets both list and what_is; list wins
        let profile = QueryProfile::analyze("What are the symptoms of flu?");
        assert!(profile.list && profile.what_is);
        assert!(profile.style_instruction().contains("organized list"));

        let detailed = QueryProfile::analyze("List and explain the stages of cancer");
        assert!(detailed.style_instruction().contains("detailed"));

        assert_eq!(QueryProfile::default().style_instruction(), "");
    }

    #[test]
    fn test_build_chat_prompt() {
        let profile = QueryProfile::analyze("compare type 1 and type 2 diabetes");
        let prompt = build_chat_prompt(
            "User: hi\nAssistant: hello",
            "compare type 1 and type 2 diabetes",
            &profile,
        );

        assert!(prompt.contains("Previous conversation:\nUser: hi\nAssistant: hello"));
        assert!(prompt.contains("Latest question: compare type 1 and type 2 diabetes"));
        assert!(prompt.contains("clearly compare and contrast"));
        assert!(prompt.contains("🏥 **Brief Answer:**"));
    }

    #[test]
    fn test_build_general_prompt() {
        let prompt = build_general_prompt("What causes gout?");
        assert!(prompt.starts_with("You are a medical AI assistant."));
        assert!(prompt.contains("What causes gout?\n"));
        assert!(prompt.ends_with(MEDICAL_QA_TEMPLATE));
    }

    #[test]
    fn test_template_wording() {
        assert!(MEDICAL_QA_TEMPLATE.contains(
            "2–3 clear, concise sentences summarizing what it is and why it's important. Tailor based on user query."
        ));
        assert!(MEDICAL_QA_TEMPLATE.contains(
            "{Explain what it is, how it originates, and basic mechanisms involved. Use layman-friendly terms.}"
        ));
        assert!(MEDICAL_QA_TEMPLATE.ends_with("keep it short but credible}"));
    }
}
