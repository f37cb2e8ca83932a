//! Prompt assembly for the coach oracle

use crate::error::PromptsError;
use crate::prompts::{Prompt, PromptQuery, PromptsRepository};
use crate::recorder::TranscriptEntry;

use super::state::ConversationState;

const DEFAULT_COACH_SYSTEM: &str = "You are an expert customer service coach evaluating a bank \
representative's handling of a customer conversation.";

const TURN_INSTRUCTION: &str = "Evaluate this single turn in the customer service conversation.
Analyze how well the bank representative handled the customer's message.
Focus on the representative's response quality, empathy, and problem-solving.
Provide ONLY the JSON object, no additional text or markdown.";

const TURN_SCHEMA: &str = r#"{
  "turn_quality_score": <0-10>,
  "immediate_strengths": ["specific strength observed"],
  "immediate_concerns": ["specific concern to address"],
  "next_turn_guidance": "specific suggestion for what to do next",
  "compliance_check": "pass/warning/fail with brief reason",
  "urgency_level": "low/medium/high - based on customer emotional state"
}"#;

const SUMMARY_INSTRUCTION: &str = "Analyze the complete customer service conversation and provide comprehensive feedback.
Provide ONLY the JSON object per the schema, no additional text.";

const SUMMARY_SCHEMA: &str = r#"{
  "overall_performance_score": <0-10>,
  "category_scores": {
    "greeting_verification": <0-10>,
    "clarity": <0-10>,
    "empathy": <0-10>,
    "probing": <0-10>,
    "resolution_focus": <0-10>,
    "compliance": <0-10>
  },
  "key_strengths": ["specific strength with evidence"],
  "priority_improvements": ["specific area needing work"],
  "coaching_recommendations": ["specific training area"]
}"#;

fn coach_prompt(repo: &PromptsRepository) -> Option<&Prompt> {
    repo.find(
        &PromptQuery::new()
            .entity("coach_agent")
            .name_contains("Main System"),
    )
    .into_iter()
    .next()
}

fn bullets(items: &[&str]) -> String {
    items
        .iter()
        .map(|item| format!("- {}", item))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Coach system text with its expertise and criteria sections
fn coach_system_with_sections(repo: &PromptsRepository) -> String {
    let Some(prompt) = coach_prompt(repo) else {
        return DEFAULT_COACH_SYSTEM.to_string();
    };

    format!(
        "{system}\n\n\
         **Your Role & Expertise:**\n{expertise}\n\n\
         **Evaluation Criteria:**\n{criteria}\n\n\
         **Behavioral Guidelines:**\n{guidelines}\n\n\
         **Coaching Philosophy:**\n{philosophy}",
        system = prompt.content_str("system").unwrap_or_default(),
        expertise = prompt.content_list("role_expertise").join("\n"),
        criteria = bullets(&prompt.content_list("evaluation_criteria")),
        guidelines = bullets(&prompt.content_list("behavioral_guidelines")),
        philosophy = bullets(&prompt.content_list("coaching_philosophy")),
    )
}

fn coach_system_plain(repo: &PromptsRepository) -> String {
    coach_prompt(repo)
        .and_then(|p| p.content_str("system"))
        .unwrap_or(DEFAULT_COACH_SYSTEM)
        .to_string()
}

fn scenario_context(repo: &PromptsRepository, state: &ConversationState) -> String {
    let mut context = format!(
        "**Current Scenario Context:**\nCUSTOMER PERSONA: {}\nSCENARIO: {}",
        state.persona_name, state.scenario
    );

    if let Ok(persona) = repo.persona_for_scenario(&state.scenario) {
        let backstory = persona.content_list("backstory");
        let key_phrases = persona.content_list("key_phrases");
        context.push_str(&format!(
            "\nEMOTIONAL STATE: {}\nCUSTOMER BACKSTORY: {}\nKEY CUSTOMER CONCERNS: {}",
            persona.content_str("emotional_state").unwrap_or("Unknown"),
            backstory.iter().take(2).copied().collect::<Vec<_>>().join("; "),
            key_phrases.iter().take(2).copied().collect::<Vec<_>>().join("; "),
        ));
    }
    context
}

/// Prompt for one turn; `turn_number` is the number this evaluation claims
pub fn build_turn_prompt(
    repo: &PromptsRepository,
    state: &ConversationState,
    turn_number: u32,
    customer: &str,
    representative: &str,
) -> String {
    format!(
        "{system}\n\n{context}\n\n{instruction}\n\n\
         **Turn Details:**\n\
         - Turn Number: {turn_number}\n\
         - Customer Statement: \"{customer}\"\n\
         - Representative Response: \"{representative}\"\n\n\
         **Required JSON Output:**\n{schema}",
        system = coach_system_with_sections(repo),
        context = scenario_context(repo, state),
        instruction = TURN_INSTRUCTION,
        schema = TURN_SCHEMA,
    )
}

/// Title-cases a transcript role (`customer` -> `Customer`)
fn title_case(role: &str) -> String {
    let mut chars = role.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Markdown assessment prompt over the final transcript
///
/// Fails when the catalog has no session assessment entry.
pub fn build_assessment_prompt(
    repo: &PromptsRepository,
    state: &ConversationState,
    transcript: &[TranscriptEntry],
) -> Result<String, PromptsError> {
    let template = repo
        .find(
            &PromptQuery::new()
                .entity("coach_agent")
                .name_contains("Session Assessment"),
        )
        .into_iter()
        .next()
        .ok_or_else(|| PromptsError::NotFound("coach session assessment".to_string()))?;

    let conversation = transcript
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            format!(
                "[Turn {} - {}]\n{}: {}\n",
                i + 1,
                entry.ts,
                title_case(&entry.role),
                entry.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    Ok(format!(
        "You are an expert customer service coach providing detailed session assessments.\n\
         {instruction}\n\n\
         Available achievements to award (be selective, only award if truly earned):\n\
         {achievements}\n\n\
         Generate a markdown assessment with:\n\
         1. Overall performance score (0-10)\n\
         2. Category scores for each evaluation area\n\
         3. Specific strengths with quoted evidence\n\
         4. Areas for improvement with specific examples\n\
         5. Actionable training recommendations\n\
         6. Achievements earned (if any)\n\n\
         IMPORTANT: Quote specific utterances from the representative as evidence.\n\
         Format quotes like: \"As shown in Turn 3: 'I understand this must be frustrating...'\"\n\n\
         **Session Details:**\n\
         - Customer: {persona}\n\
         - Scenario: {scenario}\n\
         - Total Turns: {total}\n\n\
         **Full Conversation Transcript:**\n\
         {conversation}\n\
         Generate the markdown assessment now. Be specific and quote evidence.",
        instruction = template.content_str("instruction").unwrap_or_default(),
        achievements = template.content_list("achievements").join("\n"),
        persona = state.persona_name,
        scenario = state.scenario,
        total = transcript.len(),
    ))
}

/// JSON summary prompt over the evaluated turns
pub fn build_summary_prompt(repo: &PromptsRepository, state: &ConversationState) -> String {
    let transcript = state
        .evaluations
        .iter()
        .flat_map(|ev| {
            [
                format!("Turn {} - Customer: {}", ev.turn_number, ev.customer_message),
                format!(
                    "Turn {} - Representative: {}",
                    ev.turn_number, ev.representative_response
                ),
            ]
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "{system}\n\n{instruction}\n\n**Full Transcript:**\n{transcript}\n\n**Required JSON Output:**\n{schema}",
        system = coach_system_plain(repo),
        instruction = SUMMARY_INSTRUCTION,
        schema = SUMMARY_SCHEMA,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> PromptsRepository {
        PromptsRepository::builtin().unwrap()
    }

    fn entry(role: &str, content: &str) -> TranscriptEntry {
        TranscriptEntry {
            ts_ms: 0,
            ts: "10:00:00 01-02-2025".into(),
            role: role.into(),
            content: content.into(),
        }
    }

    #[test]
    fn turn_prompt_carries_sections_and_persona_context() {
        let repo = repo();
        let state = ConversationState::new("card", "Sarah Chen");
        let prompt = build_turn_prompt(&repo, &state, 3, "My card is gone!", "Let me help.");

        assert!(prompt.contains("**Your Role & Expertise:**"));
        assert!(prompt.contains("**Coaching Philosophy:**"));
        assert!(prompt.contains("CUSTOMER PERSONA: Sarah Chen"));
        assert!(prompt.contains("SCENARIO: card"));
        assert!(prompt.contains("EMOTIONAL STATE:"));
        assert!(prompt.contains("- Turn Number: 3"));
        assert!(prompt.contains("- Customer Statement: \"My card is gone!\""));
        assert!(prompt.contains("- Representative Response: \"Let me help.\""));
        assert!(prompt.contains("\"turn_quality_score\": <0-10>"));
    }

    #[test]
    fn turn_prompt_falls_back_without_catalog_entries() {
        let repo = PromptsRepository::from_json_str(r#"{"prompts": []}"#).unwrap();
        let state = ConversationState::new("unknown", "Someone");
        let prompt = build_turn_prompt(&repo, &state, 1, "a", "b");

        assert!(prompt.starts_with(DEFAULT_COACH_SYSTEM));
        assert!(prompt.contains("CUSTOMER PERSONA: Someone"));
        assert!(!prompt.contains("EMOTIONAL STATE"));
    }

    #[test]
    fn assessment_prompt_numbers_transcript_lines() {
        let repo = repo();
        let state = ConversationState::new("card", "Sarah Chen");
        let transcript = vec![
            entry("customer", "I lost my card"),
            entry("representative", "I can block it now"),
        ];
        let prompt = build_assessment_prompt(&repo, &state, &transcript).unwrap();

        assert!(prompt.contains("[Turn 1 - 10:00:00 01-02-2025]\nCustomer: I lost my card"));
        assert!(prompt.contains("[Turn 2 - 10:00:00 01-02-2025]\nRepresentative: I can block it now"));
        assert!(prompt.contains("- Total Turns: 2"));
        assert!(prompt.contains("- Customer: Sarah Chen"));
    }

    #[test]
    fn assessment_prompt_requires_template() {
        let repo = PromptsRepository::from_json_str(r#"{"prompts": []}"#).unwrap();
        let state = ConversationState::new("card", "Sarah Chen");
        let err = build_assessment_prompt(&repo, &state, &[entry("customer", "hi")]).unwrap_err();
        assert!(matches!(err, PromptsError::NotFound(_)));
    }

    #[test]
    fn title_case_roles() {
        assert_eq!(title_case("customer"), "Customer");
        assert_eq!(title_case("REPRESENTATIVE"), "Representative");
        assert_eq!(title_case(""), "");
    }
}
