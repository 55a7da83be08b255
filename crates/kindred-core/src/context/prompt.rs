//! System prompt builder for companions.
//!
//! Assembles the system segment from the persona and the relationship stage
//! using XML tag boundaries, so the model can tell the persona apart from
//! stage guidance and behavioural instructions.

use kindred_types::config::StageDefinition;
use kindred_types::persona::CompanionPersona;
use kindred_types::relationship::RelationshipState;

/// Builds the companion system prompt.
///
/// Layout:
/// ```text
/// <persona>Name: ... Traits: ... Style: ... Interests: ... Quirks: ...</persona>
/// <backstory>...</backstory>
/// <relationship>Stage: ... Intimacy: ... Guidance: ...</relationship>
/// <instructions>You are {name}. Stay in character...</instructions>
/// ```
pub struct SystemPromptBuilder;

impl SystemPromptBuilder {
    pub fn build(
        persona: &CompanionPersona,
        relationship: &RelationshipState,
        stage: &StageDefinition,
    ) -> String {
        let mut sections = Vec::with_capacity(4);

        let mut lines = vec![format!("Name: {}", persona.name)];
        push_list(&mut lines, "Traits", &persona.traits);
        if !persona.style.trim().is_empty() {
            lines.push(format!("Style: {}", persona.style.trim()));
        }
        push_list(&mut lines, "Interests", &persona.interests);
        push_list(&mut lines, "Quirks", &persona.quirks);
        sections.push(format!("<persona>\n{}\n</persona>", lines.join("\n")));

        if !persona.backstory.trim().is_empty() {
            sections.push(format!(
                "<backstory>\n{}\n</backstory>",
                persona.backstory.trim()
            ));
        }

        let mut relationship_lines = vec![
            format!("Stage: {}", stage.name),
            format!("Intimacy: {}", relationship.intimacy_level),
        ];
        if !stage.guidance.trim().is_empty() {
            relationship_lines.push(format!("Guidance: {}", stage.guidance.trim()));
        }
        sections.push(format!(
            "<relationship>\n{}\n</relationship>",
            relationship_lines.join("\n")
        ));

        sections.push(format!(
            "<instructions>\n\
             You are {name}, chatting one-on-one with a user. Stay in character.\n\
             Reply in a natural, conversational tone that fits the relationship stage.\n\
             Keep replies short unless the user asks for more.\n\
             Messages in brackets describe media the user shared.\n\
             </instructions>",
            name = persona.name
        ));

        sections.join("\n\n")
    }
}

fn push_list(lines: &mut Vec<String>, label: &str, items: &[String]) {
    let items: Vec<&str> = items
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();
    if !items.is_empty() {
        lines.push(format!("{label}: {}", items.join(", ")));
    }
}
