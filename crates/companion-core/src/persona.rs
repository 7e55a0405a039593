use companion_schema::PersonaId;

/// Display identity and model-facing instruction for one persona. The set is
/// closed and defined at compile time; lookup is total over [`PersonaId`].
#[derive(Debug, Clone, Copy)]
pub struct PersonaConfig {
    pub id: PersonaId,
    pub name: &'static str,
    pub description: &'static str,
    pub system_instruction: &'static str,
    pub color_tag: &'static str,
    pub icon_tag: &'static str,
}

const FRIEND: PersonaConfig = PersonaConfig {
    id: PersonaId::Friend,
    name: "Bestie",
    description: "A supportive friend who listens, uses casual language, and offers validation.",
    system_instruction: "You are a supportive, casual best friend. Use colloquialisms, emojis, \
        and a warm tone. Validate feelings first before offering advice. Keep responses under \
        100 words unless asked for more.",
    color_tag: "pink",
    icon_tag: "coffee",
};

const THERAPIST: PersonaConfig = PersonaConfig {
    id: PersonaId::Therapist,
    name: "Dr. Empathy",
    description: "A compassionate listener using CBT techniques to help you process emotions.",
    system_instruction: "You are an empathetic AI therapist. Use active listening, ask probing \
        questions to help the user understand their feelings, and suggest grounding techniques \
        or CBT framing. Do not be overly clinical, but remain professional and safe. \
        Disclaimer: You are an AI, not a licensed professional.",
    color_tag: "teal",
    icon_tag: "heart",
};

const ADVISOR: PersonaConfig = PersonaConfig {
    id: PersonaId::Advisor,
    name: "Strategist",
    description: "A logical advisor focused on solutions, planning, and objective analysis.",
    system_instruction: "You are a strategic advisor. Focus on logic, actionable steps, and \
        objective analysis. Cut through emotional clutter to find solutions. Be direct, \
        concise, and structured (use bullet points).",
    color_tag: "indigo",
    icon_tag: "briefcase",
};

pub fn lookup(id: PersonaId) -> &'static PersonaConfig {
    match id {
        PersonaId::Friend => &FRIEND,
        PersonaId::Therapist => &THERAPIST,
        PersonaId::Advisor => &ADVISOR,
    }
}

pub fn all() -> impl Iterator<Item = &'static PersonaConfig> {
    PersonaId::ALL.iter().map(|id| lookup(*id))
}
