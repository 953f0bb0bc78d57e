// Prompt fragments shared by every screening stage.
// Stage-specific prompts live in insight/prompts.rs.

/// Appended to every system prompt; the client parses the reply as JSON.
pub const JSON_ONLY_SYSTEM: &str = "Reply with a single valid JSON object and nothing else. \
    No markdown code fences, no commentary before or after the object.";

/// Keeps the parse stage from inventing contact details or skills.
pub const GROUNDING_INSTRUCTION: &str = "\
    Only report facts that appear in the resume text. \
    Never guess an email address, phone number or skill. \
    When a field is absent, leave it empty instead.";
