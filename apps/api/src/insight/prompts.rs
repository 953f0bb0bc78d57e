// All LLM prompt constants for the two screening stages.
// Reuses cross-cutting fragments from llm_client::prompts.

/// System prompt for the parse stage. JSON_ONLY_SYSTEM is appended at call time.
pub const PARSE_SYSTEM: &str = "You are an expert resume parser. \
    Extract contact details, total professional experience and skills from a resume.";

/// Parse prompt template. Replace `{resume_text}` before sending.
pub const PARSE_PROMPT_TEMPLATE: &str = r#"Extract structured candidate information from the resume below.

Return a JSON object with this EXACT schema (no extra fields):
{
  "name": "Full Name",
  "email": "name@example.com",
  "phone": "+1 555 0100",
  "experience_years": 4.5,
  "skills": ["Python", "Django", "AWS"]
}

Rules:
- experience_years is the total years of professional experience as a number; 0 if none is stated.
- skills lists technical skills in the order they appear, without duplicates.
- phone is null when no phone number is present.

RESUME:
{resume_text}"#;

/// System prompt for the scoring stage. JSON_ONLY_SYSTEM is appended at call time.
pub const SCORE_SYSTEM: &str = "You are a senior technical recruiter. \
    Assess how well a parsed candidate profile fits a job's requirements.";

/// Scoring prompt template. Replace every `{...}` placeholder before sending.
pub const SCORE_PROMPT_TEMPLATE: &str = r#"Evaluate the candidate against the job requirements.

JOB TITLE: {job_title}
TECHNICAL SKILLS: {required_skills}
REQUIRED EXPERIENCE (years): {experience_range}
MANDATORY SKILLS: {mandatory_skills}

CANDIDATE PROFILE (JSON):
{candidate_json}

Return a JSON object with this EXACT schema (no extra fields):
{
  "confidence_score": 72,
  "key_strengths": ["5 years of Django in production"],
  "gaps": ["No Kubernetes experience"],
  "recommendation": "Proceed to technical interview"
}

Scoring rules:
- confidence_score is an integer from 0 to 100.
- Missing any MANDATORY skill caps the score at 60.
- Experience outside the required range lowers the score proportionally to the distance.
- key_strengths and gaps contain at most 5 short items each."#;
