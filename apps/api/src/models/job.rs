use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::AppError;

/// The role every document in a batch is screened against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRequirement {
    pub job_title: String,
    /// Accepts either a JSON array or a comma-separated string ("Python, Django, AWS").
    #[serde(default, deserialize_with = "skill_list")]
    pub required_skills: Vec<String>,
    #[serde(default)]
    pub min_experience: u32,
    #[serde(default)]
    pub max_experience: u32,
    #[serde(default, deserialize_with = "skill_list")]
    pub mandatory_skills: Vec<String>,
}

impl JobRequirement {
    /// Rejects requirements that cannot be screened against.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.job_title.trim().is_empty() {
            return Err(AppError::Validation("job_title cannot be empty".to_string()));
        }
        if self.min_experience > self.max_experience {
            return Err(AppError::Validation(format!(
                "min_experience ({}) cannot exceed max_experience ({})",
                self.min_experience, self.max_experience
            )));
        }
        Ok(())
    }

    /// Human-readable experience window, e.g. "0 to 3".
    pub fn experience_range(&self) -> String {
        format!("{} to {}", self.min_experience, self.max_experience)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SkillInput {
    List(Vec<String>),
    Csv(String),
}

fn skill_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Vec<String> = match Option::<SkillInput>::deserialize(deserializer)? {
        Some(SkillInput::List(items)) => items,
        Some(SkillInput::Csv(text)) => text.split(',').map(str::to_string).collect(),
        None => Vec::new(),
    };

    Ok(raw
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(min: u32, max: u32) -> JobRequirement {
        JobRequirement {
            job_title: "Senior Python Developer".to_string(),
            required_skills: vec!["Python".to_string()],
            min_experience: min,
            max_experience: max,
            mandatory_skills: vec![],
        }
    }

    #[test]
    fn test_skills_accept_comma_separated_string() {
        let json = r#"{
            "job_title": "Senior Python Developer",
            "required_skills": "Python, Django ,AWS,",
            "min_experience": 0,
            "max_experience": 3,
            "mandatory_skills": ["Docker", " Kubernetes "]
        }"#;
        let job: JobRequirement = serde_json::from_str(json).unwrap();
        assert_eq!(job.required_skills, vec!["Python", "Django", "AWS"]);
        assert_eq!(job.mandatory_skills, vec!["Docker", "Kubernetes"]);
    }

    #[test]
    fn test_missing_optional_fields_default() {
        let job: JobRequirement = serde_json::from_str(r#"{"job_title": "SRE"}"#).unwrap();
        assert!(job.required_skills.is_empty());
        assert!(job.mandatory_skills.is_empty());
        assert_eq!(job.experience_range(), "0 to 0");
    }

    #[test]
    fn test_validate_rejects_inverted_range() {
        assert!(job(5, 2).validate().is_err());
        assert!(job(2, 2).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_blank_title() {
        let mut j = job(0, 3);
        j.job_title = "   ".to_string();
        assert!(matches!(j.validate(), Err(AppError::Validation(_))));
    }
}
