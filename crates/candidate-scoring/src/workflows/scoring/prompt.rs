//! Deterministic prompt rendering.
//!
//! The system instruction is a contract with downstream consumers of the score: the band
//! boundaries below are what a reported score means.

use super::domain::{non_blank, CandidateProfile, VacancyProfile};

pub const SYSTEM_INSTRUCTION: &str = "\
You are an expert recruitment analyst. Your task is to evaluate how well a candidate
fits a specific vacancy. Analyze all provided candidate information against the vacancy
requirements and produce a numerical score with clear reasoning.

## Scoring Criteria
Evaluate the candidate across these dimensions:
1. **Skills match**: Does the candidate have the required skills, certifications,
and qualifications?
2. **Experience relevance**: Is the candidate's work history relevant to the role?
3. **Availability & schedule**: Can the candidate work the required hours and days?
4. **Location & commute**: Is the candidate within reasonable distance or willing to commute?
5. **Salary expectations**: Do the candidate's salary expectations align with the role?
6. **Motivation**: Does the candidate show genuine interest in this type of work?
7. **Language requirements**: Can the candidate communicate in the required language(s)?

## Scoring Rubric
- **90-100**: Excellent fit, meets or exceeds all requirements
- **70-89**: Good fit, meets most requirements with minor gaps
- **50-69**: Moderate fit, meets some requirements but has notable gaps
- **30-49**: Weak fit, significant mismatches in key areas
- **0-29**: Poor fit, fundamental mismatches, unlikely to succeed in this role

## Important Notes
- Candidate information may be in Dutch; your reasoning MUST be in English.
- Base your score strictly on the evidence provided. Do not assume information not present.
- Provide 2-4 sentences of reasoning explaining the score.";

/// Qualitative band a score falls into, mirroring the rubric above.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitBand {
    Poor,
    Weak,
    Moderate,
    Good,
    Excellent,
}

impl FitBand {
    pub fn for_score(score: u8) -> Self {
        match score {
            0..=29 => FitBand::Poor,
            30..=49 => FitBand::Weak,
            50..=69 => FitBand::Moderate,
            70..=89 => FitBand::Good,
            _ => FitBand::Excellent,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            FitBand::Poor => "poor",
            FitBand::Weak => "weak",
            FitBand::Moderate => "moderate",
            FitBand::Good => "good",
            FitBand::Excellent => "excellent",
        }
    }
}

/// Render the user prompt. Empty fields are skipped rather than rendered blank.
pub fn build_user_prompt(candidate: &CandidateProfile, vacancy: &VacancyProfile) -> String {
    let mut parts: Vec<String> = Vec::new();

    parts.push("## Candidate Information".to_string());
    if let Some(name) = candidate.display_name() {
        parts.push(format!("**Name**: {name}"));
    }
    if let Some(email) = non_blank(candidate.email.as_deref()) {
        parts.push(format!("**Email**: {email}"));
    }
    if let Some(phone) = non_blank(candidate.phone.as_deref()) {
        parts.push(format!("**Phone**: {phone}"));
    }
    if let Some(address) = non_blank(candidate.address.as_deref()) {
        parts.push(format!("**Address**: {address}"));
    }
    if let Some(job) = &candidate.job {
        let mut role = Vec::new();
        if let Some(title) = non_blank(job.title.as_deref()) {
            role.push(title.to_string());
        }
        if let Some(company) = non_blank(job.company.as_deref()) {
            role.push(format!("at {company}"));
        }
        if !role.is_empty() {
            parts.push(format!("**Current role**: {}", role.join(" ")));
        }
    }

    for document in &candidate.documents {
        let Some(text) = non_blank(Some(document.text.as_str())) else {
            continue;
        };
        let label = non_blank(Some(document.label.as_str())).unwrap_or("Document");
        parts.push(format!("\n### {label}"));
        parts.push(text.to_string());
    }

    parts.push("\n## Vacancy Description".to_string());
    if let Some(title) = non_blank(vacancy.title.as_deref()) {
        parts.push(format!("**Title**: {title}"));
    }
    if let Some(description) = non_blank(vacancy.description.as_deref()) {
        parts.push(description.to_string());
    }
    if let Some(hard) = non_blank(vacancy.hard_requirements.as_deref()) {
        parts.push(format!("\n**Hard Requirements**: {hard}"));
    }
    if let Some(soft) = non_blank(vacancy.soft_requirements.as_deref()) {
        parts.push(format!("\n**Soft Requirements**: {soft}"));
    }
    if let Some(about) = non_blank(vacancy.about_company.as_deref()) {
        parts.push(format!("\n**About the Company**: {about}"));
    }
    if let Some(address) = &vacancy.address {
        let has_anchor = non_blank(address.city.as_deref()).is_some()
            || non_blank(address.country.as_deref()).is_some();
        if has_anchor {
            let location = [
                address.street.as_deref(),
                address.city.as_deref(),
                address.zip_code.as_deref(),
                address.country.as_deref(),
            ]
            .into_iter()
            .filter_map(non_blank)
            .collect::<Vec<_>>()
            .join(", ");
            parts.push(format!("\n**Location**: {location}"));
        }
    }

    parts.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::scoring::domain::{
        CandidateJob, SupportingDocument, VacancyAddress,
    };

    fn candidate() -> CandidateProfile {
        CandidateProfile {
            id: Some("cand-1".to_string()),
            name: Some("Thomas van den Berg-Smit".to_string()),
            firstname: Some("Thomas".to_string()),
            lastname: Some("van den Berg-Smit".to_string()),
            email: Some("thomas@example.com".to_string()),
            phone: Some("+31612345678".to_string()),
            address: Some("Amsterdam, Netherlands".to_string()),
            job: Some(CandidateJob {
                title: Some("Verpleegkundige".to_string()),
                company: Some("Zorggroep West".to_string()),
            }),
            documents: vec![
                SupportingDocument::new("Resume", "HBO Verpleegkunde, 6 jaar ervaring in de zorg."),
                SupportingDocument::new("Assessment", "Beschikbaar per direct."),
            ],
            ..CandidateProfile::default()
        }
    }

    fn vacancy() -> VacancyProfile {
        VacancyProfile {
            title: Some("Tandartsassistent".to_string()),
            description: Some("Zoek tandartsassistenten voor moderne praktijk.".to_string()),
            hard_requirements: Some("BIG registratie".to_string()),
            soft_requirements: Some("Teamplayer".to_string()),
            about_company: Some("Moderne tandartspraktijk in het Westland".to_string()),
            address: Some(VacancyAddress {
                street: None,
                city: Some("Westland".to_string()),
                zip_code: None,
                country: Some("Netherlands".to_string()),
            }),
            ..VacancyProfile::default()
        }
    }

    #[test]
    fn rubric_keeps_band_boundaries() {
        for band in ["0-29", "30-49", "50-69", "70-89", "90-100"] {
            assert!(SYSTEM_INSTRUCTION.contains(band), "missing band {band}");
        }
        assert!(SYSTEM_INSTRUCTION.contains("English"));
        assert!(SYSTEM_INSTRUCTION.contains("Salary expectations"));
    }

    #[test]
    fn fit_bands_follow_rubric_edges() {
        assert_eq!(FitBand::for_score(0), FitBand::Poor);
        assert_eq!(FitBand::for_score(29), FitBand::Poor);
        assert_eq!(FitBand::for_score(30), FitBand::Weak);
        assert_eq!(FitBand::for_score(50), FitBand::Moderate);
        assert_eq!(FitBand::for_score(89), FitBand::Good);
        assert_eq!(FitBand::for_score(90), FitBand::Excellent);
        assert_eq!(FitBand::for_score(100).label(), "excellent");
    }

    #[test]
    fn renders_full_context_in_fixed_order() {
        let prompt = build_user_prompt(&candidate(), &vacancy());

        let expected = "\
## Candidate Information
**Name**: Thomas van den Berg-Smit
**Email**: thomas@example.com
**Phone**: +31612345678
**Address**: Amsterdam, Netherlands
**Current role**: Verpleegkundige at Zorggroep West

### Resume
HBO Verpleegkunde, 6 jaar ervaring in de zorg.

### Assessment
Beschikbaar per direct.

## Vacancy Description
**Title**: Tandartsassistent
Zoek tandartsassistenten voor moderne praktijk.

**Hard Requirements**: BIG registratie

**Soft Requirements**: Teamplayer

**About the Company**: Moderne tandartspraktijk in het Westland

**Location**: Westland, Netherlands";

        assert_eq!(prompt, expected);
    }

    #[test]
    fn identical_inputs_render_identical_text() {
        assert_eq!(
            build_user_prompt(&candidate(), &vacancy()),
            build_user_prompt(&candidate(), &vacancy())
        );
    }

    #[test]
    fn falls_back_to_first_and_last_name() {
        let candidate = CandidateProfile {
            name: Some("  ".to_string()),
            firstname: Some("Jan".to_string()),
            lastname: Some("de Vries".to_string()),
            ..CandidateProfile::default()
        };
        let prompt = build_user_prompt(&candidate, &vacancy());
        assert!(prompt.contains("**Name**: Jan de Vries"));
    }

    #[test]
    fn omits_empty_fields_and_documents() {
        let mut candidate = CandidateProfile::default();
        candidate
            .documents
            .push(SupportingDocument::new("Resume", "   "));
        let vacancy = VacancyProfile {
            title: Some("Test Role".to_string()),
            hard_requirements: Some(String::new()),
            address: Some(VacancyAddress {
                street: Some("Industrieweg 5".to_string()),
                ..VacancyAddress::default()
            }),
            ..VacancyProfile::default()
        };

        let prompt = build_user_prompt(&candidate, &vacancy);

        assert_eq!(
            prompt,
            "## Candidate Information\n\n## Vacancy Description\n**Title**: Test Role"
        );
    }

    #[test]
    fn role_renders_company_without_title() {
        let candidate = CandidateProfile {
            job: Some(CandidateJob {
                title: None,
                company: Some("Zorggroep West".to_string()),
            }),
            ..CandidateProfile::default()
        };
        let prompt = build_user_prompt(&candidate, &VacancyProfile::default());
        assert!(prompt.contains("**Current role**: at Zorggroep West"));
    }
}
