//! Instruction payloads for the generation backend.

use chrono::NaiveDate;
use openai_client::truncate_chars;

use crate::config::CandidateProfile;
use crate::types::CandidateItem;

pub const TAILOR_DESCRIPTION_CHARS: usize = 6000;
pub const COVER_LETTER_DESCRIPTION_CHARS: usize = 5000;
pub const WHY_COMPANY_DESCRIPTION_CHARS: usize = 2500;

const TAILOR_INSTRUCTIONS: &str = "\
You are a resume tailoring agent. Produce ONE single-page resume tailored to the job \
description below, using PRIMARY_RESUME_HTML as the source of truth. SECONDARY_RESUME_HTML \
may only add engineering detail consistent with the primary resume; when they conflict, \
follow the primary resume.

Rules:
- Stay truthful. Never invent employers, titles, dates, metrics, tools or outcomes.
- Never change company names, school names, dates or publication details.
- Rewrite wording, reorder bullets and choose the most relevant projects for this role.
- Keep it printable as one Letter page: @page { size: letter; margin: 0.42in; }, no fixed \
body height, no overflow:hidden. Preserve links.
- Fill 88-98% of the page: 4-6 bullets per experience entry, 2-4 per project.

Return exactly these sections:
1) FINAL_RESUME_HTML
   the complete HTML document, no markdown
2) CHANGELOG
   bullet list of what changed and why
3) KEYWORD_COVERAGE
   job keywords and where the resume covers them";

/// Tailoring payload: instructions, truncated description, source templates.
pub fn tailor_prompt(description: &str, primary: &str, secondary: Option<&str>) -> String {
    let mut prompt = format!(
        "{}\n\n=== JOB_DESCRIPTION ===\n{}\n\n=== PRIMARY_RESUME_HTML ===\n{}\n",
        TAILOR_INSTRUCTIONS,
        truncate_chars(description, TAILOR_DESCRIPTION_CHARS),
        primary,
    );
    if let Some(secondary) = secondary {
        prompt.push_str("\n=== SECONDARY_RESUME_HTML ===\n");
        prompt.push_str(secondary);
        prompt.push('\n');
    }
    prompt.push_str("\n=== NOTES ===\n(none)\n");
    prompt
}

pub fn cover_letter_prompt(item: &CandidateItem, description: &str, candidate: &CandidateProfile) -> String {
    format!(
        "You are an expert career coach writing a cover letter for {name}.

CANDIDATE BACKGROUND:
{bio}

ROLE: {title} at {company} ({location})

JOB DESCRIPTION:
{description}

Write the body of a specific cover letter, 3-4 paragraphs and under 320 words:
- Open with genuine interest in this company and role, citing something concrete from the description.
- Map two of the most relevant experiences or projects to the stated requirements.
- Connect one distinctive skill to what this team needs.
- Close briefly with a call to action.

Plain text only. No greeting, no header, no sign-off, no markdown, no bullet points.",
        name = candidate.name,
        bio = candidate.bio,
        title = item.title,
        company = item.company,
        location = item.location,
        description = truncate_chars(description, COVER_LETTER_DESCRIPTION_CHARS),
    )
}

pub fn why_company_prompt(item: &CandidateItem, description: &str, candidate: &CandidateProfile) -> String {
    format!(
        "Write a \"Why do you want to work at {company}?\" answer for {name} applying for {title}.

CANDIDATE BACKGROUND:
{bio}

JOB DESCRIPTION:
{description}

Use 3-5 sentences:
1. One concrete detail about the work this {title} role actually does at {company}, taken from the description.
2. Why that work is hard or matters, one level deeper than the obvious.
3. How it links to specific projects or experience in the background above and what the candidate would grow into here.

No superlatives, no generic praise, no markdown. Output only the answer.",
        company = item.company,
        name = candidate.name,
        title = item.title,
        bio = candidate.bio,
        description = truncate_chars(description, WHY_COMPANY_DESCRIPTION_CHARS),
    )
}

/// Wrap a generated body with the date line, addressee block and signature.
pub fn format_cover_letter(
    body: &str,
    item: &CandidateItem,
    candidate: &CandidateProfile,
    date: NaiveDate,
) -> String {
    format!(
        "{date}\n\nHiring Team\n{company}\n\nRe: {title}\n\nDear Hiring Manager,\n\n{body}\n\nSincerely,\n{name}\n{contact}\n",
        date = date.format("%B %d, %Y"),
        company = item.company,
        title = item.title,
        body = body,
        name = candidate.name,
        contact = candidate.contact_line(),
    )
}
