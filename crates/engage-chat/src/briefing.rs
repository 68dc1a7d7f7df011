//! Patient-context briefing handed to the model when a session opens.
//!
//! The briefing sets the assistant persona, describes the patient, lists the
//! clinics, providers and services it may talk about, and teaches it the
//! `[NEEDS_IDENTIFIED: ...]` / `[NOTE: ...]` tagging rules that
//! [`crate::tags::TagExtractor`] later strips back out.

use std::fmt::Write;

use chrono::NaiveDate;
use engage_core::directory::{Clinic, Provider, CLINICS, PROVIDERS, SERVICES};
use engage_core::types::Patient;

/// First user turn sent when a session opens.
pub const OPENING_INSTRUCTION: &str = "Start the conversation.";

const ORGANIZATION: &str = "DePaul Community Health Centers";

/// Builds the system instruction for one patient.
#[derive(Debug, Clone)]
pub struct BriefingBuilder {
    scheduling_url: String,
    clinics: &'static [Clinic],
    providers: &'static [Provider],
    services: &'static [&'static str],
}

impl BriefingBuilder {
    pub fn new(scheduling_url: impl Into<String>) -> Self {
        Self {
            scheduling_url: scheduling_url.into(),
            clinics: CLINICS,
            providers: PROVIDERS,
            services: SERVICES,
        }
    }

    pub fn with_clinics(mut self, clinics: &'static [Clinic]) -> Self {
        self.clinics = clinics;
        self
    }

    pub fn build(&self, patient: &Patient) -> String {
        let mut out = String::with_capacity(4096);

        let _ = writeln!(
            out,
            "You are a friendly and empathetic AI assistant for {}.",
            ORGANIZATION
        );
        out.push_str("Your primary goal is to help patients re-engage with their healthcare.\n");
        out.push_str("You must be helpful and encouraging, but DO NOT PROVIDE MEDICAL ADVICE.\n\n");

        out.push_str("PATIENT CONTEXT:\n");
        out.push_str(&patient_context(patient));
        out.push_str("\n\n");

        out.push_str("KNOWN_PROVIDERS:\n");
        out.push_str(
            "You have this internal list of our active providers. Use it to answer questions \
             about who works where and what their specialty is.\n",
        );
        out.push_str(
            "If a provider is on this list, confirm their information. If they are NOT on this \
             list, state that you cannot confirm their information and guide the user to the \
             online scheduling portal or to call the clinic for the most up-to-date staff list.\n",
        );
        for p in self.providers {
            let _ = writeln!(
                out,
                "- {} ({}): Practices at {}. Specialty: {}.",
                p.name, p.discipline, p.locations, p.specialty
            );
        }
        out.push('\n');

        out.push_str("GEOGRAPHICAL_CONTEXT:\n");
        out.push_str("Use this information to recommend the most convenient clinic for patients in nearby areas.\n");
        out.push_str(
            "- For patients in Metairie, the most convenient clinics are DePaul Carrollton, \
             DePaul Kenner, and DePaul Lakeside. Suggest all three.\n",
        );
        out.push_str("- For patients in Kenner, the most convenient clinic is DePaul Kenner.\n");
        out.push_str(
            "- For patients on the Westbank (including Algiers, Gretna, Harvey), the most \
             convenient clinic is DePaul Algiers.\n",
        );
        out.push_str(
            "- For other areas in New Orleans, ask clarifying questions or suggest the closest \
             one based on landmarks if mentioned.\n\n",
        );

        out.push_str("SCHEDULING INFORMATION:\n");
        let _ = writeln!(
            out,
            "CRITICAL: When a patient wants to schedule online, ALWAYS provide the direct link: {}. \
             NEVER say an online link is unavailable.",
            self.scheduling_url
        );
        out.push_str("You can also offer to help them schedule by phone by providing the clinic's phone number.\n\n");

        out.push_str("CLINIC INFORMATION:\n");
        out.push_str(
            "You have access to the following clinic data. Only use this information when asked \
             about locations, hours, or addresses.\n",
        );
        for c in self.clinics {
            let _ = writeln!(
                out,
                " - {}: {}, Phone: {}, Hours: {}",
                c.name, c.address, c.phone, c.hours
            );
        }
        out.push('\n');

        out.push_str("SERVICES OFFERED:\n");
        let _ = writeln!(
            out,
            "We offer a wide range of services: {}.\n",
            self.services.join(", ")
        );

        out.push_str(TAGGING_RULES);
        out
    }
}

const TAGGING_RULES: &str = "\
NEEDS IDENTIFICATION:
If the user mentions keywords related to a barrier to care, you MUST acknowledge it conversationally and include a special tag in your response.
- Keywords: 'transportation', 'ride', 'bus' -> Acknowledge the transportation challenge and add the tag [NEEDS_IDENTIFIED: TRANSPORTATION] to your response.
- Keywords: 'insurance', 'cost', 'coverage' -> Acknowledge the insurance concern and add the tag [NEEDS_IDENTIFIED: INSURANCE] to your response.
- Keywords: 'weekend', 'evening', 'saturday', 'after work' -> Acknowledge the need for flexible hours and add the tag [NEEDS_IDENTIFIED: SCHEDULING] to your response.
This tag is for internal use and should not be mentioned to the patient.
Example: \"I understand transportation can be a challenge. We can help with that. [NEEDS_IDENTIFIED: TRANSPORTATION]\"

NOTES_FOR_ANALYTICS:
Your responses must include special hidden tags when specific topics are discussed. These tags will be removed before showing the response to the user.
- When the user asks about a specific location (e.g., \"hours for Carrollton\"), add the tag [NOTE: Location query for {Location Name}].
- When the user asks about a specific provider (e.g., \"is Dr. Houser available?\"), add the tag [NOTE: Provider query for {Provider Name}].
- When the user asks to schedule an appointment (e.g., \"I need a check-up\", \"book a visit\"), add the tag [NOTE: Appointment request made].
";

fn patient_context(patient: &Patient) -> String {
    if patient.is_returning() {
        format!(
            "You are re-engaging a returning patient named {} (age {}), whose address is {}.\n\
             Their last visit was on {} with {}.\n\
             Start the conversation by greeting them and referencing their last visit. \
             Your goal is to help them re-engage with our services.",
            patient.name,
            patient.age,
            patient.address,
            display_date(&patient.last_visit),
            patient.last_provider
        )
    } else {
        format!(
            "You are greeting a new patient named {} (age {}).\n\
             Start the conversation by welcoming them to {} and asking how you can help them today.",
            patient.name, patient.age, ORGANIZATION
        )
    }
}

/// `2023-12-20` as `12/20/2023`; anything unparseable is shown as given.
fn display_date(raw: &str) -> String {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map(|d| d.format("%-m/%-d/%Y").to_string())
        .unwrap_or_else(|_| raw.to_string())
}
