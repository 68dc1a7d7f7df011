//! Built-in reference data: demo patients, clinic locations, the provider
//! roster and the default example prompts shown on the landing view.

use serde::Serialize;

use crate::types::{Patient, PatientId, RiskLevel};

/// Online scheduling portal offered to patients.
pub const SCHEDULING_URL: &str = "https://healow.com/apps/practice/daughters-of-charity-health-centers-new-orleans-la-20259?v=2&locale=en";

/// Example prompts used whenever prompt generation fails or returns nothing.
pub const DEFAULT_EXAMPLE_PROMPTS: [&str; 6] = [
    "I need to schedule an appointment online.",
    "Which of your locations have Saturday or evening hours?",
    "Do you offer podiatry services?",
    "My mom needs help with transportation to her appointment, can you help?",
    "What's the closest clinic to the French Quarter?",
    "I need to see a doctor about pediatric obesity.",
];

/// Services offered across all locations.
pub const SERVICES: &[&str] = &[
    "Primary Care",
    "Pediatrics",
    "Women's Health (OB/GYN)",
    "Behavioral Health",
    "Dental",
    "Podiatry",
    "Optometry",
    "WIC",
    "Pharmacy",
    "Lab",
    "Health Insurance Enrollment",
];

/// A clinic location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Clinic {
    pub name: &'static str,
    pub address: &'static str,
    pub phone: &'static str,
    pub hours: &'static str,
}

pub const CLINICS: &[Clinic] = &[
    Clinic {
        name: "DePaul Algiers",
        address: "2801 General DeGaulle Drive, New Orleans, LA 70114",
        phone: "504-362-8930",
        hours: "Mon-Fri: 8AM-8PM, Sat: 8AM-4PM",
    },
    Clinic {
        name: "DePaul Carrollton",
        address: "3201 S. Carrollton Ave, New Orleans, LA 70118",
        phone: "504-207-3060",
        hours: "Mon-Fri: 7:30AM-8PM, Sat: 8AM-2PM",
    },
    Clinic {
        name: "DePaul New Orleans East",
        address: "5630 Read Blvd, New Orleans, LA 70127",
        phone: "504-248-5357",
        hours: "Mon-Thu: 8AM-8PM, Fri: 8AM-5PM, Sat: 8AM-2PM",
    },
    Clinic {
        name: "DePaul Kenner",
        address: "1401 W. Esplanade Avenue, Suite 100, Kenner, LA 70065",
        phone: "504-469-8977",
        hours: "Mon-Fri: 8AM-5PM",
    },
    Clinic {
        name: "DePaul Lakeside",
        address: "3020 N. Causeway Blvd., Metairie, LA 70002",
        phone: "504-207-3060",
        hours: "Mon-Fri: 8AM-5PM",
    },
];

/// An active provider and where they practice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Provider {
    pub name: &'static str,
    pub discipline: &'static str,
    pub locations: &'static str,
    pub specialty: &'static str,
}

pub const PROVIDERS: &[Provider] = &[
    Provider { name: "Dr. Marcella Houser", discipline: "Pediatrics", locations: "Harvey, Carrollton", specialty: "PC" },
    Provider { name: "Kelly Franovich, NP", discipline: "Pediatrics", locations: "Harvey, Carrollton", specialty: "PC" },
    Provider { name: "Dr. Robert Post", discipline: "Family Medicine", locations: "Metairie, Carrollton, NO East, St. Cecilia", specialty: "PC" },
    Provider { name: "Dr. Mark Dal Corso", discipline: "Pediatrics", locations: "Carrollton", specialty: "PC" },
    Provider { name: "Michelle Donaldson-Bailey", discipline: "Podiatrist", locations: "East, Higgins", specialty: "Podiatry" },
    Provider { name: "Algere Cobb, Bronsyn", discipline: "NP", locations: "Harvey, Carrollton", specialty: "PC" },
    Provider { name: "Anthony, Alana", discipline: "MD", locations: "Kenner, Metairie", specialty: "PC" },
    Provider { name: "Bevrotte, Louis H", discipline: "MD", locations: "East", specialty: "PC" },
    Provider { name: "Maldonado, Anna", discipline: "MD", locations: "Lakeside, Carrollton, Metairie", specialty: "PC" },
    Provider { name: "Mascarenhas, Vimala", discipline: "MD", locations: "Lakeside", specialty: "PC" },
    Provider { name: "White, Melannie D", discipline: "Podiatry", locations: "Carrollton, NO East", specialty: "Podiatry" },
];

/// The simulated patients available on the landing view.
pub fn demo_patients() -> Vec<Patient> {
    vec![
        Patient {
            id: 1,
            name: "Maria Rodriguez".to_string(),
            phone: "(504) 555-0123".to_string(),
            address: "1247 General DeGaulle Dr, New Orleans, LA 70114".to_string(),
            age: 45,
            gender: "Female".to_string(),
            last_provider: "Dr. Marcella Houser".to_string(),
            last_visit: "2024-01-15".to_string(),
            preferred_language: "Spanish".to_string(),
            risk_level: RiskLevel::High,
        },
        Patient {
            id: 2,
            name: "James Washington".to_string(),
            phone: "(504) 555-0156".to_string(),
            address: "3456 S. Carrollton Ave, New Orleans, LA 70118".to_string(),
            age: 32,
            gender: "Male".to_string(),
            last_provider: "Kelly Franovich, NP".to_string(),
            last_visit: "2023-12-20".to_string(),
            preferred_language: "English".to_string(),
            risk_level: RiskLevel::Medium,
        },
        Patient {
            id: 3,
            name: "Emma Thompson".to_string(),
            phone: "(504) 555-0189".to_string(),
            address: "5789 Read Blvd, New Orleans, LA 70127".to_string(),
            age: 8,
            gender: "Female".to_string(),
            last_provider: "Dr. Marcella Houser (Pediatrics)".to_string(),
            last_visit: "2024-02-10".to_string(),
            preferred_language: "English".to_string(),
            risk_level: RiskLevel::Low,
        },
        Patient {
            id: 4,
            name: "Eleanor Vance".to_string(),
            phone: "(504) 555-0211".to_string(),
            address: "4501 St Charles Ave, New Orleans, LA 70115".to_string(),
            age: 78,
            gender: "Female".to_string(),
            last_provider: "Dr. Robert Post".to_string(),
            last_visit: "2023-10-05".to_string(),
            preferred_language: "English".to_string(),
            risk_level: RiskLevel::High,
        },
    ]
}

/// Look up a directory patient by id.
pub fn find_patient(patients: &[Patient], id: PatientId) -> Option<&Patient> {
    patients.iter().find(|p| p.id == id)
}

/// The patient used for scripted demo chats: the one named `name`, or the
/// first directory patient when nobody matches.
pub fn demo_patient<'a>(patients: &'a [Patient], name: &str) -> Option<&'a Patient> {
    patients
        .iter()
        .find(|p| p.name == name)
        .or_else(|| patients.first())
}

/// The default example prompts as owned strings.
pub fn default_prompts() -> Vec<String> {
    DEFAULT_EXAMPLE_PROMPTS.iter().map(|p| p.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_patients_have_unique_ids() {
        let patients = demo_patients();
        let mut ids: Vec<_> = patients.iter().map(|p| p.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), patients.len());
    }

    #[test]
    fn test_find_patient() {
        let patients = demo_patients();
        assert_eq!(find_patient(&patients, 3).map(|p| p.name.as_str()), Some("Emma Thompson"));
        assert!(find_patient(&patients, 99).is_none());
    }

    #[test]
    fn test_demo_patient_by_name() {
        let patients = demo_patients();
        let p = demo_patient(&patients, "James Washington").unwrap();
        assert_eq!(p.id, 2);
    }

    #[test]
    fn test_demo_patient_falls_back_to_first() {
        let patients = demo_patients();
        let p = demo_patient(&patients, "Nobody Here").unwrap();
        assert_eq!(p.name, "Maria Rodriguez");
        assert!(demo_patient(&[], "James Washington").is_none());
    }

    #[test]
    fn test_default_prompts_has_six_entries() {
        assert_eq!(default_prompts().len(), 6);
        assert_eq!(default_prompts()[0], "I need to schedule an appointment online.");
    }

    #[test]
    fn test_clinics_and_providers_present() {
        assert_eq!(CLINICS.len(), 5);
        assert!(PROVIDERS.iter().any(|p| p.name == "Dr. Robert Post"));
        assert!(SCHEDULING_URL.starts_with("https://"));
    }
}
