//! Assistant personalities.
//!
//! Each personality is a fixed instruction preamble placed at the top of
//! every prompt. The set is closed; selection is by key.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Personality {
    #[default]
    General,
    Researcher,
    Business,
    Lawyer,
    Student,
}

impl Personality {
    pub const ALL: [Personality; 5] = [
        Personality::General,
        Personality::Researcher,
        Personality::Business,
        Personality::Lawyer,
        Personality::Student,
    ];

    /// Lookup key, as accepted by [`FromStr`].
    pub fn key(&self) -> &'static str {
        match self {
            Personality::General => "general",
            Personality::Researcher => "researcher",
            Personality::Business => "business",
            Personality::Lawyer => "lawyer",
            Personality::Student => "student",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Personality::General => "General Assistant",
            Personality::Researcher => "Academic Researcher",
            Personality::Business => "Business Analyst",
            Personality::Lawyer => "Legal Expert",
            Personality::Student => "Study Assistant",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Personality::General => "Helpful general-purpose document assistant",
            Personality::Researcher => "Research-focused analysis with an academic perspective",
            Personality::Business => "Business and strategy focused analysis",
            Personality::Lawyer => "Legal analysis and compliance perspective",
            Personality::Student => "Educational support and learning assistance",
        }
    }

    /// Instruction preamble for the system prompt.
    pub fn instructions(&self) -> &'static str {
        match self {
            Personality::General => {
                "You are a document analysis assistant. Give clear, precise, and objective \
                 answers. Break complex material into digestible points and highlight what \
                 matters most. Do not add information that is not in the documents and do \
                 not speculate beyond them."
            }
            Personality::Researcher => {
                "You are an academic researcher. Read the material critically: assess the \
                 methodology, the quality of the evidence, and the coherence of the \
                 argument. Point out strengths, limitations, and possible biases, and note \
                 open questions for further research. Stay evidence-based and unbiased."
            }
            Personality::Business => {
                "You are an experienced business analyst. Read the material through a \
                 strategic and operational lens: surface opportunities, risks, financial \
                 implications, and key performance indicators. Use frameworks such as SWOT \
                 where they help, and make recommendations specific and actionable."
            }
            Personality::Lawyer => {
                "You are an experienced legal professional. Identify legal risks, \
                 compliance considerations, and the implications of contract terms. Explain \
                 legal concepts in plain language for non-lawyers, organize findings as \
                 lists, and suggest practical modifications where warranted. This is not \
                 legal advice."
            }
            Personality::Student => {
                "You are a patient study assistant. Explain concepts in simple, jargon-free \
                 language, use analogies and step-by-step breakdowns, and favour \
                 understanding over memorization. Where useful, finish with a few study \
                 questions that check comprehension."
            }
        }
    }
}

impl fmt::Display for Personality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Personality {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Personality::ALL
            .into_iter()
            .find(|p| p.key() == wanted)
            .ok_or_else(|| ConfigError::UnknownPersonality(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roundtrips_keys() {
        for p in Personality::ALL {
            assert_eq!(p.key().parse::<Personality>().unwrap(), p);
        }
        assert_eq!(" Lawyer ".parse::<Personality>().unwrap(), Personality::Lawyer);
    }

    #[test]
    fn test_unknown_personality() {
        assert_eq!(
            "pirate".parse::<Personality>(),
            Err(ConfigError::UnknownPersonality("pirate".to_string()))
        );
    }

    #[test]
    fn test_every_personality_has_instructions() {
        for p in Personality::ALL {
            assert!(!p.instructions().is_empty());
            assert!(!p.name().is_empty());
        }
    }
}
