//! Prompt assembly for chat turns and document analyses.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::models::{Document, Message, Role};
use crate::personality::Personality;
use crate::retrieval::Retrieval;

/// Appended to every personality preamble for chat turns.
const GROUNDING_INSTRUCTIONS: &str = "You will be given excerpts from the user's documents \
and a question. Base your answer on those excerpts. If they do not contain the information \
needed, say so plainly and describe what would be needed. Be conversational but informative, \
and refer to the source file names when you rely on them.";

/// The reply is parsed by [`crate::mindmap::parse_mind_map`].
const MIND_MAP_INSTRUCTION: &str = r#"Create a mind map of these documents. Return ONLY a JSON object of this form, with no explanations:

{
  "title": "Document Mind Map",
  "themes": [
    {
      "name": "Theme Name",
      "summary": "Brief description",
      "sub_themes": [
        {"name": "Subtopic Name", "summary": "Brief description", "sub_themes": []}
      ]
    }
  ]
}

Create 4-6 main themes based on the actual document content, each with 2-4 meaningful subtopics. Keep names under 40 characters and summaries under 100 characters."#;

const NO_CONTEXT: &str = "(No relevant passages were found in the loaded documents.)";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptTurn {
    pub role: Role,
    pub text: String,
}

/// A prompt ready for the generation backend.
///
/// Chat-style backends map `system`, `history`, and `user` to separate
/// messages; plain-text backends can use [`Prompt::render`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prompt {
    pub system: String,
    pub history: Vec<PromptTurn>,
    pub user: String,
}

impl Prompt {
    /// Flatten into a single text block.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&self.system);
        for turn in &self.history {
            let who = match turn.role {
                Role::User => "User",
                Role::Assistant => "Assistant",
            };
            out.push_str(&format!("\n\n{}: {}", who, turn.text));
        }
        out.push_str("\n\nUser: ");
        out.push_str(&self.user);
        out
    }
}

/// Build the prompt for one chat turn.
///
/// `history` holds the turns before `query`; only the last `window`
/// successful ones are included.
pub fn chat_prompt(
    personality: Personality,
    retrieval: &Retrieval,
    history: &[Message],
    window: usize,
    query: &str,
) -> Prompt {
    let usable: Vec<&Message> = history.iter().filter(|m| !m.is_error()).collect();
    let skip = usable.len().saturating_sub(window);
    let history = usable[skip..]
        .iter()
        .map(|m| PromptTurn {
            role: m.role,
            text: m.text.clone(),
        })
        .collect();

    let context = if retrieval.is_empty() {
        NO_CONTEXT
    } else {
        retrieval.context.as_str()
    };

    Prompt {
        system: format!("{}\n\n{}", personality.instructions(), GROUNDING_INSTRUCTIONS),
        history,
        user: format!(
            "Document content:\n{}\n\nQuestion: {}\n\nPlease answer the question based on the document content above.",
            context, query
        ),
    }
}

/// Whole-corpus analyses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    Summary,
    KeyPoints,
    Sentiment,
    Themes,
    MindMap,
}

impl AnalysisKind {
    pub const ALL: [AnalysisKind; 5] = [
        AnalysisKind::Summary,
        AnalysisKind::KeyPoints,
        AnalysisKind::Sentiment,
        AnalysisKind::Themes,
        AnalysisKind::MindMap,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            AnalysisKind::Summary => "summary",
            AnalysisKind::KeyPoints => "key_points",
            AnalysisKind::Sentiment => "sentiment",
            AnalysisKind::Themes => "themes",
            AnalysisKind::MindMap => "mind_map",
        }
    }

    pub fn instruction(&self) -> &'static str {
        match self {
            AnalysisKind::Summary => {
                "Provide a comprehensive summary of these documents, highlighting the main points and key takeaways."
            }
            AnalysisKind::KeyPoints => {
                "Extract and list the key points, findings, or conclusions from these documents in a clear, organized format."
            }
            AnalysisKind::Sentiment => {
                "Analyze the tone and sentiment of these documents. Consider the emotional undertones and overall attitude."
            }
            AnalysisKind::Themes => {
                "Identify the main themes, topics, and recurring concepts discussed in these documents."
            }
            AnalysisKind::MindMap => MIND_MAP_INSTRUCTION,
        }
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for AnalysisKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        AnalysisKind::ALL
            .into_iter()
            .find(|k| k.key() == wanted)
            .ok_or_else(|| ConfigError::UnknownAnalysis(s.to_string()))
    }
}

/// Build the prompt for an analysis over the loaded documents, using at
/// most `max_chars` characters of document text.
pub fn analysis_prompt(
    personality: Personality,
    kind: AnalysisKind,
    documents: &[Document],
    max_chars: usize,
) -> Prompt {
    let mut body = String::new();
    let mut remaining = max_chars;
    for doc in documents {
        if remaining == 0 {
            break;
        }
        let header = format!("[From {}]\n", doc.filename);
        let taken: String = header
            .chars()
            .chain(doc.raw_text.chars())
            .take(remaining)
            .collect();
        remaining -= taken.chars().count();
        if !body.is_empty() {
            body.push_str("\n\n");
        }
        body.push_str(&taken);
    }

    Prompt {
        system: format!(
            "{}\n\nProvide a thorough analysis based on your expertise.",
            personality.instructions()
        ),
        history: Vec::new(),
        user: format!("{}\n\nDocuments:\n{}", kind.instruction(), body),
    }
}
