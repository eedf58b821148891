use anyhow::{anyhow, Result};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;

use crate::ai::{ClaudeClient, OllamaClient, OpenAIClient};
use crate::provider::Provider;

/// The four study operations offered on the Study screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsightKind {
    Commentary,
    Lexicon,
    Context,
    Parallels,
}

impl InsightKind {
    pub fn all() -> [InsightKind; 4] {
        [
            InsightKind::Commentary,
            InsightKind::Lexicon,
            InsightKind::Context,
            InsightKind::Parallels,
        ]
    }

    pub fn title(&self) -> &'static str {
        match self {
            InsightKind::Commentary => "Commentary",
            InsightKind::Lexicon => "Greek & Hebrew",
            InsightKind::Context => "Historical Context",
            InsightKind::Parallels => "Parallel Passages",
        }
    }

    /// The one user-facing message shown when this operation fails, no
    /// matter the underlying cause.
    pub fn failure_message(&self) -> &'static str {
        match self {
            InsightKind::Commentary => "Unable to generate commentary. Please try again.",
            InsightKind::Lexicon => "Unable to analyze the original languages. Please try again.",
            InsightKind::Context => "Unable to load historical context. Please try again.",
            InsightKind::Parallels => "Unable to find parallel passages. Please try again.",
        }
    }
}

/// A key term from the passage in its original language.
#[derive(Debug, Clone, Deserialize)]
pub struct WordStudy {
    pub word: String,
    pub original: String,
    pub transliteration: String,
    pub language: String,
    pub definition: String,
    pub significance: String,
}

/// Historical background for the passage.
#[derive(Debug, Clone, Deserialize)]
pub struct ContextData {
    pub period: String,
    pub setting: String,
    pub author_and_audience: String,
    pub cultural_notes: String,
    pub relevance: String,
}

/// A related passage elsewhere in scripture.
#[derive(Debug, Clone, Deserialize)]
pub struct Parallel {
    pub reference: String,
    pub summary: String,
    pub connection: String,
}

/// A completed study result, tagged by operation.
#[derive(Debug, Clone)]
pub enum Insight {
    Commentary(String),
    Lexicon(Vec<WordStudy>),
    Context(ContextData),
    Parallels(Vec<Parallel>),
}

/// What the user is currently studying; every operation takes the same
/// three inputs.
#[derive(Debug, Clone)]
pub struct StudyRequest {
    pub passage: String,
    pub translation: String,
    pub language: String,
}

/// Canonical book names recognized when pulling references out of
/// generated commentary. "Psalm" appears alongside "Psalms" because
/// single-chapter citations usually use the singular.
const BOOKS: &[&str] = &[
    "Genesis", "Exodus", "Leviticus", "Numbers", "Deuteronomy", "Joshua",
    "Judges", "Ruth", "1 Samuel", "2 Samuel", "1 Kings", "2 Kings",
    "1 Chronicles", "2 Chronicles", "Ezra", "Nehemiah", "Esther", "Job",
    "Psalms", "Psalm", "Proverbs", "Ecclesiastes", "Song of Solomon",
    "Song of Songs", "Isaiah", "Jeremiah", "Lamentations", "Ezekiel",
    "Daniel", "Hosea", "Joel", "Amos", "Obadiah", "Jonah", "Micah", "Nahum",
    "Habakkuk", "Zephaniah", "Haggai", "Zechariah", "Malachi", "Matthew",
    "Mark", "Luke", "John", "Acts", "Romans", "1 Corinthians",
    "2 Corinthians", "Galatians", "Ephesians", "Philippians", "Colossians",
    "1 Thessalonians", "2 Thessalonians", "1 Timothy", "2 Timothy", "Titus",
    "Philemon", "Hebrews", "James", "1 Peter", "2 Peter", "1 John",
    "2 John", "3 John", "Jude", "Revelation",
];

#[derive(Deserialize)]
struct WordStudyEnvelope {
    words: Vec<WordStudy>,
}

#[derive(Deserialize)]
struct ParallelEnvelope {
    passages: Vec<Parallel>,
}

/// Prompt construction, provider dispatch, and response parsing for the
/// study operations. All real work happens in the external model; this
/// layer only shapes requests and results.
#[derive(Clone)]
pub struct InsightService {
    pub ollama: OllamaClient,
    pub claude: Option<ClaudeClient>,
    pub openai: Option<OpenAIClient>,
    reference_re: Regex,
}

impl InsightService {
    pub fn new(
        ollama: OllamaClient,
        claude: Option<ClaudeClient>,
        openai: Option<OpenAIClient>,
    ) -> Result<Self> {
        // Matches "John 3:16", "1 Corinthians 13:4-7", "Song of Solomon 2:1".
        // Book names come from the canonical list; longer names go first so
        // the alternation prefers "1 John" over "John".
        let mut books: Vec<&str> = BOOKS.to_vec();
        books.sort_by_key(|b| std::cmp::Reverse(b.len()));
        let reference_re = Regex::new(&format!(
            r"\b(?:{})\s\d+:\d+(?:-\d+)?",
            books.join("|")
        ))?;
        Ok(Self {
            ollama,
            claude,
            openai,
            reference_re,
        })
    }

    /// Run one study operation against the selected provider and model.
    pub async fn fetch(
        &self,
        provider: Provider,
        model: &str,
        kind: InsightKind,
        request: &StudyRequest,
    ) -> Result<Insight> {
        let system = system_prompt(kind);
        let prompt = build_prompt(kind, request);
        let json = kind != InsightKind::Commentary;

        let raw = match provider {
            Provider::Ollama => self.ollama.query(model, system, &prompt, json).await?,
            Provider::Claude => {
                let client = self
                    .claude
                    .as_ref()
                    .ok_or_else(|| anyhow!("Claude API key not configured"))?;
                client.query(model, system, &prompt, json).await?
            }
            Provider::OpenAI => {
                let client = self
                    .openai
                    .as_ref()
                    .ok_or_else(|| anyhow!("OpenAI API key not configured"))?;
                client.query(model, system, &prompt, json).await?
            }
        };

        parse_response(kind, &raw)
    }

    /// Pull scripture references out of generated commentary, deduped in
    /// order of first appearance.
    pub fn extract_references(&self, text: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut references = Vec::new();
        for m in self.reference_re.find_iter(text) {
            let reference = m.as_str().to_string();
            if seen.insert(reference.clone()) {
                references.push(reference);
            }
        }
        references
    }
}

fn system_prompt(kind: InsightKind) -> &'static str {
    match kind {
        InsightKind::Commentary => {
            "You are a biblical scholar writing pastoral commentary for sermon \
             preparation. Ground every claim in the text itself and cite verses \
             precisely. Respond in markdown."
        }
        InsightKind::Lexicon => {
            "You are a biblical languages expert. Identify the key Greek or Hebrew \
             terms in the passage. Respond with a JSON object of the form \
             {\"words\": [{\"word\": ..., \"original\": ..., \"transliteration\": ..., \
             \"language\": ..., \"definition\": ..., \"significance\": ...}]} and \
             nothing else."
        }
        InsightKind::Context => {
            "You are a historian of the ancient Near East and the Greco-Roman world. \
             Respond with a JSON object of the form {\"period\": ..., \"setting\": ..., \
             \"author_and_audience\": ..., \"cultural_notes\": ..., \"relevance\": ...} \
             and nothing else."
        }
        InsightKind::Parallels => {
            "You are a scripture cross-reference specialist. Find passages that \
             parallel the given one thematically or verbally. Respond with a JSON \
             object of the form {\"passages\": [{\"reference\": ..., \"summary\": ..., \
             \"connection\": ...}]} and nothing else."
        }
    }
}

fn build_prompt(kind: InsightKind, request: &StudyRequest) -> String {
    let mut prompt = String::new();

    prompt.push_str("Passage: ");
    prompt.push_str(&request.passage);
    prompt.push('\n');
    prompt.push_str("Translation: ");
    prompt.push_str(&request.translation);
    prompt.push('\n');
    prompt.push_str("Answer in ");
    prompt.push_str(&request.language);
    prompt.push_str(".\n\n");

    match kind {
        InsightKind::Commentary => {
            prompt.push_str(
                "Write a verse-by-verse commentary on this passage suitable for \
                 sermon preparation. Cover the flow of the argument, key themes, \
                 and preaching angles. Cite related scripture references.",
            );
        }
        InsightKind::Lexicon => {
            prompt.push_str(
                "List the most significant original-language terms in this passage \
                 (at most eight), with their meaning and why each matters for \
                 interpretation.",
            );
        }
        InsightKind::Context => {
            prompt.push_str(
                "Describe the historical setting of this passage: the period, the \
                 place, who wrote it for whom, the cultural background a modern \
                 reader misses, and why that background matters for preaching it.",
            );
        }
        InsightKind::Parallels => {
            prompt.push_str(
                "List passages elsewhere in scripture that parallel this one (at \
                 most eight), with a one-sentence summary of each and how it \
                 connects to the passage.",
            );
        }
    }

    prompt
}

fn parse_response(kind: InsightKind, raw: &str) -> Result<Insight> {
    match kind {
        InsightKind::Commentary => Ok(Insight::Commentary(raw.trim().to_string())),
        InsightKind::Lexicon => {
            let envelope: WordStudyEnvelope = serde_json::from_str(extract_json(raw))?;
            Ok(Insight::Lexicon(envelope.words))
        }
        InsightKind::Context => {
            let context: ContextData = serde_json::from_str(extract_json(raw))?;
            Ok(Insight::Context(context))
        }
        InsightKind::Parallels => {
            let envelope: ParallelEnvelope = serde_json::from_str(extract_json(raw))?;
            Ok(Insight::Parallels(envelope.passages))
        }
    }
}

/// Models often wrap JSON in markdown fences or lead-in prose; cut the
/// reply down to the outermost object before parsing.
fn extract_json(raw: &str) -> &str {
    let trimmed = raw.trim();

    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        let after = after.strip_prefix("json").unwrap_or(after);
        if let Some(end) = after.find("```") {
            return after[..end].trim();
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            return &trimmed[start..=end];
        }
    }

    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> InsightService {
        InsightService::new(OllamaClient::new("http://localhost:11434"), None, None)
            .expect("service")
    }

    #[test]
    fn test_extract_json_bare() {
        assert_eq!(extract_json(r#"{"period": "exile"}"#), r#"{"period": "exile"}"#);
    }

    #[test]
    fn test_extract_json_fenced() {
        let raw = "```json\n{\"words\": []}\n```";
        assert_eq!(extract_json(raw), r#"{"words": []}"#);
    }

    #[test]
    fn test_extract_json_with_prose() {
        let raw = "Here is the analysis you asked for:\n{\"passages\": []}\nHope this helps!";
        assert_eq!(extract_json(raw), r#"{"passages": []}"#);
    }

    #[test]
    fn test_parse_lexicon_response() {
        let raw = r#"{"words": [{"word": "love", "original": "ἀγάπη",
            "transliteration": "agape", "language": "Greek",
            "definition": "self-giving love", "significance": "the chapter's theme"}]}"#;
        match parse_response(InsightKind::Lexicon, raw).expect("parse") {
            Insight::Lexicon(words) => {
                assert_eq!(words.len(), 1);
                assert_eq!(words[0].transliteration, "agape");
            }
            other => panic!("wrong variant: {:?}", other),
        }
    }

    #[test]
    fn test_parse_context_response() {
        let raw = r#"{"period": "c. AD 55", "setting": "Corinth",
            "author_and_audience": "Paul to the Corinthian church",
            "cultural_notes": "a port city of rival patrons",
            "relevance": "status-seeking splits churches today too"}"#;
        match parse_response(InsightKind::Context, raw).expect("parse") {
            Insight::Context(context) => assert_eq!(context.setting, "Corinth"),
            other => panic!("wrong variant: {:?}", other),
        }
    }

    #[test]
    fn test_parse_failure_is_an_error() {
        assert!(parse_response(InsightKind::Parallels, "no json here at all").is_err());
    }

    #[test]
    fn test_commentary_passes_text_through() {
        match parse_response(InsightKind::Commentary, "  ## Romans 8\nbody\n").expect("parse") {
            Insight::Commentary(text) => assert_eq!(text, "## Romans 8\nbody"),
            other => panic!("wrong variant: {:?}", other),
        }
    }

    #[test]
    fn test_build_prompt_carries_all_inputs() {
        let request = StudyRequest {
            passage: "Romans 8:28-39".to_string(),
            translation: "ESV".to_string(),
            language: "English".to_string(),
        };
        let prompt = build_prompt(InsightKind::Commentary, &request);
        assert!(prompt.contains("Romans 8:28-39"));
        assert!(prompt.contains("ESV"));
        assert!(prompt.contains("English"));
    }

    #[test]
    fn test_extract_references_dedupes_in_order() {
        let svc = service();
        let text = "Compare John 3:16 with 1 Corinthians 13:4-7, then John 3:16 again.";
        assert_eq!(
            svc.extract_references(text),
            vec!["John 3:16".to_string(), "1 Corinthians 13:4-7".to_string()]
        );
    }

    #[test]
    fn test_extract_references_multiword_books() {
        let svc = service();
        let refs = svc.extract_references("See Song of Solomon 2:1 for the image.");
        assert_eq!(refs, vec!["Song of Solomon 2:1".to_string()]);
    }

    #[test]
    fn test_extract_references_ignores_non_book_words() {
        let svc = service();
        let refs = svc.extract_references("Verse 3:16 echoes the motif; see also John 3:16.");
        assert_eq!(refs, vec!["John 3:16".to_string()]);
    }
}
