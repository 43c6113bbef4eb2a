//! Built-in question bank
//!
//! Questions are asked in a fixed plan: two introductory, three technical
//! (per level, with resume-tailored questions first) and two behavioral.
//! Additional banks can be loaded from `<interview_type>.json` files.

use super::{CollaboratorError, QuestionGenerator, QuestionOutcome, QuestionRequest};
use crate::state_machine::{Question, QuestionCategory};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, OnceLock};

/// Bank used for interview types without a bank of their own
pub const DEFAULT_BANK: &str = "software_engineer";

/// Questions per category, in the order they are asked
pub const PLAN: &[(QuestionCategory, usize)] = &[
    (QuestionCategory::Intro, 2),
    (QuestionCategory::Technical, 3),
    (QuestionCategory::Behavioral, 2),
];

/// Resume-tailored questions per session
const MAX_TAILORED: usize = 3;

const KNOWN_SKILLS: &[&str] = &[
    "Python", "Rust", "Go", "Java", "JavaScript", "TypeScript", "C++", "C#", "SQL", "PostgreSQL",
    "MySQL", "MongoDB", "Redis", "Kafka", "Docker", "Kubernetes", "Terraform", "AWS", "GCP",
    "Azure", "React", "Angular", "Vue", "Django", "Flask", "Node.js", "GraphQL", "Spark",
    "Pandas", "Scikit-learn", "TensorFlow", "PyTorch", "Flutter", "Power BI",
];

/// Questions for one interview type
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct BankEntry {
    #[serde(default)]
    pub intro: Vec<String>,
    /// Keyed by level
    #[serde(default)]
    pub technical: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub behavioral: Vec<String>,
}

impl BankEntry {
    fn software_engineer() -> Self {
        let strings = |items: &[&str]| items.iter().map(|s| (*s).to_string()).collect::<Vec<_>>();
        let mut technical = BTreeMap::new();
        technical.insert(
            "junior".to_string(),
            strings(&[
                "What is a list in Python?",
                "Explain APIs.",
                "What is the difference between a process and a thread?",
            ]),
        );
        technical.insert(
            "mid".to_string(),
            strings(&[
                "Explain the difference between a list and a tuple in Python.",
                "How would you optimize a slow SQL query?",
                "How do database indexes work?",
            ]),
        );
        technical.insert(
            "senior".to_string(),
            strings(&[
                "Design a scalable microservices architecture.",
                "Explain the CAP theorem.",
                "How would you roll out a breaking schema change with zero downtime?",
            ]),
        );
        Self {
            intro: strings(&[
                "Tell me about yourself.",
                "Why do you want to work in software engineering?",
            ]),
            technical,
            behavioral: strings(&[
                "Describe a time you faced a challenging bug.",
                "Tell me about a team project.",
            ]),
        }
    }

    fn questions(&self, category: QuestionCategory, level: &str) -> &[String] {
        match category {
            QuestionCategory::Intro => &self.intro,
            QuestionCategory::Technical => self.technical.get(level).map(Vec::as_slice).unwrap_or_default(),
            QuestionCategory::Behavioral => &self.behavioral,
        }
    }
}

pub struct QuestionBank {
    banks: BTreeMap<String, BankEntry>,
    rng: Mutex<StdRng>,
}

impl QuestionBank {
    /// Bank with only the built-in software engineering questions
    pub fn builtin() -> Self {
        Self::with_banks(BTreeMap::new())
    }

    /// Built-in bank plus the given entries; an entry named
    /// `software_engineer` replaces the built-in one.
    pub fn with_banks(extra: BTreeMap<String, BankEntry>) -> Self {
        let mut banks = BTreeMap::new();
        banks.insert(DEFAULT_BANK.to_string(), BankEntry::software_engineer());
        banks.extend(extra);
        Self {
            banks,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Built-in bank plus every `*.json` file in `dir`. Files that fail to
    /// parse are skipped with a warning.
    pub fn load_dir(dir: &Path) -> std::io::Result<Self> {
        let mut extra = BTreeMap::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let name = crate::state_machine::state::normalize_label(stem);
            let parsed = std::fs::read_to_string(&path)
                .map_err(|e| e.to_string())
                .and_then(|raw| serde_json::from_str::<BankEntry>(&raw).map_err(|e| e.to_string()));
            match parsed {
                Ok(bank) => {
                    tracing::debug!(bank = %name, path = %path.display(), "Loaded question bank");
                    extra.insert(name, bank);
                }
                Err(error) => {
                    tracing::warn!(path = %path.display(), %error, "Skipping invalid question bank");
                }
            }
        }
        Ok(Self::with_banks(extra))
    }

    /// Reproducible question order
    #[must_use]
    pub fn with_seed(self, seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            ..self
        }
    }

    /// Interview types with a bank of their own
    pub fn interview_types(&self) -> Vec<String> {
        self.banks.keys().cloned().collect()
    }

    fn bank_for(&self, interview_type: &str) -> &BankEntry {
        self.banks
            .get(interview_type)
            .or_else(|| self.banks.get(DEFAULT_BANK))
            .unwrap_or(default_entry())
    }

    /// Next question following the plan, skipping anything already asked
    fn next_question(&self, request: &QuestionRequest) -> QuestionOutcome {
        let bank = self.bank_for(&request.interview_type);

        for &(category, quota) in PLAN {
            let asked = request
                .history
                .iter()
                .filter(|turn| turn.question.category == Some(category))
                .count();
            if asked >= quota {
                continue;
            }

            if category == QuestionCategory::Technical {
                if let Some(text) = tailored_questions(request)
                    .into_iter()
                    .find(|text| !request.has_asked(text))
                {
                    return QuestionOutcome::Question(Question::new(text).with_category(category));
                }
            }

            let candidates: Vec<&String> = bank
                .questions(category, &request.level)
                .iter()
                .filter(|text| !request.has_asked(text))
                .collect();
            let picked = match self.rng.lock() {
                Ok(mut rng) => candidates.choose(&mut *rng).copied(),
                Err(_) => candidates.first().copied(),
            };
            if let Some(text) = picked {
                return QuestionOutcome::Question(Question::new(text.clone()).with_category(category));
            }
        }

        QuestionOutcome::Exhausted
    }
}

#[async_trait]
impl QuestionGenerator for QuestionBank {
    async fn generate(&self, request: &QuestionRequest) -> Result<QuestionOutcome, CollaboratorError> {
        Ok(self.next_question(request))
    }

    fn name(&self) -> &str {
        "question_bank"
    }
}

fn default_entry() -> &'static BankEntry {
    static ENTRY: OnceLock<BankEntry> = OnceLock::new();
    ENTRY.get_or_init(BankEntry::software_engineer)
}

fn skill_patterns() -> &'static [(&'static str, Regex)] {
    static PATTERNS: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        KNOWN_SKILLS
            .iter()
            .filter_map(|skill| {
                let pattern = format!(r"(?i)(?:^|[^\w+#.]){}(?:$|[^\w+#])", regex::escape(skill));
                Regex::new(&pattern).ok().map(|re| (*skill, re))
            })
            .collect()
    })
}

/// Skills from the known list that the resume mentions, in list order
pub fn resume_skills(resume: &str) -> Vec<&'static str> {
    skill_patterns()
        .iter()
        .filter(|(_, re)| re.is_match(resume))
        .map(|(skill, _)| *skill)
        .collect()
}

fn tailored_questions(request: &QuestionRequest) -> Vec<String> {
    let Some(resume) = &request.resume_context else {
        return vec![];
    };
    let field = request.interview_type.replace('_', " ");
    resume_skills(resume)
        .into_iter()
        .take(MAX_TAILORED)
        .enumerate()
        .map(|(i, skill)| match i % 3 {
            0 => format!("Explain how you used {skill} in a project."),
            1 => format!("Describe your experience with {skill} in {field} work."),
            _ => format!("What trade-offs have you run into when using {skill}?"),
        })
        .collect()
}
