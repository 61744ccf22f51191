//! Domain types shared by the store, the ranker and the topic tree.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::{Error, Result};

pub type ChunkId = String;
pub type DocId = String;

/// Coarse structural tag of the text a chunk was cut from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Abstract,
    Methods,
    Results,
    Discussion,
    Conclusion,
    Funding,
    Acknowledgements,
    Other,
}

impl Section {
    pub const ALL: [Section; 8] = [
        Section::Abstract,
        Section::Methods,
        Section::Results,
        Section::Discussion,
        Section::Conclusion,
        Section::Funding,
        Section::Acknowledgements,
        Section::Other,
    ];

    /// Map a metadata section tag onto the closed set. Unknown tags are `Other`.
    pub fn parse(label: &str) -> Self {
        match normalize_label(label).as_str() {
            "abstract" | "summary" => Section::Abstract,
            "methods" | "method" | "methodology" | "materials and methods" | "material and methods" | "materials & methods" => Section::Methods,
            "results" | "result" | "findings" => Section::Results,
            "discussion" | "results and discussion" => Section::Discussion,
            "conclusion" | "conclusions" | "concluding remarks" => Section::Conclusion,
            "funding" | "funding information" | "financial support" => Section::Funding,
            "acknowledgements" | "acknowledgments" | "acknowledgement" | "acknowledgment" => Section::Acknowledgements,
            _ => Section::Other,
        }
    }

    /// Strict lookup by canonical name, used for configuration keys.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == name.trim().to_lowercase())
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Section::Abstract => "abstract",
            Section::Methods => "methods",
            Section::Results => "results",
            Section::Discussion => "discussion",
            Section::Conclusion => "conclusion",
            Section::Funding => "funding",
            Section::Acknowledgements => "acknowledgements",
            Section::Other => "other",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Lowercase, trimmed, single-spaced form of a free-text label.
pub fn normalize_label(label: &str) -> String {
    label.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Viewer persona. Drives section weights, content boosts and summary tone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Role {
    #[default]
    Researcher,
    #[serde(rename = "Funding Manager")]
    FundingManager,
    Student,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Researcher, Role::FundingManager, Role::Student];

    /// Strict parse of canonical names (`Researcher`, `Funding Manager`, `Student`).
    pub fn parse(name: &str) -> Option<Self> {
        match normalize_label(name).replace(['_', '-'], " ").as_str() {
            "researcher" => Some(Role::Researcher),
            "funding manager" | "fundingmanager" => Some(Role::FundingManager),
            "student" => Some(Role::Student),
            _ => None,
        }
    }

    /// Total mapping from any external role label. Unrecognized labels fall
    /// back to `Researcher`.
    pub fn from_alias(label: &str) -> Self {
        if let Some(role) = Self::parse(label) { return role; }
        match normalize_label(label).as_str() {
            "researcher/scientist" | "scientist" | "research scientist" => Role::Researcher,
            "manager/investor" | "manager" | "investor" | "funder" | "program manager" => Role::FundingManager,
            "learner" | "student/learner" => Role::Student,
            _ => Role::Researcher,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Researcher => "Researcher",
            Role::FundingManager => "Funding Manager",
            Role::Student => "Student",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Role -> section -> weight in [0, 1]. Missing entries weigh 0.0.
#[derive(Debug, Clone, PartialEq)]
pub struct RoleWeights {
    table: HashMap<Role, HashMap<Section, f32>>,
}

impl RoleWeights {
    pub fn empty() -> Self { Self { table: HashMap::new() } }

    pub fn weight(&self, role: Role, section: Section) -> f32 {
        self.table.get(&role).and_then(|m| m.get(&section)).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, role: Role, section: Section, weight: f32) -> Result<()> {
        if !(0.0..=1.0).contains(&weight) {
            return Err(Error::InvalidConfig(format!("weight for {role}/{section} must be in [0, 1], got {weight}")));
        }
        self.table.entry(role).or_default().insert(section, weight);
        Ok(())
    }

    /// Replace whole role rows with the rows present in `other`.
    pub fn merge(&mut self, other: RoleWeights) {
        for (role, row) in other.table {
            self.table.insert(role, row);
        }
    }

    /// Build from string-keyed tables as they appear in configuration files.
    pub fn from_named(named: &HashMap<String, HashMap<String, f32>>) -> Result<Self> {
        let mut weights = Self::empty();
        for (role_name, sections) in named {
            let role = Role::parse(role_name).ok_or_else(|| Error::InvalidConfig(format!("unknown role in weights: '{role_name}'")))?;
            for (section_name, &w) in sections {
                let section = Section::from_name(section_name)
                    .ok_or_else(|| Error::InvalidConfig(format!("unknown section in weights for {role}: '{section_name}'")))?;
                weights.set(role, section, w)?;
            }
        }
        Ok(weights)
    }
}

impl Default for RoleWeights {
    fn default() -> Self {
        let mut table: HashMap<Role, HashMap<Section, f32>> = HashMap::new();
        table.insert(Role::Researcher, HashMap::from([
            (Section::Methods, 0.4),
            (Section::Results, 0.35),
            (Section::Abstract, 0.15),
            (Section::Conclusion, 0.05),
            (Section::Funding, 0.03),
        ]));
        table.insert(Role::FundingManager, HashMap::from([
            (Section::Funding, 0.5),
            (Section::Conclusion, 0.25),
            (Section::Abstract, 0.15),
            (Section::Acknowledgements, 0.05),
        ]));
        table.insert(Role::Student, HashMap::from([
            (Section::Abstract, 0.5),
            (Section::Conclusion, 0.3),
            (Section::Results, 0.15),
        ]));
        Self { table }
    }
}

/// One line of the `_chunks.jsonl` metadata file.
///
/// Unknown fields are kept in `extra` so records survive a rewrite unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub chunk_id: ChunkId,
    pub doc_id: DocId,
    #[serde(default)]
    pub pmcid: String,
    #[serde(default)]
    pub section: String,
    #[serde(default)]
    pub chunk_text: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A validated, immutable chunk of article text.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub chunk_id: ChunkId,
    pub doc_id: DocId,
    pub pmcid: String,
    pub section: Section,
    /// Normalized raw section tag, kept for heuristics finer than `Section`.
    pub section_label: String,
    pub text: String,
    pub title: String,
    pub url: String,
}

impl Chunk {
    pub fn from_record(record: ChunkRecord) -> Result<Self> {
        if record.chunk_id.trim().is_empty() {
            return Err(Error::CorpusIntegrity(format!("chunk with empty chunk_id (doc_id '{}')", record.doc_id)));
        }
        if record.doc_id.trim().is_empty() {
            return Err(Error::CorpusIntegrity(format!("chunk '{}' has an empty doc_id", record.chunk_id)));
        }
        Ok(Self {
            section: Section::parse(&record.section),
            section_label: normalize_label(&record.section),
            chunk_id: record.chunk_id,
            doc_id: record.doc_id,
            pmcid: record.pmcid,
            text: record.chunk_text,
            title: record.title,
            url: record.url,
        })
    }
}

/// A chunk that contributed to a document's score, with the score breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChunkHit {
    /// Row index of the chunk in the store.
    pub index: usize,
    /// Raw cosine similarity to the query.
    pub similarity: f32,
    pub section: Section,
    pub weight: f32,
    pub boost: f32,
    pub contribution: f32,
}

/// A document assembled from its highest-similarity chunks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedDocument {
    pub doc_id: DocId,
    pub score: f32,
    pub chunks: Vec<ChunkHit>,
    pub title: String,
    pub pmcid: String,
    pub url: String,
}

impl RankedDocument {
    /// The `n` contributing chunks with the highest raw similarity.
    pub fn top_chunks(&self, n: usize) -> Vec<ChunkHit> {
        let mut hits = self.chunks.clone();
        hits.sort_by(|a, b| b.similarity.total_cmp(&a.similarity).then(a.index.cmp(&b.index)));
        hits.truncate(n);
        hits
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Topic,
    Paper,
}

/// Node of the browsable topic hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicNode {
    pub id: String,
    pub label: String,
    pub size: usize,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub children: Vec<TopicNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pmcid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl TopicNode {
    pub fn topic(id: impl Into<String>, label: impl Into<String>, size: usize) -> Self {
        Self { id: id.into(), label: label.into(), size, kind: NodeKind::Topic, children: Vec::new(), pmcid: None, url: None }
    }

    pub fn paper(doc_id: impl Into<String>, title: impl Into<String>, pmcid: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: doc_id.into(),
            label: title.into(),
            size: 1,
            kind: NodeKind::Paper,
            children: Vec::new(),
            pmcid: Some(pmcid.into()),
            url: Some(url.into()),
        }
    }

    pub fn is_leaf(&self) -> bool { self.children.is_empty() }

    /// Number of edges on the longest root-to-leaf path.
    pub fn depth(&self) -> usize {
        self.children.iter().map(|c| c.depth() + 1).max().unwrap_or(0)
    }

    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(TopicNode::node_count).sum::<usize>()
    }

    /// Sizes of every node in pre-order, a compact shape signature.
    pub fn shape(&self) -> Vec<usize> {
        let mut out = vec![self.size];
        for child in &self.children { out.extend(child.shape()); }
        out
    }
}
