//! Local fabrication-methods knowledge store.
//!
//! Records are loaded once from a CSV file at startup and never mutated, so the
//! store can be shared between concurrent resolve calls behind an `Arc`
//! without any locking.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::keywords::{KeywordSet, Stemming};

/// Separator placed between formatted record blocks.
pub const RECORD_SEPARATOR: &str = "\n\n";

/// Default soft-robotics allow-list used by the relevance gate.
pub const DEFAULT_DOMAIN_TERMS: &[&str] = &[
    "soft",
    "robotics",
    "fabrication",
    "molding",
    "moulding",
    "casting",
    "printing",
    "elastomer",
    "elastomers",
    "actuator",
    "actuators",
    "silicone",
    "pneumatic",
    "pneumatics",
    "inflatable",
    "deformation",
    "stretchable",
    "compliance",
    "hydrogel",
    "hydrogels",
];

/// One fabrication method.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Record {
    #[serde(rename = "fabrication_method")]
    pub name: String,
    pub description: String,
    pub materials: String,
    pub properties: String,
    #[serde(rename = "steps_to_fabricate")]
    pub steps: String,
    #[serde(rename = "time_taken")]
    pub time_estimate: String,
    pub advantages: String,
    pub disadvantages: String,
    pub application_example: String,
    #[serde(rename = "notable_source", default)]
    pub source: String,
}

impl Record {
    /// Render the record as a fixed multi-field block.
    pub fn format_block(&self) -> String {
        let mut block = format!(
            "**{}**:\n{}\nMaterials: {}\nProperties: {}\nSteps: {}\nTime: {}\nPros: {}\nCons: {}\nApplication: {}\n",
            self.name,
            self.description,
            self.materials,
            self.properties,
            self.steps,
            self.time_estimate,
            self.advantages,
            self.disadvantages,
            self.application_example,
        );
        if !self.source.is_empty() {
            block.push_str(&format!("Source: {}\n", self.source));
        }
        block.push_str("---");
        block
    }

    fn validate(&self, row: usize) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::MalformedRecord {
                row,
                reason: "empty fabrication_method".to_string(),
            });
        }
        if self.description.trim().is_empty() {
            return Err(Error::MalformedRecord {
                row,
                reason: "empty description".to_string(),
            });
        }
        Ok(())
    }
}

/// Record plus the lower-cased fields used for matching.
#[derive(Debug, Clone)]
struct IndexedRecord {
    record: Record,
    name_lower: String,
    description_lower: String,
}

impl IndexedRecord {
    fn new(record: Record) -> Self {
        Self {
            name_lower: record.name.to_lowercase(),
            description_lower: record.description.to_lowercase(),
            record,
        }
    }

    fn matches(&self, keywords: &KeywordSet) -> bool {
        keywords
            .iter()
            .any(|k| self.name_lower.contains(k) || self.description_lower.contains(k))
    }
}

/// `true` iff some keyword is a substring of the record's lower-cased name or
/// description.
pub fn matches(record: &Record, keywords: &KeywordSet) -> bool {
    let name = record.name.to_lowercase();
    let description = record.description.to_lowercase();
    keywords
        .iter()
        .any(|k| name.contains(k) || description.contains(k))
}

/// Read-only, in-memory record collection.
#[derive(Debug, Clone)]
pub struct KnowledgeStore {
    records: Vec<IndexedRecord>,
    domain_terms: Option<HashSet<String>>,
}

impl KnowledgeStore {
    /// Store without a relevance gate.
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records: records.into_iter().map(IndexedRecord::new).collect(),
            domain_terms: None,
        }
    }

    /// Enable the relevance gate with the given allow-list.
    pub fn with_domain_filter<I, S>(mut self, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.domain_terms = Some(
            terms
                .into_iter()
                .map(|t| t.as_ref().trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
        );
        self
    }

    /// Add the stemmed form of every allow-list term, so keywords extracted
    /// with the same `stemming` pass the gate. No-op without a gate.
    pub fn with_domain_stemming(mut self, stemming: Stemming) -> Self {
        if let Some(terms) = self.domain_terms.as_mut() {
            let stemmed: Vec<String> = terms
                .iter()
                .map(|t| stemming.apply(t))
                .filter(|s| !terms.contains(*s))
                .map(str::to_string)
                .collect();
            terms.extend(stemmed);
        }
        self
    }

    /// Enable the relevance gate with [`DEFAULT_DOMAIN_TERMS`].
    pub fn with_default_domain_filter(self) -> Self {
        self.with_domain_filter(DEFAULT_DOMAIN_TERMS)
    }

    /// Load records from a CSV file.
    pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| {
            Error::DatasetUnavailable(format!("{}: {}", path.display(), e))
        })?;
        let records = read_records(file)?;
        info!(path = %path.display(), records = records.len(), "fabrication dataset loaded");
        Ok(Self::new(records))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.records.iter().map(|r| &r.record)
    }

    pub fn has_domain_filter(&self) -> bool {
        self.domain_terms.is_some()
    }

    /// Whether any keyword belongs to the domain allow-list. Always `true`
    /// when no gate is configured.
    pub fn is_domain_relevant(&self, keywords: &KeywordSet) -> bool {
        match &self.domain_terms {
            Some(terms) => keywords.iter().any(|k| terms.contains(k)),
            None => true,
        }
    }

    /// Records matching the keywords, in dataset order.
    pub fn matching_records(&self, keywords: &KeywordSet) -> Vec<&Record> {
        if keywords.is_empty() || !self.is_domain_relevant(keywords) {
            return Vec::new();
        }
        self.records
            .iter()
            .filter(|r| r.matches(keywords))
            .map(|r| &r.record)
            .collect()
    }

    /// Formatted blocks for every matching record, or `None` on no match.
    pub fn search(&self, keywords: &KeywordSet) -> Option<String> {
        if !self.is_domain_relevant(keywords) {
            debug!(%keywords, "query not relevant to the fabrication domain");
            return None;
        }

        let blocks: Vec<String> = self
            .matching_records(keywords)
            .into_iter()
            .map(Record::format_block)
            .collect();

        debug!(%keywords, matched = blocks.len(), "local dataset search");
        if blocks.is_empty() {
            None
        } else {
            Some(blocks.join(RECORD_SEPARATOR))
        }
    }
}

/// Deserialize records from CSV, skipping rows that are malformed.
pub fn read_records<R: std::io::Read>(reader: R) -> Result<Vec<Record>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    // Header problems make the whole file unusable.
    csv_reader.headers()?;

    let mut records = Vec::new();
    for (idx, row) in csv_reader.deserialize::<Record>().enumerate() {
        // Row numbers are 1-based and count the header line.
        let row_number = idx + 2;
        let record = match row {
            Ok(record) => record,
            Err(err) => {
                warn!(row = row_number, "skipping malformed dataset row: {}", err);
                continue;
            }
        };
        if let Err(err) = record.validate(row_number) {
            warn!("skipping dataset row: {}", err);
            continue;
        }
        records.push(record);
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keywords::KeywordExtractor;

    const HEADER: &str = "fabrication_method,description,materials,properties,steps_to_fabricate,time_taken,advantages,disadvantages,application_example,notable_source";

    fn record(name: &str, description: &str) -> Record {
        Record {
            name: name.to_string(),
            description: description.to_string(),
            materials: "Ecoflex 00-30".to_string(),
            properties: "Highly stretchable".to_string(),
            steps: "Mix, pour, cure".to_string(),
            time_estimate: "4 hours".to_string(),
            advantages: "Cheap".to_string(),
            disadvantages: "Slow cure".to_string(),
            application_example: "Grippers".to_string(),
            source: "Whitesides 2011".to_string(),
        }
    }

    fn keywords(words: &[&str]) -> KeywordSet {
        words.iter().copied().collect()
    }

    fn sample_store() -> KnowledgeStore {
        KnowledgeStore::new(vec![
            record(
                "Silicone Molding",
                "A casting process using liquid silicone",
            ),
            record("Injection Molding", "An injection molding process for elastomers"),
            record("Electrospinning", "Produces nanofiber mats from polymer solutions"),
        ])
    }

    #[test]
    fn keyword_substring_matches_description() {
        let r = record("Injection", "Used in the injection molding process");
        assert!(matches(&r, &keywords(&["mold"])));
    }

    #[test]
    fn matching_is_case_insensitive() {
        let r = record("SILICONE Molding", "LIQUID silicone");
        assert!(matches(&r, &keywords(&["silicone"])));
        assert!(matches(&r, &keywords(&["liquid"])));
    }

    #[test]
    fn no_keyword_no_match() {
        let r = record("Silicone Molding", "casting");
        assert!(!matches(&r, &keywords(&["laser"])));
        assert!(!matches(&r, &KeywordSet::new()));
    }

    #[test]
    fn search_concatenates_matches_in_dataset_order() {
        let store = sample_store();
        let result = store.search(&keywords(&["molding"])).unwrap();

        let silicone = result.find("Silicone Molding").unwrap();
        let injection = result.find("Injection Molding").unwrap();
        assert!(silicone < injection);
        assert!(!result.contains("Electrospinning"));
        assert_eq!(result.matches("---").count(), 2);
    }

    #[test]
    fn search_returns_none_without_matches() {
        let store = sample_store();
        assert!(store.search(&keywords(&["laser"])).is_none());
        assert!(store.search(&KeywordSet::new()).is_none());
    }

    #[test]
    fn search_is_idempotent() {
        let store = sample_store();
        let kw = keywords(&["silicone", "molding"]);
        assert_eq!(store.search(&kw), store.search(&kw));
    }

    #[test]
    fn domain_gate_short_circuits_irrelevant_queries() {
        let store = sample_store().with_default_domain_filter();

        // "process" matches descriptions but is not a domain term.
        assert!(!store.is_domain_relevant(&keywords(&["process"])));
        assert!(store.search(&keywords(&["process"])).is_none());

        assert!(store.is_domain_relevant(&keywords(&["silicone", "process"])));
        let result = store.search(&keywords(&["silicone", "process"])).unwrap();
        assert!(result.contains("Injection Molding"));
    }

    #[test]
    fn light_stemmed_keywords_pass_a_stemmed_gate() {
        let extractor = KeywordExtractor::with_stemming(Stemming::Light);
        let kw = extractor.extract("injection molding");
        assert_eq!(kw, keywords(&["injection", "mold"]));

        let unstemmed = sample_store().with_default_domain_filter();
        assert!(!unstemmed.is_domain_relevant(&kw));

        let store = sample_store()
            .with_default_domain_filter()
            .with_domain_stemming(Stemming::Light);
        assert!(store.is_domain_relevant(&kw));
        assert!(store.is_domain_relevant(&keywords(&["molding"])));
        let result = store.search(&kw).unwrap();
        assert!(result.contains("**Injection Molding**"));
        assert!(!store.is_domain_relevant(&keywords(&["process"])));
    }

    #[test]
    fn without_gate_everything_is_relevant() {
        let store = sample_store();
        assert!(!store.has_domain_filter());
        assert!(store.is_domain_relevant(&keywords(&["weather"])));
    }

    #[test]
    fn scenario_what_is_silicone_molding() {
        let store = KnowledgeStore::new(vec![record(
            "Silicone Molding",
            "a casting process using liquid silicone",
        )])
        .with_default_domain_filter();
        let kw = KeywordExtractor::new().extract("What is silicone molding?");

        let result = store.search(&kw).unwrap();
        assert!(result.starts_with("**Silicone Molding**:"));
        assert!(result.contains("Materials: Ecoflex 00-30"));
        assert!(result.contains("Source: Whitesides 2011"));
    }

    #[test]
    fn format_block_omits_empty_source() {
        let mut r = record("Casting", "pour into a mold");
        r.source.clear();
        let block = r.format_block();
        assert!(!block.contains("Source:"));
        assert!(block.ends_with("---"));
    }

    #[test]
    fn read_records_skips_malformed_rows() {
        let csv = format!(
            "{HEADER}\n\
             Silicone Molding,Casting with silicone,Ecoflex,Soft,Pour,2h,Cheap,Slow,Grippers,Paper A\n\
             ,Missing name,Ecoflex,Soft,Pour,2h,Cheap,Slow,Grippers,Paper B\n\
             Too Short,only two\n\
             Hydrogel Printing,Printing hydrogels,Alginate,Wet,Print,1h,Biocompatible,Fragile,Medical,Paper C\n"
        );

        let records = read_records(csv.as_bytes()).unwrap();
        let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Silicone Molding", "Hydrogel Printing"]);
    }

    #[test]
    fn read_records_allows_missing_source_column() {
        let csv = "fabrication_method,description,materials,properties,steps_to_fabricate,time_taken,advantages,disadvantages,application_example\n\
                   Casting,Pour into molds,Silicone,Soft,Pour,3h,Easy,Slow,Grippers\n";
        let records = read_records(csv.as_bytes()).unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].source.is_empty());
    }

    #[test]
    fn load_csv_reports_missing_file() {
        let err = KnowledgeStore::load_csv("/nonexistent/methods.csv").unwrap_err();
        assert!(matches!(err, Error::DatasetUnavailable(_)));
    }

    #[test]
    fn load_csv_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        use std::io::Write;
        writeln!(file, "{HEADER}").unwrap();
        writeln!(
            file,
            "\"Silicone Molding\",\"Casting, with silicone\",Ecoflex,Soft,Pour,2h,Cheap,Slow,Grippers,Paper"
        )
        .unwrap();

        let store = KnowledgeStore::load_csv(file.path()).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(
            store.records().next().unwrap().description,
            "Casting, with silicone"
        );
    }
}
