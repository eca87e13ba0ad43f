// Evaluation module
// Runs benchmark queries through both rankers and writes a comparison report

#[cfg(test)]
mod tests;

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::search::{FieldWeights, LexicalBaseline, ScoredHit, Scorer, WeightedQuery};
use crate::{FolktaleError, Result};

/// Separator for multi-valued report cells
pub const LIST_SEPARATOR: &str = ";";

/// A benchmark query and the folktale names a good ranking should return
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchmarkCase {
    pub query: String,
    #[serde(default)]
    pub expected: Vec<String>,
}

impl BenchmarkCase {
    #[inline]
    pub fn new<Q, I, E>(query: Q, expected: I) -> Self
    where
        Q: Into<String>,
        I: IntoIterator<Item = E>,
        E: Into<String>,
    {
        Self {
            query: query.into(),
            expected: expected.into_iter().map(Into::into).collect(),
        }
    }
}

/// The seven-query benchmark for the sample corpus
#[inline]
pub fn default_benchmark() -> Vec<BenchmarkCase> {
    vec![
        BenchmarkCase::new("カチカチ山", ["カチカチ山"]),
        BenchmarkCase::new("タヌキの話", ["カチカチ山", "たぬきの話"]),
        BenchmarkCase::new("桃太郎の鬼退治", ["桃太郎"]),
        BenchmarkCase::new("浦島太郎の竜宮城", ["浦島太郎"]),
        BenchmarkCase::new("善悪の教訓", ["カチカチ山", "桃太郎", "舌切り雀"]),
        BenchmarkCase::new("動物が出る昔話", ["カチカチ山", "たぬきの話", "舌切り雀"]),
        BenchmarkCase::new(
            "日本の伝統的な物語",
            ["カチカチ山", "桃太郎", "浦島太郎", "舌切り雀", "金太郎"],
        ),
    ]
}

/// Load benchmark cases from a JSON array of `{"query": .., "expected": [..]}`
#[inline]
pub fn load_benchmark<P: AsRef<Path>>(path: P) -> Result<Vec<BenchmarkCase>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    let cases: Vec<BenchmarkCase> = serde_json::from_str(&content).map_err(|e| {
        FolktaleError::Validation(format!("malformed benchmark {}: {}", path.display(), e))
    })?;

    if let Some(i) = cases.iter().position(|c| c.query.trim().is_empty()) {
        return Err(FolktaleError::Validation(format!(
            "benchmark {}: case {} has an empty query",
            path.display(),
            i
        )));
    }

    info!("Loaded {} benchmark cases from {}", cases.len(), path.display());
    Ok(cases)
}

/// One line of the comparison report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    pub query: String,
    pub expected: String,
    pub vector_results: String,
    pub mlt_results: String,
}

impl ReportRow {
    #[inline]
    pub fn new(case: &BenchmarkCase, vector: &[ScoredHit], lexical: &[ScoredHit]) -> Self {
        Self {
            query: case.query.clone(),
            expected: case.expected.iter().join(LIST_SEPARATOR),
            vector_results: vector.iter().map(|hit| &hit.name).join(LIST_SEPARATOR),
            mlt_results: lexical.iter().map(|hit| &hit.name).join(LIST_SEPARATOR),
        }
    }
}

/// Report rows in benchmark order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluationReport {
    pub rows: Vec<ReportRow>,
}

impl EvaluationReport {
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Write the report as CSV with a header row
    #[inline]
    pub fn write_csv_to<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv = csv::Writer::from_writer(writer);
        if self.rows.is_empty() {
            csv.write_record(["query", "expected", "vector_results", "mlt_results"])?;
        }
        for row in &self.rows {
            csv.serialize(row)?;
        }
        csv.flush()?;
        Ok(())
    }

    /// Write the report to `path`, replacing any existing file
    #[inline]
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        self.write_csv_to(File::create(path)?)?;
        info!("Wrote {} report rows to {}", self.rows.len(), path.display());
        Ok(())
    }
}

/// Runs every benchmark case through the vector scorer and the lexical baseline
pub struct Evaluator<'a> {
    scorer: &'a Scorer<'a>,
    lexical: &'a LexicalBaseline<'a>,
    weights: FieldWeights,
}

impl<'a> Evaluator<'a> {
    #[inline]
    pub const fn new(
        scorer: &'a Scorer<'a>,
        lexical: &'a LexicalBaseline<'a>,
        weights: FieldWeights,
    ) -> Self {
        Self {
            scorer,
            lexical,
            weights,
        }
    }

    /// Evaluate all cases. Any search failure aborts the run.
    #[inline]
    pub fn evaluate(&self, cases: &[BenchmarkCase], top_k: usize) -> Result<EvaluationReport> {
        self.evaluate_with(cases, top_k, |_| Ok(()))
    }

    /// Like [`Evaluator::evaluate`], calling `on_row` as each row completes.
    /// An error from `on_row` stops the run.
    #[inline]
    pub fn evaluate_with<F>(
        &self,
        cases: &[BenchmarkCase],
        top_k: usize,
        mut on_row: F,
    ) -> Result<EvaluationReport>
    where
        F: FnMut(&ReportRow) -> Result<()>,
    {
        let mut report = EvaluationReport {
            rows: Vec::with_capacity(cases.len()),
        };

        for case in cases {
            let query = WeightedQuery::new(case.query.clone(), self.weights);
            let vector = self.scorer.search(&query, top_k)?;
            let lexical = self.lexical.search(&case.query, top_k)?;

            let row = ReportRow::new(case, &vector, &lexical);
            debug!(
                "'{}': vector [{}], lexical [{}]",
                row.query, row.vector_results, row.mlt_results
            );
            on_row(&row)?;
            report.rows.push(row);
        }

        Ok(report)
    }
}
