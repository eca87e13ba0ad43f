use tempfile::TempDir;

use super::*;
use crate::config::LexicalConfig;
use crate::dataset::builtin_folktales;
use crate::document::FieldComposition;
use crate::embeddings::HashEmbedder;
use crate::indexer::IndexManager;
use crate::store::MemoryStore;

const INDEX: &str = "folktales-eval";

fn hit(name: &str, score: f32) -> ScoredHit {
    ScoredHit {
        name: name.to_string(),
        score,
    }
}

#[test]
fn default_benchmark_has_seven_cases() {
    let cases = default_benchmark();
    assert_eq!(cases.len(), 7);
    assert_eq!(cases[0].query, "カチカチ山");
    assert_eq!(cases[6].expected.len(), 5);
    assert!(cases.iter().all(|c| !c.expected.is_empty()));
}

#[test]
fn report_row_joins_names() {
    let case = BenchmarkCase::new("桃", ["桃太郎", "金太郎"]);
    let row = ReportRow::new(&case, &[hit("桃太郎", 1.9), hit("一寸法師", 1.2)], &[]);
    assert_eq!(row.expected, "桃太郎;金太郎");
    assert_eq!(row.vector_results, "桃太郎;一寸法師");
    assert_eq!(row.mlt_results, "");
}

#[test]
fn csv_has_header_and_rows() {
    let report = EvaluationReport {
        rows: vec![ReportRow::new(
            &BenchmarkCase::new("a, b", ["x"]),
            &[hit("x", 1.0), hit("y", 0.5)],
            &[hit("y", 3.0)],
        )],
    };

    let mut buffer = Vec::new();
    report.write_csv_to(&mut buffer).expect("write");
    let text = String::from_utf8(buffer).expect("utf8");
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "query,expected,vector_results,mlt_results");
    assert_eq!(lines[1], "\"a, b\",x,x;y,y");
    assert_eq!(lines.len(), 2);
}

#[test]
fn empty_report_still_writes_header() {
    let mut buffer = Vec::new();
    EvaluationReport::default()
        .write_csv_to(&mut buffer)
        .expect("write");
    assert_eq!(
        String::from_utf8(buffer).expect("utf8"),
        "query,expected,vector_results,mlt_results\n"
    );
}

#[test]
fn write_csv_creates_parent_directories() {
    let temp_dir = TempDir::new().expect("temp dir");
    let path = temp_dir.path().join("reports").join("eval.csv");
    let report = EvaluationReport {
        rows: vec![ReportRow::new(&BenchmarkCase::new("q", ["a"]), &[hit("a", 1.0)], &[])],
    };

    report.write_csv(&path).expect("write");
    let content = std::fs::read_to_string(&path).expect("read");
    assert!(content.starts_with("query,expected,vector_results,mlt_results\n"));
    assert!(content.contains("q,a,a,"));
}

#[test]
fn load_benchmark_from_file() {
    let temp_dir = TempDir::new().expect("temp dir");
    let path = temp_dir.path().join("bench.json");
    std::fs::write(
        &path,
        r#"[{"query": "竹取", "expected": ["かぐや姫"]}, {"query": "鬼"}]"#,
    )
    .expect("write");

    let cases = load_benchmark(&path).expect("load");
    assert_eq!(cases.len(), 2);
    assert_eq!(cases[0], BenchmarkCase::new("竹取", ["かぐや姫"]));
    assert!(cases[1].expected.is_empty());
}

#[test]
fn load_benchmark_rejects_bad_input() {
    let temp_dir = TempDir::new().expect("temp dir");

    let malformed = temp_dir.path().join("malformed.json");
    std::fs::write(&malformed, "{not json").expect("write");
    assert!(matches!(
        load_benchmark(&malformed),
        Err(FolktaleError::Validation(_))
    ));

    let blank = temp_dir.path().join("blank.json");
    std::fs::write(&blank, r#"[{"query": " ", "expected": []}]"#).expect("write");
    assert!(matches!(
        load_benchmark(&blank),
        Err(FolktaleError::Validation(_))
    ));

    assert!(matches!(
        load_benchmark(temp_dir.path().join("missing.json")),
        Err(FolktaleError::Io(_))
    ));
}

#[test]
fn evaluates_every_case_in_order() {
    let store = MemoryStore::new();
    let embedder = HashEmbedder::new(256, 1..=2).expect("embedder");
    let manager = IndexManager::new(&store, &embedder, FieldComposition::StoryWithAttributes);
    let records = builtin_folktales().expect("builtin");
    manager.rebuild(INDEX, &records).expect("rebuild");

    let scorer = Scorer::new(&store, &embedder, INDEX, manager.schema().clone(), 1.0);
    let lexical = LexicalBaseline::new(&store, INDEX, LexicalConfig::default());
    let evaluator = Evaluator::new(&scorer, &lexical, FieldWeights::default());

    let cases = default_benchmark();
    let mut seen = Vec::new();
    let report = evaluator
        .evaluate_with(&cases, 5, |row| {
            seen.push(row.query.clone());
            Ok(())
        })
        .expect("evaluate");

    assert_eq!(report.len(), 7);
    assert_eq!(
        seen,
        cases.iter().map(|c| c.query.clone()).collect::<Vec<_>>()
    );
    for row in &report.rows {
        assert!(!row.vector_results.is_empty(), "{}", row.query);
        assert!(!row.mlt_results.is_empty(), "{}", row.query);
        assert!(row.vector_results.split(LIST_SEPARATOR).count() <= 5);
    }
}

#[test]
fn search_failure_aborts_evaluation() {
    let store = MemoryStore::new();
    let embedder = HashEmbedder::new(16, 1..=1).expect("embedder");
    let manager = IndexManager::new(&store, &embedder, FieldComposition::Separate);
    let scorer = Scorer::new(&store, &embedder, INDEX, manager.schema().clone(), 1.0);
    let lexical = LexicalBaseline::new(&store, INDEX, LexicalConfig::default());
    let evaluator = Evaluator::new(&scorer, &lexical, FieldWeights::default());

    let result = evaluator.evaluate(&default_benchmark(), 5);
    assert!(matches!(result, Err(FolktaleError::Store(_))));
}
