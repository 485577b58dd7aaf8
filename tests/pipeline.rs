//! Integration tests for loading, filtering, decontamination and rarefaction.

use amplicon_prep::prelude::*;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const COUNTS: &str = "\
taxon_id\tS1\tS2\tS3\tS4\tNC1\tNC2
asv1\t120\t90\t150\t110\t0\t0
asv2\t5\t0\t3\t2\t60\t45
asv3\t0\t80\t0\t95\t0\t0
asv4\t70\t10\t40\t15\t5\t2
asv5\t0\t0\t0\t0\t0\t0
asv6\t30\t40\t20\t25\t0\t3
";

const TAXONOMY: &str = "\
Feature ID\tKingdom\tPhylum\tClass\tOrder\tFamily\tGenus\tSpecies
asv1\tBacteria\tProteobacteria\tGammaproteobacteria\tVibrionales\tVibrionaceae\tVibrio\t
asv2\tBacteria\tProteobacteria\tGammaproteobacteria\tBurkholderiales\tBurkholderiaceae\tRalstonia\tNA
asv3\tBacteria\tBacteroidota\tBacteroidia\tFlavobacteriales\tFlavobacteriaceae\t\t
asv4\tBacteria\tProteobacteria\tAlphaproteobacteria\tRickettsiales\tMitochondria\t\t
asv5\tBacteria\tCyanobacteria\tCyanobacteriia\tChloroplast\t\t\t
asv6\tBacteria\tFirmicutes\tBacilli\tLactobacillales\tStreptococcaceae\tStreptococcus\t
asv7\tBacteria\tFirmicutes\tBacilli\tBacillales\tBacillaceae\tBacillus\t
";

const METADATA: &str = "\
sample_id\tSampleType\tDepthM
S1\tCoral\t5
S2\tCoral\t10
S3\tSeawater\t5
S4\tSeawater\t10
NC1\tNegCtrl\tNA
NC2\tNegCtrl\tNA
";

const TREE: &str = "(((asv1:0.1,asv2:0.2):0.05,(asv3:0.3,asv7:0.1):0.05):0.02,(asv4:0.4,(asv5:0.2,asv6:0.1):0.1):0.02);";

struct Fixture {
    _dir: TempDir,
    paths: DatasetPaths,
}

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

fn fixture_with(counts: &str, taxonomy: &str, metadata: &str, tree: Option<&str>) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let paths = DatasetPaths {
        counts: write(dir.path(), "counts.tsv", counts),
        taxonomy: write(dir.path(), "taxonomy.tsv", taxonomy),
        metadata: write(dir.path(), "metadata.tsv", metadata),
        tree: tree.map(|t| write(dir.path(), "tree.nwk", t)),
    };
    Fixture { _dir: dir, paths }
}

fn fixture() -> Fixture {
    fixture_with(COUNTS, TAXONOMY, METADATA, Some(TREE))
}

fn controls() -> SampleSelector {
    SampleSelector::column_equals("SampleType", "NegCtrl")
}

fn assert_aligned(ds: &Dataset) {
    ds.validate().unwrap();
    assert_eq!(ds.counts().taxon_ids(), ds.taxonomy().taxon_ids());
    assert_eq!(ds.counts().sample_ids(), ds.metadata().sample_ids());
    if let Some(tree) = ds.tree() {
        let tips: HashSet<&str> = tree.tip_labels().into_iter().collect();
        let taxa: HashSet<&str> = ds.taxon_ids().iter().map(String::as_str).collect();
        assert_eq!(tips, taxa);
    }
}

#[test]
fn test_load_from_files() {
    let fx = fixture();
    let ds = Dataset::load(&fx.paths).unwrap();

    // asv7 is only in the taxonomy and tree; it is dropped
    assert_eq!(ds.n_taxa(), 6);
    assert_eq!(ds.n_samples(), 6);
    assert_eq!(ds.counts().get(1, 4), 60);
    assert_eq!(
        ds.taxonomy().lineage("asv2").unwrap().get(Rank::Genus),
        Some("Ralstonia")
    );
    assert_eq!(ds.taxonomy().lineage("asv2").unwrap().get(Rank::Species), None);
    assert!(ds.metadata().get("NC1", "DepthM").unwrap().is_missing());
    assert_eq!(ds.tree().unwrap().n_tips(), 6);
    assert_aligned(&ds);
}

#[test]
fn test_unknown_taxon_is_schema_mismatch() {
    let counts = COUNTS.replace("asv6\t", "asv99\t");
    let fx = fixture_with(&counts, TAXONOMY, METADATA, None);
    match Dataset::load(&fx.paths) {
        Err(PrepError::SchemaMismatch { ids, .. }) => assert_eq!(ids, vec!["asv99"]),
        other => panic!("expected SchemaMismatch, got {:?}", other.map(|d| d.n_taxa())),
    }
}

#[test]
fn test_unknown_sample_is_schema_mismatch() {
    let metadata = METADATA.replace("S3\t", "S33\t");
    let fx = fixture_with(COUNTS, TAXONOMY, &metadata, None);
    match Dataset::load(&fx.paths) {
        Err(PrepError::SchemaMismatch { ids, .. }) => assert_eq!(ids, vec!["S3"]),
        other => panic!("expected SchemaMismatch, got {:?}", other.map(|d| d.n_taxa())),
    }
}

#[test]
fn test_taxon_missing_from_tree_is_schema_mismatch() {
    let tree = TREE.replace("asv6", "asv66");
    let fx = fixture_with(COUNTS, TAXONOMY, METADATA, Some(&tree));
    assert!(matches!(
        Dataset::load(&fx.paths),
        Err(PrepError::SchemaMismatch { .. })
    ));
}

#[test]
fn test_duplicate_sample_in_counts_is_schema_mismatch() {
    let counts = COUNTS.replacen("\tS2\t", "\tS1\t", 1);
    let fx = fixture_with(&counts, TAXONOMY, METADATA, None);
    match Dataset::load(&fx.paths) {
        Err(PrepError::SchemaMismatch { ids, .. }) => assert_eq!(ids, vec!["S1"]),
        other => panic!("expected SchemaMismatch, got {:?}", other.map(|d| d.n_samples())),
    }
}

#[test]
fn test_short_count_row_is_rejected() {
    let counts = COUNTS.replace("asv3\t0\t80\t0\t95\t0\t0", "asv3\t0\t80");
    let fx = fixture_with(&counts, TAXONOMY, METADATA, None);
    assert!(matches!(
        Dataset::load(&fx.paths),
        Err(PrepError::RaggedRow { ref taxon, expected: 6, actual: 2 }) if taxon == "asv3"
    ));
}

#[test]
fn test_empty_control_set() {
    let fx = fixture();
    let ds = Dataset::load(&fx.paths).unwrap();
    let selector = SampleSelector::column_equals("SampleType", "Blank");
    assert!(matches!(
        detect_contaminants(&ds, &selector, 0.4),
        Err(PrepError::EmptyControlSet { .. })
    ));
}

#[test]
fn test_zero_sum_then_rarefy_scenario() {
    // one all-zero taxon, one sample below depth
    let counts = CountMatrix::from_rows(
        &[vec![60, 40, 200, 50], vec![0, 0, 0, 0], vec![40, 80, 10, 30]],
        vec!["t1".into(), "t2".into(), "t3".into()],
        vec!["A".into(), "B".into(), "C".into(), "D".into()],
    )
    .unwrap();
    let taxonomy = TaxonomyTable::new(
        vec!["t1".into(), "t2".into(), "t3".into()],
        vec![Lineage::from_values(["Bacteria"]); 3],
    )
    .unwrap();
    let metadata = Metadata::from_rows(
        vec!["Site".into()],
        ["A", "B", "C", "D"]
            .iter()
            .map(|s| (s.to_string(), vec!["reef".to_string()]))
            .collect(),
    )
    .unwrap();
    let ds = Dataset::new(counts, taxonomy, metadata, None).unwrap();

    let filtered = drop_zero_sum_taxa(&ds).unwrap();
    let rarefied = rarefy(&filtered, 100, 711).unwrap();

    assert_eq!(rarefied.dataset.n_taxa(), 2);
    assert_eq!(rarefied.dataset.sample_ids(), &["A", "B", "C"]);
    assert!(rarefied
        .dataset
        .counts()
        .col_sums()
        .iter()
        .all(|&s| s == 100));
    assert_eq!(
        rarefied.warning,
        Some(RarefyWarning::SampleBelowDepth {
            depth: 100,
            samples: vec!["D".to_string()]
        })
    );
}

#[test]
fn test_filters_preserve_alignment_and_shrink() {
    let fx = fixture();
    let ds = Dataset::load(&fx.paths).unwrap();
    let ids: HashSet<String> = ["NC2".to_string()].into_iter().collect();

    let stages: Vec<(&str, Dataset)> = vec![
        ("lineage", filter_lineage(&ds, &LineageRule::organelles()).unwrap()),
        ("zero_sum", drop_zero_sum_taxa(&ds).unwrap()),
        ("abundance", filter_relative_abundance(&ds, 0.05).unwrap()),
        ("exclude", exclude_samples(&ds, &ids).unwrap()),
        ("samples", filter_samples(&ds, &controls(), false).unwrap()),
    ];

    for (name, out) in &stages {
        assert_aligned(out);
        assert!(out.n_taxa() <= ds.n_taxa(), "{} grew taxa", name);
        assert!(out.n_samples() <= ds.n_samples(), "{} grew samples", name);
        assert!(out.counts().total() <= ds.counts().total(), "{} grew reads", name);
    }
    // input untouched
    assert_eq!(ds.n_taxa(), 6);
}

#[test]
fn test_filters_are_idempotent() {
    let fx = fixture();
    let ds = Dataset::load(&fx.paths).unwrap();
    let ids: HashSet<String> = ["NC1".to_string(), "S2".to_string()].into_iter().collect();

    let once = drop_zero_sum_taxa(&ds).unwrap();
    assert_eq!(drop_zero_sum_taxa(&once).unwrap(), once);

    let once = filter_lineage(&ds, &LineageRule::organelles()).unwrap();
    assert_eq!(filter_lineage(&once, &LineageRule::organelles()).unwrap(), once);

    let once = exclude_samples(&ds, &ids).unwrap();
    assert_eq!(exclude_samples(&once, &ids).unwrap(), once);
}

#[test]
fn test_organelle_filter_drops_mitochondria_and_chloroplast() {
    let fx = fixture();
    let ds = Dataset::load(&fx.paths).unwrap();
    let out = filter_lineage(&ds, &LineageRule::organelles()).unwrap();
    assert_eq!(out.taxon_ids(), &["asv1", "asv2", "asv3", "asv6"]);
    assert_eq!(out.tree().unwrap().n_tips(), 4);
}

#[test]
fn test_contaminant_direction() {
    let fx = fixture();
    let ds = Dataset::load(&fx.paths).unwrap();
    let report = detect_contaminants(&ds, &controls(), 0.4).unwrap();

    let flagged = report.flagged();
    assert!(flagged.contains("asv2"));
    // asv4 and asv6 are in the controls but richer in the real samples
    assert!(!flagged.contains("asv4"));
    assert!(!flagged.contains("asv6"));
    for r in &report.records {
        if r.flagged {
            assert!(r.mean_control > r.mean_biological);
            assert!(r.disproportion > 0.4);
        }
    }
}

#[test]
fn test_equal_means_never_flagged() {
    let counts = CountMatrix::from_rows(
        &[vec![50, 50, 50], vec![50, 50, 50]],
        vec!["a".into(), "b".into()],
        vec!["X1".into(), "X2".into(), "C1".into()],
    )
    .unwrap();
    let taxonomy = TaxonomyTable::new(
        vec!["a".into(), "b".into()],
        vec![Lineage::from_values(["Bacteria"]); 2],
    )
    .unwrap();
    let metadata = Metadata::from_rows(
        vec!["SampleType".into()],
        vec![
            ("X1".into(), vec!["Coral".into()]),
            ("X2".into(), vec!["Coral".into()]),
            ("C1".into(), vec!["NegCtrl".into()]),
        ],
    )
    .unwrap();
    let ds = Dataset::new(counts, taxonomy, metadata, None).unwrap();

    for threshold in [0.0, 0.4, 0.99] {
        let report = detect_contaminants(&ds, &controls(), threshold).unwrap();
        assert_eq!(report.n_flagged(), 0);
    }
}

#[test]
fn test_rarefaction_is_deterministic() {
    let fx = fixture();
    let ds = Dataset::load(&fx.paths).unwrap();
    let a = rarefy(&ds, 100, 711).unwrap();
    let b = rarefy(&ds, 100, 711).unwrap();
    assert_eq!(a.dataset, b.dataset);
    assert!(a.dataset.counts().col_sums().iter().all(|&s| s == 100));
    assert_aligned(&a.dataset);
}

#[test]
fn test_yaml_config_end_to_end() {
    let fx = fixture();
    let config_yaml = r#"
name: coral-16s
description: Organelles, controls, then even depth
steps:
  - step: filter_lineage
    rules:
      - rank: Family
        value: Mitochondria
      - rank: Order
        pattern: "^Chloro"
  - step: drop_zero_sum
  - step: decontaminate
    controls:
      by: column
      column: SampleType
      values: [NegCtrl]
    threshold: 0.5
    apply: true
  - step: filter_samples
    selector:
      by: column
      column: SampleType
      values: [NegCtrl]
    keep: false
  - step: drop_zero_sum
  - step: rarefy
    depth: 150
    seed: 42
"#;
    let dir = tempfile::tempdir().unwrap();
    let config_path = write(dir.path(), "pipeline.yaml", config_yaml);
    let config = PipelineConfig::from_file(&config_path).unwrap();
    assert_eq!(config.steps.len(), 6);

    let ds = Dataset::load(&fx.paths).unwrap();
    let output = Pipeline::from_config(&config).run(&ds).unwrap();

    assert_eq!(output.name, "coral-16s");
    assert_eq!(output.reports.len(), 6);
    assert_eq!(output.dataset.taxon_ids(), &["asv1", "asv3", "asv6"]);
    assert_eq!(output.dataset.sample_ids(), &["S1", "S2", "S3", "S4"]);
    assert!(output
        .dataset
        .counts()
        .col_sums()
        .iter()
        .all(|&s| s == 150));
    assert_aligned(&output.dataset);

    let outdir = dir.path().join("results");
    let summary = write_outputs(&output, &outdir).unwrap();
    assert_eq!(summary.flagged_contaminants, vec!["asv2".to_string()]);

    // the written tables load back into the same dataset
    let reloaded = Dataset::load(&DatasetPaths {
        counts: outdir.join("counts.csv"),
        taxonomy: outdir.join("taxonomy.csv"),
        metadata: outdir.join("metadata.csv"),
        tree: Some(outdir.join("tree.nwk")),
    })
    .unwrap();
    assert_eq!(reloaded.counts(), output.dataset.counts());
    assert_eq!(reloaded.taxonomy(), output.dataset.taxonomy());
    assert_eq!(
        reloaded.tree().unwrap().tip_labels(),
        output.dataset.tree().unwrap().tip_labels()
    );
}
