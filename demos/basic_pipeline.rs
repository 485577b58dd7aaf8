//! Basic example demonstrating the preprocessing pipeline.
//!
//! This example shows how to:
//! 1. Build a small dataset in memory
//! 2. Profile library sizes
//! 3. Inspect contaminant candidates
//! 4. Run filtering, decontamination and rarefaction
//! 5. Examine diversity of the result

use amplicon_prep::prelude::*;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    println!("=== Amplicon Preprocessing Example ===\n");

    let dataset = create_example_data()?;
    println!("Data dimensions:");
    println!("  Taxa:    {}", dataset.n_taxa());
    println!("  Samples: {}", dataset.n_samples());
    println!();

    println!("=== Data Profiling ===\n");
    let lib_size = profile_library_size(dataset.counts());
    println!("{}", lib_size);
    println!(
        "Rarefying at 300 drops {:?} and keeps {:.1}% of reads\n",
        lib_size.samples_below(300),
        lib_size.reads_retained_at(300) * 100.0
    );

    println!("=== Contaminant Candidates ===\n");
    let controls = SampleSelector::column_equals("SampleType", "NegCtrl");
    let report = detect_contaminants(&dataset, &controls, 0.4)?;
    println!("{}", report);

    println!("=== Running Pipeline ===\n");
    let output = Pipeline::new()
        .name("example")
        .filter_organelles()
        .drop_zero_sum()
        .decontaminate(controls.clone(), 0.4, true)
        .filter_samples(controls, false)
        .drop_zero_sum()
        .rarefy(Some(300), 711)
        .run(&dataset)?;

    for stage in &output.reports {
        println!("  {}", stage);
    }
    for warning in &output.warnings {
        println!("  warning: {}", warning);
    }
    println!();

    println!("=== Alpha Diversity ===\n");
    println!("{:<6} {:>8} {:>8} {:>8} {:>8}", "sample", "observed", "shannon", "simpson", "chao1");
    for row in alpha_diversity(&output.dataset).rows {
        println!(
            "{:<6} {:>8} {:>8.3} {:>8.3} {:>8.2}",
            row.sample_id, row.observed, row.shannon, row.simpson, row.chao1
        );
    }

    Ok(())
}

/// Create a small coral/seawater dataset with one negative control.
fn create_example_data() -> Result<Dataset> {
    let taxon_ids: Vec<String> = (1..=8).map(|i| format!("asv{}", i)).collect();
    let sample_ids: Vec<String> = ["C1", "C2", "C3", "W1", "W2", "W3", "NC"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    // Deterministic LCG noise
    let mut seed = 42u64;
    let mut next = || {
        seed = seed.wrapping_mul(1103515245).wrapping_add(12345);
        ((seed >> 16) & 0x7FFF) as f64 / 32768.0
    };

    let base = [220.0, 180.0, 60.0, 90.0, 40.0, 120.0, 15.0, 5.0];
    let rows: Vec<Vec<u64>> = (0..taxon_ids.len())
        .map(|t| {
            (0..sample_ids.len())
                .map(|s| {
                    let is_control = s == sample_ids.len() - 1;
                    match (t, is_control) {
                        // reagent contaminant, abundant in the control
                        (6, true) => 300,
                        (6, false) => (5.0 * next()) as u64,
                        (_, true) => (3.0 * next()) as u64,
                        _ => (base[t] * (0.6 + 0.8 * next())) as u64,
                    }
                })
                .collect()
        })
        .collect();
    let counts = CountMatrix::from_rows(&rows, taxon_ids.clone(), sample_ids.clone())?;

    let lineages = vec![
        Lineage::from_values(["Bacteria", "Proteobacteria", "Gammaproteobacteria", "Vibrionales", "Vibrionaceae", "Vibrio"]),
        Lineage::from_values(["Bacteria", "Proteobacteria", "Gammaproteobacteria", "Oceanospirillales", "Endozoicomonadaceae", "Endozoicomonas"]),
        Lineage::from_values(["Bacteria", "Cyanobacteria", "Cyanobacteriia", "Synechococcales", "Cyanobiaceae", "Synechococcus"]),
        Lineage::from_values(["Bacteria", "Bacteroidota", "Bacteroidia", "Flavobacteriales", "Flavobacteriaceae"]),
        Lineage::from_values(["Bacteria", "Proteobacteria", "Alphaproteobacteria", "Rhodobacterales", "Rhodobacteraceae", "Ruegeria"]),
        Lineage::from_values(["Bacteria", "Proteobacteria", "Alphaproteobacteria", "Rickettsiales", "Mitochondria"]),
        Lineage::from_values(["Bacteria", "Proteobacteria", "Gammaproteobacteria", "Burkholderiales", "Burkholderiaceae", "Ralstonia"]),
        Lineage::from_values(["Bacteria", "Cyanobacteria", "Cyanobacteriia", "Chloroplast"]),
    ];
    let taxonomy = TaxonomyTable::new(taxon_ids, lineages)?;

    let metadata = Metadata::from_rows(
        vec!["SampleType".to_string()],
        sample_ids
            .iter()
            .map(|id| {
                let kind = match id.chars().next() {
                    Some('C') => "Coral",
                    Some('W') => "Seawater",
                    _ => "NegCtrl",
                };
                (id.clone(), vec![kind.to_string()])
            })
            .collect(),
    )?;

    Dataset::new(counts, taxonomy, metadata, None)
}
