use anyhow::{Context, Result};
use log::info;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tumor_common::{CellState, Dimensionality, Lattice, LatticeCoord, MetastasisCount, OutputConfig, SimulationRecord};

/// Writes the non-healthy cells of one generation as `x,y[,z],state`.
pub fn write_generation_csv<C: LatticeCoord, W: Write>(lattice: &Lattice<C>, out: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    let mut header: Vec<&str> = C::HEADER.to_vec();
    header.push("state");
    writer.write_record(&header)?;
    for (coord, state) in lattice.coords_not_in(CellState::Healthy) {
        let mut row: Vec<String> = coord.components().iter().map(|v| v.to_string()).collect();
        row.push(state.code().to_string());
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

/// One `Bones,Lungs,Liver` row per generation.
pub fn write_metastasis_csv<W: Write>(counts: &[MetastasisCount], out: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(["Bones", "Lungs", "Liver"])?;
    for count in counts {
        writer.write_record(count.as_array().iter().map(|v| v.to_string()))?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes the metastasis history to `{base}_metastasis.csv` in `dir`.
pub fn write_metastasis_file(counts: &[MetastasisCount], dir: &Path, base: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create CSV directory '{}'", dir.display()))?;
    let path = dir.join(format!("{}_metastasis.csv", base));
    let file = File::create(&path).with_context(|| format!("Failed to create '{}'", path.display()))?;
    write_metastasis_csv(counts, BufWriter::new(file))
        .with_context(|| format!("Failed to write metastasis counts to '{}'", path.display()))?;
    Ok(path)
}

/// Writes one CSV per generation into `dir`, named `{base}_{label}_{generation}.csv`.
pub fn export_generation_csvs<C: LatticeCoord>(
    snapshots: &[Lattice<C>],
    dir: &Path,
    base: &str,
    label: &str,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create CSV directory '{}'", dir.display()))?;
    let mut written = Vec::with_capacity(snapshots.len());
    for (generation, lattice) in snapshots.iter().enumerate() {
        let path = dir.join(format!("{}_{}_{}.csv", base, label, generation));
        let file = File::create(&path).with_context(|| format!("Failed to create '{}'", path.display()))?;
        write_generation_csv(lattice, BufWriter::new(file))?;
        written.push(path);
    }
    info!("Wrote {} generation CSVs to {}", written.len(), dir.display());
    Ok(written)
}

/// Serializes the whole run in `format` ("json", "bincode" or "messagepack").
/// Returns the file written.
pub fn save_record<C: LatticeCoord>(record: &SimulationRecord<C>, base: &str, format: &str) -> Result<PathBuf> {
    match format {
        "json" => {
            let path = PathBuf::from(format!("{}_snapshots.json", base));
            let file = File::create(&path).with_context(|| format!("Failed to create '{}'", path.display()))?;
            serde_json::to_writer(BufWriter::new(file), record)
                .with_context(|| format!("Failed to write JSON to '{}'", path.display()))?;
            Ok(path)
        }
        "bincode" => {
            let path = PathBuf::from(format!("{}_snapshots.bin", base));
            let file = File::create(&path).with_context(|| format!("Failed to create '{}'", path.display()))?;
            bincode::serialize_into(BufWriter::new(file), record)
                .with_context(|| format!("Failed to write bincode to '{}'", path.display()))?;
            Ok(path)
        }
        "messagepack" => {
            let path = PathBuf::from(format!("{}_snapshots.msgpack", base));
            let file = File::create(&path).with_context(|| format!("Failed to create '{}'", path.display()))?;
            rmp_serde::encode::write(&mut BufWriter::new(file), record)
                .with_context(|| format!("Failed to write MessagePack to '{}'", path.display()))?;
            Ok(path)
        }
        other => anyhow::bail!("Unknown output format: {}", other),
    }
}

/// Writes everything `output` asks for, plus the metastasis CSV whenever the
/// extension ran.
pub fn save_outputs<C: LatticeCoord>(
    output: &OutputConfig,
    dimensionality: Dimensionality,
    record: &SimulationRecord<C>,
) -> Result<()> {
    info!(
        "Run summary: {} generations on a {} lattice from seed {}.",
        record.generations(),
        dimensionality,
        record.seed
    );

    if output.save_snapshots {
        let format = output.format.as_deref().unwrap_or("json");
        let path = save_record(record, &output.base_filename, format)?;
        info!("All snapshots saved to {} ({} format)", path.display(), format);
    } else {
        info!("Skipping saving snapshots as per config (save_snapshots is false).");
    }

    let dir = Path::new(&output.csv_dir);
    if output.save_csv {
        export_generation_csvs(&record.snapshots, dir, &output.base_filename, &dimensionality.to_string())?;
    }
    if let Some(counts) = &record.metastasis {
        let path = write_metastasis_file(counts, dir, &output.base_filename)?;
        info!("Metastasis counts saved to {}", path.display());
    }
    Ok(())
}
