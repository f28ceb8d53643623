// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use vellum_engine::{Column, ColumnType, Options, Row, Sheet, Value, cells_row};

/// Field separator for a file: tab for `.tsv`, the configured
/// delimiter otherwise.
pub fn delimiter_for(path: &Path, options: &Options) -> Result<u8> {
    if path.extension().and_then(|ext| ext.to_str()) == Some("tsv") {
        return Ok(b'\t');
    }
    let configured = options.get_str("csv-delimiter")?;
    let mut bytes = configured.bytes();
    match (bytes.next(), bytes.next()) {
        (Some(byte), None) => Ok(byte),
        _ => bail!("csv-delimiter must be a single byte, got {configured:?}"),
    }
}

fn reader(path: &Path, delimiter: u8) -> Result<csv::Reader<std::fs::File>> {
    csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("open {}", path.display()))
}

fn read_rows(path: &Path, delimiter: u8) -> Result<Vec<Row>> {
    let mut reader = reader(path, delimiter)?;
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.with_context(|| format!("read {}", path.display()))?;
        let cells = record
            .iter()
            .map(|field| Value::Str(field.to_owned()))
            .collect();
        rows.push(cells_row(cells));
    }
    Ok(rows)
}

/// A sheet over a delimited file. Headers are read up front so the
/// columns exist immediately; the rows load through the sheet's loader
/// on a background task.
pub fn sheet_from_path(path: &Path, options: &Options) -> Result<Sheet> {
    let delimiter = delimiter_for(path, options)?;
    let mut header_reader = reader(path, delimiter)?;
    let headers = header_reader
        .headers()
        .with_context(|| format!("read header row of {}", path.display()))?;

    let columns: Vec<Column> = headers
        .iter()
        .enumerate()
        .map(|(index, name)| {
            let name = if name.trim().is_empty() {
                format!("col{index}")
            } else {
                name.trim().to_owned()
            };
            Column::indexed(&name, ColumnType::Any, index)
        })
        .collect();
    if columns.is_empty() {
        bail!("{} has no header row", path.display());
    }

    let name = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("sheet")
        .to_owned();
    let load_path: PathBuf = path.to_owned();
    let loader: vellum_engine::Loader =
        Arc::new(move || read_rows(&load_path, delimiter));
    Ok(Sheet::new(&name, columns).with_loader(loader))
}
