//! Raw partition rows and their on-disk representations.

use super::DataError;
use chrono::NaiveDateTime;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Columns every trade partition must expose.
pub const REQUIRED_COLUMNS: [&str; 5] = [
    "block_number",
    "maker_asset_id",
    "taker_asset_id",
    "maker_amount",
    "taker_amount",
];

/// One row of a trade partition, as recorded by the source.
///
/// `timestamp` is optional — older partitions carry only the block number,
/// which conversion falls back to as an ordering key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTrade {
    pub block_number: u64,
    pub timestamp: Option<NaiveDateTime>,
    pub maker_asset_id: String,
    pub taker_asset_id: String,
    pub maker_amount: f64,
    pub taker_amount: f64,
}

/// Validate that a trade table is non-empty and carries the required
/// columns. Called directly by the simulator pipeline; the store's read
/// paths degrade instead of erroring.
pub fn validate_trade_table(df: &DataFrame) -> Result<(), DataError> {
    if df.height() == 0 {
        return Err(DataError::Validation("empty trade table".into()));
    }
    for col in REQUIRED_COLUMNS {
        if df.column(col).is_err() {
            return Err(DataError::Validation(format!(
                "missing required column '{col}'"
            )));
        }
    }
    Ok(())
}

/// Read one partition file, dispatching on extension.
pub fn read_partition(path: &Path) -> Result<Vec<RawTrade>, DataError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("parquet") => read_parquet_partition(path),
        Some("csv") => read_csv_partition(path),
        other => Err(DataError::Validation(format!(
            "unsupported partition format: {other:?}"
        ))),
    }
}

fn read_parquet_partition(path: &Path) -> Result<Vec<RawTrade>, DataError> {
    let file =
        fs::File::open(path).map_err(|e| DataError::Parquet(format!("open: {e}")))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| DataError::Parquet(format!("read: {e}")))?;
    validate_trade_table(&df)?;
    dataframe_to_raw_trades(&df)
}

/// CSV row shape for the fallback format; empty timestamp fields are None.
#[derive(Debug, Deserialize)]
struct CsvTradeRow {
    block_number: u64,
    #[serde(default)]
    timestamp: Option<i64>,
    maker_asset_id: String,
    taker_asset_id: String,
    maker_amount: f64,
    taker_amount: f64,
}

fn read_csv_partition(path: &Path) -> Result<Vec<RawTrade>, DataError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| DataError::Csv(format!("open: {e}")))?;

    let mut rows = Vec::new();
    for record in reader.deserialize::<CsvTradeRow>() {
        let row = record.map_err(|e| DataError::Csv(format!("row: {e}")))?;
        rows.push(RawTrade {
            block_number: row.block_number,
            timestamp: row.timestamp.and_then(epoch_to_datetime),
            maker_asset_id: row.maker_asset_id,
            taker_asset_id: row.taker_asset_id,
            maker_amount: row.maker_amount,
            taker_amount: row.taker_amount,
        });
    }
    Ok(rows)
}

/// Convert raw trades to a DataFrame for parquet persistence.
pub fn raw_trades_to_dataframe(rows: &[RawTrade]) -> Result<DataFrame, DataError> {
    let block_numbers: Vec<u64> = rows.iter().map(|r| r.block_number).collect();
    let timestamps: Vec<Option<i64>> = rows
        .iter()
        .map(|r| r.timestamp.map(|t| t.and_utc().timestamp()))
        .collect();
    let maker_ids: Vec<String> = rows.iter().map(|r| r.maker_asset_id.clone()).collect();
    let taker_ids: Vec<String> = rows.iter().map(|r| r.taker_asset_id.clone()).collect();
    let maker_amounts: Vec<f64> = rows.iter().map(|r| r.maker_amount).collect();
    let taker_amounts: Vec<f64> = rows.iter().map(|r| r.taker_amount).collect();

    DataFrame::new(vec![
        Column::new("block_number".into(), block_numbers),
        Column::new("timestamp".into(), timestamps),
        Column::new("maker_asset_id".into(), maker_ids),
        Column::new("taker_asset_id".into(), taker_ids),
        Column::new("maker_amount".into(), maker_amounts),
        Column::new("taker_amount".into(), taker_amounts),
    ])
    .map_err(|e| DataError::Parquet(format!("dataframe creation: {e}")))
}

/// Convert a DataFrame back to raw trades.
pub fn dataframe_to_raw_trades(df: &DataFrame) -> Result<Vec<RawTrade>, DataError> {
    let col_err = |col: &str, e: PolarsError| DataError::Parquet(format!("column {col}: {e}"));

    let blocks = df
        .column("block_number")
        .map_err(|e| col_err("block_number", e))?
        .cast(&DataType::UInt64)
        .map_err(|e| col_err("block_number", e))?;
    let blocks = blocks.u64().map_err(|e| col_err("block_number", e))?;

    let timestamps = match df.column("timestamp") {
        Ok(col) => Some(
            col.cast(&DataType::Int64)
                .map_err(|e| col_err("timestamp", e))?,
        ),
        Err(_) => None,
    };
    let timestamps = match &timestamps {
        Some(col) => Some(col.i64().map_err(|e| col_err("timestamp", e))?),
        None => None,
    };

    let maker_ids_col = df
        .column("maker_asset_id")
        .map_err(|e| col_err("maker_asset_id", e))?;
    let maker_ids = maker_ids_col.str().map_err(|e| col_err("maker_asset_id", e))?;
    let taker_ids_col = df
        .column("taker_asset_id")
        .map_err(|e| col_err("taker_asset_id", e))?;
    let taker_ids = taker_ids_col.str().map_err(|e| col_err("taker_asset_id", e))?;

    let maker_amounts_col = df
        .column("maker_amount")
        .map_err(|e| col_err("maker_amount", e))?
        .cast(&DataType::Float64)
        .map_err(|e| col_err("maker_amount", e))?;
    let maker_amounts = maker_amounts_col
        .f64()
        .map_err(|e| col_err("maker_amount", e))?;
    let taker_amounts_col = df
        .column("taker_amount")
        .map_err(|e| col_err("taker_amount", e))?
        .cast(&DataType::Float64)
        .map_err(|e| col_err("taker_amount", e))?;
    let taker_amounts = taker_amounts_col
        .f64()
        .map_err(|e| col_err("taker_amount", e))?;

    let mut rows = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        rows.push(RawTrade {
            block_number: blocks.get(i).unwrap_or(0),
            timestamp: timestamps
                .as_ref()
                .and_then(|ts| ts.get(i))
                .and_then(epoch_to_datetime),
            maker_asset_id: maker_ids.get(i).unwrap_or_default().to_string(),
            taker_asset_id: taker_ids.get(i).unwrap_or_default().to_string(),
            maker_amount: maker_amounts.get(i).unwrap_or(f64::NAN),
            taker_amount: taker_amounts.get(i).unwrap_or(f64::NAN),
        });
    }
    Ok(rows)
}

/// Epoch seconds → naive UTC timestamp; out-of-range values become None.
pub fn epoch_to_datetime(secs: i64) -> Option<NaiveDateTime> {
    chrono::DateTime::from_timestamp(secs, 0).map(|dt| dt.naive_utc())
}
