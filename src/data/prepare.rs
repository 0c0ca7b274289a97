use std::{
    fs,
    io::{Read, Write},
    path::Path,
};

use chrono::NaiveDate;
use hashbrown::HashMap;
use serde::Deserialize;

use crate::{
    constants::files::{TEST_FILE, TRAIN_FILE},
    data::row::{CalendarFeatures, Row},
    error::{HarnessError, Result},
};

/// A day of the raw price file. Any numeric field may be blank.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPriceRow {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Open")]
    pub open: Option<f64>,
    #[serde(rename = "High")]
    pub high: Option<f64>,
    #[serde(rename = "Low")]
    pub low: Option<f64>,
    #[serde(rename = "Close")]
    pub close: Option<f64>,
    #[serde(rename = "Adj Close")]
    pub adj_close: Option<f64>,
    #[serde(rename = "Volume")]
    pub volume: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawRateRow {
    #[serde(rename = "Date")]
    date: NaiveDate,
    #[serde(rename = "Value")]
    value: Option<f64>,
}

/// Interest rate observations keyed by date.
pub type RateSeries = HashMap<NaiveDate, f64>;

pub fn read_price_rows(reader: impl Read) -> Result<Vec<RawPriceRow>> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut rows = Vec::new();

    for record in reader.deserialize() {
        rows.push(record?);
    }

    Ok(rows)
}

pub fn read_rate_rows(reader: impl Read) -> Result<RateSeries> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut rates = RateSeries::new();

    for record in reader.deserialize() {
        let row: RawRateRow = record?;
        // Blank rates are left for the forward fill
        if let Some(value) = row.value {
            rates.insert(row.date, value);
        }
    }

    Ok(rates)
}

/// Carries the last observed value of one column forward over gaps.
#[derive(Default)]
struct ForwardFill(Option<f64>);

impl ForwardFill {
    fn fill(&mut self, value: Option<f64>, column: &'static str, date: NaiveDate) -> Result<f64> {
        if value.is_some() {
            self.0 = value;
        }

        self.0.ok_or_else(|| HarnessError::MissingValues {
            column,
            date: date.to_string(),
        })
    }
}

/// Left joins the rates onto the price rows by date, derives the calendar
/// features and forward fills every column. Fails on the first value that is
/// still missing after the fill.
pub fn join_series(prices: &[RawPriceRow], rates: &RateSeries) -> Result<Vec<Row>> {
    let mut open = ForwardFill::default();
    let mut high = ForwardFill::default();
    let mut low = ForwardFill::default();
    let mut close = ForwardFill::default();
    let mut adj_close = ForwardFill::default();
    let mut volume = ForwardFill::default();
    let mut savings_rate = ForwardFill::default();

    let mut rows = Vec::with_capacity(prices.len());

    for raw in prices {
        let date = raw.date;
        let calendar = CalendarFeatures::new(date);

        rows.push(Row {
            date,
            open: open.fill(raw.open, "Open", date)?,
            high: high.fill(raw.high, "High", date)?,
            low: low.fill(raw.low, "Low", date)?,
            close: close.fill(raw.close, "Close", date)?,
            adj_close: adj_close.fill(raw.adj_close, "Adj Close", date)?,
            volume: volume.fill(raw.volume, "Volume", date)?,
            weekday: calendar.weekday,
            month: calendar.month,
            quarter: calendar.quarter,
            day_sine: calendar.day_sine,
            day_cos: calendar.day_cos,
            month_sine: calendar.month_sine,
            month_cos: calendar.month_cos,
            savings_rate: savings_rate.fill(rates.get(&date).copied(), "Savings_Rate", date)?,
        });
    }

    Ok(rows)
}

/// Contiguous chronological split, the first `floor(len * train_ratio)` rows train.
pub fn split_series(rows: &[Row], train_ratio: f64) -> Result<(&[Row], &[Row])> {
    if !(0.0..=1.0).contains(&train_ratio) {
        return Err(HarnessError::Config(format!(
            "train ratio {train_ratio} must be within 0 and 1"
        )));
    }

    let train_size = (rows.len() as f64 * train_ratio) as usize;
    Ok(rows.split_at(train_size))
}

pub fn write_rows(writer: impl Write, rows: &[Row]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);

    for row in rows {
        writer.serialize(row)?;
    }

    writer.flush()?;
    Ok(())
}

pub struct PreparedSplit {
    pub train: Vec<Row>,
    pub test: Vec<Row>,
}

/// Reads the raw price and rate files, prepares the joined series and writes
/// the train and test splits into `out_dir`.
pub fn prepare_files(
    stock_path: &Path,
    rates_path: &Path,
    out_dir: &Path,
    train_ratio: f64,
) -> Result<PreparedSplit> {
    let prices = read_price_rows(fs::File::open(stock_path)?)?;
    let rates = read_rate_rows(fs::File::open(rates_path)?)?;

    let rows = join_series(&prices, &rates)?;
    let (train, test) = split_series(&rows, train_ratio)?;

    fs::create_dir_all(out_dir)?;
    write_rows(fs::File::create(out_dir.join(TRAIN_FILE))?, train)?;
    write_rows(fs::File::create(out_dir.join(TEST_FILE))?, test)?;

    Ok(PreparedSplit {
        train: train.to_vec(),
        test: test.to_vec(),
    })
}
