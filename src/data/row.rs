use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::constants::data::{DAYS_PER_YEAR, MONTHS_PER_YEAR};

/// One prepared trading day. Header names match the processed CSV files.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Row {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Open")]
    pub open: f64,
    #[serde(rename = "High")]
    pub high: f64,
    #[serde(rename = "Low")]
    pub low: f64,
    #[serde(rename = "Close")]
    pub close: f64,
    #[serde(rename = "Adj Close")]
    pub adj_close: f64,
    #[serde(rename = "Volume")]
    pub volume: f64,
    #[serde(rename = "Weekday")]
    pub weekday: u32,
    #[serde(rename = "Month")]
    pub month: u32,
    #[serde(rename = "Quarter")]
    pub quarter: u32,
    #[serde(rename = "Day_Sine")]
    pub day_sine: f64,
    #[serde(rename = "Day_Cos")]
    pub day_cos: f64,
    #[serde(rename = "Month_Sine")]
    pub month_sine: f64,
    #[serde(rename = "Month_Cos")]
    pub month_cos: f64,
    /// Annualized rate in percent
    #[serde(rename = "Savings_Rate")]
    pub savings_rate: f64,
}

/// Calendar features derived from the date alone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalendarFeatures {
    /// Monday is 0
    pub weekday: u32,
    pub month: u32,
    pub quarter: u32,
    pub day_sine: f64,
    pub day_cos: f64,
    pub month_sine: f64,
    pub month_cos: f64,
}

impl CalendarFeatures {
    pub fn new(date: NaiveDate) -> Self {
        let month = date.month();
        let day_angle = 2. * std::f64::consts::PI * date.ordinal() as f64 / DAYS_PER_YEAR;
        let month_angle = 2. * std::f64::consts::PI * month as f64 / MONTHS_PER_YEAR;

        Self {
            weekday: date.weekday().num_days_from_monday(),
            month,
            quarter: (month - 1) / 3 + 1,
            day_sine: day_angle.sin(),
            day_cos: day_angle.cos(),
            month_sine: month_angle.sin(),
            month_cos: month_angle.cos(),
        }
    }
}

impl Row {
    /// A row where every price field is `price`. Used to build synthetic series.
    pub fn synthetic(date: NaiveDate, price: f64, volume: f64, savings_rate: f64) -> Self {
        let calendar = CalendarFeatures::new(date);

        Self {
            date,
            open: price,
            high: price,
            low: price,
            close: price,
            adj_close: price,
            volume,
            weekday: calendar.weekday,
            month: calendar.month,
            quarter: calendar.quarter,
            day_sine: calendar.day_sine,
            day_cos: calendar.day_cos,
            month_sine: calendar.month_sine,
            month_cos: calendar.month_cos,
            savings_rate,
        }
    }

    /// Ordered (column, value) pairs, the date excluded.
    pub fn numeric_fields(&self) -> [(&'static str, f64); 14] {
        [
            ("Open", self.open),
            ("High", self.high),
            ("Low", self.low),
            ("Close", self.close),
            ("Adj Close", self.adj_close),
            ("Volume", self.volume),
            ("Weekday", self.weekday as f64),
            ("Month", self.month as f64),
            ("Quarter", self.quarter as f64),
            ("Day_Sine", self.day_sine),
            ("Day_Cos", self.day_cos),
            ("Month_Sine", self.month_sine),
            ("Month_Cos", self.month_cos),
            ("Savings_Rate", self.savings_rate),
        ]
    }
}

/// Consecutive calendar days starting at `start`, one row per price.
pub fn synthetic_series(start: NaiveDate, prices: &[f64], rates: &[f64]) -> Vec<Row> {
    prices
        .iter()
        .zip(rates)
        .zip(start.iter_days())
        .map(|((price, rate), date)| Row::synthetic(date, *price, 1_000., *rate))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calendar_features_for_known_date() {
        // 2020-05-14 was a Thursday, day 135 of a leap year
        let date = NaiveDate::from_ymd_opt(2020, 5, 14).unwrap();
        let features = CalendarFeatures::new(date);

        assert_eq!(features.weekday, 3);
        assert_eq!(features.month, 5);
        assert_eq!(features.quarter, 2);

        let day_angle = 2. * std::f64::consts::PI * 135. / 365.;
        assert!((features.day_sine - day_angle.sin()).abs() < 1e-12);
        assert!((features.day_cos - day_angle.cos()).abs() < 1e-12);

        let month_angle = 2. * std::f64::consts::PI * 5. / 12.;
        assert!((features.month_sine - month_angle.sin()).abs() < 1e-12);
        assert!((features.month_cos - month_angle.cos()).abs() < 1e-12);
    }

    #[test]
    fn quarters_follow_months() {
        let quarters: Vec<u32> = (1..=12)
            .map(|month| CalendarFeatures::new(NaiveDate::from_ymd_opt(2021, month, 1).unwrap()).quarter)
            .collect();

        assert_eq!(quarters, vec![1, 1, 1, 2, 2, 2, 3, 3, 3, 4, 4, 4]);
    }

    #[test]
    fn synthetic_series_uses_consecutive_days() {
        let start = NaiveDate::from_ymd_opt(2021, 12, 30).unwrap();
        let rows = synthetic_series(start, &[1., 2., 3.], &[0.5, 0.5, 0.5]);

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2].date, NaiveDate::from_ymd_opt(2022, 1, 1).unwrap());
        assert_eq!(rows[1].adj_close, 2.);
        assert_eq!(rows[2].quarter, 1);
    }
}
