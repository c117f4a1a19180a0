//! Point event loading from CSV.
//!
//! Column names are configurable. The observation year comes either from
//! an integer year column or from a date column (`YYYY-MM-DD`, a naive
//! datetime, or RFC 3339). Rows can be restricted to one region code and
//! an inclusive year range; malformed rows are skipped.

use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Datelike as _, NaiveDate, NaiveDateTime};
use lgcp_grid_models::{PointEvent, TimeOffset};
use serde::Deserialize;

use crate::IngestError;

/// Names of the CSV columns holding each event attribute.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EventColumns {
    #[serde(default = "default_x")]
    pub x: String,
    #[serde(default = "default_y")]
    pub y: String,
    /// Integer year column. Takes precedence over `date`.
    #[serde(default)]
    pub year: Option<String>,
    /// Date or datetime column the year is extracted from.
    #[serde(default)]
    pub date: Option<String>,
    /// Region code column, required when filtering by region.
    #[serde(default)]
    pub region: Option<String>,
}

fn default_x() -> String {
    "x".to_string()
}

fn default_y() -> String {
    "y".to_string()
}

impl Default for EventColumns {
    fn default() -> Self {
        Self {
            x: default_x(),
            y: default_y(),
            year: Some("year".to_string()),
            date: None,
            region: None,
        }
    }
}

/// Inclusive range of calendar years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct YearRange {
    pub first: i32,
    pub last: i32,
}

impl YearRange {
    /// # Errors
    ///
    /// Returns [`IngestError::InvalidYearRange`] if `first > last`.
    pub fn new(first: i32, last: i32) -> Result<Self, IngestError> {
        if first > last {
            return Err(IngestError::InvalidYearRange { first, last });
        }
        Ok(Self { first, last })
    }

    #[must_use]
    pub const fn contains(self, year: i32) -> bool {
        self.first <= year && year <= self.last
    }
}

/// Parses `"2010-2015"` or a single year `"2012"`.
impl FromStr for YearRange {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let config_error = || IngestError::Config {
            message: format!("invalid year range '{s}', expected e.g. 2010-2015"),
        };

        let (first, last) = s.split_once('-').unwrap_or((s, s));
        let first = first.trim().parse().map_err(|_| config_error())?;
        let last = last.trim().parse().map_err(|_| config_error())?;
        Self::new(first, last)
    }
}

/// Row filters applied while reading.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    /// Keep only rows whose region column equals this code
    /// (ASCII case-insensitive).
    pub region: Option<String>,
    /// Keep only rows whose year falls in this range.
    pub years: Option<YearRange>,
}

/// An event as read from the source, before time slicing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawEvent {
    pub x: f64,
    pub y: f64,
    pub year: i32,
}

/// Events mapped onto contiguous time slices.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedEvents {
    pub events: Vec<PointEvent>,
    pub offset: TimeOffset,
    /// Slices `1..=n_slices` cover the observation window.
    pub n_slices: u32,
}

struct ColumnIndices {
    x: usize,
    y: usize,
    year: Option<usize>,
    date: Option<usize>,
    region: Option<usize>,
}

impl ColumnIndices {
    fn resolve(
        headers: &csv::StringRecord,
        columns: &EventColumns,
        filter: &EventFilter,
    ) -> Result<Self, IngestError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| IngestError::MissingColumn {
                    column: name.to_string(),
                })
        };

        let year = columns.year.as_deref().map(find).transpose()?;
        let date = columns.date.as_deref().map(find).transpose()?;
        if year.is_none() && date.is_none() {
            return Err(IngestError::Config {
                message: "either a year or a date column must be configured".to_string(),
            });
        }

        let region = columns.region.as_deref().map(find).transpose()?;
        if filter.region.is_some() && region.is_none() {
            return Err(IngestError::Config {
                message: "filtering by region requires a region column".to_string(),
            });
        }

        Ok(Self {
            x: find(&columns.x)?,
            y: find(&columns.y)?,
            year,
            date,
            region,
        })
    }
}

/// Reads events from CSV, applying `filter`.
///
/// `source` labels the input in errors and logs.
///
/// # Errors
///
/// Returns an error if the header row cannot be read, a configured column
/// is missing, or the configuration is inconsistent. Individual malformed
/// rows are skipped, not reported as errors.
pub fn read_events(
    reader: impl Read,
    source: &str,
    columns: &EventColumns,
    filter: &EventFilter,
) -> Result<Vec<RawEvent>, IngestError> {
    let csv_error = |e| IngestError::Csv {
        path: source.to_string(),
        source: e,
    };

    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(reader);
    let headers = csv_reader.headers().map_err(csv_error)?.clone();
    let indices = ColumnIndices::resolve(&headers, columns, filter)?;

    let mut events = Vec::new();
    let mut skipped = 0u64;
    let mut filtered = 0u64;

    for result in csv_reader.records() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                log::trace!("  skipping malformed row: {e}");
                skipped += 1;
                continue;
            }
        };

        let Some(event) = parse_record(&record, &indices) else {
            log::trace!("  skipping unparseable row: {record:?}");
            skipped += 1;
            continue;
        };

        if let Some(code) = &filter.region {
            let region = indices.region.and_then(|i| record.get(i)).map(str::trim);
            if !region.is_some_and(|r| r.eq_ignore_ascii_case(code)) {
                filtered += 1;
                continue;
            }
        }
        if let Some(years) = filter.years
            && !years.contains(event.year)
        {
            filtered += 1;
            continue;
        }

        events.push(event);
    }

    log::info!(
        "Read {} events from {source} ({filtered} filtered out, {skipped} malformed rows skipped)",
        events.len()
    );

    Ok(events)
}

/// Reads events from a CSV file.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or [`read_events`] fails.
pub fn load_events(
    path: &Path,
    columns: &EventColumns,
    filter: &EventFilter,
) -> Result<Vec<RawEvent>, IngestError> {
    let file = std::fs::File::open(path).map_err(|e| IngestError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    read_events(file, &path.display().to_string(), columns, filter)
}

/// Maps event years onto time slices.
///
/// With an explicit `years` range, slice 1 is `years.first` and the window
/// spans the whole range even if its last years are empty. Otherwise the
/// earliest observed year is slice 1 and the latest closes the window.
///
/// # Errors
///
/// * [`IngestError::NoEvents`] if there is no range and no events to
///   derive one from.
/// * [`IngestError::InvalidYearRange`] if the first year has no preceding
///   year to offset from.
pub fn assign_slices(
    raw: &[RawEvent],
    years: Option<YearRange>,
) -> Result<TimedEvents, IngestError> {
    let (first_year, last_year) = match years {
        Some(range) => (range.first, range.last),
        None => {
            let first = raw.iter().map(|e| e.year).min().ok_or(IngestError::NoEvents)?;
            let last = raw.iter().map(|e| e.year).max().ok_or(IngestError::NoEvents)?;
            (first, last)
        }
    };
    let offset = TimeOffset::starting_at(first_year).ok_or(IngestError::InvalidYearRange {
        first: first_year,
        last: last_year,
    })?;
    let n_slices = offset.slices_through(last_year);

    let events: Vec<PointEvent> = raw
        .iter()
        .filter_map(|e| {
            let t = offset.t_for(e.year).filter(|t| *t <= n_slices)?;
            Some(PointEvent::new(e.x, e.y, t))
        })
        .collect();

    log::info!(
        "Assigned {} events to {n_slices} time slices ({}..={last_year})",
        events.len(),
        offset.year_for(1)
    );

    Ok(TimedEvents {
        events,
        offset,
        n_slices,
    })
}

fn parse_record(record: &csv::StringRecord, indices: &ColumnIndices) -> Option<RawEvent> {
    let x: f64 = record.get(indices.x)?.trim().parse().ok()?;
    let y: f64 = record.get(indices.y)?.trim().parse().ok()?;
    if !(x.is_finite() && y.is_finite()) {
        return None;
    }

    let year = match (indices.year, indices.date) {
        (Some(i), _) => parse_year(record.get(i)?)?,
        (None, Some(i)) => parse_date_year(record.get(i)?)?,
        (None, None) => return None,
    };

    Some(RawEvent { x, y, year })
}

/// Accepts `"2014"` as well as `"2014.0"`, which spreadsheet exports
/// commonly produce.
fn parse_year(value: &str) -> Option<i32> {
    let value = value.trim();
    value
        .parse::<i32>()
        .ok()
        .or_else(|| value.strip_suffix(".0").and_then(|v| v.parse().ok()))
}

fn parse_date_year(value: &str) -> Option<i32> {
    let value = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(date.year());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.year());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt.year());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\
lon,lat,year,county
1.0,1.0,2015,A
6.0,1.0,2015,a
1.0,6.0,2016,B
bad,2.0,2016,A
3.0,3.0,2018,A
4.0,4.0,,A
";

    fn lon_lat_columns() -> EventColumns {
        EventColumns {
            x: "lon".to_string(),
            y: "lat".to_string(),
            year: Some("year".to_string()),
            date: None,
            region: Some("county".to_string()),
        }
    }

    #[test]
    fn reads_and_skips_malformed_rows() {
        let events = read_events(
            CSV.as_bytes(),
            "inline",
            &lon_lat_columns(),
            &EventFilter::default(),
        )
        .unwrap();
        assert_eq!(events.len(), 4);
        assert_eq!(
            events[0],
            RawEvent {
                x: 1.0,
                y: 1.0,
                year: 2015
            }
        );
    }

    #[test]
    fn filters_by_region_and_years() {
        let filter = EventFilter {
            region: Some("A".to_string()),
            years: Some(YearRange::new(2015, 2016).unwrap()),
        };
        let events = read_events(CSV.as_bytes(), "inline", &lon_lat_columns(), &filter).unwrap();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.year == 2015));
    }

    #[test]
    fn region_filter_requires_region_column() {
        let columns = EventColumns {
            region: None,
            ..lon_lat_columns()
        };
        let filter = EventFilter {
            region: Some("A".to_string()),
            years: None,
        };
        assert!(matches!(
            read_events(CSV.as_bytes(), "inline", &columns, &filter),
            Err(IngestError::Config { .. })
        ));
    }

    #[test]
    fn missing_column_is_reported() {
        let columns = EventColumns {
            x: "easting".to_string(),
            ..lon_lat_columns()
        };
        let err = read_events(CSV.as_bytes(), "inline", &columns, &EventFilter::default())
            .unwrap_err();
        assert!(matches!(err, IngestError::MissingColumn { column } if column == "easting"));
    }

    #[test]
    fn years_come_from_dates() {
        let csv = "\
x,y,occurred
1,1,2019-03-04
2,2,2020-12-31T23:59:59Z
3,3,2021-06-01 08:00:00
4,4,yesterday
";
        let columns = EventColumns {
            year: None,
            date: Some("occurred".to_string()),
            ..EventColumns::default()
        };
        let events = read_events(csv.as_bytes(), "inline", &columns, &EventFilter::default())
            .unwrap();
        let years: Vec<i32> = events.iter().map(|e| e.year).collect();
        assert_eq!(years, vec![2019, 2020, 2021]);
    }

    #[test]
    fn earliest_year_becomes_slice_one() {
        let raw = [
            RawEvent {
                x: 0.0,
                y: 0.0,
                year: 2012,
            },
            RawEvent {
                x: 0.0,
                y: 0.0,
                year: 2010,
            },
        ];
        let timed = assign_slices(&raw, None).unwrap();
        assert_eq!(timed.n_slices, 3);
        assert_eq!(timed.offset.base_year(), 2009);
        let ts: Vec<u32> = timed.events.iter().map(|e| e.t).collect();
        assert_eq!(ts, vec![3, 1]);
    }

    #[test]
    fn explicit_range_covers_empty_trailing_years() {
        let raw = [RawEvent {
            x: 0.0,
            y: 0.0,
            year: 2011,
        }];
        let timed = assign_slices(&raw, Some(YearRange::new(2010, 2014).unwrap())).unwrap();
        assert_eq!(timed.n_slices, 5);
        assert_eq!(timed.events[0].t, 2);
    }

    #[test]
    fn no_events_without_range_is_an_error() {
        assert!(matches!(assign_slices(&[], None), Err(IngestError::NoEvents)));
        let timed = assign_slices(&[], Some(YearRange::new(2000, 2001).unwrap())).unwrap();
        assert_eq!(timed.n_slices, 2);
        assert!(timed.events.is_empty());
    }

    #[test]
    fn extreme_years_are_reported_not_panicked_on() {
        let raw = [
            RawEvent {
                x: 0.0,
                y: 0.0,
                year: i32::MIN,
            },
            RawEvent {
                x: 0.0,
                y: 0.0,
                year: 2010,
            },
        ];
        assert!(matches!(
            assign_slices(&raw, None),
            Err(IngestError::InvalidYearRange {
                first: i32::MIN,
                last: 2010
            })
        ));

        let raw = [RawEvent {
            x: 0.0,
            y: 0.0,
            year: i32::MAX,
        }];
        let timed = assign_slices(&raw, Some(YearRange::new(-5, 2).unwrap())).unwrap();
        assert_eq!(timed.n_slices, 8);
        assert!(timed.events.is_empty());
    }

    #[test]
    fn parses_year_ranges() {
        assert_eq!(
            "2010-2015".parse::<YearRange>().unwrap(),
            YearRange::new(2010, 2015).unwrap()
        );
        assert_eq!(
            "2012".parse::<YearRange>().unwrap(),
            YearRange::new(2012, 2012).unwrap()
        );
        assert!("2015-2010".parse::<YearRange>().is_err());
        assert!("recent".parse::<YearRange>().is_err());
    }

    #[test]
    fn fractional_year_exports_are_accepted() {
        assert_eq!(parse_year("2014.0"), Some(2014));
        assert_eq!(parse_year(" 2014 "), Some(2014));
        assert_eq!(parse_year("2014.5"), None);
    }
}
