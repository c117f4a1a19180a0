//! Config-driven study definitions.
//!
//! A [`StudyDefinition`] names everything a grid indexing run needs: the
//! boundary file, the event file and its columns, the resolution, and the
//! optional region and year filters. Relative paths are resolved against
//! the directory of the TOML file they were loaded from.
//!
//! ```toml
//! id = "burglary_2010s"
//! name = "Burglary, 2010-2015"
//! boundary = "boundary.geojson"
//! events = "events.csv"
//! resolution = 500.0
//! region = "075"
//! years = { first = 2010, last = 2015 }
//!
//! [columns]
//! x = "easting"
//! y = "northing"
//! year = "year"
//! region = "county_code"
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::IngestError;
use crate::events::{EventColumns, EventFilter, YearRange};

fn default_output_dir() -> PathBuf {
    PathBuf::from("data/generated")
}

/// A complete grid indexing run, loaded from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct StudyDefinition {
    /// Identifier used to name output files.
    pub id: String,
    /// Human-readable description.
    #[serde(default)]
    pub name: Option<String>,
    /// `GeoJSON` observation window.
    pub boundary: PathBuf,
    /// CSV of point events.
    pub events: PathBuf,
    /// Cell side length, in boundary coordinate units.
    pub resolution: f64,
    /// Region code to keep.
    #[serde(default)]
    pub region: Option<String>,
    /// Years to keep; also fixes which year is slice 1.
    #[serde(default)]
    pub years: Option<YearRange>,
    #[serde(default)]
    pub columns: EventColumns,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl StudyDefinition {
    /// The row filter described by this study.
    #[must_use]
    pub fn filter(&self) -> EventFilter {
        EventFilter {
            region: self.region.clone(),
            years: self.years,
        }
    }

    /// Display name, falling back to the id.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    fn validate(&self) -> Result<(), IngestError> {
        if self.id.trim().is_empty() {
            return Err(IngestError::Config {
                message: "study id must not be empty".to_string(),
            });
        }
        if let Some(years) = self.years {
            YearRange::new(years.first, years.last)?;
        }
        Ok(())
    }

    fn resolve_paths(&mut self, base: &Path) {
        for path in [&mut self.boundary, &mut self.events, &mut self.output_dir] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }
}

/// Parses a study definition from a TOML string. Paths are left as given.
///
/// # Errors
///
/// Returns an error if the TOML is malformed or the definition is invalid.
pub fn parse_study_toml(toml_str: &str) -> Result<StudyDefinition, IngestError> {
    let study: StudyDefinition = toml::de::from_str(toml_str)?;
    study.validate()?;
    Ok(study)
}

/// Loads a study definition file, resolving relative paths against its
/// directory.
///
/// # Errors
///
/// Returns an error if the file cannot be read or [`parse_study_toml`]
/// fails.
pub fn load_study(path: &Path) -> Result<StudyDefinition, IngestError> {
    let contents = std::fs::read_to_string(path).map_err(|e| IngestError::Io {
        path: path.display().to_string(),
        source: e,
    })?;

    let mut study = parse_study_toml(&contents)?;
    if let Some(base) = path.parent() {
        study.resolve_paths(base);
    }

    log::info!("Loaded study '{}' from {}", study.id, path.display());
    Ok(study)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
id = "demo"
boundary = "boundary.geojson"
events = "events.csv"
resolution = 5.0
"#;

    #[test]
    fn parses_minimal_study_with_defaults() {
        let study = parse_study_toml(MINIMAL).unwrap();
        assert_eq!(study.display_name(), "demo");
        assert_eq!(study.columns, EventColumns::default());
        assert_eq!(study.output_dir, PathBuf::from("data/generated"));
        assert_eq!(study.filter(), EventFilter::default());
    }

    #[test]
    fn parses_full_study() {
        let study = parse_study_toml(
            r#"
id = "burglary"
name = "Burglary"
boundary = "/data/window.geojson"
events = "/data/events.csv"
resolution = 250.0
region = "075"
years = { first = 2010, last = 2015 }
output_dir = "/tmp/out"

[columns]
x = "easting"
y = "northing"
date = "occurred_at"
region = "county"
"#,
        )
        .unwrap();
        assert_eq!(study.display_name(), "Burglary");
        assert_eq!(study.columns.year, None);
        assert_eq!(study.columns.date.as_deref(), Some("occurred_at"));
        assert_eq!(study.filter().region.as_deref(), Some("075"));
        assert_eq!(study.years, Some(YearRange::new(2010, 2015).unwrap()));
    }

    #[test]
    fn rejects_inverted_year_range() {
        let toml = format!("{MINIMAL}years = {{ first = 2015, last = 2010 }}\n");
        assert!(matches!(
            parse_study_toml(&toml),
            Err(IngestError::InvalidYearRange { .. })
        ));
    }

    #[test]
    fn rejects_missing_fields() {
        assert!(matches!(
            parse_study_toml("id = \"demo\"\n"),
            Err(IngestError::Toml(_))
        ));
    }

    #[test]
    fn resolves_paths_relative_to_study_file() {
        let dir = std::env::temp_dir().join("lgcp_grid_ingest_study_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("study.toml");
        std::fs::write(&path, MINIMAL).unwrap();

        let study = load_study(&path).unwrap();
        std::fs::remove_dir_all(&dir).ok();

        assert_eq!(study.boundary, dir.join("boundary.geojson"));
        assert_eq!(study.events, dir.join("events.csv"));
        assert_eq!(study.output_dir, dir.join("data/generated"));
    }
}
