use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identity of a source raster pair, encoded in its basename as
/// `<site>_<region>_<year>`. Region may itself contain underscores; the year
/// is always the final component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RasterId {
    pub site: String,
    pub region: String,
    pub year: u16,
}

#[derive(Debug, Error)]
pub enum RasterIdError {
    #[error("basename {0:?} has fewer than three '_'-separated components")]
    TooFewComponents(String),
    #[error("basename {0:?} does not end in a four-digit year")]
    BadYear(String),
}

impl RasterId {
    pub fn parse(basename: &str) -> Result<Self, RasterIdError> {
        let parts: Vec<&str> = basename.split('_').collect();
        if parts.len() < 3 {
            return Err(RasterIdError::TooFewComponents(basename.to_string()));
        }
        let year_part = parts[parts.len() - 1];
        let year: u16 = year_part
            .parse()
            .ok()
            .filter(|_| year_part.len() == 4)
            .ok_or_else(|| RasterIdError::BadYear(basename.to_string()))?;
        Ok(Self {
            site: parts[0].to_string(),
            region: parts[1..parts.len() - 1].join("_"),
            year,
        })
    }

    pub fn basename(&self) -> String {
        format!("{}_{}_{}", self.site, self.region, self.year)
    }
}
