use clap::Args;
use meadow_dataset::{DatasetError, Modality};

/// Modality selection shared by the train and eval binaries.
#[derive(Debug, Clone, Args)]
pub struct ModalityArgs {
    /// Comma-separated input modalities (rgb, index); stacking order is
    /// fixed regardless of the order given here.
    #[arg(long, default_value = "rgb", value_delimiter = ',')]
    pub modalities: Vec<String>,
}

impl ModalityArgs {
    pub fn parse(&self) -> Result<Vec<Modality>, DatasetError> {
        parse_modalities(&self.modalities)
    }
}

/// Parse and dedupe a raw modality list, keeping first-seen order.
pub fn parse_modalities(raw: &[String]) -> Result<Vec<Modality>, DatasetError> {
    let mut out: Vec<Modality> = Vec::new();
    for s in raw {
        let modality: Modality = s.parse()?;
        if !out.contains(&modality) {
            out.push(modality);
        }
    }
    if out.is_empty() {
        return Err(DatasetError::Other(
            "at least one modality must be requested".to_string(),
        ));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_dedupes() {
        let raw = vec!["rgb".to_string(), "index".to_string(), "rgb".to_string()];
        let parsed = parse_modalities(&raw).unwrap();
        assert_eq!(parsed, vec![Modality::Rgb, Modality::Index]);
    }

    #[test]
    fn rejects_unknown_and_empty() {
        assert!(parse_modalities(&["ndvi".to_string()]).is_err());
        assert!(parse_modalities(&[]).is_err());
    }
}
