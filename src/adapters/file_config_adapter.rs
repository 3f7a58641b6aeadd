//! INI file configuration adapter.
//!
//! Section and key names are case-sensitive so that series and operator names
//! in `[data.<name>]` / `[operator.<name>]` headers survive unchanged.

use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let mut config = Ini::new_cs();
        config.load(path).map_err(std::io::Error::other)?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, String> {
        let mut config = Ini::new_cs();
        config.read(content.to_string())?;
        Ok(Self { config })
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn sections(&self) -> Vec<String> {
        let mut sections = self.config.sections();
        sections.sort();
        sections
    }

    fn keys(&self, section: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .config
            .get_map_ref()
            .get(section)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn from_string_parses_config() {
        let content = r#"
[environment]
data_dir = ./data
universe = AAA, BBB

[data.close]
dimension = CNY
"#;
        let adapter = FileConfigAdapter::from_string(content).unwrap();
        assert_eq!(
            adapter.get_string("environment", "data_dir"),
            Some("./data".to_string())
        );
        assert_eq!(
            adapter.get_string("data.close", "dimension"),
            Some("CNY".to_string())
        );
    }

    #[test]
    fn get_string_returns_none_for_missing_key() {
        let adapter = FileConfigAdapter::from_string("[environment]\ndata_dir = x\n").unwrap();
        assert_eq!(adapter.get_string("environment", "missing"), None);
        assert_eq!(adapter.get_string("missing_section", "key"), None);
    }

    #[test]
    fn names_are_case_sensitive() {
        let adapter =
            FileConfigAdapter::from_string("[data.Close]\nDimension = CNY\n").unwrap();
        assert_eq!(
            adapter.get_string("data.Close", "Dimension"),
            Some("CNY".to_string())
        );
        assert_eq!(adapter.get_string("data.close", "dimension"), None);
    }

    #[test]
    fn get_list_splits_and_trims() {
        let adapter =
            FileConfigAdapter::from_string("[operator.ts_mean]\narg1.value = 5, 10 ,,20\n").unwrap();
        assert_eq!(
            adapter.get_list("operator.ts_mean", "arg1.value"),
            Some(vec!["5".to_string(), "10".to_string(), "20".to_string()])
        );
        assert_eq!(adapter.get_list("operator.ts_mean", "arg0.value"), None);
    }

    #[test]
    fn sections_and_keys_are_sorted() {
        let content = "[data.open]\nseries = o\ndimension = CNY\n\n[environment]\ndata_dir = d\n";
        let adapter = FileConfigAdapter::from_string(content).unwrap();
        let sections = adapter.sections();
        assert!(sections.contains(&"data.open".to_string()));
        assert!(sections.contains(&"environment".to_string()));
        assert!(sections.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(
            adapter.keys("data.open"),
            vec!["dimension".to_string(), "series".to_string()]
        );
        assert!(adapter.keys("nowhere").is_empty());
    }

    #[test]
    fn from_file_reads_config() {
        let file = create_temp_config("[environment]\ndata_dir = /srv/series\n");
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(
            adapter.get_string("environment", "data_dir"),
            Some("/srv/series".to_string())
        );
    }

    #[test]
    fn from_file_returns_error_for_missing_file() {
        let result = FileConfigAdapter::from_file("/nonexistent/path/config.ini");
        assert!(result.is_err());
    }
}
