//! Language catalog mapping a language to the codes each collaborator expects.
//!
//! A row holds the language name, the translation service code and the
//! subtitle source code. Any of the three identifies the row, compared
//! case-insensitively; when several rows share a key the first one wins.

use anyhow::{anyhow, Context, Result};
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, trace};

/// One catalog row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageRow {
    pub name: String,
    pub translator_code: String,
    pub source_code: String,
}

/// Immutable lookup table from language identifiers to collaborator codes.
#[derive(Debug, Clone, Default)]
pub struct LanguageCatalog {
    rows: Vec<LanguageRow>,
    index: HashMap<String, usize>,
}

/// Rows compiled into the binary: (language, translator code, source code).
const BUILTIN_ROWS: &[(&str, &str, &str)] = &[
    ("Afrikaans", "af", "afr"),
    ("Albanian", "sq", "alb"),
    ("Arabic", "ar", "ara"),
    ("Armenian", "hy", "arm"),
    ("Basque", "eu", "baq"),
    ("Bengali", "bn", "ben"),
    ("Bosnian", "bs", "bos"),
    ("Bulgarian", "bg", "bul"),
    ("Catalan", "ca", "cat"),
    ("Chinese (Simplified)", "zh-CN", "chi"),
    ("Chinese (Traditional)", "zh-TW", "zht"),
    ("Croatian", "hr", "hrv"),
    ("Czech", "cs", "cze"),
    ("Danish", "da", "dan"),
    ("Dutch", "nl", "dut"),
    ("English", "en", "eng"),
    ("Esperanto", "eo", "epo"),
    ("Estonian", "et", "est"),
    ("Finnish", "fi", "fin"),
    ("French", "fr", "fre"),
    ("Galician", "gl", "glg"),
    ("Georgian", "ka", "geo"),
    ("German", "de", "ger"),
    ("Greek", "el", "ell"),
    ("Hebrew", "iw", "heb"),
    ("Hindi", "hi", "hin"),
    ("Hungarian", "hu", "hun"),
    ("Icelandic", "is", "ice"),
    ("Indonesian", "id", "ind"),
    ("Italian", "it", "ita"),
    ("Japanese", "ja", "jpn"),
    ("Kazakh", "kk", "kaz"),
    ("Khmer", "km", "khm"),
    ("Korean", "ko", "kor"),
    ("Latvian", "lv", "lav"),
    ("Lithuanian", "lt", "lit"),
    ("Macedonian", "mk", "mac"),
    ("Malay", "ms", "may"),
    ("Malayalam", "ml", "mal"),
    ("Mongolian", "mn", "mon"),
    ("Norwegian", "no", "nor"),
    ("Persian", "fa", "per"),
    ("Polish", "pl", "pol"),
    ("Portuguese", "pt", "por"),
    ("Portuguese (Brazil)", "pt", "pob"),
    ("Romanian", "ro", "rum"),
    ("Russian", "ru", "rus"),
    ("Serbian", "sr", "scc"),
    ("Sinhala", "si", "sin"),
    ("Slovak", "sk", "slo"),
    ("Slovenian", "sl", "slv"),
    ("Spanish", "es", "spa"),
    ("Swahili", "sw", "swa"),
    ("Swedish", "sv", "swe"),
    ("Tagalog", "tl", "tgl"),
    ("Tamil", "ta", "tam"),
    ("Telugu", "te", "tel"),
    ("Thai", "th", "tha"),
    ("Turkish", "tr", "tur"),
    ("Ukrainian", "uk", "ukr"),
    ("Urdu", "ur", "urd"),
    ("Vietnamese", "vi", "vie"),
];

static GLOBAL: OnceCell<Arc<LanguageCatalog>> = OnceCell::new();

impl LanguageCatalog {
    /// Catalog built from the rows compiled into the binary.
    pub fn builtin() -> Self {
        Self::from_rows(BUILTIN_ROWS.iter().map(|(name, tr, src)| LanguageRow {
            name: name.to_string(),
            translator_code: tr.to_string(),
            source_code: src.to_string(),
        }))
    }

    /// Make `catalog` the process-wide catalog. Only the first call wins,
    /// and only if `global` has not been used yet.
    pub fn install(catalog: LanguageCatalog) -> Result<()> {
        GLOBAL
            .set(Arc::new(catalog))
            .map_err(|_| anyhow!("language catalog already initialised"))
    }

    /// The process-wide catalog, falling back to the built-in table.
    pub fn global() -> Arc<LanguageCatalog> {
        GLOBAL.get_or_init(|| Arc::new(Self::builtin())).clone()
    }

    /// Build a catalog from rows, indexing every column of every row.
    pub fn from_rows(rows: impl IntoIterator<Item = LanguageRow>) -> Self {
        let rows: Vec<LanguageRow> = rows.into_iter().collect();
        let mut index = HashMap::new();
        for (i, row) in rows.iter().enumerate() {
            for key in [&row.name, &row.translator_code, &row.source_code] {
                index.entry(key.trim().to_lowercase()).or_insert(i);
            }
        }
        Self { rows, index }
    }

    /// Parse a `language,translator,source` CSV table.
    /// A header row naming those columns is skipped if present. Fields may
    /// be quoted, so a name can carry a comma.
    pub fn from_csv(text: &str) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());
        let mut rows = Vec::new();
        for (n, record) in reader.records().enumerate() {
            let record = record.context("malformed catalog CSV")?;
            let line = record.position().map(|p| p.line()).unwrap_or(n as u64 + 1);
            if record.iter().all(str::is_empty) {
                continue;
            }
            if record.len() != 3 || record.iter().any(str::is_empty) {
                return Err(anyhow!("line {line}: expected 3 non-empty columns"));
            }
            if n == 0 && record[0].eq_ignore_ascii_case("language") {
                continue;
            }
            rows.push(LanguageRow {
                name: record[0].to_string(),
                translator_code: record[1].to_string(),
                source_code: record[2].to_string(),
            });
        }
        debug!("loaded {} catalog rows", rows.len());
        Ok(Self::from_rows(rows))
    }

    /// Read a CSV catalog from disk.
    pub fn from_csv_path(path: &Path) -> Result<Self> {
        trace!("from_csv_path path={}", path.display());
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading catalog {}", path.display()))?;
        Self::from_csv(&text).with_context(|| format!("parsing catalog {}", path.display()))
    }

    /// Find the row identified by `language`.
    pub fn row(&self, language: &str) -> Option<&LanguageRow> {
        self.index
            .get(&language.trim().to_lowercase())
            .map(|&i| &self.rows[i])
    }

    /// Code the subtitle source expects for `language`.
    pub fn to_source_code(&self, language: &str) -> Option<&str> {
        self.row(language).map(|r| r.source_code.as_str())
    }

    /// Code the translation backend expects for `language`.
    pub fn to_translator_code(&self, language: &str) -> Option<&str> {
        self.row(language).map(|r| r.translator_code.as_str())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_maps_any_column() {
        let catalog = LanguageCatalog::global();
        assert_eq!(catalog.to_source_code("fr"), Some("fre"));
        assert_eq!(catalog.to_translator_code("FRE"), Some("fr"));
        assert_eq!(catalog.to_source_code("zh-TW"), Some("zht"));
        assert_eq!(catalog.to_translator_code("English"), Some("en"));
        assert_eq!(catalog.to_source_code("klingon"), None);
    }

    #[test]
    fn install_after_first_use_is_refused() {
        let _ = LanguageCatalog::global();
        assert!(LanguageCatalog::install(LanguageCatalog::default()).is_err());
        assert!(!LanguageCatalog::global().is_empty());
    }

    #[test]
    fn csv_with_header() {
        let catalog =
            LanguageCatalog::from_csv("language,translator,source\nFrench,fr,fre\n\nGerman,de,ger\n")
                .unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.to_source_code("de"), Some("ger"));
        assert_eq!(catalog.to_source_code("zht"), None);
    }

    #[test]
    fn first_row_wins_on_shared_key() {
        let catalog = LanguageCatalog::from_csv("Portuguese,pt,por\nBrazilian,pt,pob\n").unwrap();
        assert_eq!(catalog.to_source_code("pt"), Some("por"));
        assert_eq!(catalog.to_source_code("Brazilian"), Some("pob"));
    }

    #[test]
    fn rejects_short_rows() {
        assert!(LanguageCatalog::from_csv("French,fr\n").is_err());
        let err = LanguageCatalog::from_csv("French,fr,fre\nGerman,,ger\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn csv_reads_quoted_names() {
        let catalog = LanguageCatalog::from_csv(
            "\"Chinese, Traditional\",zh-TW,zht\n\"Say \"\"hi\"\"\", hi , hii\n",
        )
        .unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.to_translator_code("zht"), Some("zh-TW"));
        assert_eq!(catalog.to_source_code("chinese, traditional"), Some("zht"));
        assert_eq!(catalog.to_source_code("Say \"hi\""), Some("hii"));
        assert_eq!(catalog.to_translator_code("hii"), Some("hi"));
    }

    #[test]
    fn loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("codes.csv");
        std::fs::write(&path, "Chinese (Traditional),zh-TW,zht\n").unwrap();
        let catalog = LanguageCatalog::from_csv_path(&path).unwrap();
        assert_eq!(catalog.to_translator_code("zht"), Some("zh-TW"));
    }
}
