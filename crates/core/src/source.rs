//! Where subtitles come from.
//!
//! The resolver only needs "give me a subtitle in this language for this
//! title, or tell me there is none". `DirectorySource` answers that from a
//! local folder tree.

use crate::error::SourceError;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, trace, warn};

/// Code asking a source for a subtitle in any language.
pub const ANY_LANGUAGE_CODE: &str = "all";

/// The title a subtitle is wanted for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaRef {
    Imdb(String),
    Name(String),
}

/// Title plus optional series position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaQuery {
    pub media: MediaRef,
    pub season: Option<u32>,
    pub episode: Option<u32>,
}

impl MediaQuery {
    pub fn imdb(id: impl Into<String>) -> Self {
        Self {
            media: MediaRef::Imdb(id.into()),
            season: None,
            episode: None,
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            media: MediaRef::Name(name.into()),
            season: None,
            episode: None,
        }
    }

    pub fn with_episode(mut self, season: u32, episode: u32) -> Self {
        self.season = Some(season);
        self.episode = Some(episode);
        self
    }
}

impl fmt::Display for MediaQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.media {
            MediaRef::Imdb(id) => write!(f, "{id}")?,
            MediaRef::Name(name) => write!(f, "\"{name}\"")?,
        }
        if let (Some(s), Some(e)) = (self.season, self.episode) {
            write!(f, " S{s:02}E{e:02}")?;
        }
        Ok(())
    }
}

/// Addon style id: `tt1234567` for a movie, `tt1234567:1:2` for an episode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaId(pub MediaQuery);

impl FromStr for MediaId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        match parts.as_slice() {
            [id] if !id.is_empty() => Ok(MediaId(MediaQuery::imdb(*id))),
            [id, season, episode] if !id.is_empty() => {
                let season = season.parse().map_err(|_| anyhow!("bad season in `{s}`"))?;
                let episode = episode.parse().map_err(|_| anyhow!("bad episode in `{s}`"))?;
                Ok(MediaId(MediaQuery::imdb(*id).with_episode(season, episode)))
            }
            _ => Err(anyhow!("expected `id` or `id:season:episode`, got `{s}`")),
        }
    }
}

/// A place to search for subtitles.
#[async_trait]
pub trait SubtitleSource: Send + Sync {
    /// Raw subtitle bytes for `language_code`, or `None` if there are none.
    async fn search(
        &self,
        language_code: &str,
        query: &MediaQuery,
    ) -> std::result::Result<Option<Vec<u8>>, SourceError>;
}

/// Subtitles stored on disk as `<root>/<title>/[sSSeEE/]<code>.srt`, where
/// `<title>` is the IMDb id or the movie name. The `all` code picks the
/// first file of the folder in name order.
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Folder holding the subtitles of `query`. The title must be a single
    /// plain folder name so the lookup stays under `root`.
    fn folder(&self, query: &MediaQuery) -> std::result::Result<PathBuf, SourceError> {
        let title = match &query.media {
            MediaRef::Imdb(id) => id,
            MediaRef::Name(name) => name,
        };
        let mut components = Path::new(title).components();
        let plain = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        ) && !title.contains(['/', '\\']);
        if !plain {
            warn!("refusing title `{title}` outside the subtitle index");
            return Err(SourceError::Other(format!(
                "title `{title}` is not a plain folder name"
            )));
        }
        let mut dir = self.root.join(title);
        if let (Some(s), Some(e)) = (query.season, query.episode) {
            dir = dir.join(format!("s{s:02}e{e:02}"));
        }
        Ok(dir)
    }

    fn first_srt(dir: &Path) -> std::result::Result<Option<PathBuf>, SourceError> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.extension()
                    .map(|e| e.eq_ignore_ascii_case("srt"))
                    .unwrap_or(false)
            })
            .collect();
        files.sort();
        Ok(files.into_iter().next())
    }
}

#[async_trait]
impl SubtitleSource for DirectorySource {
    async fn search(
        &self,
        language_code: &str,
        query: &MediaQuery,
    ) -> std::result::Result<Option<Vec<u8>>, SourceError> {
        trace!("search(language={language_code}, query={query})");
        let dir = self.folder(query)?;
        if !dir.is_dir() {
            debug!("no subtitle folder at {}", dir.display());
            return Ok(None);
        }
        let path = if language_code == ANY_LANGUAGE_CODE {
            match Self::first_srt(&dir)? {
                Some(p) => p,
                None => return Ok(None),
            }
        } else {
            dir.join(format!("{language_code}.srt"))
        };
        if !path.is_file() {
            debug!("no subtitle at {}", path.display());
            return Ok(None);
        }
        debug!("found subtitle {}", path.display());
        Ok(Some(std::fs::read(&path)?))
    }
}
