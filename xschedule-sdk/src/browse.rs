//! Media browse tree
//!
//! A read-side projection of the metadata cache: root, a "Playlists"
//! directory, one node per playlist and one leaf per step. Nothing is stored
//! here; every call reads through [`MetadataCache`].

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;
use xschedule_state::MetadataCache;

use crate::error::{Result, SdkError};

/// Separator between playlist and step in a step content id
pub const STEP_ID_SEPARATOR: char = '|';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BrowseKind {
    #[serde(rename = "xlights_root")]
    Root,
    #[serde(rename = "xlights_playlists")]
    Playlists,
    #[serde(rename = "xlights_playlist")]
    Playlist,
    #[serde(rename = "xlights_step")]
    Step,
}

impl BrowseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BrowseKind::Root => "xlights_root",
            BrowseKind::Playlists => "xlights_playlists",
            BrowseKind::Playlist => "xlights_playlist",
            BrowseKind::Step => "xlights_step",
        }
    }
}

impl fmt::Display for BrowseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BrowseKind {
    type Err = SdkError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "xlights_root" => Ok(BrowseKind::Root),
            "xlights_playlists" => Ok(BrowseKind::Playlists),
            "xlights_playlist" => Ok(BrowseKind::Playlist),
            "xlights_step" => Ok(BrowseKind::Step),
            other => Err(SdkError::UnknownMediaType(other.to_string())),
        }
    }
}

/// One node of the browse tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrowseNode {
    pub title: String,
    pub kind: BrowseKind,
    pub content_id: String,
    pub can_play: bool,
    pub can_expand: bool,
    pub children: Vec<BrowseNode>,
}

impl BrowseNode {
    fn directory(title: &str, kind: BrowseKind, content_id: &str) -> Self {
        Self {
            title: title.to_string(),
            kind,
            content_id: content_id.to_string(),
            can_play: false,
            can_expand: true,
            children: Vec::new(),
        }
    }

    fn playlist(name: &str) -> Self {
        Self {
            can_play: true,
            ..Self::directory(name, BrowseKind::Playlist, name)
        }
    }

    fn step(playlist: &str, step: &str) -> Self {
        Self {
            title: step.to_string(),
            kind: BrowseKind::Step,
            content_id: step_content_id(playlist, step),
            can_play: true,
            can_expand: false,
            children: Vec::new(),
        }
    }
}

/// `playlist|step`
pub fn step_content_id(playlist: &str, step: &str) -> String {
    format!("{}{}{}", playlist, STEP_ID_SEPARATOR, step)
}

/// Split a step content id into playlist and step
pub fn parse_step_content_id(content_id: &str) -> Result<(&str, &str)> {
    content_id
        .split_once(STEP_ID_SEPARATOR)
        .filter(|(playlist, step)| !playlist.is_empty() && !step.is_empty())
        .ok_or_else(|| {
            SdkError::InvalidParameter(format!("'{}' is not a playlist|step id", content_id))
        })
}

/// Builds browse nodes from the metadata cache
#[derive(Debug, Clone)]
pub struct BrowseTree {
    metadata: Arc<MetadataCache>,
    enabled: bool,
}

impl BrowseTree {
    pub fn new(metadata: Arc<MetadataCache>, enabled: bool) -> Self {
        Self { metadata, enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// All playlists as expandable, playable nodes
    pub async fn list_playlists(&self) -> Result<Vec<BrowseNode>> {
        self.ensure_enabled()?;
        let playlists = self.metadata.playlists().await?;
        Ok(playlists.iter().map(|p| BrowseNode::playlist(&p.name)).collect())
    }

    /// Steps of `playlist` as playable leaves
    pub async fn list_steps(&self, playlist: &str) -> Result<Vec<BrowseNode>> {
        self.ensure_enabled()?;
        let steps = self.metadata.steps(playlist).await?;
        Ok(steps
            .iter()
            .map(|s| BrowseNode::step(playlist, &s.name))
            .collect())
    }

    /// Expand the node identified by `kind` and `content_id`
    pub async fn browse(&self, kind: BrowseKind, content_id: &str) -> Result<BrowseNode> {
        self.ensure_enabled()?;
        match kind {
            BrowseKind::Root => {
                let mut root = BrowseNode::directory("xSchedule", BrowseKind::Root, "root");
                root.children.push(BrowseNode::directory(
                    "Playlists",
                    BrowseKind::Playlists,
                    "playlists",
                ));
                Ok(root)
            }
            BrowseKind::Playlists => {
                let mut node =
                    BrowseNode::directory("Playlists", BrowseKind::Playlists, "playlists");
                node.children = self.list_playlists().await?;
                Ok(node)
            }
            BrowseKind::Playlist => {
                let mut node = BrowseNode::playlist(content_id);
                node.children = self.list_steps(content_id).await?;
                Ok(node)
            }
            BrowseKind::Step => {
                let (playlist, step) = parse_step_content_id(content_id)?;
                Ok(BrowseNode::step(playlist, step))
            }
        }
    }

    fn ensure_enabled(&self) -> Result<()> {
        if self.enabled {
            Ok(())
        } else {
            Err(SdkError::BrowseDisabled)
        }
    }
}
