//! Relative destination path for a source item

use crate::constants::{STATE_ARCHIVE, STATE_FAVORITE, STATE_TRASH};
use crate::error::PathError;
use crate::models::{FoldersMap, SourceItem};
use crate::utils::string_utils::join_segments;

/// State segment for an item, by priority trash > archive > favorite
pub fn state_segment(item: &SourceItem) -> Option<&'static str> {
    if item.is_trashed() {
        Some(STATE_TRASH)
    } else if item.is_archived() {
        Some(STATE_ARCHIVE)
    } else if item.is_favorite() {
        Some(STATE_FAVORITE)
    } else {
        None
    }
}

/// Derive `[state/]category[/folder]/title` for an item
///
/// The first folder is resolved through the folders map and left out when
/// it is unknown. The result carries no prefix; adapters add their own.
pub fn derive_path(item: &SourceItem, folders: &FoldersMap) -> Result<String, PathError> {
    let category = item.category_segment();
    if category.is_empty() {
        return Err(PathError::EmptyCategory {
            title: item.title.clone(),
        });
    }

    let title = item.title_segment();
    if title.is_empty() {
        return Err(PathError::EmptyTitle {
            category: item.category.clone(),
        });
    }

    let folder = folders.first(&item.folders).unwrap_or_default();
    let state = state_segment(item).unwrap_or_default();

    Ok(join_segments(&[state, category.as_str(), folder.as_str(), title.as_str()]))
}
