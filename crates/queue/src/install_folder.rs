//! Install folder naming and collision avoidance.

use hearth_protocol::{Cave, Game};
use tracing::debug;

use crate::error::QueueError;
use crate::store::CaveStore;
use crate::types::Preferences;

/// Candidates tried per install: `name`, then `name-2` up to `name-64`.
pub const MAX_FOLDER_CANDIDATES: u32 = 64;

/// Folder name for a game: its title slugged, or `game-<id>`.
pub fn install_folder_name(game: &Game) -> String {
    let mut slug = String::with_capacity(game.title.len());
    let mut pending_dash = false;
    for c in game.title.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    if slug.is_empty() {
        format!("game-{}", game.id)
    } else {
        slug
    }
}

/// Picks a free folder for `cave` and records the cave in `store`.
///
/// A candidate is skipped when its directory exists on disk or the store
/// refuses it. The store reservation is atomic, so concurrent installs never
/// end up with the same folder. On failure the cave keeps its base folder
/// and nothing is recorded.
pub async fn reserve_install_folder(
    store: &dyn CaveStore,
    prefs: &Preferences,
    cave: &mut Cave,
) -> Result<(), QueueError> {
    let root = prefs.install_location_path(&cave.install_location)?;
    let base = cave.install_folder.clone();

    for attempt in 1..=MAX_FOLDER_CANDIDATES {
        let candidate = if attempt == 1 {
            base.clone()
        } else {
            format!("{base}-{attempt}")
        };

        if tokio::fs::try_exists(root.join(&candidate)).await? {
            continue;
        }
        cave.install_folder = candidate;
        if store.reserve(cave.clone()) {
            if cave.install_folder != base {
                debug!(%base, candidate = %cave.install_folder, "install folder taken, using suffix");
            }
            return Ok(());
        }
    }

    cave.install_folder = base.clone();
    Err(QueueError::FolderCollision {
        folder: base,
        attempts: MAX_FOLDER_CANDIDATES,
    })
}

#[cfg(test)]
mod tests {
    use hearth_protocol::PathScheme;

    use super::*;
    use crate::store::MemoryCaveStore;

    fn cave(id: &str, folder: &str) -> Cave {
        Cave {
            id: id.into(),
            game: Game::new(1, "Overland"),
            upload: None,
            install_location: "appdata".into(),
            install_folder: folder.into(),
            path_scheme: PathScheme::ModernShared,
        }
    }

    fn new_cave(folder: &str) -> Cave {
        cave("new", folder)
    }

    fn stored(folder: &str) -> Cave {
        cave(&format!("cave-{folder}"), folder)
    }

    #[test]
    fn folder_names() {
        assert_eq!(install_folder_name(&Game::new(1, "Overland")), "overland");
        assert_eq!(
            install_folder_name(&Game::new(1, "  Night in the Woods: Weird Autumn! ")),
            "night-in-the-woods-weird-autumn"
        );
        assert_eq!(install_folder_name(&Game::new(1, "Bläck & Whïte")), "bl-ck-wh-te");
        assert_eq!(install_folder_name(&Game::new(77, "???")), "game-77");
        assert_eq!(install_folder_name(&Game::new(78, "")), "game-78");
    }

    #[tokio::test]
    async fn free_name_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let prefs = Preferences::with_apps_dir(dir.path(), dir.path());
        let mut loc = new_cave("overland");

        reserve_install_folder(&MemoryCaveStore::new(), &prefs, &mut loc)
            .await
            .unwrap();
        assert_eq!(loc.install_folder, "overland");
    }

    #[tokio::test]
    async fn reserved_cave_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let prefs = Preferences::with_apps_dir(dir.path(), dir.path());
        let store = MemoryCaveStore::new();
        let mut loc = new_cave("overland");

        reserve_install_folder(&store, &prefs, &mut loc).await.unwrap();
        assert_eq!(store.caves(), vec![loc]);
    }

    #[tokio::test]
    async fn concurrent_reservations_get_distinct_folders() {
        let dir = tempfile::tempdir().unwrap();
        let prefs = Preferences::with_apps_dir(dir.path(), dir.path());
        let store = MemoryCaveStore::new();
        let mut first = cave("first", "overland");
        let mut second = cave("second", "overland");

        let (a, b) = tokio::join!(
            reserve_install_folder(&store, &prefs, &mut first),
            reserve_install_folder(&store, &prefs, &mut second),
        );
        a.unwrap();
        b.unwrap();

        let mut folders = vec![first.install_folder, second.install_folder];
        folders.sort();
        assert_eq!(folders, vec!["overland", "overland-2"]);
        assert_eq!(store.caves().len(), 2);
    }

    #[tokio::test]
    async fn store_and_disk_collisions_get_suffixes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("overland-2")).unwrap();
        let prefs = Preferences::with_apps_dir(dir.path(), dir.path());
        let store = MemoryCaveStore::with_caves(vec![stored("overland")]);
        let mut loc = new_cave("overland");

        reserve_install_folder(&store, &prefs, &mut loc)
            .await
            .unwrap();
        assert_eq!(loc.install_folder, "overland-3");
    }

    #[tokio::test]
    async fn folders_from_earlier_runs_are_skipped_with_an_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("overland")).unwrap();
        let prefs = Preferences::with_apps_dir(dir.path(), dir.path());
        let store = MemoryCaveStore::new();
        let mut loc = new_cave("overland");

        reserve_install_folder(&store, &prefs, &mut loc).await.unwrap();
        assert_eq!(loc.install_folder, "overland-2");
        assert_eq!(store.caves(), vec![loc]);
    }

    #[tokio::test]
    async fn other_locations_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let prefs = Preferences::with_apps_dir(dir.path(), dir.path());
        let mut elsewhere = stored("overland");
        elsewhere.install_location = "usb".into();
        let store = MemoryCaveStore::with_caves(vec![elsewhere]);
        let mut loc = new_cave("overland");

        reserve_install_folder(&store, &prefs, &mut loc)
            .await
            .unwrap();
        assert_eq!(loc.install_folder, "overland");
    }

    #[tokio::test]
    async fn exhausting_candidates_fails_loudly() {
        let dir = tempfile::tempdir().unwrap();
        let prefs = Preferences::with_apps_dir(dir.path(), dir.path());
        let mut caves = vec![stored("overland")];
        caves.extend((2..=MAX_FOLDER_CANDIDATES).map(|n| stored(&format!("overland-{n}"))));
        let store = MemoryCaveStore::with_caves(caves);
        let mut loc = new_cave("overland");

        let err = reserve_install_folder(&store, &prefs, &mut loc)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            QueueError::FolderCollision { ref folder, attempts: 64 } if folder == "overland"
        ));
        assert_eq!(loc.install_folder, "overland");
        assert!(store.caves().iter().all(|c| c.id != "new"));
    }

    #[tokio::test]
    async fn unknown_location_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let prefs = Preferences::with_apps_dir(dir.path(), dir.path());
        let mut loc = new_cave("overland");
        loc.install_location = "usb".into();

        let err = reserve_install_folder(&MemoryCaveStore::new(), &prefs, &mut loc)
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::UnknownInstallLocation(_)));
    }
}
