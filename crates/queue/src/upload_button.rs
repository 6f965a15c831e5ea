//! Buttons describing an installation in choice prompts.

use hearth_protocol::{Cave, Upload};
use hearth_tasks::{ButtonTag, LocalizedMessage, ModalButton};

/// Button for one cave: labelled from its upload, or its folder when the
/// upload is unknown.
pub fn cave_button(cave: &Cave) -> ModalButton {
    match &cave.upload {
        Some(upload) => upload_button(upload),
        None => {
            let mut button = ModalButton::new(LocalizedMessage::literal(cave.install_folder.clone()));
            button.icon = Some("folder".into());
            button
        }
    }
}

/// Button for an upload: display name or filename, with platform and size
/// tags.
pub fn upload_button(upload: &Upload) -> ModalButton {
    let label = upload
        .display_name
        .as_deref()
        .filter(|name| !name.is_empty())
        .unwrap_or(&upload.filename);

    let mut button = ModalButton::new(LocalizedMessage::literal(label));
    button.icon = Some("download".into());

    if let Some(platforms) = &upload.platforms {
        let flags = [
            (platforms.windows.is_some(), "Windows", "windows8"),
            (platforms.linux.is_some(), "Linux", "tux"),
            (platforms.osx.is_some(), "macOS", "apple"),
        ];
        for (_, name, icon) in flags.into_iter().filter(|(on, _, _)| *on) {
            button.tags.push(ButtonTag {
                label: LocalizedMessage::literal(name),
                icon: Some(icon.into()),
            });
        }
    }

    if let Some(size) = upload.size.filter(|s| *s > 0) {
        button.tags.push(ButtonTag {
            label: LocalizedMessage::literal(format_size(size)),
            icon: None,
        });
    }

    button
}

/// `1536` -> `1.5 KiB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

#[cfg(test)]
mod tests {
    use hearth_protocol::{Game, PathScheme, Platforms};

    use super::*;

    fn upload() -> Upload {
        Upload {
            id: 9,
            filename: "overland-linux.zip".into(),
            display_name: None,
            size: Some(3 * 1024 * 1024 / 2),
            upload_type: Some("default".into()),
            platforms: Some(Platforms {
                windows: None,
                linux: Some("all".into()),
                osx: Some("all".into()),
            }),
        }
    }

    fn labels(button: &ModalButton) -> Vec<String> {
        button.tags.iter().map(|t| t.label.to_string()).collect()
    }

    #[test]
    fn filename_label_with_platform_and_size_tags() {
        let button = upload_button(&upload());
        assert_eq!(button.label, LocalizedMessage::literal("overland-linux.zip"));
        assert_eq!(labels(&button), vec!["Linux", "macOS", "1.5 MiB"]);
        assert!(button.action.is_none());
    }

    #[test]
    fn display_name_wins() {
        let mut up = upload();
        up.display_name = Some("Overland (Linux)".into());
        assert_eq!(
            upload_button(&up).label,
            LocalizedMessage::literal("Overland (Linux)")
        );
        up.display_name = Some(String::new());
        assert_eq!(
            upload_button(&up).label,
            LocalizedMessage::literal("overland-linux.zip")
        );
    }

    #[test]
    fn cave_without_upload_uses_folder() {
        let cave = Cave {
            id: "c".into(),
            game: Game::new(1, "Overland"),
            upload: None,
            install_location: "appdata".into(),
            install_folder: "overland-2".into(),
            path_scheme: PathScheme::ModernShared,
        };
        let button = cave_button(&cave);
        assert_eq!(button.label, LocalizedMessage::literal("overland-2"));
        assert!(button.tags.is_empty());
    }

    #[test]
    fn sizes() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1536), "1.5 KiB");
        assert_eq!(format_size(5 * 1024 * 1024 * 1024), "5.0 GiB");
    }
}
