//! Media kind detection used to pick placeholder images.

use std::path::Path;

/// Broad media category of a file, guessed from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Text,
    Folder,
}

const IMAGE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "jpe", "gif", "bmp", "webp", "tif", "tiff", "ico", "tga", "pnm", "ppm",
    "pgm", "pbm", "qoi",
];
const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "m4v", "mkv", "avi", "mov", "webm", "wmv", "flv", "mpg", "mpeg", "3gp", "ogv",
];
const AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "wav", "ogg", "oga", "flac", "m4a", "aac", "wma", "opus", "aiff",
];

impl MediaKind {
    /// Guess the media kind of `path`.
    ///
    /// Existing directories are [`MediaKind::Folder`]; unknown extensions are
    /// treated as [`MediaKind::Text`].
    pub fn guess(path: &Path) -> Self {
        if path.is_dir() {
            return MediaKind::Folder;
        }
        let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
            return MediaKind::Text;
        };
        let ext = ext.to_ascii_lowercase();
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            MediaKind::Image
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            MediaKind::Video
        } else if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
            MediaKind::Audio
        } else {
            MediaKind::Text
        }
    }

    /// Fill colour of the placeholder glyph for this kind.
    pub(crate) fn glyph_color(self) -> [u8; 4] {
        match self {
            MediaKind::Image => [0x4a, 0x90, 0xd9, 0xff],
            MediaKind::Video => [0x9b, 0x59, 0xb6, 0xff],
            MediaKind::Audio => [0xe6, 0x7e, 0x22, 0xff],
            MediaKind::Text => [0x95, 0xa5, 0xa6, 0xff],
            MediaKind::Folder => [0xf1, 0xc4, 0x0f, 0xff],
        }
    }
}
