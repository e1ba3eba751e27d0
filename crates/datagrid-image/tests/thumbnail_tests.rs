//! Tests for the image cache with the default renderer and real files.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use datagrid_image::{ImageCacheConfig, ImageCacheManager, ImageKey, MediaKind};
use image::{Rgba, RgbaImage};

fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    RgbaImage::from_pixel(width, height, Rgba([10, 120, 200, 255]))
        .save(&path)
        .unwrap();
    path
}

fn wait_for(cache: &ImageCacheManager, key: &ImageKey) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !cache.contains(key) {
        assert!(Instant::now() < deadline, "image was never loaded");
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn test_sync_render_is_cached() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_png(dir.path(), "photo.png", 64, 32);
    let cache = ImageCacheManager::new(ImageCacheConfig::default()).unwrap();

    let key = ImageKey::new(&path, 24);
    let first = cache.get_image(&key, false);
    assert_eq!((first.width(), first.height()), (24, 24));

    let second = cache.get_image(&key, false);
    assert!(second.ptr_eq(&first));
    let stats = cache.stats();
    assert_eq!((stats.hits, stats.misses), (1, 1));
}

#[test]
fn test_background_render_replaces_placeholder() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_png(dir.path(), "photo.png", 40, 40);
    let cache = ImageCacheManager::new(ImageCacheConfig::default()).unwrap();
    let key = ImageKey::new(&path, 16).with_fill(false);

    let placeholder = cache.get_image(&key, true);
    wait_for(&cache, &key);
    let loaded = cache.get_image(&key, true);
    assert!(!loaded.ptr_eq(&placeholder));
    assert_eq!(loaded.width(), 16);

    let deadline = Instant::now() + Duration::from_secs(10);
    while cache.process_loaded() == 0 {
        assert!(Instant::now() < deadline, "completion was never published");
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn test_unreadable_files_get_placeholders() {
    let dir = tempfile::tempdir().unwrap();
    let broken = dir.path().join("broken.png");
    std::fs::write(&broken, b"not a png").unwrap();
    let movie = dir.path().join("clip.mp4");
    std::fs::write(&movie, b"").unwrap();
    let cache = ImageCacheManager::new(ImageCacheConfig::default()).unwrap();

    let thumb = cache.get_image(&ImageKey::new(&broken, 24), false);
    assert_eq!(thumb.width(), 24);
    assert!(cache.contains(&ImageKey::new(&broken, 24)));

    let key = ImageKey::new(&movie, 24);
    assert_eq!(key.media_kind(), MediaKind::guess(&movie));
    assert_eq!(cache.get_image(&key, false).width(), 24);
}

#[test]
fn test_bordered_thumbnail_is_larger() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_png(dir.path(), "photo.png", 64, 64);
    let config = ImageCacheConfig::default().with_border_size(2).with_shadow(0, 0);
    let cache = ImageCacheManager::new(config).unwrap();

    let thumb = cache.get_image(&ImageKey::new(&path, 24).with_border(true), false);
    assert_eq!(thumb.width(), 28);
}
