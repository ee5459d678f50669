#![allow(dead_code)]

use image::{imageops, GrayImage, Luma};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const MANIFEST: &str = r#"
templates:
  - name: home_logo
    image: templates/home.png
    threshold: 0.9
  - name: shop_banner
    image: templates/shop.png
    threshold: 0.9
    tags: [shop]

nodes:
  - name: home
    templates: [home_logo]
  - name: shop
    templates: [shop_banner]
  - name: settings
    templates: [home_logo, shop_banner]
    match_mode: all

edges:
  - from: home
    to: shop
    action: { type: click, x: 20, y: 30 }
    delay_ms: 10
  - from: shop
    to: home
    action: { type: key_press, key: back }
    weight: 2.0

tasks:
  - name: open-shop
    target: shop
    max_retries: 2
  - name: open-settings
    target: settings
    max_retries: 1
  - name: tidy
    steps:
      - action: { type: key_press, key: back }
        repeat: 1
"#;

/// Manifest, template images and replay frames in a temporary directory
pub struct Fixture {
    pub dir: TempDir,
    pub manifest: PathBuf,
    pub frames: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_manifest(MANIFEST)
    }

    pub fn with_manifest(content: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let templates = dir.path().join("templates");
        let frames = dir.path().join("frames");
        fs::create_dir_all(&templates).unwrap();
        fs::create_dir_all(&frames).unwrap();

        let mut home = texture(48, 48, 0x5EED_0001);
        let mut shop = texture(48, 48, 0x5EED_0002);
        mark(&mut home, 12, 14);
        mark(&mut shop, 24, 10);
        patch(&home, 8, 10).save(templates.join("home.png")).unwrap();
        patch(&shop, 20, 6).save(templates.join("shop.png")).unwrap();
        home.save(frames.join("000_home.png")).unwrap();
        shop.save(frames.join("001_shop.png")).unwrap();

        let manifest = dir.path().join("manifest.yaml");
        fs::write(&manifest, content).unwrap();

        Self {
            dir,
            manifest,
            frames,
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write another manifest next to the fixture images
    pub fn write_manifest(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }
}

/// Sparse dot texture on black.
///
/// Plain cross-correlation rewards overall brightness, so dense noise would
/// match anywhere; sparse dots from distinct seeds barely overlap.
pub fn texture(width: u32, height: u32, seed: u64) -> GrayImage {
    let mut state = seed;
    GrayImage::from_fn(width, height, |_, _| {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        Luma([if (state >> 24) % 5 == 0 { 255 } else { 0 }])
    })
}

/// 3x3 white block so every template patch has content
fn mark(image: &mut GrayImage, x: u32, y: u32) {
    for dx in 0..3 {
        for dy in 0..3 {
            image.put_pixel(x + dx, y + dy, Luma([255]));
        }
    }
}

fn patch(image: &GrayImage, x: u32, y: u32) -> GrayImage {
    imageops::crop_imm(image, x, y, 12, 12).to_image()
}
