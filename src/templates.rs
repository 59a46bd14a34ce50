use image::RgbaImage;
use std::fs;
use std::path::Path;

use crate::error::TemplateError;

/// Reference-icon library.
///
/// Icons are grouped into three fixed categories, one asset subdirectory
/// each. Loading never fails outright: a missing directory is created and
/// supplies zero templates, an undecodable file is skipped. An empty
/// category is a valid continuing state in which that category simply never
/// matches.

const ASSETS_DIR: &str = "assets";
const RECOGNIZED_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// Detection category, tagged onto every template group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Local,
    Overview,
    Monster,
}

impl Category {
    /// Asset subdirectory holding this category's icons.
    pub fn dir_name(self) -> &'static str {
        match self {
            Category::Local => "hostile_icons_local",
            Category::Overview => "hostile_icons_overview",
            Category::Monster => "monster_icons",
        }
    }

    /// Logical region name, used for debug artifacts and log lines.
    pub fn label(self) -> &'static str {
        match self {
            Category::Local => "local",
            Category::Overview => "overview",
            Category::Monster => "monster",
        }
    }
}

/// A reference icon, normalized to RGBA on load. Images without native
/// transparency get a fully opaque alpha channel so the matching code sees
/// one uniform representation.
#[derive(Debug, Clone)]
pub struct Template {
    pub name: String,
    pub image: RgbaImage,
}

impl Template {
    pub fn new(name: impl Into<String>, image: RgbaImage) -> Self {
        Self {
            name: name.into(),
            image,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// All loaded templates, grouped by category. Immutable after load.
pub struct TemplateLibrary {
    pub local: Vec<Template>,
    pub overview: Vec<Template>,
    pub monster: Vec<Template>,
}

impl TemplateLibrary {
    /// Load every recognized icon under `<base_dir>/assets`.
    pub fn load(base_dir: &Path) -> Self {
        let assets = base_dir.join(ASSETS_DIR);

        let library = Self {
            local: load_category(&assets.join(Category::Local.dir_name())),
            overview: load_category(&assets.join(Category::Overview.dir_name())),
            monster: load_category(&assets.join(Category::Monster.dir_name())),
        };

        tracing::info!("{}", library.summary());
        library
    }

    pub fn category(&self, category: Category) -> &[Template] {
        match category {
            Category::Local => &self.local,
            Category::Overview => &self.overview,
            Category::Monster => &self.monster,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.local.is_empty() && self.overview.is_empty() && self.monster.is_empty()
    }

    /// Per-category counts for diagnostic display.
    pub fn summary(&self) -> String {
        format!(
            "Templates loaded: local {} | overview {} | monster {}",
            self.local.len(),
            self.overview.len(),
            self.monster.len()
        )
    }
}

fn load_category(dir: &Path) -> Vec<Template> {
    if !dir.exists() {
        // Seed the directory so the user has somewhere to drop icons.
        if let Err(e) = fs::create_dir_all(dir) {
            tracing::warn!("could not create template dir {}: {}", dir.display(), e);
        }
        return Vec::new();
    }

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            let err = TemplateError::DirectoryUnreadable {
                path: dir.display().to_string(),
                source: e,
            };
            tracing::warn!("{}", err);
            return Vec::new();
        }
    };

    let mut templates = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if !has_recognized_extension(&path) {
            continue;
        }

        match decode_template(&path) {
            Ok(template) => templates.push(template),
            Err(e) => tracing::debug!("skipping template: {}", e),
        }
    }

    // Deterministic ordering regardless of directory enumeration order.
    templates.sort_by(|a, b| a.name.cmp(&b.name));
    templates
}

fn decode_template(path: &Path) -> Result<Template, TemplateError> {
    let img = image::open(path).map_err(|e| TemplateError::DecodeFailed {
        path: path.display().to_string(),
        source: Box::new(e),
    })?;

    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(Template::new(name, img.to_rgba8()))
}

fn has_recognized_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_ascii_lowercase();
            RECOGNIZED_EXTENSIONS.contains(&e.as_str())
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use std::path::PathBuf;

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "icon-sentry-templates-{}-{}",
            tag,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    fn write_icon(path: &Path, color: Rgba<u8>) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        RgbaImage::from_pixel(8, 8, color).save(path).unwrap();
    }

    #[test]
    fn test_missing_directories_are_created_and_empty() {
        let base = scratch_dir("missing");
        let library = TemplateLibrary::load(&base);

        assert!(library.is_empty());
        for category in [Category::Local, Category::Overview, Category::Monster] {
            assert!(base.join(ASSETS_DIR).join(category.dir_name()).is_dir());
        }
    }

    #[test]
    fn test_loads_icons_per_category() {
        let base = scratch_dir("load");
        let overview_dir = base.join(ASSETS_DIR).join(Category::Overview.dir_name());
        write_icon(&overview_dir.join("red.png"), Rgba([200, 40, 40, 255]));
        write_icon(&overview_dir.join("white.png"), Rgba([230, 230, 230, 255]));

        let library = TemplateLibrary::load(&base);

        assert_eq!(library.overview.len(), 2);
        assert!(library.local.is_empty());
        assert!(library.monster.is_empty());
        assert_eq!(library.category(Category::Overview).len(), 2);
        // Sorted by name for deterministic scoring order.
        assert_eq!(library.overview[0].name, "red");
        assert_eq!(library.overview[1].name, "white");
    }

    #[test]
    fn test_corrupt_file_is_skipped() {
        let base = scratch_dir("corrupt");
        let monster_dir = base.join(ASSETS_DIR).join(Category::Monster.dir_name());
        write_icon(&monster_dir.join("ok.png"), Rgba([10, 200, 10, 255]));
        fs::write(monster_dir.join("broken.png"), b"not an image").unwrap();
        fs::write(monster_dir.join("notes.txt"), b"ignored extension").unwrap();

        let library = TemplateLibrary::load(&base);
        assert_eq!(library.monster.len(), 1);
        assert_eq!(library.monster[0].name, "ok");
    }

    #[test]
    fn test_opaque_alpha_synthesized() {
        let base = scratch_dir("alpha");
        let local_dir = base.join(ASSETS_DIR).join(Category::Local.dir_name());
        fs::create_dir_all(&local_dir).unwrap();
        // Save an RGB image with no alpha channel.
        image::RgbImage::from_pixel(4, 4, image::Rgb([1, 2, 3]))
            .save(local_dir.join("rgb.png"))
            .unwrap();

        let library = TemplateLibrary::load(&base);
        assert_eq!(library.local.len(), 1);
        assert!(library.local[0].image.pixels().all(|p| p[3] == 255));
    }

    #[test]
    fn test_summary_counts() {
        let base = scratch_dir("summary");
        let local_dir = base.join(ASSETS_DIR).join(Category::Local.dir_name());
        write_icon(&local_dir.join("a.png"), Rgba([255, 0, 0, 255]));

        let library = TemplateLibrary::load(&base);
        assert_eq!(
            library.summary(),
            "Templates loaded: local 1 | overview 0 | monster 0"
        );
    }
}
