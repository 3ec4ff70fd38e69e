//! Asset catalog and walkthrough step assembly.

use anyhow::anyhow;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use image::{ImageFormat, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{Result, WalkthroughError};
use crate::models::{Arm, Locus, MutationCategory, StepAsset, WalkthroughStep};

/// Half-width of the band diagram window around the gene start
pub const BAND_WINDOW_FLANK: u64 = 100_000;

const HIGHLIGHT_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);
const HIGHLIGHT_THICKNESS: u32 = 6;

/// Identity of a visual asset; captions share the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum AssetKey {
    ChromosomeOverview,
    ArmDiagram,
    ArmZoom(Arm),
    DnaStrand(Arm),
    BandDiagram,
    MutationExample(MutationCategory),
}

impl AssetKey {
    pub fn all() -> Vec<AssetKey> {
        let mut keys = vec![AssetKey::ChromosomeOverview, AssetKey::ArmDiagram];
        for arm in [Arm::P, Arm::Q] {
            keys.push(AssetKey::ArmZoom(arm));
            keys.push(AssetKey::DnaStrand(arm));
        }
        keys.push(AssetKey::BandDiagram);
        keys.extend(MutationCategory::ALL.into_iter().map(AssetKey::MutationExample));
        keys
    }

    pub fn name(&self) -> String {
        match self {
            AssetKey::ChromosomeOverview => "chromosome_overview".to_string(),
            AssetKey::ArmDiagram => "arm_diagram".to_string(),
            AssetKey::ArmZoom(arm) => format!("arm_zoom_{}", arm),
            AssetKey::DnaStrand(arm) => format!("dna_strand_{}", arm),
            AssetKey::BandDiagram => "band_diagram".to_string(),
            AssetKey::MutationExample(category) => format!("mutation_{}", category.slug()),
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let arm = |s: &str| match s {
            "p" => Some(Arm::P),
            "q" => Some(Arm::Q),
            _ => None,
        };
        match name {
            "chromosome_overview" => Some(AssetKey::ChromosomeOverview),
            "arm_diagram" => Some(AssetKey::ArmDiagram),
            "band_diagram" => Some(AssetKey::BandDiagram),
            _ => {
                if let Some(rest) = name.strip_prefix("arm_zoom_") {
                    arm(rest).map(AssetKey::ArmZoom)
                } else if let Some(rest) = name.strip_prefix("dna_strand_") {
                    arm(rest).map(AssetKey::DnaStrand)
                } else if let Some(rest) = name.strip_prefix("mutation_") {
                    MutationCategory::from_slug(rest).map(AssetKey::MutationExample)
                } else {
                    None
                }
            }
        }
    }
}

impl fmt::Display for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl From<AssetKey> for String {
    fn from(key: AssetKey) -> Self {
        key.name()
    }
}

impl TryFrom<String> for AssetKey {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        AssetKey::from_name(&value).ok_or_else(|| format!("unknown asset key '{}'", value))
    }
}

/// File (relative to the catalog root) and caption for one asset.
///
/// The band diagram is drawn by the viewer and has no file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetEntry {
    #[serde(default)]
    pub file: Option<PathBuf>,
    pub caption: String,
}

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    key: String,
    #[serde(default)]
    file: Option<PathBuf>,
    caption: String,
}

#[derive(Debug, Deserialize)]
struct Manifest {
    assets: Vec<ManifestEntry>,
}

/// Read-only catalog of walkthrough assets, shared by all sessions.
#[derive(Debug, Clone)]
pub struct AssetCatalog {
    root: PathBuf,
    entries: HashMap<AssetKey, AssetEntry>,
}

impl AssetCatalog {
    pub fn new(root: impl Into<PathBuf>, entries: HashMap<AssetKey, AssetEntry>) -> Self {
        Self {
            root: root.into(),
            entries,
        }
    }

    /// Catalog with the stock file names and captions.
    pub fn builtin(root: impl Into<PathBuf>) -> Self {
        let image = |file: &str, caption: &str| AssetEntry {
            file: Some(PathBuf::from(file)),
            caption: caption.to_string(),
        };

        let mut entries = HashMap::new();
        entries.insert(
            AssetKey::ChromosomeOverview,
            image(
                "chromosomes.png",
                "These are all 23 chromosomes; your variant is located on the highlighted chromosome. Click the image to learn more!",
            ),
        );
        entries.insert(
            AssetKey::ArmDiagram,
            image(
                "arms-labeled.png",
                "This diagram explains the p arm (short) and q arm (long).",
            ),
        );
        for arm in [Arm::P, Arm::Q] {
            entries.insert(
                AssetKey::ArmZoom(arm),
                image(
                    &format!("arm-{}.png", arm),
                    "This is the arm of the chromosome we will be focusing on.",
                ),
            );
            entries.insert(
                AssetKey::DnaStrand(arm),
                image(
                    &format!("dna-{}.png", arm),
                    "Chromosomes are long strands of DNA tightly packed into structures.",
                ),
            );
        }
        entries.insert(
            AssetKey::BandDiagram,
            AssetEntry {
                file: None,
                caption: "These are the chromosome bands around your gene; the highlighted region marks where it sits.".to_string(),
            },
        );
        for category in MutationCategory::ALL {
            entries.insert(
                AssetKey::MutationExample(category),
                image(
                    &format!("mutation-{}.png", category.slug().replace('_', "-")),
                    &format!("Example of this mutation type: {}.", category),
                ),
            );
        }

        Self::new(root, entries)
    }

    /// Parse a YAML manifest of the form
    ///
    /// ```yaml
    /// assets:
    ///   - key: chromosome_overview
    ///     file: chromosomes.png
    ///     caption: "These are all 23 chromosomes..."
    /// ```
    pub fn from_manifest_str(root: impl Into<PathBuf>, yaml: &str) -> Result<Self> {
        let manifest: Manifest = serde_yaml::from_str(yaml)
            .map_err(|e| WalkthroughError::asset(format!("invalid asset manifest: {}", e)))?;

        let mut entries = HashMap::new();
        for entry in manifest.assets {
            let key = AssetKey::from_name(&entry.key).ok_or_else(|| {
                WalkthroughError::asset(format!("unknown asset key '{}' in manifest", entry.key))
            })?;
            entries.insert(
                key,
                AssetEntry {
                    file: entry.file,
                    caption: entry.caption,
                },
            );
        }

        Ok(Self::new(root, entries))
    }

    pub fn from_manifest(root: impl Into<PathBuf>, manifest_path: &Path) -> Result<Self> {
        let yaml = std::fs::read_to_string(manifest_path).map_err(|e| {
            WalkthroughError::asset(format!(
                "cannot read asset manifest {}: {}",
                manifest_path.display(),
                e
            ))
        })?;
        let catalog = Self::from_manifest_str(root, &yaml)?;
        info!(
            manifest = %manifest_path.display(),
            entries = catalog.entries.len(),
            "Loaded asset manifest"
        );
        Ok(catalog)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Keys with no catalog entry
    pub fn missing_keys(&self) -> Vec<AssetKey> {
        AssetKey::all()
            .into_iter()
            .filter(|key| !self.entries.contains_key(key))
            .collect()
    }

    pub fn entry(&self, key: AssetKey) -> Result<&AssetEntry> {
        self.entries
            .get(&key)
            .ok_or_else(|| WalkthroughError::asset(format!("no catalog entry for '{}'", key)))
    }

    pub fn caption(&self, key: AssetKey) -> Result<&str> {
        self.entry(key).map(|entry| entry.caption.as_str())
    }

    pub fn path(&self, key: AssetKey) -> Result<PathBuf> {
        let entry = self.entry(key)?;
        entry
            .file
            .as_ref()
            .map(|file| self.root.join(file))
            .ok_or_else(|| WalkthroughError::asset(format!("asset '{}' has no file", key)))
    }

    pub async fn read(&self, key: AssetKey) -> Result<Vec<u8>> {
        let path = self.path(key)?;
        tokio::fs::read(&path).await.map_err(|e| {
            WalkthroughError::asset(format!("cannot read {} for '{}': {}", path.display(), key, e))
        })
    }
}

/// Pixel box of one chromosome on the overview image (right/bottom exclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HighlightBox {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl HighlightBox {
    pub fn overlaps(&self, other: &HighlightBox) -> bool {
        self.left < other.right
            && other.left < self.right
            && self.top < other.bottom
            && other.top < self.bottom
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.left && x < self.right && y >= self.top && y < self.bottom
    }
}

/// Layout of the chromosome overview image: 23 chromosomes, 8 per row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLayout {
    pub chrom_width: u32,
    pub chrom_height: u32,
    pub left_margin: u32,
    pub top_margin: u32,
    pub h_spacing: u32,
    pub v_spacing: u32,
    pub columns: u32,
    pub chromosomes: u32,
}

impl GridLayout {
    pub const OVERVIEW: GridLayout = GridLayout {
        chrom_width: 45,
        chrom_height: 105,
        left_margin: 44,
        top_margin: 43,
        h_spacing: 30,
        v_spacing: 45,
        columns: 8,
        chromosomes: 23,
    };

    /// Box for chromosome `number` (1-indexed); `None` outside the grid.
    pub fn highlight_box(&self, number: u32) -> Option<HighlightBox> {
        if number == 0 || number > self.chromosomes || self.columns == 0 {
            return None;
        }
        let row = (number - 1) / self.columns;
        let column = (number - 1) % self.columns;
        let left = self.left_margin + column * (self.chrom_width + self.h_spacing);
        let top = self.top_margin + row * (self.chrom_height + self.v_spacing);
        Some(HighlightBox {
            left,
            top,
            right: left + self.chrom_width,
            bottom: top + self.chrom_height,
        })
    }
}

impl Default for GridLayout {
    fn default() -> Self {
        Self::OVERVIEW
    }
}

/// Overview slot for an Ensembl chromosome name: `1`..`22` keep their number
/// and `X` takes slot 23. Other sequences (Y, MT, scaffolds) have no slot.
pub fn chromosome_number(chromosome_id: &str) -> Option<u32> {
    let id = chromosome_id.trim();
    let id = id
        .strip_prefix("chr")
        .or_else(|| id.strip_prefix("CHR"))
        .unwrap_or(id);

    if id.eq_ignore_ascii_case("x") {
        return Some(23);
    }
    match id.parse::<u32>() {
        Ok(n) if (1..=22).contains(&n) => Some(n),
        _ => None,
    }
}

/// Draw a rectangle outline inside `area`, clipped to the image.
pub fn draw_highlight(image: &mut RgbaImage, area: HighlightBox, thickness: u32, color: Rgba<u8>) {
    let right = area.right.min(image.width());
    let bottom = area.bottom.min(image.height());
    for y in area.top..bottom {
        for x in area.left..right {
            let on_edge = x < area.left + thickness
                || x + thickness >= area.right
                || y < area.top + thickness
                || y + thickness >= area.bottom;
            if on_edge {
                image.put_pixel(x, y, color);
            }
        }
    }
}

/// Decode the overview image, outline the chromosome and re-encode as PNG.
pub fn highlight_overview(bytes: &[u8], area: Option<HighlightBox>) -> anyhow::Result<Vec<u8>> {
    let mut image = image::load_from_memory(bytes)
        .map_err(|e| anyhow!("cannot decode overview image: {}", e))?
        .to_rgba8();

    if let Some(area) = area {
        draw_highlight(&mut image, area, HIGHLIGHT_THICKNESS, HIGHLIGHT_COLOR);
    }

    let mut buffer = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .map_err(|e| anyhow!("cannot encode overview image: {}", e))?;
    Ok(buffer)
}

/// Window shown by the band diagram
pub fn band_window(coordinate: Option<u64>) -> (u64, u64) {
    match coordinate {
        Some(c) => (
            c.saturating_sub(BAND_WINDOW_FLANK).max(1),
            c.saturating_add(BAND_WINDOW_FLANK),
        ),
        None => (1, 2 * BAND_WINDOW_FLANK),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepOptions {
    pub band_diagram: bool,
    pub layout: GridLayout,
}

impl Default for StepOptions {
    fn default() -> Self {
        Self {
            band_diagram: true,
            layout: GridLayout::OVERVIEW,
        }
    }
}

/// Asset keys in presentation order
pub fn step_keys(locus: &Locus, category: MutationCategory, options: &StepOptions) -> Vec<AssetKey> {
    let mut keys = vec![
        AssetKey::ChromosomeOverview,
        AssetKey::ArmDiagram,
        AssetKey::ArmZoom(locus.arm),
        AssetKey::DnaStrand(locus.arm),
    ];
    if options.band_diagram {
        keys.push(AssetKey::BandDiagram);
    }
    keys.push(AssetKey::MutationExample(category));
    keys
}

/// Build the full, ordered step list for a locus and mutation category.
///
/// Either every step is produced or an [`WalkthroughError::AssetError`] is
/// returned; a partially built list is never handed out.
pub async fn build_steps(
    locus: &Locus,
    category: MutationCategory,
    catalog: &AssetCatalog,
    options: &StepOptions,
) -> Result<Vec<WalkthroughStep>> {
    let mut steps = Vec::new();

    for key in step_keys(locus, category, options) {
        let caption = catalog.caption(key)?.to_string();
        let asset = match key {
            AssetKey::ChromosomeOverview => {
                let bytes = catalog.read(key).await?;
                let area = chromosome_number(&locus.chromosome_id)
                    .and_then(|n| options.layout.highlight_box(n));
                if area.is_none() {
                    warn!(
                        chromosome = %locus.chromosome_id,
                        "Chromosome has no overview slot, rendering without highlight"
                    );
                }
                let png = tokio::task::spawn_blocking(move || highlight_overview(&bytes, area))
                    .await
                    .map_err(|e| WalkthroughError::asset(format!("highlight task failed: {}", e)))?
                    .map_err(|e| WalkthroughError::asset(e.to_string()))?;
                StepAsset::Image {
                    png_base64: STANDARD.encode(png),
                }
            }
            AssetKey::BandDiagram => {
                let (start, end) = band_window(locus.coordinate);
                StepAsset::BandDiagram {
                    chromosome: locus.chromosome_id.clone(),
                    start,
                    end,
                }
            }
            _ => {
                let bytes = catalog.read(key).await?;
                StepAsset::Image {
                    png_base64: STANDARD.encode(bytes),
                }
            }
        };
        debug!(asset = %key, "Prepared walkthrough step");
        steps.push(WalkthroughStep {
            key,
            asset,
            caption,
        });
    }

    info!(
        gene = %locus.gene,
        category = %category,
        steps = steps.len(),
        "Walkthrough steps built"
    );
    Ok(steps)
}
